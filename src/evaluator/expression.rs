//! AST, parser and evaluator for branch conditions.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := unary_not (("&&" | "and") unary_not)*
//! compare := sum (("==" | "!=" | "<" | "<=" | ">" | ">=") sum)?
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/" | "%") unary)*
//! unary   := ("!" | "not" | "-") unary | primary
//! primary := literal | path | "(" or ")"
//! path    := IDENT ("." (IDENT | INT) | "[" (INT | STRING) "]")*
//! ```

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

use super::lexer::{tokenize, SpannedToken, Token};
use super::operators::{add, arithmetic, compare, equal};
use super::type_coercion::{from_f64, is_truthy, to_f64};
use crate::core::variable_pool::VariableEnvironment;

#[derive(Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("Unexpected character '{fragment}' at {position}")]
    Lex { position: usize, fragment: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Type error: {0}")]
    Type(String),
    #[error("Division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(String, Vec<PathSegment>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Deepest expression tree the parser builds. Evaluation recurses over the
/// tree, so this bounds its stack use too.
pub const MAX_EXPRESSION_DEPTH: usize = 128;

pub fn parse_expression(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Parse("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(ExpressionError::Parse(format!(
            "unexpected {:?} at {}",
            tok.token, tok.span.start
        ))),
    }
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|t| t.token.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ExpressionError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", token)))
        }
    }

    /// One level deeper into the tree; errors past [`MAX_EXPRESSION_DEPTH`].
    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(ExpressionError::Parse(format!(
                "expression nested deeper than {} levels",
                MAX_EXPRESSION_DEPTH
            )));
        }
        Ok(())
    }

    fn unexpected(&self, wanted: &str) -> ExpressionError {
        match self.peek() {
            Some(tok) => ExpressionError::Parse(format!(
                "expected {} but found {:?} at {}",
                wanted, tok.token, tok.span.start
            )),
            None => ExpressionError::Parse(format!("expected {} but input ended", wanted)),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let depth = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let depth = self.depth;
        let mut left = self.parse_compare()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let right = self.parse_compare()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_compare(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.parse_sum()?;
        let op = match self.peek_token() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::NotEq,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::LtEq) => BinaryOp::LtEq,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::GtEq) => BinaryOp::GtEq,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_sum()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_sum(&mut self) -> Result<Expr, ExpressionError> {
        let depth = self.depth;
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth = depth;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_product()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_product(&mut self) -> Result<Expr, ExpressionError> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => {
                    self.depth = depth;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.eat(&Token::Minus) {
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let Some(token) = self.advance() else {
            return Err(self.unexpected("an operand"));
        };
        match token {
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Int(n) => Ok(Expr::Literal(Value::from(n))),
            Token::Float(f) => Ok(Expr::Literal(from_f64(f)?)),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => self.parse_path(name),
            Token::LParen => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => {
                self.pos -= 1;
                Err(ExpressionError::Parse(format!(
                    "expected an operand but found {:?}",
                    other
                )))
            }
        }
    }

    fn parse_path(&mut self, root: String) -> Result<Expr, ExpressionError> {
        let mut segments = Vec::new();
        loop {
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Token::Ident(key)) => segments.push(PathSegment::Key(key)),
                    Some(Token::Int(i)) if i >= 0 => segments.push(PathSegment::Index(i as usize)),
                    _ => return Err(ExpressionError::Parse(format!(
                        "invalid member access after '{}'",
                        root
                    ))),
                }
            } else if self.eat(&Token::LBracket) {
                match self.advance() {
                    Some(Token::Int(i)) if i >= 0 => segments.push(PathSegment::Index(i as usize)),
                    Some(Token::Str(key)) => segments.push(PathSegment::Key(key)),
                    _ => return Err(ExpressionError::Parse(format!(
                        "invalid index after '{}'",
                        root
                    ))),
                }
                self.expect(&Token::RBracket)?;
            } else {
                return Ok(Expr::Path(root, segments));
            }
        }
    }
}

impl Expr {
    /// Evaluate against `env`. Unknown variables and missing members yield `null`.
    pub fn evaluate(&self, env: &VariableEnvironment) -> Result<Value, ExpressionError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Path(root, segments) => Ok(lookup(env, root, segments)),
            Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&inner.evaluate(env)?))),
            Expr::Neg(inner) => from_f64(-to_f64(&inner.evaluate(env)?)?),
            Expr::And(l, r) => {
                if !is_truthy(&l.evaluate(env)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(is_truthy(&r.evaluate(env)?)))
            }
            Expr::Or(l, r) => {
                if is_truthy(&l.evaluate(env)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(is_truthy(&r.evaluate(env)?)))
            }
            Expr::Binary(op, l, r) => {
                let a = l.evaluate(env)?;
                let b = r.evaluate(env)?;
                match op {
                    BinaryOp::Add => add(&a, &b),
                    BinaryOp::Sub => arithmetic('-', &a, &b),
                    BinaryOp::Mul => arithmetic('*', &a, &b),
                    BinaryOp::Div => arithmetic('/', &a, &b),
                    BinaryOp::Rem => arithmetic('%', &a, &b),
                    BinaryOp::Eq => Ok(Value::Bool(equal(&a, &b))),
                    BinaryOp::NotEq => Ok(Value::Bool(!equal(&a, &b))),
                    BinaryOp::Lt => Ok(Value::Bool(compare(&a, &b)? == Ordering::Less)),
                    BinaryOp::LtEq => Ok(Value::Bool(compare(&a, &b)? != Ordering::Greater)),
                    BinaryOp::Gt => Ok(Value::Bool(compare(&a, &b)? == Ordering::Greater)),
                    BinaryOp::GtEq => Ok(Value::Bool(compare(&a, &b)? != Ordering::Less)),
                }
            }
        }
    }
}

fn lookup(env: &VariableEnvironment, root: &str, segments: &[PathSegment]) -> Value {
    let Some(mut current) = env.get(root) else {
        return Value::Null;
    };
    for segment in segments {
        let next = match (segment, current) {
            (PathSegment::Key(k), Value::Object(map)) => map.get(k),
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i),
            (PathSegment::Index(i), Value::Object(map)) => map.get(&i.to_string()),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}
