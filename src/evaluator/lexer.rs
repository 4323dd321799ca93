//! Tokenizer for branch conditions.

use logos::Logos;

use super::expression::ExpressionError;

/// Source span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Keywords
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("and")]
    #[token("&&")]
    And,
    #[token("or")]
    #[token("||")]
    Or,
    #[token("not")]
    #[token("!")]
    Not,

    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Literals
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unescape(lex.slice()))]
    Str(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,
}

/// Strip quotes and resolve backslash escapes
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ExpressionError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(SpannedToken {
                token,
                span: Span {
                    start: span.start,
                    end: span.end,
                },
            }),
            Err(()) => {
                return Err(ExpressionError::Lex {
                    position: span.start,
                    fragment: lexer.slice().to_string(),
                })
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_keywords_and_symbols() {
        assert_eq!(
            kinds("a && not b || c and !d"),
            vec![
                Token::Ident("a".into()),
                Token::And,
                Token::Not,
                Token::Ident("b".into()),
                Token::Or,
                Token::Ident("c".into()),
                Token::And,
                Token::Not,
                Token::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#"12 3.5 'it\'s' "x" null"#),
            vec![
                Token::Int(12),
                Token::Float(3.5),
                Token::Str("it's".into()),
                Token::Str("x".into()),
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_comparison_longest_match() {
        assert_eq!(
            kinds("a<=b != c"),
            vec![
                Token::Ident("a".into()),
                Token::LtEq,
                Token::Ident("b".into()),
                Token::NotEq,
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_identifier_with_keyword_prefix() {
        assert_eq!(kinds("android"), vec![Token::Ident("android".into())]);
    }

    #[test]
    fn test_invalid_character() {
        assert!(matches!(
            tokenize("a # b"),
            Err(ExpressionError::Lex { position: 2, .. })
        ));
    }
}
