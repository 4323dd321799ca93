//! Sandboxed boolean expressions for BRANCH steps.
//!
//! Expressions are lexed with `logos`, parsed by a small recursive-descent
//! parser and evaluated against a [`VariableEnvironment`](crate::core::variable_pool::VariableEnvironment).
//! There are no function calls, no assignment and no I/O.

pub mod condition;
pub mod expression;
pub mod lexer;
pub mod operators;
pub mod type_coercion;

pub use condition::{evaluate_condition, try_evaluate_condition};
pub use expression::{parse_expression, Expr, ExpressionError};
