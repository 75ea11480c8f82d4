//! Expression mini-language used by `define`, `eval`, `if` and `for`.
//!
//! ```text
//! "10 + x * 2" ──► lexer ──► parser ──► Expr ──► evaluate(env) ──► Value
//!                                                     │
//!                                       Env: names, paths, file properties
//! ```
//!
//! Expressions are parsed once when a directive is scanned and evaluated
//! again on every render, against whatever bindings are visible then.

mod ast;
mod eval;
mod lexer;
mod parser;
mod value;

pub use ast::Expr;
pub use eval::{Env, EvalError, compare, evaluate_forced, force};
pub use parser::parse;
pub use value::{DateValue, PathRef, Value};

use thiserror::Error;

/// Syntax error in an expression, with the byte offset it was found at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}
