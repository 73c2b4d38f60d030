//! # Sandboxed Evaluator
//!
//! Runs author expressions and synthesized scripts against a variable pool.
//!
//! ```text
//! expression → template (names → ids) → Tokenizer → Analyzer → Sandbox → JSON value
//! ```
//!
//! Every run gets a fresh [`context::Sandbox`] with its own scopes and
//! execution budget. Failures never escape [`Evaluator::evaluate`]; they
//! degrade to the template-substituted text of the expression.

pub mod builtins;
pub mod context;
pub mod evaluator;
pub mod expression;
pub mod fetch;
pub mod statement;
pub mod value;

use thiserror::Error;

use crate::analyzer::ParseError;
use crate::tokenizer::token::TokenizerError;

pub use evaluator::Evaluator;
pub use fetch::{FetchRequest, Fetcher, HttpFetcher};
pub use value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Tokenize error: {0}")]
    Tokenize(#[from] TokenizerError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("ReferenceError: {0}")]
    Reference(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
