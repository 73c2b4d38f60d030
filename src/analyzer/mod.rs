//! # Script Analyzer
//!
//! Turns the token stream produced by the tokenizer into an [`ast::Program`]
//! using parser combinators.
//!
//! ## Core Components
//!
//! * **Parser Trait**: the parsing contract over a token slice
//! * **Combinators**: small composable parsers (`choice`, `many`, `delimited`, ...)
//! * **Grammar**: expression and statement parsers for the script subset
//!
//! ## Position in the Pipeline
//!
//! ```text
//! Script → Tokenizer → Preprocessor → Analyzer → Evaluator
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! use flowvar::analyzer::prelude::*;
//! use flowvar::analyzer::Parser;
//! use flowvar::tokenizer::token::Token;
//!
//! let parser = equal(Token::Identifier("example".to_string()));
//! let tokens = vec![Token::Identifier("example".to_string())];
//! let result = parser.parse(&tokens, 0);
//! ```

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;
pub use parsers::parse_program;

pub use crate::ast;
