pub mod common;
pub mod expression;
pub mod statement;

use super::core::{ParseError, Parser};
use crate::ast;
use crate::tokenizer::token::Token;

/// Parses a whole script. Every token must be consumed.
#[tracing::instrument(level = "debug", skip(tokens), fields(tokens = tokens.len()))]
pub fn parse_program(tokens: &[Token]) -> Result<ast::Program, ParseError> {
    let (pos, statements) = statement::parse_statements().parse(tokens, 0)?;
    match tokens.get(pos) {
        None => Ok(ast::Program { statements }),
        Some(found) => Err(ParseError::ParseError {
            message: "unexpected token".to_string(),
            found: found.to_string(),
            position: pos,
        }),
    }
}
