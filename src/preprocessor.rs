//! # Token Preprocessor
//!
//! Sits between the tokenizer and the analyzer:
//!
//! ```text
//! Expression text → Tokenizer → Preprocessor → Analyzer → Sandbox
//! ```
//!
//! Comments and formatting tokens are dropped and spans are reduced to
//! plain [`Token`]s, which is what the analyzer consumes.

use crate::tokenizer::token::{Token, TokenSpan};

/// A trait for preprocessing different types of input
pub trait Preprocessor<T, U = T> {
    fn process(&self, input: T) -> U;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenPreprocessor;

impl Preprocessor<Vec<TokenSpan>, Vec<Token>> for TokenPreprocessor {
    fn process(&self, input: Vec<TokenSpan>) -> Vec<Token> {
        input
            .into_iter()
            .map(|span| span.token)
            .filter(|token| {
                !matches!(
                    token,
                    Token::Comment { .. } | Token::Whitespace(_) | Token::Newline
                )
            })
            .collect()
    }
}
