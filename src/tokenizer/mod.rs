//! # Tokenizer
//!
//! Turns expression source text into [`token::TokenSpan`]s with nom.
//!
//! Formatting (whitespace, newlines, comments) is kept in the token stream
//! and removed later by [`crate::preprocessor::TokenPreprocessor`].

pub mod comment;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;
