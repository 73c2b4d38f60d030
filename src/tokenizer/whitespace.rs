//! # Whitespace Token Handling
//!
//! Spaces, tabs and line breaks are kept as tokens so that error positions
//! stay exact; the [`crate::preprocessor`] drops them before parsing.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::map,
    error::context,
};

use super::token::{ParserResult, Token};

/// Parses a run of spaces and tabs.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    context(
        "whitespace",
        map(
            take_while1(|c: char| c == ' ' || c == '\t' || c == '\u{a0}'),
            |ws: &str| Token::Whitespace(ws.to_string()),
        ),
    )(input)
}

/// Parses one line break (`\n` or `\r\n`).
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_newline(input: &str) -> ParserResult<Token> {
    context(
        "newline",
        map(alt((tag("\r\n"), tag("\n"), tag("\r"))), |_| Token::Newline),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whitespace() {
        let (rest, token) = parse_whitespace(" \t x").unwrap();
        assert_eq!(token, Token::Whitespace(" \t ".to_string()));
        assert_eq!(rest, "x");
        assert!(parse_whitespace("x").is_err());
    }

    #[test]
    fn test_parse_newline() {
        let (rest, token) = parse_newline("\r\nx").unwrap();
        assert_eq!(token, Token::Newline);
        assert_eq!(rest, "x");
    }
}
