use thiserror::Error;

/// A parser over a slice of `I`, starting at `pos`.
///
/// On success the parser returns the position after the consumed input
/// together with its output.
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error: {message}, found '{found}' at token {position}")]
    ParseError {
        message: String,
        found: String,
        position: usize,
    },
    #[error("Unexpected EOF")]
    UnexpectedEOF,
    #[error("EOF")]
    EOF,
    #[error("No alternative")]
    NoAlternative,
    #[error("Fail: {0}")]
    Fail(String),
    #[error("PredicateError")]
    PredicateError,
    #[error("WithContext: {message}, {inner}")]
    WithContext {
        message: String,
        inner: Box<ParseError>,
    },
}
