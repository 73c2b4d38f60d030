use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, take_while_m_n},
    character::complete::{anychar, char, digit1, one_of},
    combinator::{map, map_opt, map_res, opt, recognize, value},
    error::context,
    sequence::{delimited, pair, preceded, tuple},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    Undefined,
}

impl Literal {
    /// Word literals are recognised by the identifier parser.
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "true" => Some(Literal::Boolean(true)),
            "false" => Some(Literal::Boolean(false)),
            "null" => Some(Literal::Null),
            "undefined" => Some(Literal::Undefined),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
            Literal::Undefined => write!(f, "undefined"),
        }
    }
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_unicode_escape(input: &str) -> ParserResult<char> {
    context(
        "unicode escape",
        map_opt(
            preceded(
                char('u'),
                take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
            ),
            |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_escape(input: &str) -> ParserResult<char> {
    context(
        "escape sequence",
        alt((
            value('\n', char('n')),
            value('\t', char('t')),
            value('\r', char('r')),
            value('\u{8}', char('b')),
            value('\u{c}', char('f')),
            value('\0', char('0')),
            parse_unicode_escape,
            // \\ \" \' and any other escaped character stand for themselves
            anychar,
        )),
    )(input)
}

fn parse_quoted<'a>(
    quote: char,
    stop: &'static str,
) -> impl FnMut(&'a str) -> ParserResult<'a, String> {
    delimited(
        char(quote),
        map(
            opt(escaped_transform(is_not(stop), '\\', parse_escape)),
            Option::unwrap_or_default,
        ),
        char(quote),
    )
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(
            alt((parse_quoted('"', "\\\"\n"), parse_quoted('\'', "\\'\n"))),
            Literal::String,
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_number_literal(input: &str) -> ParserResult<Literal> {
    context(
        "number literal",
        map_res(
            recognize(tuple((
                digit1,
                opt(pair(char('.'), digit1)),
                opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
            ))),
            |s: &str| {
                if s.contains(['.', 'e', 'E']) {
                    s.parse::<f64>().map(Literal::Float)
                } else {
                    // integers beyond i64 degrade to floats, as numbers do in scripts
                    s.parse::<i64>()
                        .map(Literal::Integer)
                        .or_else(|_| s.parse::<f64>().map(Literal::Float))
                }
            },
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((parse_string_literal, parse_number_literal)),
            Token::Literal,
        ),
    )(input)
}
