use super::super::{core::*, prelude::*};
use crate::ast;
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_identifier() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            _ => None,
        }),
        "identifier",
    )
}

/// Property names after `.` or in object literals may be reserved words.
pub fn parse_property_name() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            Token::Keyword(kw) => Some(kw.to_string()),
            Token::Literal(Literal::String(s)) => Some(s.clone()),
            Token::Literal(Literal::Integer(i)) => Some(i.to_string()),
            Token::Literal(Literal::Boolean(b)) => Some(b.to_string()),
            Token::Literal(Literal::Null) => Some("null".to_string()),
            Token::Literal(Literal::Undefined) => Some("undefined".to_string()),
            _ => None,
        }),
        "property name",
    )
}

pub fn parse_literal() -> impl Parser<Token, ast::Literal> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Literal(literal) => Some(match literal {
                Literal::String(s) => ast::Literal::String(s.clone()),
                Literal::Integer(i) => ast::Literal::Integer(*i),
                Literal::Float(f) => ast::Literal::Float(*f),
                Literal::Boolean(b) => ast::Literal::Boolean(*b),
                Literal::Null => ast::Literal::Null,
                Literal::Undefined => ast::Literal::Undefined,
            }),
            _ => None,
        }),
        "literal",
    )
}

pub fn parse_keyword(keyword: Keyword) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Keyword(keyword)))
}

pub fn parse_operator(operator: Operator) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Operator(operator)))
}

pub fn parse_delimiter(delimiter: Delimiter) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Delimiter(delimiter)))
}

pub fn parse_comma() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Comma)
}

pub fn parse_semicolon() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Semicolon)
}

pub fn parse_colon() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Colon)
}

pub fn parse_open_paren() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::OpenParen)
}

pub fn parse_close_paren() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::CloseParen)
}

pub fn parse_open_bracket() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::OpenBracket)
}

pub fn parse_close_bracket() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::CloseBracket)
}

pub fn parse_open_brace() -> impl Parser<Token, ()> {
    with_context(parse_delimiter(Delimiter::OpenBrace), "open brace")
}

pub fn parse_close_brace() -> impl Parser<Token, ()> {
    with_context(parse_delimiter(Delimiter::CloseBrace), "close brace")
}
