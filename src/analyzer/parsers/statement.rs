use super::super::{core::*, prelude::*};
use super::common::*;
use super::expression::{parse_expression, parse_postfix};
use crate::ast;
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::Token,
};

/// One statement, with an optional trailing `;`.
pub fn parse_statement() -> impl Parser<Token, ast::Statement> {
    with_context(
        choice(vec![
            Box::new(map(parse_semicolon(), |_: ()| ast::Statement::Empty)),
            Box::new(terminated(
                choice(vec![
                    Box::new(parse_block()),
                    Box::new(parse_if()),
                    Box::new(parse_while()),
                    Box::new(parse_return()),
                    Box::new(parse_declaration()),
                    Box::new(parse_assignment()),
                    Box::new(map(parse_expression(), ast::Statement::Expression)),
                ]),
                optional(parse_semicolon()),
            )),
        ]),
        "statement",
    )
}

pub fn parse_statements() -> impl Parser<Token, ast::Statements> {
    many(lazy(parse_statement))
}

fn parse_block() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            delimited(parse_open_brace(), parse_statements(), parse_close_brace()),
            ast::Statement::Block,
        ),
        "block",
    )
}

fn parse_condition() -> impl Parser<Token, ast::Expression> {
    delimited(parse_open_paren(), parse_expression(), parse_close_paren())
}

fn parse_if() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            tuple3(
                preceded(parse_keyword(Keyword::If), parse_condition()),
                lazy(parse_statement),
                optional(preceded(parse_keyword(Keyword::Else), lazy(parse_statement))),
            ),
            |(condition, then_block, else_block): (
                ast::Expression,
                ast::Statement,
                Option<ast::Statement>,
            )| ast::Statement::If {
                condition,
                then_block: Box::new(then_block),
                else_block: else_block.map(Box::new),
            },
        ),
        "if statement",
    )
}

fn parse_while() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            tuple2(
                preceded(parse_keyword(Keyword::While), parse_condition()),
                lazy(parse_statement),
            ),
            |(condition, body): (ast::Expression, ast::Statement)| ast::Statement::While {
                condition,
                body: Box::new(body),
            },
        ),
        "while statement",
    )
}

fn parse_return() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            preceded(parse_keyword(Keyword::Return), optional(parse_expression())),
            ast::Statement::Return,
        ),
        "return statement",
    )
}

fn parse_declaration_kind() -> impl Parser<Token, ast::DeclarationKind> {
    satisfy(|token: &Token| match token {
        Token::Keyword(Keyword::Const) => Some(ast::DeclarationKind::Const),
        Token::Keyword(Keyword::Let) => Some(ast::DeclarationKind::Let),
        Token::Keyword(Keyword::Var) => Some(ast::DeclarationKind::Var),
        _ => None,
    })
}

fn parse_declaration() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            tuple3(
                parse_declaration_kind(),
                parse_identifier(),
                optional(preceded(
                    parse_delimiter(Delimiter::Equal),
                    parse_expression(),
                )),
            ),
            |(kind, name, value): (ast::DeclarationKind, String, Option<ast::Expression>)| {
                ast::Statement::Declaration { kind, name, value }
            },
        ),
        "declaration",
    )
}

fn parse_assignment_operator() -> impl Parser<Token, ast::AssignmentOperator> {
    satisfy(|token: &Token| match token {
        Token::Delimiter(Delimiter::Equal) => Some(ast::AssignmentOperator::Assign),
        Token::Operator(Operator::PlusEqual) => Some(ast::AssignmentOperator::AddAssign),
        Token::Operator(Operator::MinusEqual) => Some(ast::AssignmentOperator::SubtractAssign),
        _ => None,
    })
}

fn parse_assignment() -> impl Parser<Token, ast::Statement> {
    with_context(
        map(
            tuple3(
                filter_map(parse_postfix(), |target: ast::Expression| {
                    target.as_assignment_target()
                }),
                parse_assignment_operator(),
                parse_expression(),
            ),
            |(target, op, value): (
                ast::AssignmentTarget,
                ast::AssignmentOperator,
                ast::Expression,
            )| ast::Statement::Assignment { target, op, value },
        ),
        "assignment",
    )
}
