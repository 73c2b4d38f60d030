//! Expression grammar, lowest to highest precedence:
//!
//! ```text
//! conditional   := logical_or ("?" expression ":" expression)?
//! logical_or    := logical_and (("||" | "??") logical_and)*
//! logical_and   := equality ("&&" equality)*
//! equality      := relational (("===" | "!==" | "==" | "!=") relational)*
//! relational    := additive (("<" | "<=" | ">" | ">=") additive)*
//! additive      := multiplicative (("+" | "-") multiplicative)*
//! multiplicative:= unary (("*" | "/" | "%") unary)*
//! unary         := ("!" | "-" | "+" | "typeof") unary | postfix
//! postfix       := primary ("." name | "[" expression "]" | "(" arguments ")")*
//! primary       := literal | array | object | "(" expression ")" | new | identifier
//! ```

use super::super::{core::*, prelude::*};
use super::common::*;
use crate::ast;
use crate::tokenizer::{keyword::Keyword, symbol::Operator, token::Token};

pub fn parse_expression() -> impl Parser<Token, ast::Expression> {
    with_context(lazy(parse_conditional), "expression")
}

fn parse_conditional() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_or(),
                optional(tuple2(
                    preceded(parse_operator(Operator::Question), lazy(parse_expression)),
                    preceded(parse_colon(), lazy(parse_expression)),
                )),
            ),
            |(condition, branches): (ast::Expression, Option<(ast::Expression, ast::Expression)>)| {
                match branches {
                    Some((then_expr, else_expr)) => ast::Expression::Conditional {
                        condition: Box::new(condition),
                        then_expr: Box::new(then_expr),
                        else_expr: Box::new(else_expr),
                    },
                    None => condition,
                }
            },
        ),
        "conditional",
    )
}

/// Deepest tree a left-folded chain may build.
///
/// Chains such as `1 + 1 + ...` or `a.b.c...` nest one level per operator
/// without any recursion in the parser itself.
pub const MAX_CHAIN_DEPTH: usize = 256;

/// Depth of `first` folded with one node per item, or `None` past the limit.
fn chain_depth(first: usize, items: impl Iterator<Item = usize>) -> Option<usize> {
    items.fold(Some(first), |depth, item| {
        depth
            .map(|depth| depth.max(item) + 1)
            .filter(|depth| *depth <= MAX_CHAIN_DEPTH)
    })
}

/// Left-associative chain of `operand (operator operand)*`.
fn binary_level<F, P, Q>(operand: F, operator: Q) -> impl Parser<Token, ast::Expression>
where
    F: Fn() -> P,
    P: Parser<Token, ast::Expression>,
    Q: Parser<Token, ast::BinaryOperator>,
{
    filter_map(
        tuple2(operand(), many(tuple2(operator, operand()))),
        |(first, rest): (ast::Expression, Vec<(ast::BinaryOperator, ast::Expression)>)| {
            if rest.is_empty() {
                return Some(first);
            }
            chain_depth(first.depth(), rest.iter().map(|(_, right)| right.depth()))?;
            Some(
                rest.into_iter()
                    .fold(first, |left, (op, right)| ast::Expression::BinaryOp {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
            )
        },
    )
}

fn binary_operator(
    table: &'static [(Operator, ast::BinaryOperator)],
) -> impl Parser<Token, ast::BinaryOperator> {
    satisfy(move |token: &Token| match token {
        Token::Operator(op) => table
            .iter()
            .find(|(candidate, _)| candidate == op)
            .map(|(_, binary)| *binary),
        _ => None,
    })
}

fn parse_logical_or() -> impl Parser<Token, ast::Expression> {
    with_context(
        binary_level(
            parse_logical_and,
            binary_operator(&[
                (Operator::Or, ast::BinaryOperator::Or),
                (Operator::Nullish, ast::BinaryOperator::Nullish),
            ]),
        ),
        "logical or",
    )
}

fn parse_logical_and() -> impl Parser<Token, ast::Expression> {
    with_context(
        binary_level(
            parse_equality,
            binary_operator(&[(Operator::And, ast::BinaryOperator::And)]),
        ),
        "logical and",
    )
}

fn parse_equality() -> impl Parser<Token, ast::Expression> {
    with_context(
        binary_level(
            parse_relational,
            binary_operator(&[
                (Operator::StrictEqual, ast::BinaryOperator::StrictEqual),
                (Operator::StrictNotEqual, ast::BinaryOperator::StrictNotEqual),
                (Operator::EqualEqual, ast::BinaryOperator::Equal),
                (Operator::NotEqual, ast::BinaryOperator::NotEqual),
            ]),
        ),
        "equality",
    )
}

fn parse_relational() -> impl Parser<Token, ast::Expression> {
    with_context(
        binary_level(
            parse_additive,
            binary_operator(&[
                (Operator::Less, ast::BinaryOperator::LessThan),
                (Operator::LessEqual, ast::BinaryOperator::LessThanEqual),
                (Operator::Greater, ast::BinaryOperator::GreaterThan),
                (Operator::GreaterEqual, ast::BinaryOperator::GreaterThanEqual),
            ]),
        ),
        "relational",
    )
}

fn parse_additive() -> impl Parser<Token, ast::Expression> {
    with_context(
        binary_level(
            parse_multiplicative,
            binary_operator(&[
                (Operator::Plus, ast::BinaryOperator::Add),
                (Operator::Minus, ast::BinaryOperator::Subtract),
            ]),
        ),
        "additive",
    )
}

fn parse_multiplicative() -> impl Parser<Token, ast::Expression> {
    with_context(
        binary_level(
            parse_unary,
            binary_operator(&[
                (Operator::Multiply, ast::BinaryOperator::Multiply),
                (Operator::Divide, ast::BinaryOperator::Divide),
                (Operator::Percent, ast::BinaryOperator::Modulo),
            ]),
        ),
        "multiplicative",
    )
}

fn parse_unary_operator() -> impl Parser<Token, ast::UnaryOperator> {
    satisfy(|token: &Token| match token {
        Token::Operator(Operator::Not) => Some(ast::UnaryOperator::Not),
        Token::Operator(Operator::Minus) => Some(ast::UnaryOperator::Negate),
        Token::Operator(Operator::Plus) => Some(ast::UnaryOperator::Plus),
        Token::Keyword(Keyword::Typeof) => Some(ast::UnaryOperator::Typeof),
        _ => None,
    })
}

fn parse_unary() -> impl Parser<Token, ast::Expression> {
    with_context(
        choice(vec![
            Box::new(map(
                tuple2(parse_unary_operator(), lazy(parse_unary)),
                |(op, operand): (ast::UnaryOperator, ast::Expression)| ast::Expression::Unary {
                    op,
                    operand: Box::new(operand),
                },
            )),
            Box::new(parse_postfix()),
        ]),
        "unary",
    )
}

#[derive(Debug, Clone)]
enum Suffix {
    Member(String),
    Index(ast::Expression),
    Call(Vec<ast::Expression>),
}

impl Suffix {
    fn depth(&self) -> usize {
        match self {
            Suffix::Member(_) => 0,
            Suffix::Index(index) => index.depth(),
            Suffix::Call(arguments) => arguments
                .iter()
                .map(ast::Expression::depth)
                .max()
                .unwrap_or(0),
        }
    }
}

pub fn parse_arguments() -> impl Parser<Token, Vec<ast::Expression>> {
    with_context(
        delimited(
            parse_open_paren(),
            separated_list(lazy(parse_expression), parse_comma()),
            parse_close_paren(),
        ),
        "arguments",
    )
}

fn parse_suffix() -> impl Parser<Token, Suffix> {
    choice(vec![
        Box::new(map(
            preceded(parse_operator(Operator::Dot), parse_property_name()),
            Suffix::Member,
        )),
        Box::new(map(
            delimited(
                parse_open_bracket(),
                lazy(parse_expression),
                parse_close_bracket(),
            ),
            Suffix::Index,
        )),
        Box::new(map(parse_arguments(), Suffix::Call)),
    ])
}

pub fn parse_postfix() -> impl Parser<Token, ast::Expression> {
    with_context(
        filter_map(
            tuple2(parse_primary(), many(parse_suffix())),
            |(primary, suffixes): (ast::Expression, Vec<Suffix>)| {
                if suffixes.is_empty() {
                    return Some(primary);
                }
                chain_depth(primary.depth(), suffixes.iter().map(Suffix::depth))?;
                let expression = suffixes
                    .into_iter()
                    .fold(primary, |object, suffix| match suffix {
                        Suffix::Member(property) => ast::Expression::Member {
                            object: Box::new(object),
                            property,
                        },
                        Suffix::Index(index) => ast::Expression::Index {
                            object: Box::new(object),
                            index: Box::new(index),
                        },
                        Suffix::Call(arguments) => ast::Expression::Call {
                            callee: Box::new(object),
                            arguments,
                        },
                    });
                Some(expression)
            },
        ),
        "postfix",
    )
}

fn parse_primary() -> impl Parser<Token, ast::Expression> {
    with_context(
        choice(vec![
            Box::new(map(parse_literal(), ast::Expression::Literal)),
            Box::new(parse_array()),
            Box::new(parse_object()),
            Box::new(parse_parenthesized()),
            Box::new(parse_new()),
            Box::new(map(parse_identifier(), ast::Expression::Identifier)),
        ]),
        "primary",
    )
}

fn parse_array() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            delimited(
                parse_open_bracket(),
                separated_list(lazy(parse_expression), parse_comma()),
                parse_close_bracket(),
            ),
            ast::Expression::Array,
        ),
        "array",
    )
}

fn parse_object() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            delimited(
                parse_open_brace(),
                separated_list(
                    tuple2(
                        parse_property_name(),
                        preceded(parse_colon(), lazy(parse_expression)),
                    ),
                    parse_comma(),
                ),
                parse_close_brace(),
            ),
            ast::Expression::Object,
        ),
        "object",
    )
}

fn parse_parenthesized() -> impl Parser<Token, ast::Expression> {
    with_context(
        delimited(
            parse_open_paren(),
            lazy(parse_expression),
            parse_close_paren(),
        ),
        "parenthesized",
    )
}

fn parse_new() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                preceded(parse_keyword(Keyword::New), parse_identifier()),
                optional(parse_arguments()),
            ),
            |(constructor, arguments): (String, Option<Vec<ast::Expression>>)| {
                ast::Expression::New {
                    constructor,
                    arguments: arguments.unwrap_or_default(),
                }
            },
        ),
        "new",
    )
}
