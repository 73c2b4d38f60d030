//! Syntax tree of the expression language.

use strum_macros::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Array(Vec<Expression>),
    Object(Vec<(String, Expression)>),
    Member {
        object: Box<Expression>,
        property: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    New {
        constructor: String,
        arguments: Vec<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOperator {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "typeof")]
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "===")]
    StrictEqual,
    #[strum(serialize = "!==")]
    StrictNotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "??")]
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
}

/// One step of an assignment target path, `.name` or `[expr]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Property(String),
    Index(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentTarget {
    pub name: String,
    pub path: Vec<Accessor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Declaration {
        kind: DeclarationKind,
        name: String,
        value: Option<Expression>,
    },
    Assignment {
        target: AssignmentTarget,
        op: AssignmentOperator,
        value: Expression,
    },
    Expression(Expression),
    Return(Option<Expression>),
    If {
        condition: Expression,
        then_block: Box<Statement>,
        else_block: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    Block(Vec<Statement>),
    Empty,
}

pub type Statements = Vec<Statement>;

/// A parsed script: the body of an implicit function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Statements,
}

impl Expression {
    /// Converts `a`, `a.b` or `a[i]` chains into an assignment target.
    pub fn as_assignment_target(&self) -> Option<AssignmentTarget> {
        match self {
            Expression::Identifier(name) => Some(AssignmentTarget {
                name: name.clone(),
                path: Vec::new(),
            }),
            Expression::Member { object, property } => {
                let mut target = object.as_assignment_target()?;
                target.path.push(Accessor::Property(property.clone()));
                Some(target)
            }
            Expression::Index { object, index } => {
                let mut target = object.as_assignment_target()?;
                target.path.push(Accessor::Index((**index).clone()));
                Some(target)
            }
            _ => None,
        }
    }

    /// Height of the tree below this node; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + match self {
            Expression::Literal(_) | Expression::Identifier(_) => 0,
            Expression::Array(items) => deepest(items.iter()),
            Expression::Object(entries) => deepest(entries.iter().map(|(_, value)| value)),
            Expression::Member { object, .. } => object.depth(),
            Expression::Index { object, index } => object.depth().max(index.depth()),
            Expression::Call { callee, arguments } => callee.depth().max(deepest(arguments.iter())),
            Expression::New { arguments, .. } => deepest(arguments.iter()),
            Expression::Unary { operand, .. } => operand.depth(),
            Expression::BinaryOp { left, right, .. } => left.depth().max(right.depth()),
            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
            } => condition
                .depth()
                .max(then_expr.depth())
                .max(else_expr.depth()),
        }
    }
}

fn deepest<'a>(expressions: impl Iterator<Item = &'a Expression>) -> usize {
    expressions.map(Expression::depth).max().unwrap_or(0)
}
