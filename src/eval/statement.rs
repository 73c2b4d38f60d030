use super::context::Sandbox;
use super::expression::ExpressionEvaluator;
use super::value::Value;
use super::EvalResult;
use crate::ast::{self, AssignmentOperator, DeclarationKind, Expression, Statement};

/// Outcome of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    Value(Value),
    Control(ControlFlow),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Return(Value),
}

pub struct StatementEvaluator<'a> {
    pub expression_evaluator: ExpressionEvaluator<'a>,
}

impl<'a> StatementEvaluator<'a> {
    pub fn new(expression_evaluator: ExpressionEvaluator<'a>) -> Self {
        Self {
            expression_evaluator,
        }
    }

    /// Runs a program as the body of a function and yields its return value.
    pub fn eval_program(&self, program: &ast::Program, sandbox: &mut Sandbox) -> EvalResult<Value> {
        for statement in &program.statements {
            if let StatementResult::Control(ControlFlow::Return(value)) =
                self.eval_statement(statement, sandbox)?
            {
                return Ok(value);
            }
        }
        Ok(Value::Undefined)
    }

    pub fn eval_statement(
        &self,
        statement: &Statement,
        sandbox: &mut Sandbox,
    ) -> EvalResult<StatementResult> {
        sandbox.tick()?;
        sandbox.enter()?;
        let result = self.dispatch(statement, sandbox);
        sandbox.exit();
        result
    }

    fn dispatch(
        &self,
        statement: &Statement,
        sandbox: &mut Sandbox,
    ) -> EvalResult<StatementResult> {
        match statement {
            Statement::Expression(expr) => {
                Ok(StatementResult::Value(self.eval_expression(expr, sandbox)?))
            }
            Statement::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expression(expr, sandbox)?,
                    None => Value::Undefined,
                };
                Ok(StatementResult::Control(ControlFlow::Return(value)))
            }
            Statement::Declaration { kind, name, value } => {
                let value = match value {
                    Some(expr) => self.eval_expression(expr, sandbox)?,
                    None => Value::Undefined,
                };
                sandbox.declare(name, value, *kind == DeclarationKind::Const)?;
                Ok(StatementResult::Value(Value::Undefined))
            }
            Statement::Assignment { target, op, value } => {
                Ok(StatementResult::Value(self.eval_assignment(target, *op, value, sandbox)?))
            }
            Statement::Block(statements) => self.eval_block(statements, sandbox),
            Statement::If {
                condition,
                then_block,
                else_block,
            } => {
                if self.eval_expression(condition, sandbox)?.is_truthy() {
                    self.eval_statement(then_block, sandbox)
                } else if let Some(else_block) = else_block {
                    self.eval_statement(else_block, sandbox)
                } else {
                    Ok(StatementResult::Value(Value::Undefined))
                }
            }
            Statement::While { condition, body } => {
                while self.eval_expression(condition, sandbox)?.is_truthy() {
                    let result = self.eval_statement(body, sandbox)?;
                    if let StatementResult::Control(_) = result {
                        return Ok(result);
                    }
                }
                Ok(StatementResult::Value(Value::Undefined))
            }
            Statement::Empty => Ok(StatementResult::Value(Value::Undefined)),
        }
    }

    pub fn eval_block(
        &self,
        statements: &[Statement],
        sandbox: &mut Sandbox,
    ) -> EvalResult<StatementResult> {
        sandbox.push_scope();
        let mut last = StatementResult::Value(Value::Undefined);
        for statement in statements {
            match self.eval_statement(statement, sandbox) {
                Ok(result @ StatementResult::Control(_)) => {
                    sandbox.pop_scope();
                    return Ok(result);
                }
                Ok(result) => last = result,
                Err(e) => {
                    sandbox.pop_scope();
                    return Err(e);
                }
            }
        }
        sandbox.pop_scope();
        Ok(last)
    }

    fn eval_expression(&self, expr: &Expression, sandbox: &mut Sandbox) -> EvalResult<Value> {
        self.expression_evaluator.eval_expression(expr, sandbox)
    }

    fn eval_assignment(
        &self,
        target: &ast::AssignmentTarget,
        op: AssignmentOperator,
        value: &Expression,
        sandbox: &mut Sandbox,
    ) -> EvalResult<Value> {
        let value = self.eval_expression(value, sandbox)?;
        let value = match op {
            AssignmentOperator::Assign => value,
            AssignmentOperator::AddAssign => self.read_target(target, sandbox)?.add(&value),
            AssignmentOperator::SubtractAssign => {
                Value::number(self.read_target(target, sandbox)?.to_number() - value.to_number())
            }
        };
        self.expression_evaluator
            .write_target(target, value.clone(), sandbox)?;
        Ok(value)
    }

    fn read_target(
        &self,
        target: &ast::AssignmentTarget,
        sandbox: &mut Sandbox,
    ) -> EvalResult<Value> {
        let expr = target.path.iter().fold(
            Expression::Identifier(target.name.clone()),
            |object, accessor| match accessor {
                ast::Accessor::Property(property) => Expression::Member {
                    object: Box::new(object),
                    property: property.clone(),
                },
                ast::Accessor::Index(index) => Expression::Index {
                    object: Box::new(object),
                    index: Box::new(index.clone()),
                },
            },
        );
        self.eval_expression(&expr, sandbox)
    }
}
