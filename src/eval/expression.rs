use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tracing::{debug, warn};

use super::builtins::{call_function, call_method, namespace_member};
use super::context::Sandbox;
use super::fetch::{FetchRequest, Fetcher};
use super::value::{Builtin, Value};
use super::{EvalError, EvalResult};
use crate::ast::{self, BinaryOperator, Expression, UnaryOperator};
use crate::timestamp::Clock;

/// Evaluates expressions against a [`Sandbox`].
///
/// Holds the host capabilities a script may reach: the clock behind
/// `new Date()` and the fetcher behind `fetch(...)`.
pub struct ExpressionEvaluator<'a> {
    clock: &'a dyn Clock,
    time_zone: Tz,
    fetcher: &'a dyn Fetcher,
    allow_fetch: bool,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        time_zone: Tz,
        fetcher: &'a dyn Fetcher,
        allow_fetch: bool,
    ) -> Self {
        Self {
            clock,
            time_zone,
            fetcher,
            allow_fetch,
        }
    }

    pub fn eval_expression(&self, expr: &Expression, sandbox: &mut Sandbox) -> EvalResult<Value> {
        sandbox.tick()?;
        sandbox.enter()?;
        let result = self.eval_node(expr, sandbox).and_then(|value| {
            if builds_value(expr) {
                sandbox.check_value(&value)?;
            }
            Ok(value)
        });
        sandbox.exit();
        result
    }

    fn eval_node(&self, expr: &Expression, sandbox: &mut Sandbox) -> EvalResult<Value> {
        match expr {
            Expression::Literal(literal) => Ok(Self::eval_literal(literal)),
            Expression::Identifier(name) => sandbox.lookup(name).cloned(),
            Expression::Array(items) => items
                .iter()
                .map(|item| self.eval_expression(item, sandbox))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::List),
            Expression::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let value = self.eval_expression(value, sandbox)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Map(map))
            }
            Expression::Member { object, property } => {
                let object = self.eval_expression(object, sandbox)?;
                get_property(&object, property)
            }
            Expression::Index { object, index } => {
                let object = self.eval_expression(object, sandbox)?;
                let index = self.eval_expression(index, sandbox)?;
                get_index(&object, &index)
            }
            Expression::Call { callee, arguments } => self.eval_call(callee, arguments, sandbox),
            Expression::New {
                constructor,
                arguments,
            } => self.eval_new(constructor, arguments, sandbox),
            Expression::Unary { op, operand } => self.eval_unary(*op, operand, sandbox),
            Expression::BinaryOp { op, left, right } => {
                self.eval_binary_op(*op, left, right, sandbox)
            }
            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.eval_expression(condition, sandbox)?.is_truthy() {
                    self.eval_expression(then_expr, sandbox)
                } else {
                    self.eval_expression(else_expr, sandbox)
                }
            }
        }
    }

    fn eval_literal(literal: &ast::Literal) -> Value {
        match literal {
            ast::Literal::Undefined => Value::Undefined,
            ast::Literal::Null => Value::Null,
            ast::Literal::Boolean(b) => Value::Boolean(*b),
            ast::Literal::Integer(i) => Value::Integer(*i),
            ast::Literal::Float(f) => Value::Float(*f),
            ast::Literal::String(s) => Value::String(s.clone()),
        }
    }

    pub fn eval_arguments(
        &self,
        arguments: &[Expression],
        sandbox: &mut Sandbox,
    ) -> EvalResult<Vec<Value>> {
        arguments
            .iter()
            .map(|argument| self.eval_expression(argument, sandbox))
            .collect()
    }

    fn eval_call(
        &self,
        callee: &Expression,
        arguments: &[Expression],
        sandbox: &mut Sandbox,
    ) -> EvalResult<Value> {
        sandbox.enter()?;
        let result = self.eval_call_inner(callee, arguments, sandbox);
        sandbox.exit();
        result
    }

    fn eval_call_inner(
        &self,
        callee: &Expression,
        arguments: &[Expression],
        sandbox: &mut Sandbox,
    ) -> EvalResult<Value> {
        if let Expression::Member { object, property } = callee {
            let receiver = self.eval_expression(object, sandbox)?;
            if let Value::Builtin(namespace) = receiver {
                let function = namespace_member(namespace, property);
                let args = self.eval_arguments(arguments, sandbox)?;
                return self.call_value(&function, &format!("{}.{}", namespace, property), args);
            }
            let args = self.eval_arguments(arguments, sandbox)?;
            if property == "push" {
                let target = object.as_assignment_target();
                if let (Value::List(items), Some(target)) = (&receiver, target) {
                    let mut items = items.clone();
                    items.extend(args);
                    let length = items.len() as i64;
                    self.write_target(&target, Value::List(items), sandbox)?;
                    return Ok(Value::Integer(length));
                }
            }
            return call_method(&receiver, property, &args, sandbox.max_value_len());
        }

        let function = self.eval_expression(callee, sandbox)?;
        let args = self.eval_arguments(arguments, sandbox)?;
        self.call_value(&function, &describe(callee), args)
    }

    fn call_value(&self, function: &Value, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        match function {
            Value::Builtin(Builtin::Fetch) => Ok(self.fetch(&args)),
            Value::Builtin(Builtin::DateNow) => Ok(Value::Integer(self.now().timestamp_millis())),
            Value::Builtin(builtin) if !builtin.is_namespace() && *builtin != Builtin::Date => {
                call_function(*builtin, &args)
            }
            _ => Err(EvalError::Type(format!("{} is not a function", name))),
        }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.clock
            .now()
            .into_inner()
            .with_timezone(&self.time_zone)
            .fixed_offset()
    }

    fn eval_new(
        &self,
        constructor: &str,
        arguments: &[Expression],
        sandbox: &mut Sandbox,
    ) -> EvalResult<Value> {
        if constructor != "Date" || !sandbox.is_defined("Date") {
            return Err(EvalError::Type(format!("{} is not a constructor", constructor)));
        }
        let args = self.eval_arguments(arguments, sandbox)?;
        let date = match args.first() {
            None => self.now(),
            Some(Value::String(text)) => DateTime::parse_from_rfc3339(text.trim())
                .map_err(|e| EvalError::Type(format!("Invalid Date '{}': {}", text, e)))?,
            Some(Value::Date(date)) => *date,
            Some(other) => {
                let millis = other.to_number();
                DateTime::from_timestamp_millis(millis as i64)
                    .filter(|_| millis.is_finite())
                    .ok_or_else(|| EvalError::Type("Invalid Date".to_string()))?
                    .with_timezone(&self.time_zone)
                    .fixed_offset()
            }
        };
        Ok(Value::Date(date))
    }

    fn fetch(&self, args: &[Value]) -> Value {
        let url = match args.first() {
            Some(url) => url.to_js_string(),
            None => return Value::Undefined,
        };
        if !self.allow_fetch {
            warn!(%url, "fetch is disabled, request dropped");
            return Value::Undefined;
        }
        let mut request = FetchRequest::get(url);
        if let Some(Value::Map(options)) = args.get(1) {
            if let Some(method) = options.get("method") {
                request.method = method.to_js_string();
            }
            if let Some(Value::Map(headers)) = options.get("headers") {
                request.headers = headers
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_js_string()))
                    .collect();
            }
            request.body = match options.get("body") {
                None | Some(Value::Undefined) | Some(Value::Null) => None,
                Some(Value::String(body)) => Some(body.clone()),
                Some(other) => Some(other.to_json().to_string()),
            };
        }
        debug!(url = %request.url, method = %request.method, "fetch requested");
        self.fetcher.fetch(request);
        Value::Undefined
    }

    fn eval_unary(
        &self,
        op: UnaryOperator,
        operand: &Expression,
        sandbox: &mut Sandbox,
    ) -> EvalResult<Value> {
        if op == UnaryOperator::Typeof {
            if let Expression::Identifier(name) = operand {
                if !sandbox.is_defined(name) {
                    return Ok(Value::String("undefined".to_string()));
                }
            }
        }
        let value = self.eval_expression(operand, sandbox)?;
        Ok(match op {
            UnaryOperator::Not => Value::Boolean(!value.is_truthy()),
            UnaryOperator::Negate => Value::number(-value.to_number()),
            UnaryOperator::Plus => Value::number(value.to_number()),
            UnaryOperator::Typeof => Value::String(value.type_of().to_string()),
        })
    }

    fn eval_binary_op(
        &self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
        sandbox: &mut Sandbox,
    ) -> EvalResult<Value> {
        let left = self.eval_expression(left, sandbox)?;
        match op {
            BinaryOperator::And if !left.is_truthy() => return Ok(left),
            BinaryOperator::Or if left.is_truthy() => return Ok(left),
            BinaryOperator::Nullish if !left.is_nullish() => return Ok(left),
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Nullish => {
                return self.eval_expression(right, sandbox)
            }
            _ => {}
        }
        let right = self.eval_expression(right, sandbox)?;
        Ok(apply_binary(op, &left, &right))
    }

    /// Writes `value` to an assignment target, e.g. `a`, `a.b` or `a[0]`.
    pub fn write_target(
        &self,
        target: &ast::AssignmentTarget,
        value: Value,
        sandbox: &mut Sandbox,
    ) -> EvalResult<()> {
        if target.path.is_empty() {
            return sandbox.assign(&target.name, value);
        }
        let keys = target
            .path
            .iter()
            .map(|accessor| match accessor {
                ast::Accessor::Property(name) => Ok(Value::String(name.clone())),
                ast::Accessor::Index(index) => self.eval_expression(index, sandbox),
            })
            .collect::<EvalResult<Vec<_>>>()?;

        let mut root = sandbox.lookup(&target.name)?.clone();
        let mut slot = &mut root;
        for key in &keys {
            slot = slot_mut(slot, key)?;
        }
        *slot = value;
        sandbox.check_value(&root)?;
        sandbox.mutate(&target.name, root)
    }
}

/// Expressions that may produce a value larger than their operands.
fn builds_value(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Array(_)
            | Expression::Object(_)
            | Expression::Call { .. }
            | Expression::BinaryOp {
                op: BinaryOperator::Add,
                ..
            }
    )
}

pub fn apply_binary(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    let numeric = |f: fn(f64, f64) -> f64| Value::number(f(left.to_number(), right.to_number()));
    match op {
        BinaryOperator::Add => left.add(right),
        BinaryOperator::Subtract => numeric(|a, b| a - b),
        BinaryOperator::Multiply => numeric(|a, b| a * b),
        BinaryOperator::Divide => numeric(|a, b| a / b),
        BinaryOperator::Modulo => numeric(|a, b| a % b),
        BinaryOperator::Equal => Value::Boolean(left.loose_equals(right)),
        BinaryOperator::NotEqual => Value::Boolean(!left.loose_equals(right)),
        BinaryOperator::StrictEqual => Value::Boolean(left.strict_equals(right)),
        BinaryOperator::StrictNotEqual => Value::Boolean(!left.strict_equals(right)),
        BinaryOperator::LessThan => ordered(left, right, Ordering::is_lt),
        BinaryOperator::LessThanEqual => ordered(left, right, Ordering::is_le),
        BinaryOperator::GreaterThan => ordered(left, right, Ordering::is_gt),
        BinaryOperator::GreaterThanEqual => ordered(left, right, Ordering::is_ge),
        // short-circuiting operators are resolved before both sides are evaluated
        BinaryOperator::And if left.is_truthy() => right.clone(),
        BinaryOperator::Or if !left.is_truthy() => right.clone(),
        BinaryOperator::Nullish if left.is_nullish() => right.clone(),
        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Nullish => left.clone(),
    }
}

fn ordered(left: &Value, right: &Value, test: fn(Ordering) -> bool) -> Value {
    Value::Boolean(compare(left, right).is_some_and(test))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

/// Property read, `object.name`.
pub fn get_property(object: &Value, name: &str) -> EvalResult<Value> {
    match object {
        Value::Undefined | Value::Null => Err(EvalError::Type(format!(
            "Cannot read properties of {} (reading '{}')",
            object.to_js_string(),
            name
        ))),
        Value::String(s) if name == "length" => Ok(Value::Integer(s.encode_utf16().count() as i64)),
        Value::List(items) if name == "length" => Ok(Value::Integer(items.len() as i64)),
        Value::List(items) => Ok(list_index(&Value::String(name.to_string()))
            .and_then(|index| items.get(index).cloned())
            .unwrap_or_default()),
        Value::Map(entries) => Ok(entries.get(name).cloned().unwrap_or_default()),
        Value::Builtin(namespace) => Ok(namespace_member(*namespace, name)),
        _ => Ok(Value::Undefined),
    }
}

/// Indexed read, `object[index]`.
pub fn get_index(object: &Value, index: &Value) -> EvalResult<Value> {
    match (object, list_index(index)) {
        (Value::List(items), Some(position)) => {
            Ok(items.get(position).cloned().unwrap_or_default())
        }
        (Value::String(s), Some(position)) => Ok(s
            .chars()
            .nth(position)
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default()),
        _ => get_property(object, &index.to_js_string()),
    }
}

/// Array position denoted by `key`, if it is a non-negative integer.
fn list_index(key: &Value) -> Option<usize> {
    match key {
        Value::Integer(i) => usize::try_from(*i).ok(),
        Value::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as usize),
        Value::String(s) => s.parse::<usize>().ok().filter(|i| i.to_string() == *s),
        _ => None,
    }
}

// a write may grow an array by at most this many holes
const MAX_ARRAY_GROWTH: usize = 10_000;

fn slot_mut<'v>(value: &'v mut Value, key: &Value) -> EvalResult<&'v mut Value> {
    match value {
        Value::Map(entries) => Ok(entries.entry(key.to_js_string()).or_default()),
        Value::List(items) => {
            let index = list_index(key).ok_or_else(|| {
                EvalError::Type(format!("Cannot set property '{}' of an array", key.to_js_string()))
            })?;
            if index > items.len() + MAX_ARRAY_GROWTH {
                return Err(EvalError::Type("Invalid array length".to_string()));
            }
            if index >= items.len() {
                items.resize(index + 1, Value::Undefined);
            }
            Ok(&mut items[index])
        }
        other => Err(EvalError::Type(format!(
            "Cannot set properties of {} (setting '{}')",
            other.to_js_string(),
            key.to_js_string()
        ))),
    }
}

/// Source-like rendering of a callee, for error messages.
fn describe(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(name) => name.clone(),
        Expression::Member { object, property } => format!("{}.{}", describe(object), property),
        _ => "expression".to_string(),
    }
}
