use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::value::Value;
use super::{EvalError, EvalResult};
use crate::config::SandboxConfig;

// wall-clock checks are amortised over this many steps
const DEADLINE_CHECK_INTERVAL: u64 = 256;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub constant: bool,
}

#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn insert(&mut self, name: String, binding: Binding) -> Option<Binding> {
        self.bindings.insert(name, binding)
    }
}

/// Step, depth, size and time limits of one evaluation.
#[derive(Debug)]
pub struct Budget {
    max_steps: u64,
    steps: u64,
    max_depth: usize,
    depth: usize,
    max_value_len: usize,
    timeout: Duration,
    deadline: Instant,
}

impl Budget {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            steps: 0,
            max_depth: config.max_depth,
            depth: 0,
            max_value_len: config.max_value_len,
            timeout: config.timeout,
            deadline: Instant::now() + config.timeout,
        }
    }

    pub fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(EvalError::BudgetExceeded(format!(
                "step limit of {} exceeded",
                self.max_steps
            )));
        }
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            return Err(EvalError::BudgetExceeded(format!(
                "timeout of {}ms exceeded",
                self.timeout.as_millis()
            )));
        }
        Ok(())
    }

    pub fn enter(&mut self) -> EvalResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(EvalError::BudgetExceeded(format!(
                "nesting depth of {} exceeded",
                self.max_depth
            )));
        }
        Ok(())
    }

    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Rejects values larger than `max_value_len` or nested deeper than `max_depth`.
    pub fn check_value(&self, value: &Value) -> EvalResult<()> {
        let (units, depth) = value.footprint();
        if units > self.max_value_len {
            return Err(EvalError::BudgetExceeded(format!(
                "value size of {} exceeded",
                self.max_value_len
            )));
        }
        if depth > self.max_depth {
            return Err(EvalError::BudgetExceeded(format!(
                "value nesting of {} exceeded",
                self.max_depth
            )));
        }
        Ok(())
    }

    pub fn max_value_len(&self) -> usize {
        self.max_value_len
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// Isolated execution state of one script.
///
/// The bottom scope holds the globals (built-ins and variable ids), the
/// scope above it is the body of the implicit function. Blocks push further
/// scopes.
#[derive(Debug)]
pub struct Sandbox {
    scopes: Vec<Scope>,
    budget: Budget,
}

impl Sandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            scopes: vec![Scope::new(), Scope::new()],
            budget: Budget::new(config),
        }
    }

    pub fn bind_global(&mut self, name: impl Into<String>, value: Value) {
        self.scopes[0].insert(
            name.into(),
            Binding {
                value,
                constant: false,
            },
        );
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        // the global and function scopes stay for the whole run
        if self.scopes.len() > 2 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn declare(&mut self, name: &str, value: Value, constant: bool) -> EvalResult<()> {
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| EvalError::Reference(name.to_string()))?;
        if let Some(existing) = scope.get(name) {
            if existing.constant || constant {
                return Err(EvalError::Syntax(format!(
                    "Identifier '{}' has already been declared",
                    name
                )));
            }
        }
        scope.insert(name.to_string(), Binding { value, constant });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> EvalResult<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(|binding| &binding.value)
            .ok_or_else(|| EvalError::Reference(format!("{} is not defined", name)))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    /// Assigns to the nearest binding, or creates one in the function scope.
    pub fn assign(&mut self, name: &str, value: Value) -> EvalResult<()> {
        let function_scope = 1;
        let existing = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.bindings.get_mut(name));
        match existing {
            Some(binding) if binding.constant => Err(EvalError::Type(
                "Assignment to constant variable.".to_string(),
            )),
            Some(binding) => {
                binding.value = value;
                Ok(())
            }
            None => {
                self.scopes[function_scope].insert(
                    name.to_string(),
                    Binding {
                        value,
                        constant: false,
                    },
                );
                Ok(())
            }
        }
    }

    /// Replaces the value of an existing binding, even a constant one.
    ///
    /// Used for in-place updates such as `obj.key = v` or `list.push(v)`,
    /// which mutate the bound value rather than rebinding the name.
    pub fn mutate(&mut self, name: &str, value: Value) -> EvalResult<()> {
        let binding = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.bindings.get_mut(name))
            .ok_or_else(|| EvalError::Reference(format!("{} is not defined", name)))?;
        binding.value = value;
        Ok(())
    }

    pub fn tick(&mut self) -> EvalResult<()> {
        self.budget.tick()
    }

    pub fn enter(&mut self) -> EvalResult<()> {
        self.budget.enter()
    }

    pub fn exit(&mut self) {
        self.budget.exit()
    }

    pub fn check_value(&self, value: &Value) -> EvalResult<()> {
        self.budget.check_value(value)
    }

    pub fn max_value_len(&self) -> usize {
        self.budget.max_value_len()
    }

    pub fn steps(&self) -> u64 {
        self.budget.steps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_steps: u64, max_depth: usize) -> SandboxConfig {
        SandboxConfig {
            max_steps,
            max_depth,
            ..SandboxConfig::default()
        }
    }

    #[test]
    fn test_scopes_shadow_and_restore() {
        let mut sandbox = Sandbox::new(&SandboxConfig::default());
        sandbox.bind_global("a", Value::Integer(1));
        sandbox.push_scope();
        sandbox.declare("a", Value::Integer(2), false).unwrap();
        assert_eq!(sandbox.lookup("a").unwrap(), &Value::Integer(2));
        sandbox.pop_scope();
        assert_eq!(sandbox.lookup("a").unwrap(), &Value::Integer(1));
    }

    #[test]
    fn test_constants_cannot_be_reassigned() {
        let mut sandbox = Sandbox::new(&SandboxConfig::default());
        sandbox.declare("c", Value::Null, true).unwrap();
        assert!(matches!(sandbox.assign("c", Value::Integer(1)), Err(EvalError::Type(_))));
        assert!(matches!(
            sandbox.declare("c", Value::Null, false),
            Err(EvalError::Syntax(_))
        ));
    }

    #[test]
    fn test_undeclared_assignment_creates_binding() {
        let mut sandbox = Sandbox::new(&SandboxConfig::default());
        sandbox.push_scope();
        sandbox.assign("x", Value::Integer(5)).unwrap();
        sandbox.pop_scope();
        assert_eq!(sandbox.lookup("x").unwrap(), &Value::Integer(5));
        assert!(matches!(sandbox.lookup("y"), Err(EvalError::Reference(_))));
    }

    #[test]
    fn test_mutate_ignores_constness() {
        let mut sandbox = Sandbox::new(&SandboxConfig::default());
        sandbox.declare("list", Value::List(vec![]), true).unwrap();
        sandbox.mutate("list", Value::List(vec![Value::Null])).unwrap();
        assert_eq!(sandbox.lookup("list").unwrap(), &Value::List(vec![Value::Null]));
        assert!(matches!(sandbox.mutate("nope", Value::Null), Err(EvalError::Reference(_))));
    }

    #[test]
    fn test_global_scopes_are_never_popped() {
        let mut sandbox = Sandbox::new(&SandboxConfig::default());
        assert!(sandbox.pop_scope().is_none());
    }

    #[test]
    fn test_step_budget() {
        let mut sandbox = Sandbox::new(&config(3, 8));
        for _ in 0..3 {
            sandbox.tick().unwrap();
        }
        assert!(matches!(sandbox.tick(), Err(EvalError::BudgetExceeded(_))));
    }

    #[test]
    fn test_depth_budget() {
        let mut sandbox = Sandbox::new(&config(100, 2));
        sandbox.enter().unwrap();
        sandbox.enter().unwrap();
        assert!(matches!(sandbox.enter(), Err(EvalError::BudgetExceeded(_))));
        sandbox.exit();
        sandbox.exit();
        sandbox.exit();
        sandbox.enter().unwrap();
    }

    #[test]
    fn test_value_budget() {
        let sandbox = Sandbox::new(&SandboxConfig {
            max_depth: 2,
            max_value_len: 10,
            ..SandboxConfig::default()
        });
        sandbox.check_value(&Value::String("x".repeat(10))).unwrap();
        assert!(matches!(
            sandbox.check_value(&Value::String("x".repeat(11))),
            Err(EvalError::BudgetExceeded(_))
        ));
        assert!(matches!(
            sandbox.check_value(&Value::List(vec![Value::Integer(0); 10])),
            Err(EvalError::BudgetExceeded(_))
        ));

        let nested = Value::List(vec![Value::List(vec![Value::Null])]);
        sandbox.check_value(&nested).unwrap();
        assert!(matches!(
            sandbox.check_value(&Value::List(vec![nested])),
            Err(EvalError::BudgetExceeded(_))
        ));
    }
}
