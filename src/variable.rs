//! Variables and the copy-on-write pool that holds them for one session.
//!
//! A [`VariablePool`] is never mutated in place: [`VariablePool::commit`]
//! builds a new pool and leaves the original untouched for every other
//! holder of it.

use std::{collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    #[error("Duplicate variable id: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
}

impl Variable {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<JsonValue>) -> Self {
        self.value = normalize(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct VariablePool {
    variables: Arc<[Variable]>,
}

impl VariablePool {
    pub fn new(variables: Vec<Variable>) -> Result<Self, VariableError> {
        let mut seen = HashSet::with_capacity(variables.len());
        for variable in &variables {
            if !seen.insert(variable.id.as_str()) {
                return Err(VariableError::DuplicateId(variable.id.clone()));
            }
        }
        Ok(Self {
            variables: Arc::from(variables),
        })
    }

    pub fn empty() -> Self {
        Self {
            variables: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn as_slice(&self) -> &[Variable] {
        &self.variables
    }

    pub fn get(&self, id: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Looks a variable up by its display name, as used in `{{Name}}` placeholders.
    pub fn find_by_name(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Returns a new pool in which the variable `id` holds `value`.
    ///
    /// An unknown id yields a pool equal to this one. A JSON `null` clears
    /// the variable.
    #[tracing::instrument(level = "debug", skip(self, value))]
    pub fn commit(&self, id: &str, value: JsonValue) -> VariablePool {
        if !self.contains(id) {
            tracing::debug!("Variable {} not in pool, nothing to commit", id);
            return self.clone();
        }
        let value = normalize(value);
        let variables: Vec<Variable> = self
            .variables
            .iter()
            .map(|variable| {
                if variable.id == id {
                    Variable {
                        value: value.clone(),
                        ..variable.clone()
                    }
                } else {
                    variable.clone()
                }
            })
            .collect();
        Self {
            variables: Arc::from(variables),
        }
    }

    /// True when both pools share the same backing storage.
    pub fn ptr_eq(&self, other: &VariablePool) -> bool {
        Arc::ptr_eq(&self.variables, &other.variables)
    }
}

impl Default for VariablePool {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<Vec<Variable>> for VariablePool {
    type Error = VariableError;

    fn try_from(variables: Vec<Variable>) -> Result<Self, Self::Error> {
        Self::new(variables)
    }
}

impl From<VariablePool> for Vec<Variable> {
    fn from(pool: VariablePool) -> Self {
        pool.variables.to_vec()
    }
}

fn normalize(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Null => None,
        other => Some(other),
    }
}
