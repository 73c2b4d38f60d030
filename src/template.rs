//! `{{Name}}` placeholder substitution and value-type inference.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;

use crate::variable::{Variable, VariablePool};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{([^{}]+)\}\}").unwrap();
    static ref SOLE_PLACEHOLDER: Regex = Regex::new(r"^\{\{([^{}]+)\}\}$").unwrap();
}

/// What a placeholder is replaced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstituteMode {
    /// The variable's textual value; unknown or unset variables become empty text.
    Value,
    /// The variable's id, for use as a free identifier in a script; unknown
    /// variables become `null`.
    Id,
}

pub trait TemplateEngine: Send + Sync {
    fn substitute(&self, pool: &VariablePool, text: &str, mode: SubstituteMode) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTemplate;

impl TemplateEngine for PlaceholderTemplate {
    fn substitute(&self, pool: &VariablePool, text: &str, mode: SubstituteMode) -> String {
        PLACEHOLDER
            .replace_all(text, |captures: &Captures| {
                let variable = pool.find_by_name(captures[1].trim());
                match mode {
                    SubstituteMode::Id => variable
                        .map(|v| v.id.clone())
                        .unwrap_or_else(|| "null".to_string()),
                    SubstituteMode::Value => variable.map(text_value).unwrap_or_default(),
                }
            })
            .into_owned()
    }
}

/// Returns the variable name when `text` is exactly one placeholder.
pub fn sole_placeholder(text: &str) -> Option<&str> {
    SOLE_PLACEHOLDER
        .captures(text.trim())
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().trim())
}

/// Names referenced by placeholders in `text`, in order of appearance.
pub fn placeholder_names(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().trim())
        .collect()
}

fn text_value(variable: &Variable) -> String {
    match &variable.value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Best-guess typed value of a stored variable value.
///
/// Strings that look like booleans, `null`, numbers or JSON containers are
/// converted. Strings with a leading zero or a leading `+` stay text so that
/// codes and phone numbers keep their shape. Lists are inferred element-wise.
pub fn infer_value_type(raw: &JsonValue) -> JsonValue {
    match raw {
        JsonValue::String(s) => infer_text(s),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(infer_value_type).collect()),
        other => other.clone(),
    }
}

fn infer_text(text: &str) -> JsonValue {
    let keep = || JsonValue::String(text.to_string());
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return keep();
    }
    if trimmed.len() > 1 && trimmed.starts_with('0') && !trimmed.starts_with("0.") {
        return keep();
    }
    if trimmed.starts_with('+') {
        return keep();
    }
    match trimmed {
        "true" => return JsonValue::Bool(true),
        "false" => return JsonValue::Bool(false),
        "null" => return JsonValue::Null,
        _ => {}
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return JsonValue::from(integer);
    }
    if looks_numeric(trimmed) {
        if let Some(number) = trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return JsonValue::Number(number);
        }
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<JsonValue>(trimmed) {
            return parsed;
        }
    }
    keep()
}

// f64::from_str accepts "inf" and "NaN", which are not numbers here
fn looks_numeric(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E'))
}
