use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use strum_macros::Display;

/// Runtime value of the sandbox, modelled on JavaScript values.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Date(DateTime<FixedOffset>),
    Builtin(Builtin),
}

/// Native functions and namespaces bound in every sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Builtin {
    Math,
    #[strum(serialize = "JSON")]
    Json,
    Array,
    Date,
    #[strum(serialize = "floor")]
    MathFloor,
    #[strum(serialize = "ceil")]
    MathCeil,
    #[strum(serialize = "round")]
    MathRound,
    #[strum(serialize = "abs")]
    MathAbs,
    #[strum(serialize = "min")]
    MathMin,
    #[strum(serialize = "max")]
    MathMax,
    #[strum(serialize = "random")]
    MathRandom,
    #[strum(serialize = "pow")]
    MathPow,
    #[strum(serialize = "stringify")]
    JsonStringify,
    #[strum(serialize = "parse")]
    JsonParse,
    #[strum(serialize = "isArray")]
    ArrayIsArray,
    #[strum(serialize = "now")]
    DateNow,
    Number,
    String,
    Boolean,
    #[strum(serialize = "parseInt")]
    ParseInt,
    #[strum(serialize = "parseFloat")]
    ParseFloat,
    #[strum(serialize = "isNaN")]
    IsNaN,
    #[strum(serialize = "fetch")]
    Fetch,
}

impl Builtin {
    pub fn is_namespace(&self) -> bool {
        matches!(self, Builtin::Math | Builtin::Json | Builtin::Array)
    }
}

impl Value {
    /// Builds a number, keeping integral values as integers.
    pub fn number(n: f64) -> Value {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
            if n == 0.0 && n.is_sign_negative() {
                return Value::Float(n);
            }
            Value::Integer(n as i64)
        } else {
            Value::Float(n)
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Date(_) | Value::Builtin(_) => true,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Integer(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => string_to_number(s),
            Value::List(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            Value::Date(date) => date.timestamp_millis() as f64,
            Value::Map(_) | Value::Builtin(_) => f64::NAN,
        }
    }

    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_number(*f),
            Value::String(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) => "[object Object]".to_string(),
            Value::Date(date) => iso_string(date),
            Value::Builtin(builtin) if builtin.is_namespace() => {
                format!("[object {}]", builtin)
            }
            Value::Builtin(builtin) => format!("function {}() {{ [native code] }}", builtin),
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::List(_) | Value::Map(_) | Value::Date(_) => "object",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Builtin(builtin) if builtin.is_namespace() => "object",
            Value::Builtin(_) => "function",
        }
    }

    /// Values that `+` turns into strings rather than numbers.
    fn concatenates(&self) -> bool {
        matches!(
            self,
            Value::String(_) | Value::List(_) | Value::Map(_) | Value::Date(_) | Value::Builtin(_)
        )
    }

    pub fn add(&self, other: &Value) -> Value {
        if self.concatenates() || other.concatenates() {
            Value::String(format!("{}{}", self.to_js_string(), other.to_js_string()))
        } else {
            Value::number(self.to_number() + other.to_number())
        }
    }

    /// `===`. Lists and maps compare structurally.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_number() && b.is_number() => a.to_number() == b.to_number(),
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.strict_equals(vb))
            }
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }

    /// `==`.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
                self.to_number() == other.to_number()
            }
            (a, b) if a.is_number() && (b.is_number() || matches!(b, Value::String(_))) => {
                a.to_number() == b.to_number()
            }
            (Value::String(_), b) if b.is_number() => self.to_number() == other.to_number(),
            (Value::List(_) | Value::Map(_) | Value::Date(_), Value::String(_))
            | (Value::String(_), Value::List(_) | Value::Map(_) | Value::Date(_)) => {
                self.to_js_string() == other.to_js_string()
            }
            (Value::List(_), b) if b.is_number() => self.to_number() == other.to_number(),
            (a, Value::List(_)) if a.is_number() => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }

    /// Converts into JSON. `undefined` becomes `null` and is dropped from objects.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Undefined | Value::Null | Value::Builtin(_) => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Float(f) => match Value::number(*f) {
                Value::Integer(i) => JsonValue::from(i),
                _ => serde_json::Number::from_f64(*f)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null),
            },
            Value::String(s) => JsonValue::String(s.clone()),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .filter(|(_, value)| !matches!(value, Value::Undefined | Value::Builtin(_)))
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Value::Date(date) => JsonValue::String(iso_string(date)),
        }
    }

    /// Size and nesting of a value, as `(units, depth)`.
    ///
    /// Text counts one unit per byte, every list element and object entry
    /// one more. Scalars are a single unit at depth 0.
    pub fn footprint(&self) -> (usize, usize) {
        match self {
            Value::String(s) => (s.len().max(1), 0),
            Value::List(items) => container_footprint(items.iter().map(|item| (0, item))),
            Value::Map(entries) => {
                container_footprint(entries.iter().map(|(key, value)| (key.len(), value)))
            }
            _ => (1, 0),
        }
    }
}

fn container_footprint<'a>(children: impl Iterator<Item = (usize, &'a Value)>) -> (usize, usize) {
    children.fold((1, 1), |(units, depth), (extra, child)| {
        let (child_units, child_depth) = child.footprint();
        (units + extra + child_units, depth.max(child_depth + 1))
    })
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            JsonValue::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from(&json)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

/// `Date.prototype.toISOString`: UTC with millisecond precision.
pub fn iso_string(date: &DateTime<FixedOffset>) -> String {
    date.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{}", n)
    }
}

pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.starts_with("0x") || trimmed.starts_with("0X") => {
            i64::from_str_radix(&trimmed[2..], 16)
                .map(|i| i as f64)
                .unwrap_or(f64::NAN)
        }
        // Rust accepts "inf" and "nan", JavaScript does not
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}
