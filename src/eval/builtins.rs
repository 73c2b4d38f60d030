//! Native functions and methods available to scripts.

use chrono::{Datelike, Timelike};
use lazy_static::lazy_static;
use regex::Regex;

use super::value::{format_number, iso_string, Builtin, Value};
use super::{EvalError, EvalResult};

lazy_static! {
    static ref FLOAT_PREFIX: Regex =
        Regex::new(r"^[+-]?(Infinity|\d+\.?\d*(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?)").unwrap();
}

/// Names bound in the global scope of every sandbox.
pub const GLOBALS: &[(&str, Builtin)] = &[
    ("Math", Builtin::Math),
    ("JSON", Builtin::Json),
    ("Array", Builtin::Array),
    ("Date", Builtin::Date),
    ("Number", Builtin::Number),
    ("String", Builtin::String),
    ("Boolean", Builtin::Boolean),
    ("parseInt", Builtin::ParseInt),
    ("parseFloat", Builtin::ParseFloat),
    ("isNaN", Builtin::IsNaN),
    ("fetch", Builtin::Fetch),
];

fn arg(args: &[Value], index: usize) -> &Value {
    const UNDEFINED: &Value = &Value::Undefined;
    args.get(index).unwrap_or(UNDEFINED)
}

/// Member lookup on a namespace object such as `Math`.
pub fn namespace_member(namespace: Builtin, name: &str) -> Value {
    let member = match (namespace, name) {
        (Builtin::Math, "floor") => Builtin::MathFloor,
        (Builtin::Math, "ceil") => Builtin::MathCeil,
        (Builtin::Math, "round") => Builtin::MathRound,
        (Builtin::Math, "abs") => Builtin::MathAbs,
        (Builtin::Math, "min") => Builtin::MathMin,
        (Builtin::Math, "max") => Builtin::MathMax,
        (Builtin::Math, "random") => Builtin::MathRandom,
        (Builtin::Math, "pow") => Builtin::MathPow,
        (Builtin::Math, "PI") => return Value::Float(std::f64::consts::PI),
        (Builtin::Math, "E") => return Value::Float(std::f64::consts::E),
        (Builtin::Json, "stringify") => Builtin::JsonStringify,
        (Builtin::Json, "parse") => Builtin::JsonParse,
        (Builtin::Array, "isArray") => Builtin::ArrayIsArray,
        (Builtin::Date, "now") => Builtin::DateNow,
        _ => return Value::Undefined,
    };
    Value::Builtin(member)
}

/// Calls a side-effect free built-in function.
pub fn call_function(function: Builtin, args: &[Value]) -> EvalResult<Value> {
    let number = |index: usize| arg(args, index).to_number();
    Ok(match function {
        Builtin::MathFloor => Value::number(number(0).floor()),
        Builtin::MathCeil => Value::number(number(0).ceil()),
        Builtin::MathRound => Value::number((number(0) + 0.5).floor()),
        Builtin::MathAbs => Value::number(number(0).abs()),
        Builtin::MathMin => Value::number(fold_numbers(args, f64::INFINITY, f64::min)),
        Builtin::MathMax => Value::number(fold_numbers(args, f64::NEG_INFINITY, f64::max)),
        Builtin::MathRandom => Value::Float(rand::random::<f64>()),
        Builtin::MathPow => Value::number(number(0).powf(number(1))),
        Builtin::JsonStringify => json_stringify(arg(args, 0), arg(args, 2))?,
        Builtin::JsonParse => {
            serde_json::from_str::<serde_json::Value>(&arg(args, 0).to_js_string())
                .map(Value::from)
                .map_err(|e| EvalError::Syntax(format!("JSON.parse: {}", e)))?
        }
        Builtin::ArrayIsArray => Value::Boolean(matches!(arg(args, 0), Value::List(_))),
        Builtin::Number => match args.first() {
            None => Value::Integer(0),
            Some(value) => Value::number(value.to_number()),
        },
        Builtin::String => match args.first() {
            None => Value::String(String::new()),
            Some(value) => Value::String(value.to_js_string()),
        },
        Builtin::Boolean => Value::Boolean(arg(args, 0).is_truthy()),
        Builtin::ParseInt => parse_int(&arg(args, 0).to_js_string(), arg(args, 1)),
        Builtin::ParseFloat => parse_float(&arg(args, 0).to_js_string()),
        Builtin::IsNaN => Value::Boolean(number(0).is_nan()),
        other => return Err(EvalError::Type(format!("{} is not a function", other))),
    })
}

fn fold_numbers(args: &[Value], initial: f64, pick: fn(f64, f64) -> f64) -> f64 {
    args.iter().map(Value::to_number).fold(initial, |acc, n| {
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            pick(acc, n)
        }
    })
}

fn json_stringify(value: &Value, indent: &Value) -> EvalResult<Value> {
    if matches!(value, Value::Undefined | Value::Builtin(_)) {
        return Ok(Value::Undefined);
    }
    let json = value.to_json();
    let text = if indent.to_number() > 0.0 {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map(Value::String)
        .map_err(|e| EvalError::Type(format!("JSON.stringify: {}", e)))
}

fn parse_int(text: &str, radix: &Value) -> Value {
    let mut text = text.trim_start();
    let negative = text.starts_with('-');
    if negative || text.starts_with('+') {
        text = &text[1..];
    }
    let requested = radix.to_number();
    let unspecified = requested.is_nan() || requested == 0.0;
    let mut radix = match requested {
        _ if unspecified => 10,
        r if (2.0..=36.0).contains(&r) => r as u32,
        _ => return Value::Float(f64::NAN),
    };
    if (unspecified || radix == 16) && (text.starts_with("0x") || text.starts_with("0X")) {
        radix = 16;
        text = &text[2..];
    }
    let magnitude = text
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(None, |acc: Option<f64>, d| {
            Some(acc.unwrap_or(0.0) * radix as f64 + d as f64)
        });
    match magnitude {
        Some(magnitude) => Value::number(if negative { -magnitude } else { magnitude }),
        None => Value::Float(f64::NAN),
    }
}

fn parse_float(text: &str) -> Value {
    match FLOAT_PREFIX.find(text.trim_start()) {
        Some(found) => Value::number(match found.as_str().trim_start_matches('+') {
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            number => number.parse::<f64>().unwrap_or(f64::NAN),
        }),
        None => Value::Float(f64::NAN),
    }
}

/// Calls `receiver.name(args)` for strings, arrays, numbers and dates.
///
/// Methods whose output can dwarf their inputs are refused up front when
/// the result would exceed `max_len` bytes.
pub fn call_method(
    receiver: &Value,
    name: &str,
    args: &[Value],
    max_len: usize,
) -> EvalResult<Value> {
    if amplified_len(receiver, name, args) > max_len {
        return Err(EvalError::BudgetExceeded(format!(
            "{}.{} would exceed the value size of {}",
            receiver.type_of(),
            name,
            max_len
        )));
    }
    let result = match receiver {
        Value::String(s) => string_method(s, name, args),
        Value::List(items) => list_method(items, name, args),
        Value::Date(date) => date_method(date, name),
        Value::Integer(_) | Value::Float(_) => number_method(receiver.to_number(), name, args),
        Value::Undefined | Value::Null => {
            return Err(EvalError::Type(format!(
                "Cannot read properties of {} (reading '{}')",
                receiver.to_js_string(),
                name
            )))
        }
        _ => None,
    };
    result.ok_or_else(|| {
        EvalError::Type(format!("{}.{} is not a function", receiver.type_of(), name))
    })
}

/// Lower bound on the text a `replaceAll` or `join` call produces.
fn amplified_len(receiver: &Value, name: &str, args: &[Value]) -> usize {
    match (receiver, name) {
        (Value::String(s), "replaceAll") => {
            let pattern = arg(args, 0).to_js_string();
            let matches = if pattern.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(pattern.as_str()).count()
            };
            let replacement = arg(args, 1).to_js_string().len();
            s.len()
                .saturating_sub(matches.saturating_mul(pattern.len()))
                .saturating_add(matches.saturating_mul(replacement))
        }
        (Value::List(items), "join") => {
            let separator = match arg(args, 0) {
                Value::Undefined => 1,
                other => other.to_js_string().len(),
            };
            items.len().saturating_sub(1).saturating_mul(separator)
        }
        _ => 0,
    }
}

/// Resolves a possibly negative position against `len`, like `slice` does.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len as f64 + n.trunc()).max(0.0) as usize
    } else {
        (n.trunc() as usize).min(len)
    }
}

fn char_index_of(haystack: &str, needle: &str) -> i64 {
    haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count() as i64)
        .unwrap_or(-1)
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Value> {
    let text_arg = |index: usize| arg(args, index).to_js_string();
    Some(match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "includes" => Value::Boolean(s.contains(&text_arg(0))),
        "startsWith" => Value::Boolean(s.starts_with(&text_arg(0))),
        "endsWith" => Value::Boolean(s.ends_with(&text_arg(0))),
        "indexOf" => Value::Integer(char_index_of(s, &text_arg(0))),
        "charAt" => {
            let index = arg(args, 0).to_number();
            let index = if index.is_nan() { 0 } else { index as usize };
            Value::String(s.chars().nth(index).map(String::from).unwrap_or_default())
        }
        "slice" | "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = relative_index(arg(args, 0), chars.len(), 0);
            let end = relative_index(arg(args, 1), chars.len(), chars.len());
            Value::String(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            })
        }
        "split" => match args.first() {
            None | Some(Value::Undefined) => Value::List(vec![Value::String(s.to_string())]),
            Some(separator) => {
                let separator = separator.to_js_string();
                let parts: Vec<Value> = if separator.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(separator.as_str())
                        .map(|part| Value::String(part.to_string()))
                        .collect()
                };
                Value::List(parts)
            }
        },
        "replace" => Value::String(s.replacen(&text_arg(0), &text_arg(1), 1)),
        "replaceAll" => Value::String(s.replace(&text_arg(0), &text_arg(1))),
        "concat" => Value::String(args.iter().fold(s.to_string(), |mut acc, value| {
            acc.push_str(&value.to_js_string());
            acc
        })),
        "toString" | "valueOf" => Value::String(s.to_string()),
        _ => return None,
    })
}

fn list_method(items: &[Value], name: &str, args: &[Value]) -> Option<Value> {
    Some(match name {
        "indexOf" => Value::Integer(
            items
                .iter()
                .position(|item| item.strict_equals(arg(args, 0)))
                .map(|index| index as i64)
                .unwrap_or(-1),
        ),
        "includes" => Value::Boolean(items.iter().any(|item| item.strict_equals(arg(args, 0)))),
        "concat" => {
            let mut result = items.to_vec();
            for value in args {
                match value {
                    Value::List(more) => result.extend(more.iter().cloned()),
                    other => result.push(other.clone()),
                }
            }
            Value::List(result)
        }
        "join" => {
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_js_string(),
            };
            Value::String(
                items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.to_js_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        "slice" => {
            let start = relative_index(arg(args, 0), items.len(), 0);
            let end = relative_index(arg(args, 1), items.len(), items.len());
            Value::List(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        "at" => {
            let index = arg(args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index.trunc() };
            let resolved = if index < 0.0 {
                items.len() as f64 + index
            } else {
                index
            };
            if resolved < 0.0 {
                Value::Undefined
            } else {
                items.get(resolved as usize).cloned().unwrap_or_default()
            }
        }
        // receivers that are not assignable still report the new length
        "push" => Value::Integer((items.len() + args.len()) as i64),
        "toString" => Value::String(Value::List(items.to_vec()).to_js_string()),
        _ => return None,
    })
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Value> {
    Some(match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Value::String(format!("{:.*}", digits, n))
        }
        "toString" => Value::String(format_number(n)),
        "valueOf" => Value::number(n),
        _ => return None,
    })
}

fn date_method(date: &chrono::DateTime<chrono::FixedOffset>, name: &str) -> Option<Value> {
    Some(match name {
        "getHours" => Value::Integer(date.hour() as i64),
        "getMinutes" => Value::Integer(date.minute() as i64),
        "getSeconds" => Value::Integer(date.second() as i64),
        "getDay" => Value::Integer(date.weekday().num_days_from_sunday() as i64),
        "getDate" => Value::Integer(date.day() as i64),
        "getMonth" => Value::Integer(date.month0() as i64),
        "getFullYear" => Value::Integer(date.year() as i64),
        "getTime" | "valueOf" => Value::Integer(date.timestamp_millis()),
        "toISOString" | "toJSON" | "toString" => Value::String(iso_string(date)),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    fn method(receiver: &Value, name: &str, args: &[Value]) -> EvalResult<Value> {
        call_method(receiver, name, args, usize::MAX)
    }

    fn list(items: &[i64]) -> Value {
        Value::List(items.iter().map(|i| Value::Integer(*i)).collect())
    }

    #[test]
    fn test_math() {
        assert_eq!(call_function(Builtin::MathFloor, &[Value::Float(2.7)]), Ok(Value::Integer(2)));
        assert_eq!(
            call_function(Builtin::MathRound, &[Value::Float(-2.5)]),
            Ok(Value::Integer(-2))
        );
        assert_eq!(
            call_function(Builtin::MathMax, &[Value::Integer(1), s("5"), Value::Integer(3)]),
            Ok(Value::Integer(5))
        );
        assert_eq!(
            call_function(Builtin::MathMin, &[]),
            Ok(Value::Float(f64::INFINITY))
        );
        let random = call_function(Builtin::MathRandom, &[]).unwrap().to_number();
        assert!((0.0..1.0).contains(&random));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call_function(Builtin::ParseInt, &[s("42px")]), Ok(Value::Integer(42)));
        assert_eq!(call_function(Builtin::ParseInt, &[s("  -0x1f")]), Ok(Value::Integer(-31)));
        assert_eq!(
            call_function(Builtin::ParseInt, &[s("ff"), Value::Integer(16)]),
            Ok(Value::Integer(255))
        );
        assert!(call_function(Builtin::ParseInt, &[s("abc")]).unwrap().to_number().is_nan());
        assert_eq!(call_function(Builtin::ParseFloat, &[s("3.5kg")]), Ok(Value::Float(3.5)));
        assert_eq!(call_function(Builtin::Number, &[s("")]), Ok(Value::Integer(0)));
        assert_eq!(call_function(Builtin::String, &[list(&[1, 2])]), Ok(s("1,2")));
        assert_eq!(call_function(Builtin::IsNaN, &[s("x")]), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_json() {
        assert_eq!(
            call_function(Builtin::JsonStringify, &[list(&[1, 2])]),
            Ok(s("[1,2]"))
        );
        assert_eq!(
            call_function(Builtin::JsonParse, &[s(r#"{"a":[true]}"#)])
                .unwrap()
                .to_json(),
            serde_json::json!({ "a": [true] })
        );
        assert!(matches!(
            call_function(Builtin::JsonParse, &[s("{")]),
            Err(EvalError::Syntax(_))
        ));
    }

    #[test]
    fn test_namespaces_are_not_callable() {
        assert!(matches!(call_function(Builtin::Math, &[]), Err(EvalError::Type(_))));
        assert_eq!(
            namespace_member(Builtin::Array, "isArray"),
            Value::Builtin(Builtin::ArrayIsArray)
        );
        assert_eq!(namespace_member(Builtin::Math, "nope"), Value::Undefined);
    }

    #[test]
    fn test_string_methods() {
        let text = s("Hello World");
        assert_eq!(method(&text, "toUpperCase", &[]), Ok(s("HELLO WORLD")));
        assert_eq!(method(&text, "indexOf", &[s("World")]), Ok(Value::Integer(6)));
        assert_eq!(method(&text, "slice", &[Value::Integer(-5)]), Ok(s("World")));
        assert_eq!(
            method(&text, "split", &[s(" ")]),
            Ok(Value::List(vec![s("Hello"), s("World")]))
        );
        assert_eq!(method(&text, "replace", &[s("o"), s("0")]), Ok(s("Hell0 World")));
        assert!(matches!(method(&text, "nope", &[]), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_list_methods() {
        let items = list(&[1, 2, 3]);
        assert_eq!(method(&items, "indexOf", &[Value::Integer(2)]), Ok(Value::Integer(1)));
        assert_eq!(method(&items, "indexOf", &[Value::Integer(9)]), Ok(Value::Integer(-1)));
        assert_eq!(
            method(&items, "concat", &[Value::Integer(4), list(&[5])]),
            Ok(list(&[1, 2, 3, 4, 5]))
        );
        assert_eq!(method(&items, "join", &[s("-")]), Ok(s("1-2-3")));
        assert_eq!(method(&items, "at", &[Value::Integer(-1)]), Ok(Value::Integer(3)));
        assert_eq!(method(&items, "slice", &[Value::Integer(1)]), Ok(list(&[2, 3])));
    }

    #[test]
    fn test_date_methods() {
        let date = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 23, 5, 0)
            .unwrap();
        let value = Value::Date(date);
        assert_eq!(method(&value, "getHours", &[]), Ok(Value::Integer(23)));
        assert_eq!(method(&value, "getDay", &[]), Ok(Value::Integer(5)));
        assert_eq!(method(&value, "getMonth", &[]), Ok(Value::Integer(2)));
        assert_eq!(
            method(&value, "toISOString", &[]),
            Ok(s("2024-03-01T21:05:00.000Z"))
        );
    }

    #[test]
    fn test_methods_on_null_fail() {
        assert!(matches!(method(&Value::Null, "trim", &[]), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_amplifying_methods_are_refused() {
        let text = s("abc");
        assert_eq!(call_method(&text, "replaceAll", &[s("b"), s("xy")], 4), Ok(s("axyc")));
        assert!(matches!(
            call_method(&text, "replaceAll", &[s(""), s("0123456789")], 100),
            Ok(Value::String(ref out)) if out.len() == 43
        ));
        assert!(matches!(
            call_method(&text, "replaceAll", &[s(""), s("0123456789")], 42),
            Err(EvalError::BudgetExceeded(_))
        ));
        let items = list(&[1, 2, 3]);
        assert!(matches!(
            call_method(&items, "join", &[s("-".repeat(50))], 99),
            Err(EvalError::BudgetExceeded(_))
        ));
        assert_eq!(call_method(&items, "join", &[], 5), Ok(s("1,2,3")));
    }
}
