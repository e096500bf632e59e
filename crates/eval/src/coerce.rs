//! Argument type coercion.
//!
//! Verbs declare the shape they want each argument in; `coerce` always
//! produces a value of that shape, falling back to a deterministic
//! default when the raw value is falsy. There is no failure mode.

use std::collections::BTreeMap;

use crate::value::Value;

/// The argument shapes a verb may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Identity — the value passes through untouched.
    Any,
    String,
    Object,
    Array,
    Number,
}

/// Coerce `value` to `kind`. Falsy inputs take the kind's default:
/// `""`, `{}`, `[]` or `0`.
pub fn coerce(value: Value, kind: Kind) -> Value {
    match kind {
        Kind::Any => value,
        Kind::String => {
            if value.is_falsy() {
                Value::String(String::new())
            } else {
                Value::String(stringify(&value))
            }
        }
        Kind::Object => match value {
            Value::Object(map) if !map.is_empty() => Value::Object(map),
            _ => Value::Object(BTreeMap::new()),
        },
        Kind::Array => {
            if value.is_falsy() {
                return Value::Array(Vec::new());
            }
            match value {
                Value::Array(items) => Value::Array(items),
                Value::Object(map) => Value::Array(map.into_values().collect()),
                other => Value::Array(vec![other]),
            }
        }
        Kind::Number => {
            if value.is_falsy() {
                return Value::Number(0.0);
            }
            Value::Number(numberify(&value))
        }
    }
}

/// Script-style string projection: numbers without a trailing `.0`,
/// arrays as comma-joined elements, objects as their JSON rendering.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_json().to_string(),
        Value::Output(id) => format!("[deferred {}]", id),
    }
}

fn numberify(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Bool(true) => 1.0,
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_identity() {
        assert_eq!(coerce(Value::Null, Kind::Any), Value::Null);
        assert_eq!(coerce(Value::Bool(true), Kind::Any), Value::Bool(true));
    }

    #[test]
    fn falsy_values_take_defaults() {
        assert_eq!(coerce(Value::Null, Kind::String), Value::String("".into()));
        assert_eq!(coerce(Value::Null, Kind::Object), Value::Object(BTreeMap::new()));
        assert_eq!(coerce(Value::Null, Kind::Array), Value::Array(vec![]));
        assert_eq!(coerce(Value::Null, Kind::Number), Value::Number(0.0));
        assert_eq!(coerce(Value::Number(0.0), Kind::String), Value::String("".into()));
    }

    #[test]
    fn string_projection() {
        assert_eq!(coerce(Value::Number(5.0), Kind::String), Value::String("5".into()));
        assert_eq!(coerce(Value::Number(5.5), Kind::String), Value::String("5.5".into()));
        assert_eq!(
            coerce(
                Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]),
                Kind::String
            ),
            Value::String("1,2".into())
        );
    }

    #[test]
    fn number_projection_parses_strings() {
        assert_eq!(coerce(Value::String("42".into()), Kind::Number), Value::Number(42.0));
        assert_eq!(coerce(Value::String("nope".into()), Kind::Number), Value::Number(0.0));
        assert_eq!(coerce(Value::Bool(true), Kind::Number), Value::Number(1.0));
    }

    #[test]
    fn array_projection_wraps_scalars() {
        assert_eq!(
            coerce(Value::String("x".into()), Kind::Array),
            Value::Array(vec![Value::String("x".into())])
        );
    }
}
