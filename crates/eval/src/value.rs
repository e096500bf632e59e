//! Runtime value type for the engine.
//!
//! Distinct from the cuescript-core AST: the AST is what a script
//! says, a `Value` is what flows between verbs at run time. The one
//! variant with no JSON counterpart is [`Value::Output`] — a handle to
//! a deferred invocation's output record, the placeholder that powers
//! dependency detection in `InvocationScope::arg`.

use std::collections::BTreeMap;
use std::fmt;

/// Identifies one verb invocation (and its scope/output pair) within a
/// single script run. Monotonic per [`crate::ExecutionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvocationId(pub(crate) usize);

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A script-level runtime value.
///
/// Equality is deep value equality — this is what invocation-identity
/// memoization compares. `Output` handles compare by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// Reference to a deferred invocation's output record.
    Output(InvocationId),
}

impl Value {
    /// JS-style falsiness: null, false, 0, NaN and "" are falsy;
    /// arrays and objects (even empty) are truthy, as is an output ref.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => *n == 0.0 || n.is_nan(),
            Value::String(s) => s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Output(_) => false,
        }
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    /// Convert a host-supplied JSON value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON for the host. An `Output` handle has no JSON
    /// form and becomes null; a non-finite number likewise.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Output(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Collect every embedded output reference, depth-first through
    /// arrays and objects.
    pub(crate) fn find_outputs(&self, found: &mut Vec<InvocationId>) {
        match self {
            Value::Output(id) => found.push(*id),
            Value::Array(items) => {
                for item in items {
                    item.find_outputs(found);
                }
            }
            Value::Object(map) => {
                for item in map.values() {
                    item.find_outputs(found);
                }
            }
            _ => {}
        }
    }

    /// Replace embedded output references in place with their resolved
    /// results. References with no entry become null.
    pub(crate) fn substitute_outputs(&mut self, resolved: &BTreeMap<InvocationId, Value>) {
        match self {
            Value::Output(id) => {
                *self = resolved.get(id).cloned().unwrap_or(Value::Null);
            }
            Value::Array(items) => {
                for item in items {
                    item.substitute_outputs(resolved);
                }
            }
            Value::Object(map) => {
                for item in map.values_mut() {
                    item.substitute_outputs(resolved);
                }
            }
            _ => {}
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsiness_follows_script_semantics() {
        assert!(Value::Null.is_falsy());
        assert!(Value::Number(0.0).is_falsy());
        assert!(Value::Number(f64::NAN).is_falsy());
        assert!(Value::String(String::new()).is_falsy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::Object(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({"a": [1, "x", null], "b": true});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn finds_outputs_nested_in_containers() {
        let value = Value::Array(vec![
            Value::Number(1.0),
            Value::Object(
                [("k".to_string(), Value::Output(InvocationId(3)))]
                    .into_iter()
                    .collect(),
            ),
        ]);
        let mut found = Vec::new();
        value.find_outputs(&mut found);
        assert_eq!(found, vec![InvocationId(3)]);
    }

    #[test]
    fn substitutes_outputs_in_place() {
        let mut value = Value::Array(vec![Value::Output(InvocationId(1))]);
        let resolved = [(InvocationId(1), Value::Number(7.0))].into_iter().collect();
        value.substitute_outputs(&resolved);
        assert_eq!(value, Value::Array(vec![Value::Number(7.0)]));
    }
}
