//! Script-level globals and the per-invocation argument scope.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::coerce::{self, Kind};
use crate::value::{InvocationId, Value};

/// The explicit configuration object for one machine: script-level
/// argument values. Names that do not start with `_` are bound into
/// the script environment as identifiers; `_`-prefixed names are
/// host-internal and reachable only through [`Globals::arg`] (verbs
/// and handlers), never from script text.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    values: BTreeMap<String, Value>,
}

impl Globals {
    pub fn new() -> Self {
        Globals::default()
    }

    /// Build from a host-supplied JSON object. Non-object input yields
    /// empty globals.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let mut globals = Globals::new();
        if let serde_json::Value::Object(map) = json {
            for (key, value) in map {
                globals.values.insert(key.clone(), Value::from_json(value));
            }
        }
        globals
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Read a global argument coerced to `kind`; an absent or falsy
    /// value takes the kind's default.
    pub fn arg(&self, name: &str, kind: Kind) -> Value {
        match self.values.get(name) {
            Some(value) => coerce::coerce(value.clone(), kind),
            None => coerce::coerce(Value::Null, kind),
        }
    }

    /// True if `name` is visible to script text as an identifier.
    pub fn is_bindable(&self, name: &str) -> bool {
        !name.starts_with('_') && self.values.contains_key(name)
    }
}

/// The argument record for one verb invocation.
///
/// Immutable after creation except for the in-place substitution of
/// argument values whose source output record has since resolved.
#[derive(Debug)]
pub struct InvocationScope {
    invocation_id: usize,
    verb_name: String,
    raw_args: Vec<Value>,
    globals: Arc<Globals>,
    /// Output references seen by `arg` during the current `execute`;
    /// drained by the engine into dependency edges afterwards.
    found_deps: Vec<InvocationId>,
}

impl InvocationScope {
    pub(crate) fn new(
        invocation_id: usize,
        verb_name: &str,
        raw_args: Vec<Value>,
        globals: Arc<Globals>,
    ) -> Self {
        InvocationScope {
            invocation_id,
            verb_name: verb_name.to_string(),
            raw_args,
            globals,
            found_deps: Vec::new(),
        }
    }

    pub fn invocation_id(&self) -> usize {
        self.invocation_id
    }

    pub fn verb_name(&self) -> &str {
        &self.verb_name
    }

    pub(crate) fn args(&self) -> &[Value] {
        &self.raw_args
    }

    /// Read positional argument `index` coerced to `kind`. Missing or
    /// falsy arguments take the kind's default.
    pub fn arg(&mut self, index: usize, kind: Kind) -> Value {
        self.arg_or(index, kind, Value::Null)
    }

    /// Like [`arg`](Self::arg), but a missing/falsy argument — or one
    /// that embeds a not-yet-resolved output reference — yields the
    /// coerced `mock` instead. When a reference is found it is
    /// recorded as a dependency mark and the real value is substituted
    /// before the verb is re-invoked during resolution, so `execute`
    /// always runs to completion on a concrete value.
    pub fn arg_or(&mut self, index: usize, kind: Kind, mock: Value) -> Value {
        let raw = match self.raw_args.get(index) {
            Some(value) => value.clone(),
            None => return coerce::coerce(mock, kind),
        };
        if raw.is_falsy() {
            return coerce::coerce(mock, kind);
        }
        let mut found = Vec::new();
        raw.find_outputs(&mut found);
        if !found.is_empty() {
            self.found_deps.extend(found);
            return coerce::coerce(mock, kind);
        }
        coerce::coerce(raw, kind)
    }

    /// Read a script-level global (the configuration object of the
    /// enclosing machine).
    pub fn global(&self, name: &str, kind: Kind) -> Value {
        self.globals.arg(name, kind)
    }

    pub(crate) fn take_found_deps(&mut self) -> Vec<InvocationId> {
        std::mem::take(&mut self.found_deps)
    }

    /// Replace embedded output references in the raw arguments with
    /// their resolved results, depth-first through arrays and objects.
    pub(crate) fn substitute(&mut self, resolved: &BTreeMap<InvocationId, Value>) {
        for arg in &mut self.raw_args {
            arg.substitute_outputs(resolved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_with(args: Vec<Value>) -> InvocationScope {
        InvocationScope::new(1, "test", args, Arc::new(Globals::new()))
    }

    #[test]
    fn missing_arg_takes_mock() {
        let mut scope = scope_with(vec![]);
        assert_eq!(
            scope.arg_or(0, Kind::Number, Value::Number(7.0)),
            Value::Number(7.0)
        );
        assert_eq!(scope.arg(0, Kind::String), Value::String("".into()));
    }

    #[test]
    fn concrete_arg_is_coerced() {
        let mut scope = scope_with(vec![Value::Number(5.0)]);
        assert_eq!(scope.arg(0, Kind::String), Value::String("5".into()));
        assert!(scope.take_found_deps().is_empty());
    }

    #[test]
    fn output_ref_yields_mock_and_dependency_mark() {
        let mut scope = scope_with(vec![Value::Output(InvocationId(9))]);
        assert_eq!(
            scope.arg_or(0, Kind::Number, Value::Number(1.0)),
            Value::Number(1.0)
        );
        assert_eq!(scope.take_found_deps(), vec![InvocationId(9)]);
    }

    #[test]
    fn nested_output_ref_detected_through_containers() {
        let mut scope = scope_with(vec![Value::Array(vec![Value::Output(InvocationId(4))])]);
        scope.arg(0, Kind::Array);
        assert_eq!(scope.take_found_deps(), vec![InvocationId(4)]);
    }

    #[test]
    fn substitution_replaces_refs_in_place() {
        let mut scope = scope_with(vec![Value::Output(InvocationId(2))]);
        let resolved = [(InvocationId(2), Value::String("done".into()))]
            .into_iter()
            .collect();
        scope.substitute(&resolved);
        assert_eq!(scope.arg(0, Kind::String), Value::String("done".into()));
        assert!(scope.take_found_deps().is_empty());
    }

    #[test]
    fn underscore_globals_not_bindable() {
        let mut globals = Globals::new();
        globals.insert("_component", Value::String("host".into()));
        globals.insert("$userId", Value::String("u1".into()));
        assert!(!globals.is_bindable("_component"));
        assert!(globals.is_bindable("$userId"));
        assert_eq!(
            globals.arg("_component", Kind::String),
            Value::String("host".into())
        );
    }
}
