//! The ordered, mergeable accumulator of a verb invocation's output.
//!
//! Verbs write key/value pairs during synchronous execution; the
//! resolution pass later replays those keys, in first-write order,
//! through the dialect's key handlers. A record is *deferred* while
//! more work remains: an argument referenced another record that has
//! not resolved, a key still awaits its handler, or the verb signalled
//! a pending result.

use std::collections::BTreeMap;

use crate::error::EvalError;
use crate::value::{InvocationId, Value};

/// Reserved key holding the record's final result. Keys starting with
/// `$` are internal: they never enter the replay order.
pub const RESULT_KEY: &str = "$result";

/// Resolution lifecycle of a record. `Resolving` doubles as the
/// "visiting" mark that turns a cyclic dependency graph into a
/// reported fault instead of an infinite walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunState {
    Idle,
    Resolving,
    Settled,
}

#[derive(Debug)]
pub struct OutputRecord {
    verb_name: String,
    /// Every non-internal write, in order, duplicates included —
    /// this is the replay order for key handlers.
    ordered_keys: Vec<String>,
    values: BTreeMap<String, Vec<Value>>,
    deps: Vec<InvocationId>,
    deferred: bool,
    pending_write: bool,
    pub(crate) run_state: RunState,
}

impl OutputRecord {
    pub(crate) fn new(verb_name: &str) -> Self {
        OutputRecord {
            verb_name: verb_name.to_string(),
            ordered_keys: Vec::new(),
            values: BTreeMap::new(),
            deps: Vec::new(),
            deferred: false,
            pending_write: false,
            run_state: RunState::Idle,
        }
    }

    pub fn verb_name(&self) -> &str {
        &self.verb_name
    }

    /// Append `value` under `key`. Non-internal keys also enter the
    /// replay order and mark the record deferred (a write always means
    /// more work to do at resolution).
    pub fn set(&mut self, key: &str, value: Value) {
        if !key.starts_with('$') {
            self.ordered_keys.push(key.to_string());
            self.deferred = true;
        }
        self.values.entry(key.to_string()).or_default().push(value);
    }

    /// The single value for `key` if exactly one was set, the full
    /// list if several, null if none.
    pub fn get(&self, key: &str) -> Value {
        match self.values.get(key) {
            None => Value::Null,
            Some(values) if values.len() == 1 => values[0].clone(),
            Some(values) => Value::Array(values.clone()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ordered_keys.iter().any(|k| k == key)
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
        self.ordered_keys.retain(|k| k != key);
    }

    /// Finalize the record's result. Replaces any provisional result
    /// so that a non-deferred record's `$result`, once read, is stable.
    pub fn write(&mut self, result: Value) {
        self.pending_write = false;
        self.deferred = false;
        self.values.insert(RESULT_KEY.to_string(), vec![result]);
    }

    /// Signal that the result arrives later, via a key handler. A
    /// second pending signal before the first is satisfied is a
    /// programmer error in the verb.
    pub fn write_pending(&mut self) -> Result<(), EvalError> {
        if self.pending_write {
            return Err(EvalError::IllegalDeferredWrite {
                verb: self.verb_name.clone(),
            });
        }
        self.pending_write = true;
        self.deferred = true;
        Ok(())
    }

    pub fn result(&self) -> Value {
        self.get(RESULT_KEY)
    }

    /// First-occurrence key order — duplicates collapsed.
    pub fn keys(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for key in &self.ordered_keys {
            if !seen.contains(&key.as_str()) {
                seen.push(key.as_str());
            }
        }
        seen
    }

    /// Replay every `(key, value)` pair into `other`, in first-write
    /// order. Each key occurrence carries the value written at that
    /// occurrence.
    pub fn merge_to(&self, other: &mut OutputRecord) {
        let mut taken: BTreeMap<&str, usize> = BTreeMap::new();
        for key in &self.ordered_keys {
            let index = taken.entry(key.as_str()).or_insert(0);
            if let Some(value) = self.values.get(key).and_then(|v| v.get(*index)) {
                other.set(key, value.clone());
            }
            *index += 1;
        }
    }

    pub fn mark_depend_on(&mut self, other: InvocationId) {
        if !self.deps.contains(&other) {
            self.deps.push(other);
        }
    }

    pub fn mark_deferred(&mut self) {
        self.deferred = true;
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub(crate) fn deps(&self) -> &[InvocationId] {
        &self.deps
    }

    pub(crate) fn depends_on(&self, other: InvocationId) -> bool {
        self.deps.contains(&other)
    }

    pub(crate) fn ordered_key_at(&self, index: usize) -> Option<&str> {
        self.ordered_keys.get(index).map(String::as_str)
    }

    /// Drop everything accumulated from a placeholder execution so the
    /// verb can be re-invoked with resolved arguments. Dependency
    /// edges survive; they are already settled by the caller.
    pub(crate) fn reset_for_resolve(&mut self) {
        self.ordered_keys.clear();
        self.values.clear();
        self.pending_write = false;
    }

    pub(crate) fn clear_deferred(&mut self) {
        self.deferred = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_set_reads_scalar_multi_set_reads_list() {
        let mut record = OutputRecord::new("t");
        record.set("k", Value::Number(1.0));
        assert_eq!(record.get("k"), Value::Number(1.0));
        record.set("k", Value::Number(2.0));
        assert_eq!(
            record.get("k"),
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn internal_keys_do_not_enter_replay_order() {
        let mut record = OutputRecord::new("t");
        record.set(RESULT_KEY, Value::Number(1.0));
        assert!(!record.is_deferred());
        assert!(!record.contains(RESULT_KEY));
        record.set("user", Value::Number(1.0));
        assert!(record.is_deferred());
        assert!(record.contains("user"));
    }

    #[test]
    fn merge_preserves_first_write_order_and_fans_in() {
        let mut a = OutputRecord::new("a");
        a.set("x", Value::Number(1.0));
        a.set("y", Value::Number(2.0));
        let mut b = OutputRecord::new("b");
        b.set("y", Value::Number(3.0));
        b.set("z", Value::Number(4.0));

        let mut c = OutputRecord::new("c");
        a.merge_to(&mut c);
        b.merge_to(&mut c);

        assert_eq!(c.keys(), vec!["x", "y", "z"]);
        assert_eq!(
            c.get("y"),
            Value::Array(vec![Value::Number(2.0), Value::Number(3.0)])
        );
    }

    #[test]
    fn merge_replays_duplicate_occurrences_in_order() {
        let mut a = OutputRecord::new("a");
        a.set("lines", Value::String("first".into()));
        a.set("lines", Value::String("second".into()));
        let mut b = OutputRecord::new("b");
        a.merge_to(&mut b);
        assert_eq!(
            b.get("lines"),
            Value::Array(vec![Value::String("first".into()), Value::String("second".into())])
        );
    }

    #[test]
    fn write_replaces_provisional_result() {
        let mut record = OutputRecord::new("t");
        record.write(Value::Number(0.0));
        record.write(Value::Number(20.0));
        assert_eq!(record.result(), Value::Number(20.0));
        assert!(!record.is_deferred());
    }

    #[test]
    fn double_pending_write_fails_fast() {
        let mut record = OutputRecord::new("fetch");
        record.write_pending().unwrap();
        let err = record.write_pending().unwrap_err();
        assert!(matches!(err, EvalError::IllegalDeferredWrite { ref verb } if verb == "fetch"));
    }

    #[test]
    fn pending_then_write_settles() {
        let mut record = OutputRecord::new("fetch");
        record.write_pending().unwrap();
        assert!(record.is_deferred());
        record.write(Value::Number(5.0));
        assert!(!record.is_deferred());
        assert_eq!(record.result(), Value::Number(5.0));
        // The pending signal was satisfied; a new one is legal again.
        assert!(record.write_pending().is_ok());
    }

    #[test]
    fn remove_drops_key_and_order() {
        let mut record = OutputRecord::new("t");
        record.set("a", Value::Number(1.0));
        record.set("b", Value::Number(2.0));
        record.remove("a");
        assert!(!record.contains("a"));
        assert_eq!(record.keys(), vec!["b"]);
    }
}
