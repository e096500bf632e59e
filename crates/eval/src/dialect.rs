//! Capability registration: a dialect bundles the verbs a script may
//! call with the key handlers that run during the resolution pass.
//!
//! Key handlers are an explicit map from key name to handler — the
//! "key written ⇒ handler runs in write order" contract — rather than
//! any reflective method lookup. A handler may be asynchronous, may
//! read and write its record, and finalizes the overall script result
//! by calling [`HandlerCtx::write`]; returning without writing leaves
//! the record open so a later key's handler can still run.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::coerce::Kind;
use crate::error::EvalError;
use crate::output::OutputRecord;
use crate::scope::{Globals, InvocationScope};
use crate::value::Value;
use crate::verb::Verb;

// ──────────────────────────────────────────────
// Key handlers
// ──────────────────────────────────────────────

/// Host-side async handler for one accumulated key.
#[async_trait]
pub trait KeyHandler: Send + Sync {
    async fn handle(&self, ctx: &mut HandlerCtx<'_>) -> Result<(), EvalError>;
}

/// What a key handler sees: the record being resolved, the invocation
/// scope that produced it, and the machine's globals.
pub struct HandlerCtx<'a> {
    key: &'a str,
    scope: &'a mut InvocationScope,
    output: &'a mut OutputRecord,
    globals: &'a Globals,
}

impl<'a> HandlerCtx<'a> {
    pub(crate) fn new(
        key: &'a str,
        scope: &'a mut InvocationScope,
        output: &'a mut OutputRecord,
        globals: &'a Globals,
    ) -> Self {
        HandlerCtx {
            key,
            scope,
            output,
            globals,
        }
    }

    /// The key whose write triggered this handler.
    pub fn key(&self) -> &str {
        self.key
    }

    pub fn get(&self, key: &str) -> Value {
        self.output.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.output.contains(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.output.set(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.output.remove(key);
    }

    /// Finalize the record's result.
    pub fn write(&mut self, result: Value) {
        self.output.write(result);
    }

    /// Positional argument of the invocation that produced this record.
    pub fn arg(&mut self, index: usize, kind: Kind) -> Value {
        self.scope.arg(index, kind)
    }

    /// Script-level global argument.
    pub fn global(&self, name: &str, kind: Kind) -> Value {
        self.globals.arg(name, kind)
    }
}

// ──────────────────────────────────────────────
// Dialect
// ──────────────────────────────────────────────

/// A named set of verbs plus the key handlers for their output.
pub struct Dialect {
    name: String,
    verbs: BTreeMap<String, Arc<dyn Verb>>,
    handlers: BTreeMap<String, Arc<dyn KeyHandler>>,
}

impl std::fmt::Debug for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.name)
            .field("verbs", &self.verbs.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Dialect {
    pub fn builder(name: impl Into<String>) -> DialectBuilder {
        DialectBuilder {
            name: name.into(),
            verbs: BTreeMap::new(),
            handlers: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verb(&self, name: &str) -> Option<Arc<dyn Verb>> {
        self.verbs.get(name).cloned()
    }

    pub fn handler(&self, key: &str) -> Option<Arc<dyn KeyHandler>> {
        self.handlers.get(key).cloned()
    }

    pub fn verb_names(&self) -> Vec<&str> {
        self.verbs.keys().map(String::as_str).collect()
    }
}

/// Builder enforcing the registration invariants: every verb has a
/// non-empty name, unique within the dialect.
pub struct DialectBuilder {
    name: String,
    verbs: BTreeMap<String, Arc<dyn Verb>>,
    handlers: BTreeMap<String, Arc<dyn KeyHandler>>,
}

impl std::fmt::Debug for DialectBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialectBuilder")
            .field("name", &self.name)
            .field("verbs", &self.verbs.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DialectBuilder {
    pub fn verb(mut self, verb: Arc<dyn Verb>) -> Result<Self, EvalError> {
        let name = verb.name().to_string();
        if name.is_empty() {
            return Err(EvalError::MissingVerbName);
        }
        if self.verbs.contains_key(&name) {
            return Err(EvalError::DuplicateVerb { name });
        }
        self.verbs.insert(name, verb);
        Ok(self)
    }

    pub fn handler(mut self, key: impl Into<String>, handler: Arc<dyn KeyHandler>) -> Self {
        self.handlers.insert(key.into(), handler);
        self
    }

    pub fn build(self) -> Dialect {
        Dialect {
            name: self.name,
            verbs: self.verbs,
            handlers: self.handlers,
        }
    }
}

// ──────────────────────────────────────────────
// Registry
// ──────────────────────────────────────────────

/// Name → dialect lookup used at machine construction.
#[derive(Default)]
pub struct DialectRegistry {
    dialects: BTreeMap<String, Arc<Dialect>>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        DialectRegistry::default()
    }

    pub fn register(&mut self, dialect: Dialect) {
        self.dialects
            .insert(dialect.name().to_string(), Arc::new(dialect));
    }

    pub fn get(&self, name: &str) -> Result<Arc<Dialect>, EvalError> {
        self.dialects
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownDialect {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verb::Outcome;

    struct Named(&'static str);

    impl Verb for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn execute(
            &self,
            _scope: &mut InvocationScope,
            _output: &mut OutputRecord,
        ) -> Result<Outcome, EvalError> {
            Ok(Outcome::Empty)
        }
    }

    #[test]
    fn empty_verb_name_is_a_configuration_error() {
        let err = Dialect::builder("d").verb(Arc::new(Named(""))).unwrap_err();
        assert_eq!(err, EvalError::MissingVerbName);
    }

    #[test]
    fn duplicate_verb_name_rejected() {
        let err = Dialect::builder("d")
            .verb(Arc::new(Named("go")))
            .unwrap()
            .verb(Arc::new(Named("go")))
            .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateVerb { ref name } if name == "go"));
    }

    #[test]
    fn verb_names_lists_registrations() {
        let dialect = Dialect::builder("d")
            .verb(Arc::new(Named("go")))
            .unwrap()
            .verb(Arc::new(Named("ask")))
            .unwrap()
            .build();
        assert_eq!(dialect.verb_names(), vec!["ask", "go"]);
    }

    #[test]
    fn registry_miss_is_unknown_dialect() {
        let registry = DialectRegistry::new();
        let err = registry.get("missing").unwrap_err();
        assert!(matches!(err, EvalError::UnknownDialect { ref name } if name == "missing"));
    }
}
