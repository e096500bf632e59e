//! Per-run bookkeeping: the arena of invocation scope/output pairs,
//! invocation-identity memoization, and output chaining across
//! sequential statements.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::output::OutputRecord;
use crate::scope::{Globals, InvocationScope};
use crate::value::{InvocationId, Value};
use crate::verb::Verb;

/// One verb invocation: the verb, its argument scope, and its output
/// record, created together and owned by the context for one run.
pub(crate) struct Invocation {
    pub(crate) verb: Arc<dyn Verb>,
    pub(crate) scope: InvocationScope,
    pub(crate) output: OutputRecord,
}

/// Owns every scope/output pair created during one script run. All of
/// it is discarded when `execute()` returns.
pub struct ExecutionContext {
    globals: Arc<Globals>,
    cells: Vec<Invocation>,
    current: Option<InvocationId>,
    /// A deferred previous output that could not be merged forward;
    /// it must become a dependency of the next invocation or the run
    /// fails with `DeferredChain`.
    unchained: Option<InvocationId>,
}

impl ExecutionContext {
    pub(crate) fn new(globals: Arc<Globals>) -> Self {
        ExecutionContext {
            globals,
            cells: Vec::new(),
            current: None,
            unchained: None,
        }
    }

    /// Memoized scope lookup. Calling the same verb again with
    /// deep-equal arguments reuses the most recent scope/output pair
    /// instead of executing again; new arguments get a fresh pair.
    /// Returns the cell id and whether it already existed.
    pub(crate) fn scope_for(
        &mut self,
        verb: &Arc<dyn Verb>,
        args: Vec<Value>,
    ) -> (InvocationId, bool) {
        let existing = self
            .cells
            .iter()
            .rposition(|cell| cell.verb.name() == verb.name() && cell.scope.args() == args);
        if let Some(index) = existing {
            return (InvocationId(index), true);
        }
        let id = InvocationId(self.cells.len());
        self.cells.push(Invocation {
            verb: verb.clone(),
            scope: InvocationScope::new(id.0, verb.name(), args, self.globals.clone()),
            output: OutputRecord::new(verb.name()),
        });
        (id, false)
    }

    /// Make `id` the current output, merging the previous current
    /// output into it first — unless the previous one is deferred, in
    /// which case the merge is skipped and the orphan remembered (a
    /// deferred record's keys may be regenerated at resolution, so
    /// merging it forward now could replay stale state).
    pub(crate) fn output_for(&mut self, id: InvocationId) {
        if let Some(prev) = self.current {
            if prev != id {
                if self.cells[prev.0].output.is_deferred() {
                    self.unchained = Some(prev);
                } else {
                    let (source, target) = self.two_mut(prev.0, id.0);
                    source.output.merge_to(&mut target.output);
                }
            }
        }
        self.current = Some(id);
    }

    pub(crate) fn current(&self) -> Option<InvocationId> {
        self.current
    }

    pub(crate) fn take_unchained(&mut self) -> Option<InvocationId> {
        self.unchained.take()
    }

    pub(crate) fn cell(&self, id: InvocationId) -> &Invocation {
        &self.cells[id.0]
    }

    pub(crate) fn cell_mut(&mut self, id: InvocationId) -> &mut Invocation {
        &mut self.cells[id.0]
    }

    pub(crate) fn any_dep_deferred(&self, id: InvocationId) -> bool {
        self.cells[id.0]
            .output
            .deps()
            .iter()
            .any(|dep| self.cells[dep.0].output.is_deferred())
    }

    /// Resolved results of every dependency of `id`, for argument
    /// substitution.
    pub(crate) fn dep_results(&self, id: InvocationId) -> BTreeMap<InvocationId, Value> {
        self.cells[id.0]
            .output
            .deps()
            .iter()
            .map(|dep| (*dep, self.cells[dep.0].output.result()))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    fn two_mut(&mut self, a: usize, b: usize) -> (&mut Invocation, &mut Invocation) {
        debug_assert_ne!(a, b);
        if a < b {
            let (left, right) = self.cells.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.cells.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::verb::Outcome;

    struct Plain(&'static str);

    impl Verb for Plain {
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

    fn context() -> ExecutionContext {
        ExecutionContext::new(Arc::new(Globals::new()))
    }

    #[test]
    fn identical_invocation_identity_is_memoized() {
        let mut ctx = context();
        let verb: Arc<dyn Verb> = Arc::new(Plain("go"));
        let (a, first_hit) = ctx.scope_for(&verb, vec![Value::Number(1.0)]);
        let (b, second_hit) = ctx.scope_for(&verb, vec![Value::Number(1.0)]);
        assert_eq!(a, b);
        assert!(!first_hit);
        assert!(second_hit);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn new_arguments_get_a_new_pair() {
        let mut ctx = context();
        let verb: Arc<dyn Verb> = Arc::new(Plain("go"));
        let (a, _) = ctx.scope_for(&verb, vec![Value::Number(1.0)]);
        let (b, _) = ctx.scope_for(&verb, vec![Value::Number(2.0)]);
        assert_ne!(a, b);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn memoization_uses_deep_equality() {
        let mut ctx = context();
        let verb: Arc<dyn Verb> = Arc::new(Plain("go"));
        let nested = || {
            Value::Object(
                [("k".to_string(), Value::Array(vec![Value::Number(1.0)]))]
                    .into_iter()
                    .collect(),
            )
        };
        let (a, _) = ctx.scope_for(&verb, vec![nested()]);
        let (b, memoized) = ctx.scope_for(&verb, vec![nested()]);
        assert!(memoized);
        assert_eq!(a, b);
    }

    #[test]
    fn sequential_outputs_chain_forward() {
        let mut ctx = context();
        let first: Arc<dyn Verb> = Arc::new(Plain("first"));
        let second: Arc<dyn Verb> = Arc::new(Plain("second"));
        let (a, _) = ctx.scope_for(&first, vec![]);
        ctx.output_for(a);
        ctx.cell_mut(a).output.set("view", Value::String("pop".into()));
        // Writing a user key defers the record; finalize it so it chains.
        ctx.cell_mut(a).output.write(Value::Null);

        let (b, _) = ctx.scope_for(&second, vec![]);
        ctx.output_for(b);
        assert_eq!(ctx.current(), Some(b));
        assert_eq!(ctx.cell(b).output.get("view"), Value::String("pop".into()));
        assert!(ctx.take_unchained().is_none());
    }

    #[test]
    fn deferred_previous_output_is_not_merged() {
        let mut ctx = context();
        let first: Arc<dyn Verb> = Arc::new(Plain("first"));
        let second: Arc<dyn Verb> = Arc::new(Plain("second"));
        let (a, _) = ctx.scope_for(&first, vec![]);
        ctx.output_for(a);
        ctx.cell_mut(a).output.set("lines", Value::String("x".into()));

        let (b, _) = ctx.scope_for(&second, vec![]);
        ctx.output_for(b);
        assert!(!ctx.cell(b).output.contains("lines"));
        assert_eq!(ctx.take_unchained(), Some(a));
    }
}
