//! The verb trait — a named, host-registered capability invocable from
//! a script.
//!
//! `execute` is synchronous by contract: a verb never blocks. A verb
//! that needs external I/O writes a key during `execute` and lets the
//! dialect's [`KeyHandler`](crate::KeyHandler) for that key do the
//! asynchronous work during the resolution pass, or signals
//! [`Outcome::Pending`] so the engine keeps the record open until a
//! handler finalizes it.

use crate::error::EvalError;
use crate::output::OutputRecord;
use crate::scope::InvocationScope;
use crate::value::Value;

/// What a verb's `execute` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A concrete result — written to the record's `$result`.
    Produced(Value),
    /// The result is not known yet; a key handler will finalize it
    /// during the resolution pass.
    Pending,
    /// No result. The record's accumulated keys (if any) still replay.
    Empty,
}

/// A host-defined capability. One instance per dialect, shared across
/// invocations and runs; implementations must be stateless with
/// respect to any single invocation.
pub trait Verb: Send + Sync {
    /// Unique, non-empty name within one dialect. Registration fails
    /// with [`EvalError::MissingVerbName`] on an empty name.
    fn name(&self) -> &str;

    /// Run the verb synchronously. Arguments come from `scope`,
    /// intermediate keys go to `output`.
    fn execute(
        &self,
        scope: &mut InvocationScope,
        output: &mut OutputRecord,
    ) -> Result<Outcome, EvalError>;
}
