//! Script execution for cuescript: hosts register dialects of verbs
//! and key handlers, then hand scripts to a [`ScriptMachine`].
//!
//! Evaluation is two-phase. The synchronous phase parses the script
//! and invokes each verb, producing a chain of output records; a verb
//! that cannot produce its result immediately marks its record
//! deferred and hands back a placeholder. The async resolution pass
//! then settles the final record: dependencies first, depth-first,
//! re-invoking deferred verbs with real values before replaying each
//! record's keys through the dialect's handlers.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cuescript_eval::{DialectRegistry, Globals, ScriptMachine};
//! # fn dialect() -> cuescript_eval::Dialect { unimplemented!() }
//!
//! # async fn demo() -> Result<(), cuescript_eval::EvalError> {
//! let mut registry = DialectRegistry::new();
//! registry.register(dialect());
//!
//! let mut machine = ScriptMachine::new(&registry, "chat", Globals::new())?;
//! let result = machine.execute("greet('Bo')").await?;
//! # Ok(())
//! # }
//! ```

pub mod coerce;
mod context;
pub mod dialect;
pub mod error;
pub mod machine;
pub mod output;
pub mod scope;
pub mod value;
pub mod verb;

pub use coerce::{coerce, Kind};
pub use dialect::{Dialect, DialectBuilder, DialectRegistry, HandlerCtx, KeyHandler};
pub use error::EvalError;
pub use machine::ScriptMachine;
pub use output::{OutputRecord, RESULT_KEY};
pub use scope::{Globals, InvocationScope};
pub use value::{InvocationId, Value};
pub use verb::{Outcome, Verb};
