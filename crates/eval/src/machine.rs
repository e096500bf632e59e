//! The engine facade: parse a script, evaluate it against a dialect's
//! verbs, then run the resolution pass over the resulting output
//! record.
//!
//! Suspension happens only inside the resolution pass — at each
//! dependency boundary and each key-handler invocation. Verb
//! execution itself is always synchronous, so a single machine
//! evaluates one script to completion before accepting the next.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, trace};

use cuescript_core::{BinaryOp, Expr, Literal, Script, UnaryOp};

use crate::coerce;
use crate::context::ExecutionContext;
use crate::dialect::{Dialect, DialectRegistry, HandlerCtx};
use crate::error::EvalError;
use crate::output::RunState;
use crate::scope::Globals;
use crate::value::{InvocationId, Value};
use crate::verb::Outcome;

/// Executes scripts against one dialect with one set of globals.
pub struct ScriptMachine {
    dialect: Arc<Dialect>,
    globals: Arc<Globals>,
    context: ExecutionContext,
}

impl std::fmt::Debug for ScriptMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptMachine")
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}

impl ScriptMachine {
    /// Look up `dialect` in the registry and build a machine around
    /// it. Fails with [`EvalError::UnknownDialect`] on a miss.
    pub fn new(
        registry: &DialectRegistry,
        dialect: &str,
        globals: Globals,
    ) -> Result<Self, EvalError> {
        let dialect = registry.get(dialect)?;
        let globals = Arc::new(globals);
        let context = ExecutionContext::new(globals.clone());
        Ok(ScriptMachine {
            dialect,
            globals,
            context,
        })
    }

    /// Parse, evaluate and resolve one script. Scope/output records
    /// are discarded when this returns; nothing carries over between
    /// calls.
    pub async fn execute(&mut self, script: &str) -> Result<Value, EvalError> {
        debug!(
            dialect = self.dialect.name(),
            bytes = script.len(),
            "executing script"
        );
        let parsed: Script = cuescript_core::parse(script)?;
        self.context = ExecutionContext::new(self.globals.clone());

        let mut last = Value::Null;
        for statement in &parsed.statements {
            last = self.eval(statement)?;
        }

        match self.context.current() {
            Some(id) => self.run(id).await,
            None => Ok(last),
        }
    }

    // ──────────────────────────────────────────────
    // Expression evaluation
    // ──────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),
            Expr::Ident { name, line } => {
                if self.globals.is_bindable(name) {
                    return Ok(self.globals.get(name).cloned().unwrap_or(Value::Null));
                }
                Err(EvalError::UnknownIdentifier {
                    name: name.clone(),
                    line: *line,
                })
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Call { name, args, line } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.invoke(name, *line, values)
            }
            Expr::Member { object, field } => {
                let object = self.eval(object)?;
                match object {
                    Value::Object(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
                    Value::Output(_) => Err(EvalError::type_mismatch(format!(
                        "cannot read field '{}' of a deferred value",
                        field
                    ))),
                    _ => Ok(Value::Null),
                }
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                match (object, index) {
                    (Value::Array(items), Value::Number(n)) => {
                        if n >= 0.0 && (n as usize) < items.len() {
                            Ok(items[n as usize].clone())
                        } else {
                            Ok(Value::Null)
                        }
                    }
                    (Value::Object(map), key) => {
                        let key = coerce::stringify(&key);
                        Ok(map.get(&key).cloned().unwrap_or(Value::Null))
                    }
                    _ => Ok(Value::Null),
                }
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(value.is_falsy())),
                    UnaryOp::Neg => Ok(Value::Number(-self.as_number(&value)?)),
                }
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        // Logical operators short-circuit and yield an operand, not a
        // bare boolean — `a || fallback` keeps `a`'s value.
        if op == BinaryOp::And {
            let left = self.eval(left)?;
            if left.is_falsy() {
                return Ok(left);
            }
            return self.eval(right);
        }
        if op == BinaryOp::Or {
            let left = self.eval(left)?;
            if left.is_truthy() {
                return Ok(left);
            }
            return self.eval(right);
        }

        let left = self.eval(left)?;
        let right = self.eval(right)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::Neq => Ok(Value::Bool(left != right)),
            BinaryOp::Add => {
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut s = coerce::stringify(&self.concrete(left)?);
                    s.push_str(&coerce::stringify(&self.concrete(right)?));
                    return Ok(Value::String(s));
                }
                Ok(Value::Number(self.as_number(&left)? + self.as_number(&right)?))
            }
            BinaryOp::Sub => Ok(Value::Number(self.as_number(&left)? - self.as_number(&right)?)),
            BinaryOp::Mul => Ok(Value::Number(self.as_number(&left)? * self.as_number(&right)?)),
            BinaryOp::Div => Ok(Value::Number(self.as_number(&left)? / self.as_number(&right)?)),
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                let ordering = match (&left, &right) {
                    (Value::String(a), Value::String(b)) => a.cmp(b),
                    _ => self
                        .as_number(&left)?
                        .partial_cmp(&self.as_number(&right)?)
                        .ok_or_else(|| EvalError::type_mismatch("incomparable numbers"))?,
                };
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Lte => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    BinaryOp::Gte => ordering.is_ge(),
                    _ => unreachable!(),
                }))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    /// Reject a still-deferred value where an operator needs a
    /// concrete one.
    fn concrete(&self, value: Value) -> Result<Value, EvalError> {
        if let Value::Output(id) = value {
            return Err(EvalError::type_mismatch(format!(
                "deferred output of verb '{}' used as an operand",
                self.context.cell(id).verb.name()
            )));
        }
        Ok(value)
    }

    fn as_number(&self, value: &Value) -> Result<f64, EvalError> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Bool(true) => Ok(1.0),
            Value::Bool(false) | Value::Null => Ok(0.0),
            Value::String(s) => Ok(s.trim().parse().unwrap_or(f64::NAN)),
            Value::Output(id) => Err(EvalError::type_mismatch(format!(
                "deferred output of verb '{}' used as a number",
                self.context.cell(*id).verb.name()
            ))),
            other => Err(EvalError::type_mismatch(format!(
                "cannot use {:?} as a number",
                other
            ))),
        }
    }

    // ──────────────────────────────────────────────
    // Verb invocation
    // ──────────────────────────────────────────────

    fn invoke(&mut self, name: &str, line: u32, args: Vec<Value>) -> Result<Value, EvalError> {
        let verb = self
            .dialect
            .verb(name)
            .ok_or_else(|| EvalError::UnknownVerb {
                name: name.to_string(),
                line,
            })?;

        let (id, memoized) = self.context.scope_for(&verb, args);
        self.context.output_for(id);

        // A memo hit keeps the earlier invocation's record as-is; only
        // a fresh cell executes the verb.
        if !memoized {
            let outcome = {
                let cell = self.context.cell_mut(id);
                verb.execute(&mut cell.scope, &mut cell.output)?
            };
            self.apply_outcome(id, outcome)?;

            // A result computed from placeholder arguments must not
            // escape as final; resolution re-invokes the verb with
            // real values.
            if self.context.any_dep_deferred(id) {
                self.context.cell_mut(id).output.mark_deferred();
            }
        }

        // A deferred previous statement either became a dependency of
        // this invocation or it is unreachable by the resolution pass.
        if let Some(orphan) = self.context.take_unchained() {
            if !self.context.cell(id).output.depends_on(orphan) {
                return Err(EvalError::DeferredChain {
                    verb: self.context.cell(orphan).verb.name().to_string(),
                });
            }
        }

        let cell = self.context.cell(id);
        let deferred = cell.output.is_deferred();
        debug!(verb = name, id = %id, deferred, "verb invoked");
        if deferred {
            Ok(Value::Output(id))
        } else {
            Ok(cell.output.result())
        }
    }

    /// Transfer dependency marks found by `arg()` onto the record and
    /// apply the verb's outcome with write semantics.
    fn apply_outcome(&mut self, id: InvocationId, outcome: Outcome) -> Result<(), EvalError> {
        let cell = self.context.cell_mut(id);
        let found = cell.scope.take_found_deps();
        if !found.is_empty() {
            for dep in found {
                cell.output.mark_depend_on(dep);
            }
            cell.output.mark_deferred();
        }
        match outcome {
            Outcome::Produced(value) => cell.output.write(value),
            Outcome::Pending => cell.output.write_pending()?,
            Outcome::Empty => {}
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Resolution pass
    // ──────────────────────────────────────────────

    /// Settle one record and everything it depends on, depth-first.
    /// Dependencies settle entirely before any of this record's own
    /// keys replay — a dependent invocation never observes a
    /// dependency's placeholder value. Running an already-settled
    /// record returns the cached result without re-invoking anything.
    pub(crate) fn run(
        &mut self,
        id: InvocationId,
    ) -> Pin<Box<dyn Future<Output = Result<Value, EvalError>> + Send + '_>> {
        Box::pin(async move {
            match self.context.cell(id).output.run_state {
                RunState::Settled => return Ok(self.context.cell(id).output.result()),
                RunState::Resolving => {
                    return Err(EvalError::DependencyCycle {
                        verb: self.context.cell(id).verb.name().to_string(),
                    })
                }
                RunState::Idle => {}
            }
            self.context.cell_mut(id).output.run_state = RunState::Resolving;

            let deps: Vec<InvocationId> = self.context.cell(id).output.deps().to_vec();
            for dep in &deps {
                self.run(*dep).await?;
            }
            if !deps.is_empty() {
                self.resolve(id)?;
            }

            // Replay keys in first-write order. Handlers may append
            // more keys (or re-set existing ones); iterating by index
            // picks those up in order.
            let dialect = self.dialect.clone();
            let globals = self.globals.clone();
            let mut index = 0;
            loop {
                let key = match self.context.cell(id).output.ordered_key_at(index) {
                    Some(key) => key.to_string(),
                    None => break,
                };
                index += 1;
                let handler = match dialect.handler(&key) {
                    Some(handler) => handler,
                    None => continue,
                };
                trace!(id = %id, key = %key, "dispatching key handler");
                let cell = self.context.cell_mut(id);
                let mut ctx = HandlerCtx::new(&key, &mut cell.scope, &mut cell.output, &globals);
                handler.handle(&mut ctx).await?;
            }

            let cell = self.context.cell_mut(id);
            cell.output.run_state = RunState::Settled;
            cell.output.clear_deferred();
            trace!(id = %id, "record settled");
            Ok(self.context.cell(id).output.result())
        })
    }

    /// Re-invoke a record's verb now that every dependency has
    /// settled: substitute real results into the scope's arguments,
    /// drop everything accumulated from the placeholder execution, and
    /// execute again — synchronously, like every verb execution.
    fn resolve(&mut self, id: InvocationId) -> Result<(), EvalError> {
        if !self.context.cell(id).output.is_deferred() {
            return Ok(());
        }
        trace!(id = %id, "resolving with substituted arguments");
        let resolved = self.context.dep_results(id);
        let outcome = {
            let cell = self.context.cell_mut(id);
            cell.scope.substitute(&resolved);
            cell.output.reset_for_resolve();
            let verb = cell.verb.clone();
            verb.execute(&mut cell.scope, &mut cell.output)?
        };
        self.apply_outcome(id, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::output::OutputRecord;
    use crate::scope::InvocationScope;
    use crate::verb::Verb;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEcho {
        executions: Arc<AtomicUsize>,
    }

    impl Verb for CountingEcho {
        fn name(&self) -> &str {
            "echo"
        }
        fn execute(
            &self,
            scope: &mut InvocationScope,
            _output: &mut OutputRecord,
        ) -> Result<Outcome, EvalError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Produced(scope.arg(0, crate::coerce::Kind::Any)))
        }
    }

    fn machine_with_echo(executions: Arc<AtomicUsize>) -> ScriptMachine {
        let dialect = Dialect::builder("test")
            .verb(Arc::new(CountingEcho { executions }))
            .unwrap()
            .build();
        let mut registry = DialectRegistry::new();
        registry.register(dialect);
        ScriptMachine::new(&registry, "test", Globals::new()).unwrap()
    }

    #[tokio::test]
    async fn run_is_idempotent_once_settled() {
        let executions = Arc::new(AtomicUsize::new(0));
        let mut machine = machine_with_echo(executions.clone());
        machine.execute("echo(3)").await.unwrap();
        let id = machine.context.current().unwrap();

        let first = machine.run(id).await.unwrap();
        let second = machine.run(id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cyclic_dependencies_are_reported() {
        let executions = Arc::new(AtomicUsize::new(0));
        let mut machine = machine_with_echo(executions.clone());
        machine.execute("echo(1)").await.unwrap();
        let a = InvocationId(0);

        // Wire a self-cycle by hand; scripts cannot express one
        // directly, but a buggy host verb could.
        machine.context.cell_mut(a).output.mark_depend_on(a);
        machine.context.cell_mut(a).output.mark_deferred();
        machine.context.cell_mut(a).output.run_state = RunState::Idle;

        let err = machine.run(a).await.unwrap_err();
        assert!(matches!(err, EvalError::DependencyCycle { ref verb } if verb == "echo"));
    }

    #[tokio::test]
    async fn unknown_identifier_names_the_line() {
        let mut machine = machine_with_echo(Arc::new(AtomicUsize::new(0)));
        let err = machine.execute("echo(nope)").await.unwrap_err();
        assert!(matches!(err, EvalError::UnknownIdentifier { ref name, line: 1 } if name == "nope"));
    }
}
