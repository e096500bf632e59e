/// All errors the execution engine can surface.
///
/// None of these are retried by the engine; retry, if desired, is a
/// host concern applied to the whole `execute()` call. Records are
/// discarded per run, so there is no partial state to roll back.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Empty or unparseable script text.
    #[error("invalid script: {reason}")]
    InvalidScript { reason: String },

    /// The script references a denylisted construct.
    #[error("forbidden construct '{token}' at line {line}")]
    ForbiddenConstruct { token: String, line: u32 },

    /// A call names a verb the dialect does not register.
    #[error("unknown verb '{name}' at line {line}")]
    UnknownVerb { name: String, line: u32 },

    /// No dialect registered under this name.
    #[error("unknown dialect '{name}'")]
    UnknownDialect { name: String },

    /// An identifier is neither a global argument nor a verb.
    #[error("unknown identifier '{name}' at line {line}")]
    UnknownIdentifier { name: String, line: u32 },

    /// A verb was registered with an empty name.
    #[error("verb registered without a name")]
    MissingVerbName,

    /// Two verbs in one dialect share a name.
    #[error("duplicate verb name '{name}'")]
    DuplicateVerb { name: String },

    /// A verb signalled a pending result while one was already pending.
    #[error("verb '{verb}' wrote a pending result while already pending")]
    IllegalDeferredWrite { verb: String },

    /// The dependency graph is not a DAG.
    #[error("dependency cycle involving verb '{verb}'")]
    DependencyCycle { verb: String },

    /// A deferred output was neither chained forward nor consumed as a
    /// dependency of a later invocation.
    #[error("deferred output of verb '{verb}' cannot be chained past")]
    DeferredChain { verb: String },

    /// An operator was applied to operands it cannot handle.
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    /// A host verb or key handler failed.
    #[error("verb '{name}' failed: {message}")]
    Verb { name: String, message: String },
}

impl EvalError {
    /// Convenience constructor for host verb/handler failures.
    pub fn verb(name: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Verb {
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            message: message.into(),
        }
    }
}

impl From<cuescript_core::ParseError> for EvalError {
    fn from(err: cuescript_core::ParseError) -> Self {
        match err {
            cuescript_core::ParseError::Forbidden { line, token } => {
                EvalError::ForbiddenConstruct { token, line }
            }
            other => EvalError::InvalidScript {
                reason: other.to_string(),
            },
        }
    }
}
