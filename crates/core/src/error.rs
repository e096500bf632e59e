/// Errors produced while lexing or parsing a script.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The script is empty or whitespace-only.
    #[error("empty script")]
    EmptyScript,

    /// A token- or grammar-level error.
    #[error("line {line}: {message}")]
    Syntax { line: u32, message: String },

    /// The script references a denylisted construct (dynamic code
    /// evaluation, function definition, host globals).
    #[error("line {line}: forbidden construct '{token}'")]
    Forbidden { line: u32, token: String },
}

impl ParseError {
    pub fn syntax(line: u32, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn forbidden(line: u32, token: impl Into<String>) -> Self {
        ParseError::Forbidden {
            line,
            token: token.into(),
        }
    }
}
