//! AST produced by the parser. Expressions carry the line of their
//! opening token where a later diagnostic may need it (verb calls).

use serde::Serialize;

/// A parsed script: one or more expression statements.
/// The last statement's value is the script's expression value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    pub statements: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Literal(Literal),
    /// A bound name: a script-level global such as `$chatroomId`.
    Ident { name: String, line: u32 },
    Array(Vec<Expr>),
    /// Object literal; entry order is preserved as written.
    Object(Vec<(String, Expr)>),
    /// A verb invocation.
    Call {
        name: String,
        args: Vec<Expr>,
        line: u32,
    },
    Member {
        object: Box<Expr>,
        field: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    /// Numeric negation `-x`
    Neg,
    /// Logical not `!x`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}
