//! cuescript-core: the cuescript expression language.
//!
//! A deliberately small language for invoking host-registered verbs:
//! literals, identifiers, verb calls, member/index access, and simple
//! operators. Statements are separated by `;`. There are no loops, no
//! user-defined functions, and no dynamic code evaluation — scripts are
//! parsed by an explicit recursive-descent parser, and a short denylist
//! of host-environment identifiers is rejected structurally at parse
//! time, never by pattern-matching raw text.
//!
//! # Public API
//!
//! - [`parse()`] -- lex + parse a script into a [`Script`]
//! - [`ParseError`] -- parse error type
//! - AST types: [`Script`], [`Expr`], [`Literal`], [`BinaryOp`], [`UnaryOp`]

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, Literal, Script, UnaryOp};
pub use error::ParseError;
pub use parser::parse;
