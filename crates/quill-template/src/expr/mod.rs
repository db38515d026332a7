//! Template expressions.
//!
//! Directive values go through two stages:
//!
//! 1. [`format_expression`] rewrites bare identifiers into
//!    `context['name']` lookups (the canonical, context-scoped form).
//! 2. [`Expression::parse`] turns the formatted string into an [`Expr`] tree
//!    that the virtual machine evaluates against a
//!    [`DataContext`](crate::DataContext).
//!
//! The language is the expression subset of JavaScript that templates use:
//! literals, member and index access, unary and binary operators, the
//! conditional operator, and array/object literals. Calls are rejected.

mod eval;
mod format;
mod lexer;
mod parser;

use std::fmt;

use thiserror::Error;

use crate::value::Value;

pub use format::{ExpressionFormatter, RESERVED_WORDS, format_expression};
pub use lexer::{Lexer, Spanned, Token};

/// An expression that failed to tokenize or parse.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `context['name']`
    Field(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
}

// ── Expression ────────────────────────────────────────────────────────────

/// A parsed expression together with the formatted source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parse a formatted expression.
    ///
    /// ```
    /// use quill_template::expr::{Expr, Expression};
    ///
    /// let e = Expression::parse("context['a']").unwrap();
    /// assert_eq!(e.root(), &Expr::Field("a".into()));
    /// ```
    pub fn parse(source: &str) -> Result<Self, SyntaxError> {
        let root = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
