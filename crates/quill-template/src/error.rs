use thiserror::Error;

use crate::program::Slot;

/// Structural failure detected while adding or compiling a template.
///
/// A template that fails to compile has no routine; every render of it
/// reports the same error until the markup is fixed and re-added.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("invalid template `{template}`: {reason}")]
    MalformedMarkup { template: String, reason: String },

    #[error("invalid directive structure: {0}")]
    InvalidDirectiveStructure(String),

    #[error("t-call target `{0}` is not a registered template")]
    UnresolvedInclusion(String),

    #[error("cannot materialize {0} node")]
    UnknownNodeKind(&'static str),

    #[error("invalid expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("template `{0}` not found")]
    TemplateNotFound(String),
}

/// Fault raised while evaluating an expression against a data context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cannot read property `{property}` of {target}")]
    MemberOfNothing {
        property: String,
        target: &'static str,
    },
}

/// Fault raised while a compiled routine runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("t-on handler `{handler}` is {found}, not a function")]
    NotAFunction {
        handler: String,
        found: &'static str,
    },

    #[error("t-foreach source of type {found} is not iterable")]
    NotIterable { found: &'static str },

    #[error("t-foreach count {0} is not a valid array length")]
    InvalidCount(f64),

    #[error("register {slot} does not hold {expected}")]
    Register { slot: Slot, expected: &'static str },
}

/// Any failure of [`TemplateRegistry::render`](crate::TemplateRegistry::render).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
