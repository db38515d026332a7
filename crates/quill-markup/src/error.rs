use std::error::Error;
use std::fmt;

/// Markup that is not a well-formed template document.
///
/// `line` and `col` are 1-based and point at the offending character, or at
/// the end of input for unterminated constructs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
        }
    }

    /// The `(line, col)` pair, handy for editor diagnostics.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.col)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.col, self.message)
    }
}

impl Error for ParseError {}
