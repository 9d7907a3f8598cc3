//! Categories of the error taxonomy.

use std::fmt;

/// The stage an [`ErrorKind`](super::ErrorKind) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or unterminated tokens.
    Lexer,
    /// Grammar violations, attribute and version syntax.
    Parser,
    /// Type errors, resolution failures, layout/binding/stage violations.
    Compiler,
    /// Index misuse and broken invariants inside the front end.
    ///
    /// These are implementation faults rather than source defects.
    Ast,
}

impl ErrorCategory {
    /// Single-letter prefix used in error codes.
    pub fn letter(&self) -> char {
        match self {
            ErrorCategory::Lexer => 'L',
            ErrorCategory::Parser => 'P',
            ErrorCategory::Compiler => 'C',
            ErrorCategory::Ast => 'A',
        }
    }

    /// Returns `true` for errors caused by the front end rather than the source.
    pub fn is_internal(&self) -> bool {
        matches!(self, ErrorCategory::Ast)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Lexer => write!(f, "lexer"),
            ErrorCategory::Parser => write!(f, "parser"),
            ErrorCategory::Compiler => write!(f, "compiler"),
            ErrorCategory::Ast => write!(f, "ast"),
        }
    }
}
