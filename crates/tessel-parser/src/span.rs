//! Source positions attached to tokens, AST nodes and diagnostics.

use std::{fmt, sync::Arc};

/// A byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span from a byte range.
    pub fn new(range: std::ops::Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end.max(range.start),
        }
    }

    /// Get the start offset of the span
    pub fn start(&self) -> usize {
        self.start
    }

    /// Get the end offset of the span
    pub fn end(&self) -> usize {
        self.end
    }

    /// Get the length of the span
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span is empty
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Create a union of two spans (encompassing both)
    pub fn union(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start)..self.end.max(other.end))
    }
}

/// A line/column position, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Where a token, node or diagnostic comes from.
///
/// Locations are computed once by the lexer and then copied along through
/// every later stage. A location with line `0` is the "whole program"
/// location used by errors that have no single source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceLocation {
    file: Option<Arc<str>>,
    start: Position,
    end: Position,
    span: Span,
}

impl SourceLocation {
    pub fn new(file: Option<Arc<str>>, start: Position, end: Position, span: Span) -> Self {
        Self {
            file,
            start,
            end,
            span,
        }
    }

    /// A location not tied to any position, for whole-program diagnostics.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn is_known(&self) -> bool {
        self.start.line > 0
    }

    /// Returns a location covering both `self` and `other`.
    ///
    /// Unknown locations are absorbed by known ones.
    pub fn extend_to(&self, other: &SourceLocation) -> SourceLocation {
        if !self.is_known() {
            return other.clone();
        }
        if !other.is_known() {
            return self.clone();
        }
        SourceLocation {
            file: self.file.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            span: self.span.union(other.span),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.file().unwrap_or("<source>");
        if self.is_known() {
            write!(f, "{file}:{}:{}", self.start.line, self.start.column)
        } else {
            f.write_str(file)
        }
    }
}

/// A value paired with the location it was parsed from.
#[derive(Debug, Clone, Default)]
pub struct Spanned<T> {
    value: T,
    location: SourceLocation,
}

impl<T> Spanned<T> {
    pub fn new(value: T, location: SourceLocation) -> Self {
        Self { value, location }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Convert from one spanned type to another using the provided function
    pub fn map<F, U>(&self, f: F) -> Spanned<U>
    where
        F: FnOnce(&T) -> U,
    {
        Spanned {
            value: f(&self.value),
            location: self.location.clone(),
        }
    }

    /// Get a reference to the underlying value
    pub fn inner(&self) -> &T {
        &self.value
    }

    /// Consume the Spanned wrapper and return just the inner value
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

// Locations are ignored so parsed values compare by content.
impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value.eq(&other.value)
    }
}
