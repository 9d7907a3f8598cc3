//! The core diagnostic type.

use std::fmt;

use crate::{
    error::{ErrorCategory, ErrorKind, Label},
    span::SourceLocation,
};

/// A positioned error with optional labels and help text.
///
/// # Example
///
/// ```text
/// shader.tsl:12:5: CExtBindingAlreadyUsed error: binding (set=0, binding=0) is already in use
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    kind: ErrorKind,
    location: SourceLocation,
    labels: Vec<Label>,
    help: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, location: SourceLocation) -> Self {
        Self {
            kind,
            location,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn code(&self) -> String {
        self.kind.code()
    }

    /// The fully substituted message.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Get all labels attached to this diagnostic.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Add a primary label to this diagnostic.
    pub fn with_label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(location, message));
        self
    }

    /// Add a secondary label to this diagnostic.
    pub fn with_secondary_label(
        mut self,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        self.labels.push(Label::secondary(location, message));
        self
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Follows `ModuleCompilationFailed` wrappers down to the original failure.
    pub fn root_cause(&self) -> &Diagnostic {
        match &self.kind {
            ErrorKind::ModuleCompilationFailed(_, cause) => cause.root_cause(),
            _ => self,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.kind.is_internal() {
            "internal error"
        } else {
            "error"
        };
        if self.location.is_known() || self.location.file().is_some() {
            write!(f, "{}: ", self.location)?;
        }
        write!(f, "{} {severity}: {}", self.code(), self.kind)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::span::{Position, Span};

    fn location() -> SourceLocation {
        SourceLocation::new(
            Some(Arc::from("shader.tsl")),
            Position::new(12, 5),
            Position::new(12, 9),
            Span::new(120..124),
        )
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new(ErrorKind::ExtBindingAlreadyUsed(0, 0), location());
        assert_eq!(
            diag.to_string(),
            "shader.tsl:12:5: CExtBindingAlreadyUsed error: binding (set=0, binding=0) is already in use"
        );
    }

    #[test]
    fn test_internal_display() {
        let diag = Diagnostic::new(ErrorKind::InvalidIndex(4), SourceLocation::unknown());
        assert_eq!(diag.to_string(), "AInvalidIndex internal error: invalid index 4");
    }

    #[test]
    fn test_diagnostic_builder_chain() {
        let diag = Diagnostic::new(ErrorKind::ExtBindingAlreadyUsed(1, 2), location())
            .with_label(location(), "binding reused here")
            .with_secondary_label(SourceLocation::unknown(), "first bound here")
            .with_help("pick a free binding index");

        assert_eq!(diag.category(), ErrorCategory::Compiler);
        assert_eq!(diag.labels().len(), 2);
        assert!(diag.labels()[0].is_primary());
        assert!(diag.labels()[1].is_secondary());
        assert_eq!(diag.help(), Some("pick a free binding index"));
    }

    #[test]
    fn test_root_cause() {
        let inner = Diagnostic::new(ErrorKind::CircularImport("A".into()), location());
        let middle = Diagnostic::new(
            ErrorKind::ModuleCompilationFailed("B".into(), Box::new(inner.clone())),
            SourceLocation::unknown(),
        );
        let outer = Diagnostic::new(
            ErrorKind::ModuleCompilationFailed("A".into(), Box::new(middle)),
            SourceLocation::unknown(),
        );
        assert_eq!(outer.root_cause(), &inner);
    }
}
