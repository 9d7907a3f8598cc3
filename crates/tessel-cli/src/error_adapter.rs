//! Error adapter for converting TesselError to miette diagnostics.
//!
//! This module provides the bridge between the library's error types and
//! miette's rich diagnostic formatting used in the CLI.
//!
//! # Imported Modules
//!
//! A failure inside an imported module surfaces as a
//! `ModuleCompilationFailed` diagnostic whose location belongs to another
//! file. Only locations in the compiled source are rendered as snippets;
//! the original failure is reported as help text.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, SourceSpan};

use tessel::TesselError;
use tessel_parser::{Diagnostic, SourceLocation};

/// Adapter for a single Tessel diagnostic.
pub struct DiagnosticAdapter<'a> {
    diag: &'a Diagnostic,
    /// Source code for displaying snippets
    src: &'a str,
}

impl<'a> DiagnosticAdapter<'a> {
    pub fn new(diag: &'a Diagnostic, src: &'a str) -> Self {
        Self { diag, src }
    }

    /// Whether `location` points into the compiled source.
    fn in_source(&self, location: &SourceLocation) -> bool {
        location.is_known()
            && location.file() == self.diag.location().file()
            && location.span().end() <= self.src.len()
    }
}

impl fmt::Debug for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticAdapter")
            .field("diag", &self.diag)
            .finish()
    }
}

impl fmt::Display for DiagnosticAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diag.message())
    }
}

impl std::error::Error for DiagnosticAdapter<'_> {}

impl MietteDiagnostic for DiagnosticAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.diag.code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        if let Some(help) = self.diag.help() {
            return Some(Box::new(help));
        }
        let root = self.diag.root_cause();
        if std::ptr::eq(root, self.diag) {
            return None;
        }
        Some(Box::new(format!("caused by: {root}")))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let mut labels = Vec::new();
        let location = self.diag.location();
        let has_primary = self.diag.labels().iter().any(|label| label.is_primary());
        if !has_primary && self.in_source(location) {
            labels.push(LabeledSpan::new_primary_with_span(
                None,
                span_to_miette(location),
            ));
        }

        for label in self.diag.labels() {
            if !self.in_source(label.location()) {
                continue;
            }
            let span = span_to_miette(label.location());
            let message = Some(label.message().to_string());
            labels.push(if label.is_primary() {
                LabeledSpan::new_primary_with_span(message, span)
            } else {
                LabeledSpan::new_with_span(message, span)
            });
        }

        if labels.is_empty() {
            return None;
        }
        Some(Box::new(labels.into_iter()))
    }
}

/// Adapter for non-diagnostic [`TesselError`] variants.
pub struct ErrorAdapter<'a>(pub &'a TesselError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            TesselError::Io(_) => "tessel::io",
            TesselError::Compile { .. } => return None,
            TesselError::Config(_) => "tessel::config",
        };
        Some(Box::new(code))
    }
}

/// A reportable error that can be rendered by miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// A rich diagnostic with source location information.
    Diagnostic(DiagnosticAdapter<'a>),
    /// A simple error without source location.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Diagnostic(d) => fmt::Display::fmt(d, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Diagnostic(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Diagnostic(d) => d.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Diagnostic(d) => d.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Diagnostic(d) => d.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

fn span_to_miette(location: &SourceLocation) -> SourceSpan {
    let span = location.span();
    SourceSpan::new(span.start().into(), span.len())
}

/// Convert a [`TesselError`] into a list of reportable errors.
///
/// Compilation stops at the first diagnostic, so every error yields exactly
/// one [`Reportable`].
pub fn to_reportables(err: &TesselError) -> Vec<Reportable<'_>> {
    match err {
        TesselError::Compile { err: diag, src } => {
            vec![Reportable::Diagnostic(DiagnosticAdapter::new(diag, src))]
        }
        _ => vec![Reportable::Error(ErrorAdapter(err))],
    }
}
