//! Error types for Tessel operations.
//!
//! This module provides the main error type [`TesselError`] which wraps
//! the failures that can occur while compiling a shader.

use std::io;

use thiserror::Error;

use tessel_parser::Diagnostic;

/// The main error type for Tessel operations.
///
/// # Diagnostic Variants
///
/// The `Compile` variant keeps the source text next to the diagnostic so
/// the location can be rendered as a snippet.
#[derive(Debug, Error)]
pub enum TesselError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Compile { err: Diagnostic, src: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TesselError {
    /// Create a new `Compile` error with the associated source code.
    pub fn new_compile_error(err: Diagnostic, src: impl Into<String>) -> Self {
        Self::Compile {
            err,
            src: src.into(),
        }
    }

    /// The diagnostic of a `Compile` error.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Compile { err, .. } => Some(err),
            _ => None,
        }
    }
}
