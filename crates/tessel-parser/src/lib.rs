//! # Tessel Parser
//!
//! Front end of the Tessel shading language. This crate turns `.tsl` source
//! text into a resolved, fully typed AST:
//!
//! 1. **Tokenize** - [`lexer::tokenize`] converts source text to tokens
//! 2. **Parse** - [`parser::parse`] builds the unresolved AST
//! 3. **Sanitize** - [`sanitizer::sanitize`] resolves names, types every
//!    expression and folds constants
//!
//! Every stage stops at the first problem and reports it as a
//! [`Diagnostic`].
//!
//! ## Usage
//!
//! ```
//! # use tessel_parser::{compile, Diagnostic, SanitizeOptions};
//!
//! fn main() -> Result<(), Diagnostic> {
//!     let source = r#"
//!         [nzsl_version("1.0")]
//!         module;
//!
//!         fn add(a: f32, b: f32) -> f32 { return a + b; }
//!     "#;
//!
//!     let module = compile(source, Some("add.tsl"), &SanitizeOptions::default())?;
//!     assert_eq!(module.statements.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
#[cfg(test)]
mod parser_tests;
pub mod sanitizer;
#[cfg(test)]
mod sanitizer_tests;
pub mod span;
pub mod tokens;

pub use error::{Diagnostic, ErrorKind, Result};
pub use sanitizer::{ModuleResolver, SanitizeOptions, sanitize};
pub use span::SourceLocation;

use log::debug;

use ast::Module;

/// Tokenizes and parses `source` without resolving it.
///
/// `file_path` is recorded in every source location.
pub fn parse_source(source: &str, file_path: Option<&str>) -> Result<Module> {
    let tokens = lexer::tokenize(source, file_path)?;
    debug!(tokens = tokens.len(); "Tokenized");
    parser::parse(&tokens)
}

/// Runs the whole front end on `source`.
pub fn compile(source: &str, file_path: Option<&str>, options: &SanitizeOptions) -> Result<Module> {
    let module = parse_source(source, file_path)?;
    sanitize(module, options)
}
