//! Error and diagnostic system for the Tessel front end.
//!
//! Every failure of the lexer, parser or sanitizer is one [`ErrorKind`] from
//! a closed taxonomy. Kinds carry their arguments as typed fields and belong
//! to one [`ErrorCategory`]:
//! - `L` - Lexer errors
//! - `P` - Parser errors
//! - `C` - Compiler (semantic) errors
//! - `A` - AST errors, which signal a defect in the front end itself
//!
//! A [`Diagnostic`] pairs a kind with its [`SourceLocation`](crate::span::SourceLocation)
//! and optional secondary labels and help text.
//!
//! # Example
//!
//! ```
//! # use tessel_parser::error::{Diagnostic, ErrorKind};
//! # use tessel_parser::span::SourceLocation;
//!
//! let diag = Diagnostic::new(ErrorKind::ExtBindingAlreadyUsed(0, 1), SourceLocation::unknown())
//!     .with_help("pick another binding index");
//!
//! assert_eq!(diag.code(), "CExtBindingAlreadyUsed");
//! assert_eq!(diag.message(), "binding (set=0, binding=1) is already in use");
//! ```

mod category;
mod diagnostic;
mod kind;
mod label;

pub use category::ErrorCategory;
pub use diagnostic::Diagnostic;
pub use kind::ErrorKind;
pub use label::Label;

/// A type alias for `Result<T, Diagnostic>`.
pub type Result<T> = std::result::Result<T, Diagnostic>;
