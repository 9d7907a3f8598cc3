//! The AST node model shared by the parser and the sanitizer.
//!
//! The parser produces an unresolved tree: names are [`ExpressionKind::Identifier`]s,
//! declaration `index` slots are `None` and no expression carries a type. The
//! sanitizer returns a tree of the same shape with every slot filled. Nodes
//! refer to declarations through registry indices, never through pointers.
//!
//! ## Span Architecture
//! - Every [`Expression`] and [`Statement`] carries the [`SourceLocation`](crate::span::SourceLocation)
//!   of the text it was parsed from.
//! - Declared names are [`Spanned`](crate::span::Spanned) so diagnostics can point at them.

mod expression;
mod module;
mod statement;

pub use expression::{
    AssignOp, AttributeValue, BinaryOp, Expression, ExpressionKind, UnaryOp,
};
pub use module::{ImportedModule, LangVersion, Module, ModuleMetadata};
pub use statement::{
    AliasDeclaration, BranchStatement, ConditionalBranch, ConstDeclaration, ExternalDeclaration,
    ExternalVariable, ForEachStatement, ForStatement, FunctionDeclaration, FunctionParameter,
    ImportIdentifier, ImportStatement, OptionDeclaration, Statement, StatementKind,
    StructDeclaration, StructMember, VariableDeclaration, WhileStatement,
};
