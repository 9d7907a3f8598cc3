//! Statement and declaration nodes.

use tessel_core::attribute::{
    DepthWriteMode, LoopUnroll, MemoryLayout, ShaderStage, BuiltinEntry,
};

use crate::{
    ast::{AttributeValue, Expression},
    span::{SourceLocation, Spanned},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Expression,
    pub statement: Box<Statement>,
}

/// `if`/`else if`/`else` chain. `is_const` marks a `const if`, folded by the
/// sanitizer.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchStatement {
    pub branches: Vec<ConditionalBranch>,
    pub else_statement: Option<Box<Statement>>,
    pub is_const: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDeclaration {
    pub index: Option<usize>,
    pub name: Spanned<String>,
    pub expression: Expression,
    pub is_exported: bool,
    pub cond: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDeclaration {
    pub index: Option<usize>,
    pub name: Spanned<String>,
    pub ty: Option<Expression>,
    pub expression: Option<Expression>,
    pub is_exported: bool,
    pub cond: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalVariable {
    pub index: Option<usize>,
    pub name: Spanned<String>,
    pub ty: Expression,
    pub set: Option<AttributeValue<u32>>,
    pub binding: Option<AttributeValue<u32>>,
    pub tag: Option<String>,
    pub cond: Option<Expression>,
}

/// `external { ... }` resource block.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDeclaration {
    pub set: Option<AttributeValue<u32>>,
    pub auto_binding: Option<AttributeValue<bool>>,
    pub tag: Option<String>,
    pub variables: Vec<ExternalVariable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameter {
    pub index: Option<usize>,
    pub name: Spanned<String>,
    pub ty: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub index: Option<usize>,
    pub name: Spanned<String>,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Option<Expression>,
    pub statements: Vec<Statement>,
    pub entry_stage: Option<AttributeValue<ShaderStage>>,
    pub workgroup: Option<[AttributeValue<u32>; 3]>,
    pub early_fragment_tests: Option<AttributeValue<bool>>,
    pub depth_write: Option<AttributeValue<DepthWriteMode>>,
    pub is_exported: bool,
    pub cond: Option<Expression>,
}

impl FunctionDeclaration {
    pub fn stage(&self) -> Option<ShaderStage> {
        self.entry_stage.as_ref().and_then(|s| s.value().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDeclaration {
    pub index: Option<usize>,
    pub name: Spanned<String>,
    pub ty: Expression,
    pub default: Option<Expression>,
    pub tag: Option<String>,
    /// CRC-32 of the option name, filled by the sanitizer.
    pub hash: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub name: Spanned<String>,
    pub ty: Expression,
    pub builtin: Option<AttributeValue<BuiltinEntry>>,
    pub location_index: Option<AttributeValue<u32>>,
    pub cond: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDeclaration {
    pub index: Option<usize>,
    pub name: Spanned<String>,
    pub is_exported: bool,
    pub cond: Option<Expression>,
    pub layout: Option<AttributeValue<MemoryLayout>>,
    pub members: Vec<StructMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub index: Option<usize>,
    pub name: Spanned<String>,
    pub ty: Option<Expression>,
    pub initial: Option<Expression>,
}

/// Numerical `for i in from -> to : step`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub index: Option<usize>,
    pub variable: Spanned<String>,
    pub from: Expression,
    pub to: Expression,
    pub step: Option<Expression>,
    pub unroll: Option<AttributeValue<LoopUnroll>>,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachStatement {
    pub index: Option<usize>,
    pub variable: Spanned<String>,
    pub expression: Expression,
    pub unroll: Option<AttributeValue<LoopUnroll>>,
    pub body: Box<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub condition: Expression,
    pub unroll: Option<AttributeValue<LoopUnroll>>,
    pub body: Box<Statement>,
}

/// One name in an import list. `identifier` is `None` for the `*` wildcard.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportIdentifier {
    pub identifier: Option<String>,
    pub rename: Option<String>,
    pub location: SourceLocation,
}

impl ImportIdentifier {
    pub fn is_wildcard(&self) -> bool {
        self.identifier.is_none()
    }
}

/// `import a, b as c from Mod;` or `import Mod as M;`.
///
/// The second form has no identifiers and binds the whole module.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    pub module_name: Spanned<String>,
    pub module_alias: Option<Spanned<String>>,
    pub identifiers: Vec<ImportIdentifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Branch(BranchStatement),
    Break,
    Continue,
    DeclareAlias(AliasDeclaration),
    DeclareConst(ConstDeclaration),
    DeclareExternal(ExternalDeclaration),
    DeclareFunction(FunctionDeclaration),
    DeclareOption(OptionDeclaration),
    DeclareStruct(StructDeclaration),
    DeclareVariable(VariableDeclaration),
    Discard,
    Expression(Expression),
    For(ForStatement),
    ForEach(ForEachStatement),
    Import(ImportStatement),
    /// Several statements without a scope of their own, e.g. a folded
    /// `const if` branch.
    Multi(Vec<Statement>),
    NoOp,
    Return(Option<Expression>),
    Scoped(Vec<Statement>),
    While(WhileStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub location: SourceLocation,
}

impl Statement {
    pub fn new(kind: StatementKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    pub fn no_op(location: SourceLocation) -> Self {
        Self::new(StatementKind::NoOp, location)
    }

    /// Name of the declaration this statement introduces at module level,
    /// if any.
    pub fn declared_name(&self) -> Option<&Spanned<String>> {
        match &self.kind {
            StatementKind::DeclareAlias(decl) => Some(&decl.name),
            StatementKind::DeclareConst(decl) => Some(&decl.name),
            StatementKind::DeclareFunction(decl) => Some(&decl.name),
            StatementKind::DeclareOption(decl) => Some(&decl.name),
            StatementKind::DeclareStruct(decl) => Some(&decl.name),
            _ => None,
        }
    }

    /// Whether the declaration is guarded by a `cond` attribute.
    pub fn is_conditional(&self) -> bool {
        match &self.kind {
            StatementKind::DeclareAlias(decl) => decl.cond.is_some(),
            StatementKind::DeclareConst(decl) => decl.cond.is_some(),
            StatementKind::DeclareFunction(decl) => decl.cond.is_some(),
            StatementKind::DeclareStruct(decl) => decl.cond.is_some(),
            _ => false,
        }
    }
}
