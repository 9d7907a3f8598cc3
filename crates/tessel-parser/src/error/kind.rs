//! The closed taxonomy of front-end errors.
//!
//! Type arguments are carried as already-rendered strings so a diagnostic
//! stays meaningful after the registries that named them are gone.

use thiserror::Error;

use tessel_core::attribute::{AttributeType, BuiltinEntry, ModuleFeature, ShaderStage};

use crate::{
    error::{Diagnostic, ErrorCategory},
    tokens::TokenKind,
};

/// Declares [`ErrorKind`] together with its category and name lookups, so the
/// three can never drift apart.
macro_rules! error_kinds {
    (
        $(
            $category:ident {
                $(
                    $(#[$meta:meta])*
                    $name:ident $( ( $($arg:ty),+ $(,)? ) )? = ( $($message:tt)+ )
                ),+ $(,)?
            }
        )+
    ) => {
        /// Every failure the front end can report.
        #[derive(Debug, Clone, PartialEq, Eq, Error)]
        pub enum ErrorKind {
            $($(
                $(#[$meta])*
                #[error($($message)+)]
                $name $( ( $($arg),+ ) )?,
            )+)+
        }

        impl ErrorKind {
            pub fn category(&self) -> ErrorCategory {
                match self {
                    $($( ErrorKind::$name { .. } => ErrorCategory::$category, )+)+
                }
            }

            /// Stable identifier of the kind, equal to its variant name.
            pub fn name(&self) -> &'static str {
                match self {
                    $($( ErrorKind::$name { .. } => stringify!($name), )+)+
                }
            }
        }
    };
}

error_kinds! {
    Lexer {
        BadNumber = ("bad number"),
        NumberOutOfRange = ("number is out of range"),
        UnfinishedComment = ("unfinished block comment"),
        UnfinishedString = ("unfinished string"),
        UnrecognizedChar = ("unrecognized character"),
        UnrecognizedToken = ("unrecognized token"),
        UnexpectedFloatingPointBase(u32) =
            ("floating-point number can only be specified using base 10 (got base {0})"),
    }

    Parser {
        AttributeExpectString(AttributeType) = ("attribute {0} requires a string parameter"),
        AttributeInvalidParameter(String, AttributeType) =
            ("invalid parameter {0} for attribute {1}"),
        AttributeMultipleUnique(AttributeType) = ("attribute {0} can only be present once"),
        AttributeParameterIdentifier(AttributeType) =
            ("attribute {0} parameter can only be an identifier"),
        AttributeUnexpectedParameterCount(AttributeType, usize, usize) =
            ("attribute {0} expects {1} arguments, got {2}"),
        ExpectedToken(TokenKind, TokenKind) = ("expected token {0}, got {1}"),
        DuplicateIdentifier = ("duplicate identifier"),
        DuplicateModule = ("duplicate module"),
        InvalidVersion(String) = ("\"{0}\" is not a valid version"),
        MissingAttribute(AttributeType) = ("missing attribute {0}"),
        ModuleFeatureMultipleUnique(ModuleFeature) =
            ("module feature {0} has already been specified"),
        ReservedKeyword = ("reserved keyword"),
        UnknownAttribute(String) = ("unknown attribute \"{0}\""),
        UnknownType = ("unknown type"),
        UnexpectedAttribute(AttributeType, String) = ("unexpected attribute {0} on {1}"),
        UnexpectedEndOfFile = ("unexpected end of file"),
        UnexpectedToken(TokenKind) = ("unexpected token {0}"),
    }

    Compiler {
        AliasUnexpectedType(String) =
            ("for now, only aliases, functions and structs can be aliased (got {0})"),
        ArrayLength(String) = ("array length must a strictly positive integer, got {0}"),
        ArrayLengthRequired = ("array length is required in this context"),
        AssignTemporary = ("temporary values cannot be assigned"),
        AttributeUnexpectedExpression = ("unexpected expression for this type"),
        AttributeUnexpectedNegative(String) = ("attribute value cannot be negative, got {0}"),
        AttributeUnexpectedType(String, String) =
            ("unexpected attribute type (expected {0}, got {1})"),
        BinaryIncompatibleTypes(String, String) = ("incompatibles types ({0} and {1})"),
        BinaryNegativeShift(String, String, String) =
            ("negative shift in expression ({0} {1} {2})"),
        BinaryTooLargeShift(String, String, String, String) =
            ("shift is too large in expression ({0} {1} {2}) for type {3}"),
        BinaryUnsupported(String, String) =
            ("{0} type ({1}) does not support this binary operation"),
        BuiltinUnexpectedType(BuiltinEntry, String, String) =
            ("builtin {0} expected type {1}, got type {2}"),
        BuiltinUnsupportedStage(BuiltinEntry, ShaderStage) =
            ("builtin {0} is not available in {1} stage"),
        BranchOutsideOfFunction =
            ("non-const branching statements can only exist inside a function"),
        CastComponentMismatch(u32, u32) =
            ("component count ({0}) doesn't match required component count ({1})"),
        CastIncompatibleBaseTypes(String, String) =
            ("incompatibles base types (expected {0}, got {1})"),
        CastIncompatibleTypes(String, String) = ("incompatibles types ({0} and {1})"),
        CastMatrixExpectedVectorOrScalar(String) = ("expected vector or scalar type, got {0}"),
        CastMatrixVectorComponentMismatch(u32, u32) =
            ("vector component count ({0}) doesn't match target matrix row count ({1})"),
        CircularImport(String) = ("circular import detected on {0}"),
        ConditionExpectedBool(String) = ("expected boolean for condition, got {0}"),
        ConstMissingExpression = ("const variables must have an expression"),
        ConstantExpectedValue = ("expected a value"),
        ConstantExpressionRequired = ("a constant expression is required in this context"),
        DiscardEarlyFragmentTests = ("discard is not compatible with early fragment tests"),
        DiscardOutsideOfFunction = ("discard can only be used inside a function"),
        EntryFunctionParameter =
            ("entry functions can either take one struct parameter or no parameter"),
        EntryPointAlreadyDefined(ShaderStage) =
            ("the {0} entry type has been defined multiple times"),
        ExpectedConstantType(String) = (
            "const and options type can only be scalars/vectors (or arrays of scalars/vectors), got {0}"
        ),
        ExpectedFunction = ("expected function expression"),
        ExpectedIntrinsicFunction = ("expected intrinsic function expression"),
        ExpectedPartialType(String) = ("only partial types can be specialized, got {0}"),
        ExtAlreadyDeclared(String) = ("external variable {0} is already declared"),
        ExtBindingAlreadyUsed(u32, u32) = ("binding (set={0}, binding={1}) is already in use"),
        ExtMissingBindingIndex = ("external variable requires a binding index"),
        ExtTypeNotAllowed(String, String) = (
            "external variable {0} has unauthorized type ({1}): only storage buffers, samplers, push constants and uniform buffers (and primitives, vectors and matrices if primitive external feature is enabled) are allowed in external blocks"
        ),
        ForEachUnsupportedType(String) =
            ("for-each statements can only be called on array types, got {0}"),
        ForFromTypeExpectIntegerType(String) =
            ("numerical for from expression must be an integer or unsigned integer, got {0}"),
        ForStepUnmatchingType(String, String) =
            ("numerical for step expression type ({0}) must match from expression type ({1})"),
        ForToUnmatchingType(String, String) =
            ("numerical for to expression type ({0}) must match from expression type ({1})"),
        FullTypeExpected(String) = ("expected a full type, got {0}"),
        FunctionCallExpectedFunction = ("expected function expression"),
        FunctionCallOutsideOfFunction = ("function calls must happen inside a function"),
        FunctionCallUnexpectedEntryFunction(String) =
            ("{0} is an entry function which cannot be called by the program"),
        FunctionCallUnmatchingParameterCount(String, u32, u32) =
            ("function {0} expects {1} parameter(s), but got {2}"),
        FunctionCallUnmatchingParameterType(String, u32, String, String) =
            ("function {0} parameter #{1} type mismatch (expected {2}, got {3})"),
        FunctionDeclarationInsideFunction =
            ("a function cannot be defined inside another function"),
        IdentifierAlreadyUsed(String) = ("identifier {0} is already used"),
        ImportIdentifierAlreadyPresent(String) = ("{0} identifier was already imported"),
        ImportIdentifierNotFound(String, String) = ("identifier {0} not found in module {1}"),
        ImportMultipleWildcard = ("only one wildcard can be present in an import directive"),
        ImportWildcardRename = ("wildcard cannot be renamed"),
        IndexRequiresIntegerIndices(String) = ("index access requires integer indices (got {0})"),
        IndexStructRequiresInt32Indices(String) =
            ("struct indexing requires constant i32 indices (got {0})"),
        IndexUnexpectedType(String) = (
            "unexpected type: only arrays, structs, vectors and matrices can be indexed (got {0})"
        ),
        IntegralDivisionByZero(String, String) =
            ("integral division by zero in expression ({0} / {1})"),
        IntegralModuloByZero(String, String) =
            ("integral modulo by zero in expression ({0} % {1})"),
        IntrinsicExpectedFloat = ("expected scalar or vector floating-points"),
        IntrinsicExpectedParameterCount(u32) = ("expected {0} parameter(s)"),
        IntrinsicExpectedType(u32, String, String) =
            ("expected type {1} for parameter #{0}, got {2}"),
        IntrinsicUnexpectedBoolean = ("boolean parameters are not allowed"),
        IntrinsicUnmatchingParameterType(u32, u32) =
            ("unmatching intrinsic types (param #{0}->#{1} types must match)"),
        IntrinsicUnmatchingVecComponent(u32, u32) =
            ("unmatching intrinsic types (param #{0}->#{1} types must match)"),
        InvalidCast(String) = ("invalid cast to type {0}"),
        InvalidScalarSwizzle = ("invalid swizzle for scalar"),
        InvalidStageDependency(ShaderStage, ShaderStage) = (
            "this is only valid in the {0} stage but this functions gets called in the {1} stage"
        ),
        InvalidSwizzle(String) = ("invalid swizzle {0}"),
        InvalidWorkgroup(String) =
            ("invalid workgroup {0} (all values must be strictly positive integers)"),
        LoopControlOutsideOfLoop(&'static str) =
            ("loop control instruction {0} found outside of loop"),
        MatrixExpectedFloat(String) =
            ("expected floating-point primitive as matrix type, got {0}"),
        MissingOptionValue(String) = ("option {0} requires a value (no default value set)"),
        MissingWorkgroupAttribute = ("compute shader requires a workgroup attribute"),
        ModuleCompilationFailed(String, Box<Diagnostic>) = ("module {0} compilation failed: {1}"),
        ModuleFeatureMismatch(String, ModuleFeature) = ("module {0} requires feature {1}"),
        ModuleNotFound(String) = ("module {0} not found"),
        NoModuleResolver = (
            "import statement found but no module resolver has been set (and partial sanitization is not enabled)"
        ),
        OptionHashCollision(String, String) = ("option {0} has the same hash as option {1}"),
        OptionDeclarationInsideFunction = ("options must be declared outside of functions"),
        PartialTypeExpect(String, u32) = ("expected a {0} type at #{1}"),
        PartialTypeTooFewParameters(u32, u32) =
            ("parameter count mismatch (expected at least {0}, got {1})"),
        PartialTypeTooManyParameters(u32, u32) =
            ("parameter count mismatch (expected at most {0}, got {1})"),
        SamplerUnexpectedType(String) = ("for now only f32 samplers are supported (got {0})"),
        StructDeclarationInsideFunction = ("structs must be declared outside of functions"),
        StructExpected(String) = ("struct type expected, got {0}"),
        StructFieldBuiltinLocation =
            ("a struct field cannot have both builtin and location attributes"),
        StructFieldMultiple(String) =
            ("multiple {0} active struct field found, only one can be active at a time"),
        StructLayoutInnerMismatch(String, String) = (
            "inner struct layout mismatch, struct is declared with {0} but field has layout {1}"
        ),
        StructLayoutTypeNotAllowed(String, String) = ("{0} type is not allowed in {1} layout"),
        SwizzleUnexpectedType(String) = ("expression type ({0}) does not support swizzling"),
        TextureUnexpectedAccess(String) =
            ("texture type require readonly, readwrite or writeonly qualifier (got {0})"),
        TextureUnexpectedFormat(String) =
            ("for now only rgba8 textures are supported (got {0})"),
        TextureUnexpectedType(String) = ("for now only f32 textures are supported (got {0})"),
        UnaryUnsupported(String) = ("type ({0}) does not support this unary operation"),
        UnexpectedAccessedType =
            ("unexpected type (only struct and vectors can be indexed with identifiers)"),
        UnknownField(String) = ("unknown field {0}"),
        UnknownIdentifier(String) = ("unknown identifier {0}"),
        UnknownMethod(String, String) = ("type {0} has no method {1}"),
        UnmatchingTypes(String, String) =
            ("left expression type ({0}) doesn't match right expression type ({1})"),
        UnsupportedAttributeOnStage(String, String) =
            ("{0} entry-point doesn't support {1} attribute"),
        VarDeclarationMissingTypeAndValue =
            ("variable must either have a type or an initial value"),
        VarDeclarationOutsideOfFunction =
            ("global variables outside of external blocks are forbidden"),
        VarDeclarationTypeUnmatching(String, String) =
            ("initial expression type ({0}) doesn't match specified type ({1})"),
        WhileUnrollNotSupported =
            ("unroll(always) is not yet supported on while, use a for loop"),
        UnexpectedAttributeOnPushConstant(AttributeType) =
            ("unexpected attribute {0} on push_constant"),
    }

    Ast {
        AlreadyUsedIndex(usize) = ("index {0} is already used"),
        AttributeRequiresValue(AttributeType) = ("attribute {0} requires a value"),
        AlreadyUsedIndexPreregister(usize) =
            ("cannot preregister used index {0} as its already used"),
        EmptyIdentifier = ("identifier cannot be empty"),
        EmptyImport = ("no identifiers found in import statement"),
        IndexOutOfBounds(&'static str, i32) = ("{0} index {1} is out of bounds"),
        Internal(String) = ("internal error: {0}"),
        InvalidConstantIndex(usize) = ("invalid constant index #{0}"),
        InvalidMethodIndex(usize, String) = ("invalid method index #{0} for type {1}"),
        InvalidIndex(usize) = ("invalid index {0}"),
        MissingExpression = ("a mandatory expression is missing"),
        MissingStatement = ("a mandatory statement is missing"),
        NoIdentifier = ("at least one identifier is required"),
        NoIndex = ("at least one index is required"),
        UnexpectedIdentifier(String) = ("unexpected identifier of type {0}"),
    }
}

impl ErrorKind {
    /// Category letter followed by the kind name, e.g. `CExtBindingAlreadyUsed`.
    pub fn code(&self) -> String {
        format!("{}{}", self.category().letter(), self.name())
    }

    /// Returns `true` for errors caused by the front end rather than the source.
    pub fn is_internal(&self) -> bool {
        self.category().is_internal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SourceLocation;

    #[test]
    fn test_categories_and_codes() {
        assert_eq!(ErrorKind::BadNumber.category(), ErrorCategory::Lexer);
        assert_eq!(ErrorKind::UnexpectedEndOfFile.code(), "PUnexpectedEndOfFile");
        assert_eq!(ErrorKind::CircularImport("A".into()).code(), "CCircularImport");
        assert_eq!(ErrorKind::InvalidIndex(3).code(), "AInvalidIndex");
        assert!(ErrorKind::AlreadyUsedIndex(1).is_internal());
        assert!(!ErrorKind::AssignTemporary.is_internal());
    }

    #[test]
    fn test_message_substitution() {
        assert_eq!(
            ErrorKind::ExpectedToken(TokenKind::Semicolon, TokenKind::Identifier).to_string(),
            "expected token Semicolon, got Identifier"
        );
        assert_eq!(
            ErrorKind::IntrinsicExpectedType(1, "f32".into(), "bool".into()).to_string(),
            "expected type f32 for parameter #1, got bool"
        );
        assert_eq!(
            ErrorKind::InvalidStageDependency(ShaderStage::Fragment, ShaderStage::Vertex)
                .to_string(),
            "this is only valid in the fragment stage but this functions gets called in the vertex stage"
        );
        assert_eq!(
            ErrorKind::EntryPointAlreadyDefined(ShaderStage::Fragment).to_string(),
            "the fragment entry type has been defined multiple times"
        );
        assert_eq!(
            ErrorKind::BuiltinUnsupportedStage(BuiltinEntry::FragDepth, ShaderStage::Vertex)
                .to_string(),
            "builtin frag_depth is not available in vertex stage"
        );
        assert_eq!(
            ErrorKind::UnexpectedFloatingPointBase(16).to_string(),
            "floating-point number can only be specified using base 10 (got base 16)"
        );
    }

    #[test]
    fn test_attribute_requires_value_has_its_own_message() {
        assert_eq!(
            ErrorKind::AttributeRequiresValue(AttributeType::Binding).to_string(),
            "attribute binding requires a value"
        );
        assert_ne!(
            ErrorKind::AttributeRequiresValue(AttributeType::Binding).to_string(),
            ErrorKind::AlreadyUsedIndex(0).to_string()
        );
    }

    #[test]
    fn test_module_compilation_failed_nests_cause() {
        let cause = Diagnostic::new(ErrorKind::UnknownIdentifier("x".into()), SourceLocation::unknown());
        let kind = ErrorKind::ModuleCompilationFailed("Engine.Lights".into(), Box::new(cause));
        assert!(kind.to_string().starts_with("module Engine.Lights compilation failed: "));
        assert!(kind.to_string().contains("unknown identifier x"));
    }
}
