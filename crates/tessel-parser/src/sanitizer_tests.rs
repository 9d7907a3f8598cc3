//! End-to-end tests of semantic analysis, driven from source text.

use std::{collections::HashMap, sync::Arc};

use proptest::prelude::*;
use tessel_core::{
    attribute::ShaderStage,
    constant::{ConstantArrayValue, ConstantSingleValue, ConstantValue, ConstantVector, Vector},
};

use crate::{
    ast::{AttributeValue, Module, Statement, StatementKind},
    error::{Diagnostic, ErrorKind, Result},
    lexer, parser,
    sanitizer::{self, ModuleResolver, SanitizeOptions},
};

const HEADER: &str = "[nzsl_version(\"1.0\")]\nmodule;\n";

fn parse(source: &str) -> Module {
    let tokens = lexer::tokenize(source, Some("test.tsl")).expect("lexing should succeed");
    parser::parse(&tokens).expect("parsing should succeed")
}

fn sanitize_with(body: &str, options: &SanitizeOptions) -> Result<Module> {
    sanitizer::sanitize(parse(&format!("{HEADER}{body}")), options)
}

fn sanitize_body(body: &str) -> Module {
    sanitize_with(body, &SanitizeOptions::default())
        .unwrap_or_else(|err| panic!("Expected sanitization to succeed, but got error: {err}"))
}

fn body_error(body: &str) -> ErrorKind {
    match sanitize_with(body, &SanitizeOptions::default()) {
        Ok(_) => panic!("Expected sanitization to fail, but it succeeded"),
        Err(err) => err.kind().clone(),
    }
}

/// Names of the top-level declarations, looking through flattened blocks.
fn declared_names(statements: &[Statement]) -> Vec<String> {
    let mut names = Vec::new();
    for statement in statements {
        match &statement.kind {
            StatementKind::Multi(inner) => names.extend(declared_names(inner)),
            _ => names.extend(statement.declared_name().map(|name| name.to_string())),
        }
    }
    names
}

fn function_body<'m>(module: &'m Module, name: &str) -> &'m [Statement] {
    module
        .statements
        .iter()
        .find_map(|statement| match &statement.kind {
            StatementKind::DeclareFunction(decl) if decl.name.inner() == name => {
                Some(decl.statements.as_slice())
            }
            _ => None,
        })
        .unwrap_or_else(|| panic!("function {name} not found"))
}

fn initial_constant(statement: &Statement) -> ConstantValue {
    let StatementKind::DeclareVariable(decl) = &statement.kind else {
        panic!("expected a variable declaration, got {statement:?}");
    };
    decl.initial
        .as_ref()
        .and_then(|initial| initial.as_constant())
        .cloned()
        .expect("initial value should be folded")
}

/// Folded value of the module-level constant `name`.
fn const_value(module: &Module, name: &str) -> ConstantValue {
    module
        .statements
        .iter()
        .find_map(|statement| match &statement.kind {
            StatementKind::DeclareConst(decl) if decl.name.inner() == name => decl
                .expression
                .as_ref()
                .and_then(|expression| expression.as_constant())
                .cloned(),
            _ => None,
        })
        .unwrap_or_else(|| panic!("constant {name} not found"))
}

/// Resolves modules from in-memory sources.
#[derive(Default)]
struct MemoryResolver {
    modules: HashMap<String, Arc<Module>>,
}

impl MemoryResolver {
    fn with(mut self, name: &str, source: &str) -> Self {
        self.modules.insert(name.to_string(), Arc::new(parse(source)));
        self
    }
}

impl ModuleResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> Result<Option<Arc<Module>>> {
        Ok(self.modules.get(name).cloned())
    }
}

// ---------------------------------------------------------------------------
// Constants and literals
// ---------------------------------------------------------------------------

#[test]
fn test_untyped_literals_fold_to_defaults() {
    let module = sanitize_body("fn main() { let a = 1 + 2; let b = 0.5 * 4.0; let c: u32 = 7; }");
    let body = function_body(&module, "main");
    assert_eq!(initial_constant(&body[0]), ConstantSingleValue::I32(3).into());
    assert_eq!(initial_constant(&body[1]), ConstantSingleValue::F32(2.0).into());
    assert_eq!(initial_constant(&body[2]), ConstantSingleValue::U32(7).into());
}

#[test]
fn test_constants_are_inlined() {
    let module = sanitize_body("const Scale: f32 = 2.0;\nfn main() { let x = Scale * 3.0; }");
    let body = function_body(&module, "main");
    assert_eq!(initial_constant(&body[0]), ConstantSingleValue::F32(6.0).into());
}

#[test]
fn test_i32_min_is_recovered_from_rendering() {
    let min = ConstantValue::from(ConstantSingleValue::I32(i32::MIN));
    let module = sanitize_body(&format!("const Min = {min};"));
    assert_eq!(const_value(&module, "Min"), min);

    let module = sanitize_body("fn main() { let x: i32 = -2147483648; }");
    let body = function_body(&module, "main");
    assert_eq!(initial_constant(&body[0]), ConstantSingleValue::I32(i32::MIN).into());
}

#[test]
fn test_literal_out_of_range_for_adopted_type() {
    assert!(matches!(
        body_error("fn main() { let x: u32 = -1; }"),
        ErrorKind::InvalidCast(_)
    ));
}

#[test]
fn test_integral_division_by_zero() {
    assert!(matches!(
        body_error("fn main() { let x = 4 / 0; }"),
        ErrorKind::IntegralDivisionByZero(..)
    ));
    assert!(matches!(
        body_error("const Bad = 1 / 0;"),
        ErrorKind::IntegralDivisionByZero(..)
    ));
    assert!(matches!(
        body_error("fn f(a: i32) -> i32 { return a / 0; }"),
        ErrorKind::IntegralDivisionByZero(..)
    ));
    assert!(matches!(
        body_error("fn f(a: i32) -> i32 { return a % 0; }"),
        ErrorKind::IntegralModuloByZero(..)
    ));
}

// ---------------------------------------------------------------------------
// Names and types
// ---------------------------------------------------------------------------

#[test]
fn test_unknown_identifier() {
    assert_eq!(
        body_error("fn main() { let x = y; }"),
        ErrorKind::UnknownIdentifier("y".to_string())
    );
}

#[test]
fn test_variable_type_mismatch() {
    assert_eq!(
        body_error("fn main() { let x: f32 = true; }"),
        ErrorKind::VarDeclarationTypeUnmatching("bool".to_string(), "f32".to_string())
    );
    assert_eq!(
        body_error("fn main() { let x; }"),
        ErrorKind::VarDeclarationMissingTypeAndValue
    );
}

#[test]
fn test_binary_incompatible_types() {
    assert!(matches!(
        body_error("fn f(a: f32, b: i32) { let x = a + b; }"),
        ErrorKind::BinaryIncompatibleTypes(..)
    ));
}

#[test]
fn test_assign_temporary() {
    assert_eq!(
        body_error("fn f(a: f32) { a + 1.0 = 2.0; }"),
        ErrorKind::AssignTemporary
    );
    sanitize_body("fn f() { let v = vec3[f32](1.0, 2.0, 3.0); v.xy = vec2[f32](0.0, 0.0); }");
}

#[test]
fn test_condition_must_be_bool() {
    assert_eq!(
        body_error("fn f(a: i32) { if (a) { } }"),
        ErrorKind::ConditionExpectedBool("i32".to_string())
    );
}

#[test]
fn test_functions_may_call_later_declarations() {
    sanitize_body(
        "fn main() { let x = helper(1.0); }\n\
         fn helper(v: f32) -> f32 { return v * 2.0; }",
    );
}

#[test]
fn test_call_parameter_mismatch() {
    assert!(matches!(
        body_error("fn helper(v: f32) {}\nfn main() { helper(true); }"),
        ErrorKind::FunctionCallUnmatchingParameterType(..)
    ));
}

#[test]
fn test_loop_control_outside_of_loop() {
    assert_eq!(
        body_error("fn main() { break; }"),
        ErrorKind::LoopControlOutsideOfLoop("break")
    );
    sanitize_body("fn main() { for i in 0 -> 10 { if (i == 5) { break; } } }");
}

#[test]
fn test_let_at_module_level() {
    assert_eq!(
        body_error("let x = 1;"),
        ErrorKind::VarDeclarationOutsideOfFunction
    );
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[test]
fn test_const_if_keeps_taken_branch() {
    let module = sanitize_body(
        "const UseShadows = true;\n\
         const if (UseShadows) { fn shadow() {} } else { fn flat() {} }",
    );
    let names = declared_names(&module.statements);
    assert!(names.contains(&"shadow".to_string()));
    assert!(!names.contains(&"flat".to_string()));
}

#[test]
fn test_const_if_requires_bool() {
    assert!(matches!(
        body_error("const if (1) { fn f() {} }"),
        ErrorKind::ConditionExpectedBool(_)
    ));
}

#[test]
fn test_struct_field_multiple() {
    assert_eq!(
        body_error("struct S { [cond(true)] x: f32, x: f32 }"),
        ErrorKind::StructFieldMultiple("x".to_string())
    );
    sanitize_body("struct S { [cond(false)] x: f32, x: f32 }");
}

#[test]
fn test_struct_layout_rejects_bool() {
    assert_eq!(
        body_error("[layout(std140)] struct S { flag: bool }"),
        ErrorKind::StructLayoutTypeNotAllowed("bool".to_string(), "std140".to_string())
    );
}

#[test]
fn test_partial_type_parameters() {
    assert!(matches!(
        body_error("fn main() { let x: vec3[f32, f32]; }"),
        ErrorKind::PartialTypeTooManyParameters(..)
    ));
    assert!(matches!(
        body_error("fn main() { let x: mat4[i32]; }"),
        ErrorKind::MatrixExpectedFloat(_)
    ));
    assert!(matches!(
        body_error("fn main() { let x: vec3; }"),
        ErrorKind::FullTypeExpected(_)
    ));
}

// ---------------------------------------------------------------------------
// External resources
// ---------------------------------------------------------------------------

#[test]
fn test_binding_already_used() {
    let err = sanitize_with(
        "external {\n\
             [set(0), binding(0)] a: sampler2D[f32],\n\
             [set(0), binding(0)] b: sampler2D[f32],\n\
         }",
        &SanitizeOptions::default(),
    )
    .expect_err("sanitization should fail");
    assert_eq!(err.kind(), &ErrorKind::ExtBindingAlreadyUsed(0, 0));
    assert_eq!(err.labels().len(), 1);
}

#[test]
fn test_binding_already_used_across_blocks() {
    let first = "external { [set(1), binding(2)] a: sampler2D[f32] }";
    let second = "external { [set(1), binding(2)] b: sampler2D[f32] }";
    assert_eq!(
        body_error(&format!("{first}\n{second}")),
        ErrorKind::ExtBindingAlreadyUsed(1, 2)
    );
    assert_eq!(
        body_error(&format!("{second}\n{first}")),
        ErrorKind::ExtBindingAlreadyUsed(1, 2)
    );
}

#[test]
fn test_binding_already_used_with_block_set() {
    assert_eq!(
        body_error(
            "[set(0)]\n\
             external { [binding(3)] a: sampler2D[f32] }\n\
             external { [set(0), binding(3)] b: sampler2D[f32] }"
        ),
        ErrorKind::ExtBindingAlreadyUsed(0, 3)
    );
    sanitize_body(
        "[set(1)]\n\
         external { [binding(3)] a: sampler2D[f32] }\n\
         external { [set(0), binding(3)] b: sampler2D[f32] }",
    );
}

#[test]
fn test_auto_binding_fills_lowest_free_index() {
    let module = sanitize_body(
        "[auto_binding]\n\
         external {\n\
             [binding(0)] a: sampler2D[f32],\n\
             b: sampler2D[f32],\n\
         }",
    );
    let StatementKind::DeclareExternal(decl) = &module.statements[0].kind else {
        panic!("expected an external block");
    };
    assert_eq!(decl.variables[1].binding, Some(AttributeValue::Value(1)));
    assert_eq!(decl.variables[1].set, Some(AttributeValue::Value(0)));
}

#[test]
fn test_missing_binding_without_auto_binding() {
    assert_eq!(
        body_error("external { a: sampler2D[f32] }"),
        ErrorKind::ExtMissingBindingIndex
    );
}

#[test]
fn test_external_type_not_allowed() {
    assert_eq!(
        body_error("external { [binding(0)] a: f32 }"),
        ErrorKind::ExtTypeNotAllowed("a".to_string(), "f32".to_string())
    );
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

#[test]
fn test_entry_point_defined_twice() {
    assert_eq!(
        body_error("[entry(frag)] fn a() {}\n[entry(frag)] fn b() {}"),
        ErrorKind::EntryPointAlreadyDefined(ShaderStage::Fragment)
    );
}

#[test]
fn test_compute_requires_workgroup() {
    assert_eq!(
        body_error("[entry(compute)] fn main() {}"),
        ErrorKind::MissingWorkgroupAttribute
    );
    sanitize_body("[entry(compute), workgroup(8, 8, 1)] fn main() {}");
}

#[test]
fn test_compute_workgroup_rejects_zero() {
    assert_eq!(
        body_error("[entry(compute), workgroup(0, 1, 1)] fn main() {}"),
        ErrorKind::InvalidWorkgroup("(0, 1, 1)".to_string())
    );
    assert!(matches!(
        body_error("[entry(compute), workgroup(4, 4, 0)] fn main() {}"),
        ErrorKind::InvalidWorkgroup(_)
    ));
}

#[test]
fn test_discard_reached_from_vertex_stage() {
    assert_eq!(
        body_error("fn kill() { discard; }\n[entry(vert)] fn main() { kill(); }"),
        ErrorKind::InvalidStageDependency(ShaderStage::Fragment, ShaderStage::Vertex)
    );
    sanitize_body("fn kill() { discard; }\n[entry(frag)] fn main() { kill(); }");
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[test]
fn test_option_default_and_override() {
    let body = "option Count: u32 = 4;\nfn main() { let x = Count; }";
    let module = sanitize_body(body);
    assert_eq!(
        initial_constant(&function_body(&module, "main")[0]),
        ConstantSingleValue::U32(4).into()
    );

    let mut options = SanitizeOptions::default();
    options.set_option("Count", ConstantSingleValue::U32(8));
    let module = sanitize_with(body, &options).expect("override should apply");
    assert_eq!(
        initial_constant(&function_body(&module, "main")[0]),
        ConstantSingleValue::U32(8).into()
    );
}

#[test]
fn test_option_override_type_mismatch() {
    let mut options = SanitizeOptions::default();
    options.set_option("Enabled", ConstantSingleValue::F32(1.0));
    let err = sanitize_with("option Enabled: bool = false;", &options)
        .expect_err("sanitization should fail");
    assert!(matches!(err.kind(), ErrorKind::VarDeclarationTypeUnmatching(..)));
}

#[test]
fn test_option_without_value() {
    assert_eq!(
        body_error("option Count: u32;"),
        ErrorKind::MissingOptionValue("Count".to_string())
    );
    sanitize_with("option Count: u32;", &SanitizeOptions::default().partial())
        .expect("partial analysis accepts options without value");
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

#[test]
fn test_import_without_resolver() {
    assert_eq!(
        body_error("import Foo from Other;"),
        ErrorKind::NoModuleResolver
    );
}

#[test]
fn test_partial_import_defers_checks() {
    let module = sanitize_with(
        "import Foo from Other;\nfn main() { let x = Foo + 1; }",
        &SanitizeOptions::default().partial(),
    )
    .expect("partial analysis should succeed");
    assert!(matches!(module.statements[0].kind, StatementKind::Import(_)));
    assert!(module.imported_modules.is_empty());
}

#[test]
fn test_import_exported_function() {
    let resolver = MemoryResolver::default().with(
        "Engine.Math",
        "[nzsl_version(\"1.0\")]\n\
         module Engine.Math;\n\
         [export] fn square(x: f32) -> f32 { return x * x; }\n\
         fn hidden() {}",
    );
    let options = SanitizeOptions::default().with_resolver(Arc::new(resolver));

    let module = sanitize_with(
        "import square from Engine.Math;\nfn main() { let y = square(2.0); }",
        &options,
    )
    .expect("import should resolve");
    assert_eq!(module.imported_modules.len(), 1);
    assert_eq!(module.imported_modules[0].identifier, "Engine.Math");

    let err = sanitize_with("import hidden from Engine.Math;", &options)
        .expect_err("hidden is not exported");
    assert_eq!(
        err.kind(),
        &ErrorKind::ImportIdentifierNotFound("hidden".to_string(), "Engine.Math".to_string())
    );
}

#[test]
fn test_import_module_alias() {
    let resolver = MemoryResolver::default().with(
        "Lights",
        "[nzsl_version(\"1.0\")]\n\
         module Lights;\n\
         [export] const Intensity: f32 = 0.5;",
    );
    let options = SanitizeOptions::default().with_resolver(Arc::new(resolver));
    let module = sanitize_with(
        "import Lights as L;\nfn main() { let x = L.Intensity * 2.0; }",
        &options,
    )
    .expect("module alias should resolve");
    assert_eq!(
        initial_constant(&function_body(&module, "main")[0]),
        ConstantSingleValue::F32(1.0).into()
    );
}

#[test]
fn test_unknown_module() {
    let options = SanitizeOptions::default().with_resolver(Arc::new(MemoryResolver::default()));
    let err = sanitize_with("import * from Missing;", &options).expect_err("module is missing");
    assert_eq!(err.kind(), &ErrorKind::ModuleNotFound("Missing".to_string()));
}

#[test]
fn test_circular_import() {
    let resolver = MemoryResolver::default().with(
        "B",
        "[nzsl_version(\"1.0\")]\nmodule B;\nimport * from A;",
    );
    let options = SanitizeOptions::default().with_resolver(Arc::new(resolver));
    let root = parse("[nzsl_version(\"1.0\")]\nmodule A;\nimport * from B;");

    let err: Diagnostic = sanitizer::sanitize(root, &options).expect_err("cycle should fail");
    assert!(matches!(err.kind(), ErrorKind::ModuleCompilationFailed(name, _) if name == "B"));
    assert_eq!(err.root_cause().kind(), &ErrorKind::CircularImport("A".to_string()));
}

#[test]
fn test_wildcard_checked_before_resolution() {
    assert_eq!(
        body_error("import * from A;\nimport * from A;"),
        ErrorKind::ImportMultipleWildcard
    );
}

#[test]
fn test_duplicate_wildcard_reported_before_rename() {
    assert_eq!(
        body_error("import * as Foo from Mod;\nimport * from Mod;"),
        ErrorKind::ImportMultipleWildcard
    );
    assert_eq!(
        body_error("import * as Foo from Mod;"),
        ErrorKind::ImportWildcardRename
    );
}

// ---------------------------------------------------------------------------
// Constant rendering round trip
// ---------------------------------------------------------------------------

/// Typed scalars whose rendering is exact. Floats are kept to quarters and
/// eighths so the fixed number of rendered digits loses nothing.
fn scalar_strategy() -> impl Strategy<Value = ConstantSingleValue> {
    prop_oneof![
        any::<bool>().prop_map(ConstantSingleValue::Bool),
        any::<i32>().prop_map(ConstantSingleValue::I32),
        any::<u32>().prop_map(ConstantSingleValue::U32),
        any::<i16>().prop_map(|q| ConstantSingleValue::F32(f32::from(q) / 4.0)),
        any::<i32>().prop_map(|q| ConstantSingleValue::F64(f64::from(q) / 8.0)),
    ]
}

fn vector_strategy() -> impl Strategy<Value = ConstantSingleValue> {
    let vector = |vector: Option<ConstantVector>| {
        ConstantSingleValue::Vector(vector.expect("two to four components"))
    };
    prop_oneof![
        prop::collection::vec(any::<bool>(), 2..=4)
            .prop_map(move |c| vector(Vector::new(c).map(ConstantVector::Bool))),
        prop::collection::vec(any::<i32>(), 2..=4)
            .prop_map(move |c| vector(Vector::new(c).map(ConstantVector::I32))),
        prop::collection::vec(any::<u32>(), 2..=4)
            .prop_map(move |c| vector(Vector::new(c).map(ConstantVector::U32))),
        prop::collection::vec(any::<i16>(), 2..=4).prop_map(move |c| {
            let c = c.into_iter().map(|q| f32::from(q) / 4.0).collect();
            vector(Vector::new(c).map(ConstantVector::F32))
        }),
    ]
}

fn constant_strategy() -> impl Strategy<Value = ConstantValue> {
    prop_oneof![
        scalar_strategy().prop_map(ConstantValue::Single),
        vector_strategy().prop_map(ConstantValue::Single),
        "[a-z0-9 ]{0,12}".prop_map(|s| ConstantValue::Single(ConstantSingleValue::String(s))),
        prop::collection::vec(any::<i32>(), 1..=4).prop_map(|values| {
            let values = values.into_iter().map(ConstantSingleValue::I32).collect();
            ConstantValue::Array(ConstantArrayValue::from_values(values).expect("homogeneous"))
        }),
        prop::collection::vec(any::<i16>(), 1..=4).prop_map(|values| {
            let values = values
                .into_iter()
                .map(|q| ConstantSingleValue::F32(f32::from(q) / 4.0))
                .collect();
            ConstantValue::Array(ConstantArrayValue::from_values(values).expect("homogeneous"))
        }),
    ]
}

fn check_constant_recovered(value: &ConstantValue) -> std::result::Result<(), TestCaseError> {
    let source = format!("{HEADER}const Value = {value};\n");
    let tokens = lexer::tokenize(&source, None).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let module = parser::parse(&tokens).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let module = sanitizer::sanitize(module, &SanitizeOptions::default())
        .map_err(|e| TestCaseError::fail(format!("{source}: {e}")))?;
    prop_assert_eq!(&const_value(&module, "Value"), value);
    Ok(())
}

proptest! {
    #[test]
    fn rendered_constants_are_recovered(value in constant_strategy()) {
        check_constant_recovered(&value)?;
    }
}
