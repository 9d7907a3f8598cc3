//! Unit tests for the token-to-AST parser.
//!
//! These tests cover every statement form, attribute validation and the
//! parser's diagnostics.

use tessel_core::{
    attribute::{AttributeType, BuiltinEntry, LoopUnroll, MemoryLayout, ModuleFeature, ShaderStage},
    constant::{ConstantSingleValue, ConstantValue},
};

use crate::{
    ast::{
        AssignOp, AttributeValue, BinaryOp, Expression, ExpressionKind, LangVersion, Module,
        Statement, StatementKind, UnaryOp,
    },
    error::{Diagnostic, ErrorKind},
    lexer, parser,
    tokens::TokenKind,
};

const HEADER: &str = "[nzsl_version(\"1.0\")]\nmodule;\n";

/// Helper function to tokenize and parse a complete source
fn parse_source(source: &str) -> Result<Module, Diagnostic> {
    let tokens = lexer::tokenize(source, Some("test.tsl")).expect("lexing should succeed");
    parser::parse(&tokens)
}

/// Parse statements placed after a standard module header
fn parse_body(body: &str) -> Module {
    parse_source(&format!("{HEADER}{body}"))
        .unwrap_or_else(|err| panic!("Expected parsing to succeed, but got error: {err}"))
}

fn source_error(source: &str) -> ErrorKind {
    match parse_source(source) {
        Ok(_) => panic!("Expected parsing to fail, but it succeeded"),
        Err(err) => err.kind().clone(),
    }
}

fn body_error(body: &str) -> ErrorKind {
    source_error(&format!("{HEADER}{body}"))
}

fn function_body(module: &Module) -> &[Statement] {
    module
        .statements
        .iter()
        .find_map(|statement| match &statement.kind {
            StatementKind::DeclareFunction(function) => Some(function.statements.as_slice()),
            _ => None,
        })
        .expect("module should contain a function")
}

/// Initial value of the first `let` in the first function
fn first_initializer(module: &Module) -> &Expression {
    function_body(module)
        .iter()
        .find_map(|statement| match &statement.kind {
            StatementKind::DeclareVariable(var) => var.initial.as_ref(),
            _ => None,
        })
        .expect("function should declare an initialized variable")
}

fn constant(expr: &Expression) -> &ConstantSingleValue {
    match &expr.kind {
        ExpressionKind::Constant(ConstantValue::Single(value)) => value,
        other => panic!("expected constant, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Module statement
// ---------------------------------------------------------------------------

#[test]
fn test_module_metadata() {
    let module = parse_source(
        r#"[nzsl_version("1.1"), feature(float64), author("Tessel"), desc("lights"), license("MIT")]
module Engine.Lights;"#,
    )
    .expect("module should parse");

    let metadata = &module.metadata;
    assert_eq!(metadata.lang_version, LangVersion::new(1, 1, 0));
    assert_eq!(metadata.enabled_features, vec![ModuleFeature::Float64]);
    assert_eq!(metadata.author.as_deref(), Some("Tessel"));
    assert_eq!(metadata.description.as_deref(), Some("lights"));
    assert_eq!(metadata.license.as_deref(), Some("MIT"));
    assert_eq!(module.name(), Some("Engine.Lights"));
    assert!(module.statements.is_empty());
}

#[test]
fn test_module_statement_must_come_first() {
    assert_eq!(
        source_error("fn main() {}"),
        ErrorKind::ExpectedToken(TokenKind::Module, TokenKind::Fn)
    );
}

#[test]
fn test_module_version_errors() {
    assert_eq!(
        source_error("module;"),
        ErrorKind::MissingAttribute(AttributeType::LangVersion)
    );
    assert_eq!(
        source_error("[nzsl_version(\"1.x\")] module;"),
        ErrorKind::InvalidVersion("1.x".to_string())
    );
    assert_eq!(
        source_error("[nzsl_version(1)] module;"),
        ErrorKind::AttributeExpectString(AttributeType::LangVersion)
    );
}

#[test]
fn test_duplicate_feature() {
    assert_eq!(
        source_error("[nzsl_version(\"1.0\"), feature(float64), feature(float64)] module;"),
        ErrorKind::ModuleFeatureMultipleUnique(ModuleFeature::Float64)
    );
}

#[test]
fn test_duplicate_module() {
    assert_eq!(body_error("[nzsl_version(\"1.0\")] module Other;"), ErrorKind::DuplicateModule);
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[test]
fn test_attribute_errors() {
    assert_eq!(
        body_error("[shiny] fn main() {}"),
        ErrorKind::UnknownAttribute("shiny".to_string())
    );
    assert_eq!(
        body_error("[layout(std140)] fn main() {}"),
        ErrorKind::UnexpectedAttribute(AttributeType::Layout, "function".to_string())
    );
    assert_eq!(
        body_error("[entry(frag), entry(vert)] fn main() {}"),
        ErrorKind::AttributeMultipleUnique(AttributeType::Entry)
    );
    assert_eq!(
        body_error("[entry(compute), workgroup(1, 1)] fn main() {}"),
        ErrorKind::AttributeUnexpectedParameterCount(AttributeType::Workgroup, 3, 2)
    );
    assert_eq!(
        body_error("[entry(\"frag\")] fn main() {}"),
        ErrorKind::AttributeParameterIdentifier(AttributeType::Entry)
    );
    assert_eq!(
        body_error("[entry(geometry)] fn main() {}"),
        ErrorKind::AttributeInvalidParameter("geometry".to_string(), AttributeType::Entry)
    );
    assert_eq!(
        body_error("fn main() { [unroll] let x = 1; }"),
        ErrorKind::UnexpectedAttribute(AttributeType::Unroll, "let".to_string())
    );
}

#[test]
fn test_function_attributes() {
    let module = parse_body(
        "[entry(frag), early_fragment_tests, depth_write(greater)] fn main() {}\n\
         [entry(compute)] [workgroup(8, 8, 1)] fn cs() {}",
    );

    let StatementKind::DeclareFunction(frag) = &module.statements[0].kind else {
        panic!("expected a function");
    };
    assert_eq!(frag.stage(), Some(ShaderStage::Fragment));
    assert_eq!(frag.early_fragment_tests, Some(AttributeValue::Value(true)));
    assert!(frag.depth_write.is_some());

    let StatementKind::DeclareFunction(compute) = &module.statements[1].kind else {
        panic!("expected a function");
    };
    assert_eq!(compute.stage(), Some(ShaderStage::Compute));
    let workgroup = compute.workgroup.as_ref().expect("workgroup attribute");
    assert!(workgroup.iter().all(|value| !value.is_resolved()));
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[test]
fn test_struct_declaration() {
    let module = parse_body(
        "[export, layout(std140)]\n\
         struct VertOut {\n\
             [builtin(position)] pos: vec4[f32],\n\
             [location(0)] color: vec3[f32],\n\
             [cond(false)] extra: f32\n\
         }",
    );

    let StatementKind::DeclareStruct(decl) = &module.statements[0].kind else {
        panic!("expected a struct");
    };
    assert_eq!(decl.name.inner(), "VertOut");
    assert!(decl.is_exported);
    assert_eq!(decl.layout, Some(AttributeValue::Value(MemoryLayout::Std140)));
    assert_eq!(decl.members.len(), 3);
    assert_eq!(
        decl.members[0].builtin,
        Some(AttributeValue::Value(BuiltinEntry::VertexPosition))
    );
    assert!(decl.members[1].location_index.is_some());
    assert!(decl.members[2].cond.is_some());
    assert_eq!(decl.members[1].ty.to_string(), "vec3[f32]");
}

#[test]
fn test_external_declaration() {
    let module = parse_body(
        "[set(1), auto_binding]\n\
         external {\n\
             [binding(0)] tex: sampler2D[f32],\n\
             data: uniform[Data],\n\
         }",
    );

    let StatementKind::DeclareExternal(decl) = &module.statements[0].kind else {
        panic!("expected an external block");
    };
    assert!(decl.set.is_some());
    assert_eq!(decl.auto_binding, Some(AttributeValue::Value(true)));
    assert_eq!(decl.variables.len(), 2);
    assert!(decl.variables[0].binding.is_some());
    assert!(decl.variables[1].binding.is_none());
}

#[test]
fn test_option_const_alias() {
    let module = parse_body(
        "[tag(\"lighting\")] option LightCount: u32 = 4;\n\
         [export] const Pi = 3.14159;\n\
         const Missing: f32;\n\
         alias Vertex = VertOut;",
    );

    let StatementKind::DeclareOption(option) = &module.statements[0].kind else {
        panic!("expected an option");
    };
    assert_eq!(option.tag.as_deref(), Some("lighting"));
    assert!(option.default.is_some());

    let StatementKind::DeclareConst(pi) = &module.statements[1].kind else {
        panic!("expected a const");
    };
    assert!(pi.is_exported);
    assert!(pi.expression.is_some());

    let StatementKind::DeclareConst(missing) = &module.statements[2].kind else {
        panic!("expected a const");
    };
    assert!(missing.ty.is_some());
    assert!(missing.expression.is_none());

    assert!(matches!(
        module.statements[3].kind,
        StatementKind::DeclareAlias(_)
    ));
}

#[test]
fn test_function_signature() {
    let module = parse_body("fn add(a: f32, b: f32,) -> f32 { return a + b; }");
    let StatementKind::DeclareFunction(function) = &module.statements[0].kind else {
        panic!("expected a function");
    };
    assert_eq!(function.parameters.len(), 2);
    assert_eq!(function.parameters[1].name.inner(), "b");
    assert_eq!(
        function.return_type.as_ref().map(ToString::to_string).as_deref(),
        Some("f32")
    );
    assert!(matches!(
        function.statements[0].kind,
        StatementKind::Return(Some(_))
    ));
}

#[test]
fn test_duplicate_identifiers() {
    assert_eq!(
        body_error("fn f() {}\nfn f() {}"),
        ErrorKind::DuplicateIdentifier
    );
    assert_eq!(
        body_error("struct S { x: f32 }\nconst S = 1;"),
        ErrorKind::DuplicateIdentifier
    );
    // conditional declarations may share a name
    parse_body("[cond(true)] fn f() {}\n[cond(false)] fn f() {}");
}

#[test]
fn test_identifier_errors() {
    assert_eq!(
        body_error("fn main() { let static = 1; }"),
        ErrorKind::ReservedKeyword
    );
    assert_eq!(
        body_error("fn main() { let x: vec5[f32]; }"),
        ErrorKind::UnknownType
    );
    assert_eq!(
        body_error("fn main() { let m: mat2x7[f32]; }"),
        ErrorKind::UnknownType
    );
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

#[test]
fn test_import_forms() {
    let module = parse_body(
        "import * as Foo from \"mod\";\n\
         import Light, Shadow as S from Engine.Lights;\n\
         import Engine.Math as M;",
    );

    let imports: Vec<_> = module
        .statements
        .iter()
        .filter_map(|statement| match &statement.kind {
            StatementKind::Import(import) => Some(import),
            _ => None,
        })
        .collect();
    assert_eq!(imports.len(), 3);

    assert_eq!(imports[0].module_name.inner(), "mod");
    assert!(imports[0].identifiers[0].is_wildcard());
    assert_eq!(imports[0].identifiers[0].rename.as_deref(), Some("Foo"));

    assert_eq!(imports[1].module_name.inner(), "Engine.Lights");
    assert_eq!(imports[1].identifiers.len(), 2);
    assert_eq!(imports[1].identifiers[1].identifier.as_deref(), Some("Shadow"));
    assert_eq!(imports[1].identifiers[1].rename.as_deref(), Some("S"));

    assert_eq!(imports[2].module_name.inner(), "Engine.Math");
    assert!(imports[2].identifiers.is_empty());
    assert_eq!(
        imports[2].module_alias.as_ref().map(|alias| alias.inner().as_str()),
        Some("M")
    );
}

#[test]
fn test_block_only_statements_rejected_in_functions() {
    assert_eq!(
        body_error("fn main() { import Foo; }"),
        ErrorKind::UnexpectedToken(TokenKind::Import)
    );
    assert_eq!(
        body_error("fn main() { external { x: f32 } }"),
        ErrorKind::UnexpectedToken(TokenKind::External)
    );
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

#[test]
fn test_loops() {
    let module = parse_body(
        "fn main() {\n\
             for i in 0 -> 10 : 2 { }\n\
             [unroll] for v in values { }\n\
             [unroll(never)] while (true) { break; }\n\
         }",
    );
    let body = function_body(&module);

    let StatementKind::For(numerical) = &body[0].kind else {
        panic!("expected a for loop");
    };
    assert_eq!(numerical.variable.inner(), "i");
    assert!(numerical.step.is_some());

    let StatementKind::ForEach(each) = &body[1].kind else {
        panic!("expected a for-each loop");
    };
    assert_eq!(each.unroll, Some(AttributeValue::Value(LoopUnroll::Always)));

    let StatementKind::While(while_loop) = &body[2].kind else {
        panic!("expected a while loop");
    };
    assert_eq!(while_loop.unroll, Some(AttributeValue::Value(LoopUnroll::Never)));
}

#[test]
fn test_branches() {
    let module = parse_body(
        "const if (UseShadows) { fn shadow() {} } else { }\n\
         fn main() { if (a) { } else if (b) { } else { discard; } }",
    );

    let StatementKind::Branch(const_branch) = &module.statements[0].kind else {
        panic!("expected a branch");
    };
    assert!(const_branch.is_const);
    assert!(const_branch.else_statement.is_some());

    let StatementKind::Branch(branch) = &function_body(&module)[0].kind else {
        panic!("expected a branch");
    };
    assert!(!branch.is_const);
    assert_eq!(branch.branches.len(), 2);
    assert!(branch.else_statement.is_some());
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[test]
fn test_binary_precedence() {
    let module = parse_body("fn main() { let x = 1 + 2 * 3; }");
    let ExpressionKind::Binary { op, right, .. } = &first_initializer(&module).kind else {
        panic!("expected a binary expression");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(
        right.kind,
        ExpressionKind::Binary {
            op: BinaryOp::Multiply,
            ..
        }
    ));
}

#[test]
fn test_left_associativity() {
    let module = parse_body("fn main() { let x = a - b - c; }");
    let ExpressionKind::Binary { op, left, right } = &first_initializer(&module).kind else {
        panic!("expected a binary expression");
    };
    assert_eq!(*op, BinaryOp::Subtract);
    assert!(matches!(left.kind, ExpressionKind::Binary { .. }));
    assert_eq!(right.as_identifier(), Some("c"));
}

#[test]
fn test_comparison_binds_looser_than_shift() {
    let module = parse_body("fn main() { let x = a << 1 < b && c; }");
    let ExpressionKind::Binary { op, left, .. } = &first_initializer(&module).kind else {
        panic!("expected a binary expression");
    };
    assert_eq!(*op, BinaryOp::LogicalAnd);
    let ExpressionKind::Binary { op, left, .. } = &left.kind else {
        panic!("expected a comparison");
    };
    assert_eq!(*op, BinaryOp::CompLt);
    assert!(matches!(
        left.kind,
        ExpressionKind::Binary {
            op: BinaryOp::ShiftLeft,
            ..
        }
    ));
}

#[test]
fn test_unary_and_postfix() {
    let module = parse_body("fn main() { let x = -data.values[2].xyz; }");
    let ExpressionKind::Unary { op, expr } = &first_initializer(&module).kind else {
        panic!("expected a unary expression");
    };
    assert_eq!(*op, UnaryOp::Minus);
    let ExpressionKind::AccessIdentifier { expr, identifier } = &expr.kind else {
        panic!("expected member access");
    };
    assert_eq!(identifier.inner(), "xyz");
    assert!(matches!(expr.kind, ExpressionKind::AccessIndex { .. }));
}

#[test]
fn test_calls_and_casts_share_syntax() {
    let module = parse_body("fn main() { let v = vec3[f32](1.0, 2.0, 3.0); }");
    let ExpressionKind::CallFunction { target, parameters } = &first_initializer(&module).kind
    else {
        panic!("expected a call");
    };
    assert_eq!(parameters.len(), 3);
    assert!(matches!(target.kind, ExpressionKind::AccessIndex { .. }));
}

#[test]
fn test_literals() {
    let module = parse_body(
        "fn main() { let a = 42; let b = 1.5_f32; let c = 0x10_u32; let d = 2.0; let e = true; }",
    );
    let values: Vec<_> = function_body(&module)
        .iter()
        .filter_map(|statement| match &statement.kind {
            StatementKind::DeclareVariable(var) => var.initial.as_ref().map(constant),
            _ => None,
        })
        .cloned()
        .collect();

    assert_eq!(
        values,
        vec![
            ConstantSingleValue::UntypedInteger(42),
            ConstantSingleValue::F32(1.5),
            ConstantSingleValue::U32(16),
            ConstantSingleValue::UntypedFloat(2.0),
            ConstantSingleValue::Bool(true),
        ]
    );
}

#[test]
fn test_assignment_statements() {
    let module = parse_body("fn main() { x += 1; y.x = 2.0; }");
    let body = function_body(&module);
    let StatementKind::Expression(expr) = &body[0].kind else {
        panic!("expected an expression statement");
    };
    assert!(matches!(
        expr.kind,
        ExpressionKind::Assign {
            op: AssignOp::CompoundAdd,
            ..
        }
    ));
    let StatementKind::Expression(expr) = &body[1].kind else {
        panic!("expected an expression statement");
    };
    assert!(matches!(
        expr.kind,
        ExpressionKind::Assign {
            op: AssignOp::Simple,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Syntax errors
// ---------------------------------------------------------------------------

#[test]
fn test_expected_token() {
    assert_eq!(
        body_error("fn main() { let x = 1 }"),
        ErrorKind::ExpectedToken(TokenKind::Semicolon, TokenKind::ClosingCurlyBracket)
    );
}

#[test]
fn test_unexpected_token() {
    assert_eq!(
        body_error("fn main() { ) }"),
        ErrorKind::UnexpectedToken(TokenKind::ClosingParenthesis)
    );
}

#[test]
fn test_unexpected_end_of_file() {
    assert_eq!(body_error("fn main() {"), ErrorKind::UnexpectedEndOfFile);
    assert_eq!(body_error("[entry(frag)]"), ErrorKind::UnexpectedEndOfFile);
}

#[test]
fn test_error_location_points_at_token() {
    let err = parse_source(&format!("{HEADER}fn main() {{\n    let x = 1 )\n}}"))
        .expect_err("parsing should fail");
    assert_eq!(err.location().file(), Some("test.tsl"));
    assert_eq!(err.location().start().line, 4);
    assert_eq!(err.location().start().column, 15);
}
