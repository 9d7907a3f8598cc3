use tessel_core::constant::{ConstantSingleValue, ConstantValue};
use tessel_parser::{
    ErrorKind, SanitizeOptions,
    ast::StatementKind,
    compile,
    error::ErrorCategory,
    lexer, parse_source,
    tokens::{TokenKind, tokens_to_string},
};

const SHADER: &str = r#"
[nzsl_version("1.0")]
module Shaders.Blit;

[layout(std140)]
struct Params {
    scale: vec2[f32],
    offset: vec2[f32],
}

external {
    [binding(0)] params: uniform[Params],
    [binding(1)] source: sampler2D[f32],
}

struct VertIn {
    [location(0)] pos: vec2[f32],
    [location(1)] uv: vec2[f32],
}

struct VertOut {
    [builtin(position)] pos: vec4[f32],
    [location(0)] uv: vec2[f32],
}

struct FragIn {
    [location(0)] uv: vec2[f32],
}

struct FragOut {
    [location(0)] color: vec4[f32],
}

[entry(vert)]
fn vs(input: VertIn) -> VertOut {
    let output: VertOut;
    output.pos = vec4[f32](input.pos * params.scale + params.offset, 0.0, 1.0);
    output.uv = input.uv;
    return output;
}

[entry(frag)]
fn fs(input: FragIn) -> FragOut {
    let output: FragOut;
    output.color = source.Sample(input.uv);
    return output;
}
"#;

#[test]
fn test_compile_blit_shader() {
    let module = compile(SHADER, Some("blit.tsl"), &SanitizeOptions::default())
        .unwrap_or_else(|err| panic!("Failed to compile: {err}"));

    assert_eq!(module.name(), Some("Shaders.Blit"));
    let functions: Vec<_> = module
        .statements
        .iter()
        .filter_map(|statement| match &statement.kind {
            StatementKind::DeclareFunction(decl) => Some(decl.name.inner().as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(functions, ["vs", "fs"]);
}

#[test]
fn test_parse_keeps_names_unresolved() {
    let module = parse_source(SHADER, None).expect("Failed to parse");
    let StatementKind::DeclareExternal(external) = &module.statements[1].kind else {
        panic!("Expected external block");
    };
    assert!(external.variables.iter().all(|variable| variable.index.is_none()));
}

#[test]
fn test_constant_folding_through_compile() {
    let source = r#"
        [nzsl_version("1.0")]
        module;

        const Size = 4;
        fn main() { let a: array[f32, Size * 2]; let n = a.Size(); }
    "#;
    let module = compile(source, None, &SanitizeOptions::default()).expect("Failed to compile");
    let StatementKind::DeclareConst(size) = &module.statements[0].kind else {
        panic!("Expected const");
    };
    assert_eq!(
        size.expression.as_ref().and_then(|e| e.as_constant()),
        Some(&ConstantValue::from(ConstantSingleValue::I32(4)))
    );
}

#[test]
fn test_diagnostic_rendering() {
    let source = "[nzsl_version(\"1.0\")]\nmodule;\nfn main() { let x = missing; }\n";
    let err = compile(source, Some("broken.tsl"), &SanitizeOptions::default())
        .expect_err("Should fail on unknown identifier");

    assert_eq!(err.kind(), &ErrorKind::UnknownIdentifier("missing".to_string()));
    assert_eq!(err.category(), ErrorCategory::Compiler);
    assert_eq!(err.code(), "CUnknownIdentifier");
    assert_eq!(err.location().file(), Some("broken.tsl"));
    assert_eq!(err.location().start().line, 3);
    assert_eq!(
        err.to_string(),
        format!(
            "broken.tsl:3:{}: CUnknownIdentifier error: unknown identifier missing",
            err.location().start().column
        )
    );
}

#[test]
fn test_lexer_errors_surface_first() {
    let source = "[nzsl_version(\"1.0\")]\nmodule;\nfn main() { let s = \"open; }";
    let err = compile(source, None, &SanitizeOptions::default())
        .expect_err("Should fail on unfinished string");
    assert_eq!(err.kind(), &ErrorKind::UnfinishedString);
    assert_eq!(err.category(), ErrorCategory::Lexer);
}

#[test]
fn test_token_dump() {
    let tokens = lexer::tokenize("let x = 1;", None).expect("Failed to tokenize");
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::EndOfStream));
    let rendered = tokens_to_string(&tokens, false);
    assert!(rendered.contains("let"));
    assert!(rendered.contains('x'));
}
