use std::{fs, path::Path, sync::Arc, thread};

use tempfile::tempdir;

use tessel::{
    Compiler, ErrorKind, TesselError,
    attribute::{ModuleFeature, ShaderStage},
    config::{CompilerConfig, OptionValue},
};

const LIGHTS: &str = r#"
[nzsl_version("1.0")]
module Engine.Lights;

[export]
const MaxLights: u32 = 8;

[export]
fn attenuate(intensity: f32, distance: f32) -> f32 {
    return intensity / (1.0 + distance * distance);
}
"#;

const MAIN: &str = r#"
[nzsl_version("1.0")]
module Main;

import attenuate, MaxLights from Engine.Lights;

option Brightness: f32 = 1.0;

struct FragOut {
    [location(0)] color: vec4[f32],
}

[entry(frag)]
fn main() -> FragOut {
    let value = attenuate(Brightness, 2.0);
    let count = MaxLights;
    let output: FragOut;
    output.color = vec4[f32](value, value, value, 1.0);
    return output;
}
"#;

fn write_module(root: &Path, relative: &str, source: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create module directory");
    }
    fs::write(path, source).expect("Failed to write module");
}

fn config_with_modules(dir: &Path) -> CompilerConfig {
    let mut config = CompilerConfig::default();
    config.modules_mut().add_search_path(dir);
    config
}

#[test]
fn test_compile_with_filesystem_imports() {
    let dir = tempdir().expect("Failed to create temp directory");
    write_module(dir.path(), "Engine/Lights.tsl", LIGHTS);

    let compiler = Compiler::new(config_with_modules(dir.path()));
    let module = compiler.compile(MAIN, None).expect("Failed to compile");

    assert_eq!(module.name(), Some("Main"));
    assert_eq!(module.entry_points(), vec![(ShaderStage::Fragment, "main")]);
    assert_eq!(module.module().imported_modules.len(), 1);
    assert_eq!(module.module().imported_modules[0].identifier, "Engine.Lights");
}

#[test]
fn test_import_without_search_paths() {
    let compiler = Compiler::default();
    let err = compiler.compile(MAIN, None).expect_err("Imports need a resolver");
    let diagnostic = err.diagnostic().expect("Expected a diagnostic");
    assert_eq!(diagnostic.kind(), &ErrorKind::NoModuleResolver);

    let mut config = CompilerConfig::default();
    config.sanitize_mut().set_partial(true);
    Compiler::new(config)
        .compile(MAIN, None)
        .expect("Partial analysis keeps imports unresolved");
}

#[test]
fn test_missing_module() {
    let dir = tempdir().expect("Failed to create temp directory");
    let compiler = Compiler::new(config_with_modules(dir.path()));
    let err = compiler.compile(MAIN, None).expect_err("Module is missing");
    assert!(matches!(
        err.diagnostic().map(|d| d.kind()),
        Some(ErrorKind::ModuleNotFound(name)) if name == "Engine.Lights"
    ));
}

#[test]
fn test_broken_module_reports_cause() {
    let dir = tempdir().expect("Failed to create temp directory");
    write_module(
        dir.path(),
        "Engine/Lights.tsl",
        "[nzsl_version(\"1.0\")]\nmodule Engine.Lights;\n[export] fn f() -> f32 { return true; }\n",
    );

    let compiler = Compiler::new(config_with_modules(dir.path()));
    let err = compiler.compile(MAIN, None).expect_err("Imported module is broken");
    let diagnostic = err.diagnostic().expect("Expected a diagnostic");
    assert!(matches!(diagnostic.kind(), ErrorKind::ModuleCompilationFailed(..)));
    assert!(matches!(
        diagnostic.root_cause().kind(),
        ErrorKind::UnmatchingTypes(..)
    ));
}

#[test]
fn test_option_override_from_config() {
    let source = r#"
        [nzsl_version("1.0")]
        module;

        option LightCount: u32;

        fn main() { let n = LightCount; }
    "#;

    let err = Compiler::default().compile(source, None).expect_err("Option needs a value");
    assert!(matches!(
        err.diagnostic().map(|d| d.kind()),
        Some(ErrorKind::MissingOptionValue(_))
    ));

    let mut config = CompilerConfig::default();
    config.sanitize_mut().set_option("LightCount", OptionValue::Integer(4));
    Compiler::new(config)
        .compile(source, None)
        .expect("Override supplies the value");
}

#[test]
fn test_feature_from_config() {
    let source = r#"
        [nzsl_version("1.0")]
        module;

        external {
            [binding(0)] scale: f32,
        }
    "#;

    let err = Compiler::default().compile(source, None).expect_err("Primitive externals are off");
    assert!(matches!(
        err.diagnostic().map(|d| d.kind()),
        Some(ErrorKind::ExtTypeNotAllowed(..))
    ));

    let mut config = CompilerConfig::default();
    config.sanitize_mut().add_feature(ModuleFeature::PrimitiveExternals);
    Compiler::new(config)
        .compile(source, None)
        .expect("Feature enables primitive externals");
}

#[test]
fn test_compile_file() {
    let dir = tempdir().expect("Failed to create temp directory");
    let missing = dir.path().join("missing.tsl");
    let err = Compiler::default().compile_file(&missing).expect_err("File is missing");
    assert!(matches!(err, TesselError::Io(_)));

    let path = dir.path().join("bad.tsl");
    fs::write(&path, "[nzsl_version(\"1.0\")]\nmodule;\nfn main() { let x = ; }\n")
        .expect("Failed to write source");
    let err = Compiler::default().compile_file(&path).expect_err("Source is invalid");
    let TesselError::Compile { err: diagnostic, src } = &err else {
        panic!("Expected a compile error");
    };
    assert!(src.contains("let x = ;"));
    assert_eq!(
        diagnostic.location().file(),
        Some(path.display().to_string().as_str())
    );
}

#[test]
fn test_concurrent_compilations_share_resolver() {
    let dir = tempdir().expect("Failed to create temp directory");
    write_module(dir.path(), "Engine/Lights.tsl", LIGHTS);
    let compiler = Arc::new(Compiler::new(config_with_modules(dir.path())));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let compiler = Arc::clone(&compiler);
            thread::spawn(move || compiler.compile(MAIN, None).map(|m| m.entry_points().len()))
        })
        .collect();

    for handle in handles {
        let entries = handle.join().expect("Thread panicked").expect("Failed to compile");
        assert_eq!(entries, 1);
    }
}
