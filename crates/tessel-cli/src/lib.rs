//! CLI logic for the Tessel shader compiler.
//!
//! This module contains the core CLI logic: it loads configuration, runs
//! the front end over one module and prints what was requested.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;

use std::{fs, path::Path};

use log::info;

use tessel::{Compiler, TesselError};
use tessel_parser::{lexer, tokens::tokens_to_string};

/// Run the Tessel CLI application
///
/// This function compiles the input file through every front-end stage and
/// prints a summary of the sanitized module, plus the token stream and AST
/// when asked for.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `TesselError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Lexer, parser and semantic errors
pub fn run(args: &Args) -> Result<(), TesselError> {
    info!(input_path = args.input; "Compiling shader module");

    let compiler_config = config::load_config(args.config.as_ref())?;
    let compiler_config = config::apply_args(compiler_config, args);

    let path = Path::new(&args.input);
    let source = fs::read_to_string(path)?;

    if args.dump_tokens {
        let tokens = lexer::tokenize(&source, Some(&args.input))
            .map_err(|err| TesselError::new_compile_error(err, source.as_str()))?;
        println!("{}", tokens_to_string(&tokens, true));
    }

    let compiler = Compiler::new(compiler_config);
    let module = compiler.compile(&source, Some(path))?;

    if args.dump_ast {
        println!("{:#?}", module.module().statements);
    }

    let entry_points = module.entry_points();
    println!(
        "{}: module {} ({} entry point(s))",
        args.input,
        module.name().unwrap_or("<unnamed>"),
        entry_points.len()
    );
    for (stage, name) in entry_points {
        println!("  {} {name}", stage.display_name());
    }

    info!(input_path = args.input; "Module compiled successfully");

    Ok(())
}
