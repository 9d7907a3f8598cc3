//! Tessel - A front end for the Tessel shading language.
//!
//! Tokenizes, parses and semantically checks `.tsl` shader modules,
//! resolving imports from the filesystem. The result is a fully typed AST
//! ready for a backend.

pub mod config;

mod error;
mod resolver;

pub use tessel_core::{attribute, constant, identifier, intrinsic, types};
pub use tessel_parser::{Diagnostic, ErrorKind, ast};

pub use error::TesselError;
pub use resolver::{FilesystemModuleResolver, MODULE_EXTENSION};

use std::{fs, path::Path, sync::Arc};

use log::{debug, info, trace};

use tessel_core::attribute::ShaderStage;
use tessel_parser::{
    ModuleResolver, SanitizeOptions,
    ast::{Module, Statement, StatementKind},
    lexer, parser, sanitizer,
};

use config::CompilerConfig;

/// A module that went through every front-end stage.
#[derive(Debug, Clone)]
pub struct SanitizedModule {
    module: Module,
}

impl SanitizedModule {
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn name(&self) -> Option<&str> {
        self.module.name()
    }

    /// Entry functions of the module, in declaration order.
    pub fn entry_points(&self) -> Vec<(ShaderStage, &str)> {
        let mut entries = Vec::new();
        collect_entry_points(&self.module.statements, &mut entries);
        entries
    }
}

fn collect_entry_points<'m>(
    statements: &'m [Statement],
    entries: &mut Vec<(ShaderStage, &'m str)>,
) {
    for statement in statements {
        match &statement.kind {
            StatementKind::DeclareFunction(decl) => {
                if let Some(stage) = decl.entry_stage.as_ref().and_then(|stage| stage.value()) {
                    entries.push((*stage, decl.name.inner().as_str()));
                }
            }
            StatementKind::Multi(inner) => collect_entry_points(inner, entries),
            _ => {}
        }
    }
}

/// Compiles Tessel sources with one configuration.
///
/// # Examples
///
/// ```rust
/// use tessel::{Compiler, config::CompilerConfig};
///
/// let source = r#"
///     [nzsl_version("1.0")]
///     module Example;
///
///     [entry(frag)]
///     fn main() { }
/// "#;
///
/// let compiler = Compiler::new(CompilerConfig::default());
/// let module = compiler.compile(source, None).expect("Failed to compile");
/// assert_eq!(module.name(), Some("Example"));
/// assert_eq!(module.entry_points().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
    resolver: Option<Arc<FilesystemModuleResolver>>,
}

impl Compiler {
    /// Create a compiler. Imports are looked up in the configured search
    /// paths; with none configured, modules cannot import.
    pub fn new(config: CompilerConfig) -> Self {
        let search_paths = config.modules().search_paths();
        let resolver = (!search_paths.is_empty())
            .then(|| Arc::new(FilesystemModuleResolver::new(search_paths.iter().cloned())));
        Self { config, resolver }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn sanitize_options(&self) -> SanitizeOptions {
        let sanitize = self.config.sanitize();
        let mut options = SanitizeOptions {
            partial_sanitization: sanitize.partial(),
            features: sanitize.features().to_vec(),
            ..SanitizeOptions::default()
        };
        for (name, value) in sanitize.options() {
            options.set_option(name, *value);
        }
        if let Some(resolver) = &self.resolver {
            let resolver: Arc<dyn ModuleResolver> = resolver.clone();
            options = options.with_resolver(resolver);
        }
        options
    }

    /// Parse source code into an unresolved module.
    ///
    /// # Errors
    ///
    /// Returns `TesselError::Compile` for lexer and parser errors.
    pub fn parse(&self, source: &str, path: Option<&Path>) -> Result<Module, TesselError> {
        let path = path.map(|path| path.display().to_string());
        let tokens = lexer::tokenize(source, path.as_deref())
            .map_err(|err| TesselError::new_compile_error(err, source))?;
        debug!(tokens = tokens.len(); "Source tokenized");
        trace!(tokens:? = tokens; "Tokens");

        let module =
            parser::parse(&tokens).map_err(|err| TesselError::new_compile_error(err, source))?;
        debug!(statements = module.statements.len(); "Source parsed");
        Ok(module)
    }

    /// Run the full front end on `source`.
    ///
    /// `path` only names the source in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `TesselError::Compile` with the first diagnostic of any stage.
    pub fn compile(
        &self,
        source: &str,
        path: Option<&Path>,
    ) -> Result<SanitizedModule, TesselError> {
        info!(path:? = path; "Compiling module");
        let module = self.parse(source, path)?;

        info!(module = module.name().unwrap_or("<unnamed>"); "Sanitizing module");
        let module = sanitizer::sanitize(module, &self.sanitize_options())
            .map_err(|err| TesselError::new_compile_error(err, source))?;
        debug!(imported = module.imported_modules.len(); "Module sanitized");
        trace!(module:? = module; "Sanitized module");

        Ok(SanitizedModule { module })
    }

    /// Read and compile the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `TesselError::Io` if the file cannot be read, otherwise as
    /// [`Compiler::compile`].
    pub fn compile_file(&self, path: &Path) -> Result<SanitizedModule, TesselError> {
        let source = fs::read_to_string(path)?;
        self.compile(&source, Some(path))
    }
}
