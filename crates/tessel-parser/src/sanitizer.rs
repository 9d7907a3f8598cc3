//! Semantic analysis of parsed modules.
//!
//! The sanitizer turns the unresolved AST produced by the
//! [`parser`](super::parser) into a resolved one: every identifier is bound
//! to a registry index, every expression carries its type, constant
//! expressions are folded and untyped literals are given concrete types.
//!
//! A module is processed in two passes. The first resolves imports and
//! top-level declarations in order (options, constants, aliases, structs,
//! external blocks and function signatures); the second sanitizes function
//! bodies, so a function may call another declared further down. Imported
//! modules are sanitized on demand into the same registries.
//!
//! Analysis stops at the first error.

mod cast;
mod crc32;
mod expression;
mod fold;
mod import;
mod intrinsic;
mod registry;
mod scope;
mod statement;
mod types;
mod walk;

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use indexmap::IndexSet;
use log::{debug, trace};

use tessel_core::{
    attribute::{ModuleFeature, ShaderStage},
    constant::ConstantValue,
    identifier::Id,
    types::ExpressionType,
};

use crate::{
    ast::{ImportedModule, Module, Statement, StatementKind},
    error::{Diagnostic, ErrorKind, Result},
    span::SourceLocation,
};

pub use crc32::option_hash;

use registry::Registries;
use scope::ScopeStack;

/// Supplies imported modules by name.
///
/// Implementations must be safe to share between concurrent analyses.
pub trait ModuleResolver: Send + Sync {
    /// Returns the parsed module called `name`, or `None` if there is no
    /// such module. Errors are reported wrapped in `ModuleCompilationFailed`.
    fn resolve(&self, name: &str) -> Result<Option<Arc<Module>>>;
}

/// Settings of one analysis.
#[derive(Clone, Default)]
pub struct SanitizeOptions {
    /// Keep going without a module resolver: imports stay unresolved, the
    /// names they introduce have no type and options may lack a value.
    pub partial_sanitization: bool,
    /// Features enabled on top of those the module declares.
    pub features: Vec<ModuleFeature>,
    /// Option overrides keyed by [`option_hash`] of the option name.
    pub option_values: HashMap<u32, ConstantValue>,
    pub module_resolver: Option<Arc<dyn ModuleResolver>>,
}

impl SanitizeOptions {
    /// Overrides the value of option `name`.
    pub fn set_option(&mut self, name: &str, value: impl Into<ConstantValue>) {
        self.option_values.insert(option_hash(name), value.into());
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ModuleResolver>) -> Self {
        self.module_resolver = Some(resolver);
        self
    }

    pub fn partial(mut self) -> Self {
        self.partial_sanitization = true;
        self
    }
}

impl fmt::Debug for SanitizeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizeOptions")
            .field("partial_sanitization", &self.partial_sanitization)
            .field("features", &self.features)
            .field("option_values", &self.option_values)
            .field("module_resolver", &self.module_resolver.is_some())
            .finish()
    }
}

/// State scoped to the module currently being sanitized.
#[derive(Debug, Default)]
struct ModuleState {
    name: Option<Id>,
    is_root: bool,
    features: Vec<ModuleFeature>,
    scopes: ScopeStack,
    current_function: Option<usize>,
    loop_depth: u32,
    entry_points: HashMap<ShaderStage, SourceLocation>,
    entry_functions: Vec<usize>,
}

/// Import bookkeeping shared by every module of one analysis.
#[derive(Debug, Default)]
struct ImportState {
    /// Modules currently being sanitized, outermost first.
    in_flight: IndexSet<Id>,
    /// Registry index of every module sanitized so far.
    resolved: HashMap<Id, usize>,
    modules: Vec<ImportedModule>,
}

pub(crate) struct Sanitizer<'o> {
    options: &'o SanitizeOptions,
    registries: Registries,
    imports: ImportState,
    /// `(set, binding)` pairs of external variables, with their location.
    bindings: HashMap<(u32, u32), SourceLocation>,
    state: ModuleState,
}

impl<'o> Sanitizer<'o> {
    fn new(options: &'o SanitizeOptions) -> Self {
        Self {
            options,
            registries: Registries::default(),
            imports: ImportState::default(),
            bindings: HashMap::new(),
            state: ModuleState::default(),
        }
    }

    fn is_partial(&self) -> bool {
        self.options.partial_sanitization
    }

    /// Whether a check against `ty` must wait: only unresolved names under
    /// partial analysis have no type and are not statements.
    fn is_deferred(&self, ty: &ExpressionType) -> bool {
        self.is_partial() && ty.is_no_type()
    }

    fn type_name(&self, ty: &ExpressionType) -> String {
        ty.display(&self.registries).to_string()
    }

    fn enabled_features(&self, module: &Module) -> Vec<ModuleFeature> {
        let mut features = module.metadata.enabled_features.clone();
        for feature in &self.options.features {
            if !features.contains(feature) {
                features.push(*feature);
            }
        }
        features
    }

    // ============================================================================
    // Module Passes
    // ============================================================================

    fn sanitize_root(&mut self, module: Module) -> Result<Module> {
        self.state = ModuleState {
            name: module.name().map(Id::new),
            is_root: true,
            features: self.enabled_features(&module),
            ..ModuleState::default()
        };
        if let Some(name) = self.state.name {
            self.imports.in_flight.insert(name);
        }

        let mut module = self.sanitize_module(module)?;
        module.imported_modules = std::mem::take(&mut self.imports.modules);
        walk::check_resolved(&module.statements)?;
        Ok(module)
    }

    /// Runs both passes on `module` using the current module state.
    fn sanitize_module(&mut self, mut module: Module) -> Result<Module> {
        debug!(
            module = module.name().unwrap_or("<unnamed>"),
            statements = module.statements.len();
            "Sanitizing module"
        );

        import::check_wildcards(&module.statements)?;
        self.preregister_indices(&module.statements)?;

        let statements = std::mem::take(&mut module.statements);
        let mut declared = Vec::with_capacity(statements.len());
        for statement in statements {
            declared.push(self.top_level_statement(statement)?);
        }
        self.assign_auto_bindings(&mut declared)?;
        trace!(statements:? = declared; "Declarations resolved");

        let mut resolved = Vec::with_capacity(declared.len());
        for statement in declared {
            resolved.push(self.function_bodies(statement)?);
        }
        module.statements = resolved;

        self.check_stage_dependencies()?;
        debug!(module = module.name().unwrap_or("<unnamed>"); "Module sanitized");
        Ok(module)
    }

    /// Reserves the indices of declarations that already carry one, as in a
    /// module sanitized before.
    fn preregister_indices(&mut self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            let location = &statement.location;
            match &statement.kind {
                StatementKind::DeclareAlias(decl) => {
                    if let Some(index) = decl.index {
                        self.registries.aliases.preregister(index, location)?;
                    }
                }
                StatementKind::DeclareConst(decl) => {
                    if let Some(index) = decl.index {
                        self.registries.constants.preregister(index, location)?;
                    }
                }
                StatementKind::DeclareFunction(decl) => {
                    if let Some(index) = decl.index {
                        self.registries.functions.preregister(index, location)?;
                    }
                }
                StatementKind::DeclareOption(decl) => {
                    if let Some(index) = decl.index {
                        self.registries.options.preregister(index, location)?;
                    }
                }
                StatementKind::DeclareStruct(decl) => {
                    if let Some(index) = decl.index {
                        self.registries.structs.preregister(index, location)?;
                    }
                }
                StatementKind::DeclareExternal(decl) => {
                    for variable in &decl.variables {
                        if let Some(index) = variable.index {
                            self.registries.variables.preregister(index, location)?;
                        }
                    }
                }
                StatementKind::Multi(inner) | StatementKind::Scoped(inner) => {
                    self.preregister_indices(inner)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Entry points of the current module must not reach code tied to
    /// another stage.
    fn check_stage_dependencies(&self) -> Result<()> {
        for &entry in &self.state.entry_functions {
            let function = self.registries.functions.get(entry, &SourceLocation::unknown())?;
            let Some(stage) = function.stage else {
                continue;
            };

            let mut visited = HashSet::new();
            let mut pending = vec![entry];
            while let Some(index) = pending.pop() {
                if !visited.insert(index) {
                    continue;
                }
                let callee = self.registries.functions.get(index, &function.location)?;
                if let Some(discard) = &callee.discard {
                    if stage != ShaderStage::Fragment {
                        return Err(Diagnostic::new(
                            ErrorKind::InvalidStageDependency(ShaderStage::Fragment, stage),
                            discard.clone(),
                        )
                        .with_secondary_label(function.location.clone(), "entry point declared here"));
                    }
                    if function.early_fragment_tests {
                        return Err(Diagnostic::new(
                            ErrorKind::DiscardEarlyFragmentTests,
                            discard.clone(),
                        ));
                    }
                }
                pending.extend(callee.calls.iter().map(|(called, _)| *called));
            }
        }
        Ok(())
    }
}

/// Resolves and validates `module`.
///
/// # Example
///
/// ```
/// use tessel_parser::{lexer, parser, sanitizer::{self, SanitizeOptions}};
///
/// let source = r#"
///     [nzsl_version("1.0")]
///     module;
///
///     fn main() { let x = 1 + 2; }
/// "#;
/// let tokens = lexer::tokenize(source, None).unwrap();
/// let module = parser::parse(&tokens).unwrap();
/// let resolved = sanitizer::sanitize(module, &SanitizeOptions::default()).unwrap();
/// assert_eq!(resolved.statements.len(), 1);
/// ```
pub fn sanitize(module: Module, options: &SanitizeOptions) -> Result<Module> {
    debug!(
        module = module.name().unwrap_or("<unnamed>"),
        partial = options.partial_sanitization;
        "Sanitizing"
    );
    let mut sanitizer = Sanitizer::new(options);
    let module = sanitizer.sanitize_root(module)?;
    debug!(imported = module.imported_modules.len(); "Sanitization completed");
    Ok(module)
}
