//! Import statements and imported modules.

use std::{collections::HashSet, sync::Arc};

use indexmap::IndexMap;
use log::{debug, warn};

use tessel_core::identifier::Id;

use crate::{
    ast::{ImportStatement, ImportedModule, Module, Statement, StatementKind},
    error::{Diagnostic, ErrorKind, Result},
    span::SourceLocation,
};

use super::{
    ModuleResolver, ModuleState, Sanitizer,
    registry::ModuleData,
    scope::{IdentifierCategory, IdentifierData, ScopeStack},
};

/// Validates every import statement of a module before any is resolved.
///
/// Duplicate wildcards are reported before a renamed wildcard, even when the
/// rename appears earlier in the source.
pub(super) fn check_wildcards(statements: &[Statement]) -> Result<()> {
    let mut wildcard_modules = HashSet::new();
    let mut renamed_wildcard = None;
    check_imports(statements, &mut wildcard_modules, &mut renamed_wildcard)?;
    match renamed_wildcard {
        Some(location) => Err(Diagnostic::new(ErrorKind::ImportWildcardRename, location)),
        None => Ok(()),
    }
}

fn check_imports<'s>(
    statements: &'s [Statement],
    wildcard_modules: &mut HashSet<&'s str>,
    renamed_wildcard: &mut Option<SourceLocation>,
) -> Result<()> {
    for statement in statements {
        match &statement.kind {
            StatementKind::Import(import) => {
                if import.identifiers.is_empty() && import.module_alias.is_none() {
                    return Err(Diagnostic::new(ErrorKind::EmptyImport, statement.location.clone()));
                }
                let mut wildcards = import.identifiers.iter().filter(|i| i.is_wildcard());
                if let Some(wildcard) = wildcards.next() {
                    if wildcard.rename.is_some() && renamed_wildcard.is_none() {
                        *renamed_wildcard = Some(wildcard.location.clone());
                    }
                    if let Some(second) = wildcards.next() {
                        return Err(Diagnostic::new(
                            ErrorKind::ImportMultipleWildcard,
                            second.location.clone(),
                        ));
                    }
                    if !wildcard_modules.insert(import.module_name.as_str()) {
                        return Err(Diagnostic::new(
                            ErrorKind::ImportMultipleWildcard,
                            wildcard.location.clone(),
                        ));
                    }
                }
            }
            StatementKind::Multi(inner) | StatementKind::Scoped(inner) => {
                check_imports(inner, wildcard_modules, renamed_wildcard)?;
            }
            StatementKind::Branch(branch) if branch.is_const => {
                for arm in &branch.branches {
                    check_imports(
                        std::slice::from_ref(&*arm.statement),
                        wildcard_modules,
                        renamed_wildcard,
                    )?;
                }
                if let Some(statement) = &branch.else_statement {
                    check_imports(
                        std::slice::from_ref(&**statement),
                        wildcard_modules,
                        renamed_wildcard,
                    )?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Exported declarations of a sanitized module, bound as in `scopes`.
fn collect_exports(
    statements: &[Statement],
    scopes: &ScopeStack,
    exports: &mut IndexMap<String, IdentifierData>,
) {
    for statement in statements {
        let exported = match &statement.kind {
            StatementKind::DeclareAlias(decl) => decl.is_exported,
            StatementKind::DeclareConst(decl) => decl.is_exported,
            StatementKind::DeclareFunction(decl) => decl.is_exported,
            StatementKind::DeclareStruct(decl) => decl.is_exported,
            StatementKind::Multi(inner) => {
                collect_exports(inner, scopes, exports);
                continue;
            }
            _ => false,
        };
        if !exported {
            continue;
        }
        if let Some(name) = statement.declared_name() {
            if let Some(data) = scopes.lookup(name) {
                exports.entry(name.to_string()).or_insert(data);
            }
        }
    }
}

impl Sanitizer<'_> {
    pub(super) fn import(
        &mut self,
        import: ImportStatement,
        location: SourceLocation,
    ) -> Result<Statement> {
        let Some(resolver) = self.options.module_resolver.clone() else {
            if !self.is_partial() {
                return Err(Diagnostic::new(ErrorKind::NoModuleResolver, location));
            }
            debug!(module = import.module_name.as_str(); "Keeping import unresolved");
            self.bind_unresolved(&import)?;
            return Ok(Statement::new(StatementKind::Import(import), location));
        };

        let module = self.resolve_module(
            &import.module_name,
            resolver.as_ref(),
            import.module_name.location(),
        )?;
        self.bind_imports(&import, module)?;
        Ok(Statement::new(StatementKind::Import(import), location))
    }

    /// Returns the registry index of module `name`, sanitizing it on first
    /// use.
    fn resolve_module(
        &mut self,
        name: &str,
        resolver: &dyn ModuleResolver,
        location: &SourceLocation,
    ) -> Result<usize> {
        let id = Id::new(name);
        if self.imports.in_flight.contains(&id) {
            let chain: Vec<String> = self.imports.in_flight.iter().map(Id::to_string).collect();
            warn!(module = name, chain:? = chain; "Circular import");
            return Err(Diagnostic::new(
                ErrorKind::CircularImport(name.to_string()),
                location.clone(),
            ));
        }
        if let Some(&index) = self.imports.resolved.get(&id) {
            return Ok(index);
        }

        debug!(module = name; "Resolving import");
        let module = match resolver.resolve(name) {
            Ok(Some(module)) => module,
            Ok(None) => {
                return Err(Diagnostic::new(
                    ErrorKind::ModuleNotFound(name.to_string()),
                    location.clone(),
                ));
            }
            Err(err) => {
                return Err(Diagnostic::new(
                    ErrorKind::ModuleCompilationFailed(name.to_string(), Box::new(err)),
                    location.clone(),
                ));
            }
        };
        for feature in &module.metadata.enabled_features {
            if !self.state.features.contains(feature) {
                return Err(Diagnostic::new(
                    ErrorKind::ModuleFeatureMismatch(name.to_string(), *feature),
                    location.clone(),
                ));
            }
        }

        let sanitized = self.sanitize_imported(id, Module::clone(&module));
        let (sanitized, scopes) = sanitized.map_err(|err| {
            Diagnostic::new(
                ErrorKind::ModuleCompilationFailed(name.to_string(), Box::new(err)),
                location.clone(),
            )
        })?;

        let mut exported = IndexMap::new();
        collect_exports(&sanitized.statements, &scopes, &mut exported);
        debug!(module = name, exports = exported.len(); "Import resolved");

        let index = self.registries.modules.register(
            ModuleData {
                name: id,
                exports: exported,
            },
            None,
            location,
        )?;
        self.imports.resolved.insert(id, index);
        self.imports.modules.push(ImportedModule {
            identifier: name.to_string(),
            module: Arc::new(sanitized),
        });
        Ok(index)
    }

    /// Runs both passes on an imported module with a fresh module state.
    fn sanitize_imported(&mut self, id: Id, module: Module) -> Result<(Module, ScopeStack)> {
        let state = ModuleState {
            name: Some(id),
            is_root: false,
            features: self.enabled_features(&module),
            ..ModuleState::default()
        };
        let parent = std::mem::replace(&mut self.state, state);
        self.imports.in_flight.insert(id);

        let result = self.sanitize_module(module);

        self.imports.in_flight.shift_remove(&id);
        let state = std::mem::replace(&mut self.state, parent);
        result.map(|module| (module, state.scopes))
    }

    fn bind_import(
        &mut self,
        name: &str,
        data: IdentifierData,
        location: &SourceLocation,
    ) -> Result<()> {
        if !self.state.scopes.declare(name, data) {
            return Err(Diagnostic::new(
                ErrorKind::ImportIdentifierAlreadyPresent(name.to_string()),
                location.clone(),
            ));
        }
        Ok(())
    }

    fn bind_imports(&mut self, import: &ImportStatement, module: usize) -> Result<()> {
        let location = import.module_name.location();
        let exported = self.registries.modules.get(module, location)?.exports.clone();

        if let Some(alias) = &import.module_alias {
            let data = IdentifierData::new(IdentifierCategory::Module, module);
            self.bind_import(alias, data, alias.location())?;
        }
        for identifier in &import.identifiers {
            match &identifier.identifier {
                None => {
                    for (name, data) in &exported {
                        self.bind_import(name, *data, &identifier.location)?;
                    }
                }
                Some(name) => {
                    let Some(data) = exported.get(name) else {
                        return Err(Diagnostic::new(
                            ErrorKind::ImportIdentifierNotFound(
                                name.clone(),
                                import.module_name.to_string(),
                            ),
                            identifier.location.clone(),
                        ));
                    };
                    let bound = identifier.rename.as_deref().unwrap_or(name);
                    self.bind_import(bound, *data, &identifier.location)?;
                }
            }
        }
        Ok(())
    }

    /// Partial analysis without a resolver: the imported names exist but
    /// have no type.
    fn bind_unresolved(&mut self, import: &ImportStatement) -> Result<()> {
        if let Some(alias) = &import.module_alias {
            self.bind_import(alias, IdentifierData::unresolved(), alias.location())?;
        }
        for identifier in &import.identifiers {
            let bound = identifier.rename.as_ref().or(identifier.identifier.as_ref());
            if let Some(bound) = bound {
                self.bind_import(bound, IdentifierData::unresolved(), &identifier.location)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ImportIdentifier;
    use crate::span::Spanned;

    fn import(module: &str, identifiers: &[Option<&str>]) -> Statement {
        let location = SourceLocation::unknown();
        Statement::new(
            StatementKind::Import(ImportStatement {
                module_name: Spanned::new(module.to_string(), location.clone()),
                module_alias: None,
                identifiers: identifiers
                    .iter()
                    .map(|identifier| ImportIdentifier {
                        identifier: identifier.map(str::to_string),
                        rename: None,
                        location: location.clone(),
                    })
                    .collect(),
            }),
            location,
        )
    }

    fn kind_of(statements: &[Statement]) -> Option<ErrorKind> {
        check_wildcards(statements).err().map(|err| err.kind().clone())
    }

    #[test]
    fn test_single_wildcards_pass() {
        let statements = [import("A", &[None]), import("B", &[None, Some("x")])];
        assert_eq!(kind_of(&statements), None);
    }

    #[test]
    fn test_two_wildcards_in_one_statement() {
        let statements = [import("A", &[None, None])];
        assert_eq!(kind_of(&statements), Some(ErrorKind::ImportMultipleWildcard));
    }

    #[test]
    fn test_same_module_wildcard_twice() {
        let statements = [import("A", &[None]), import("A", &[None])];
        assert_eq!(kind_of(&statements), Some(ErrorKind::ImportMultipleWildcard));
    }

    #[test]
    fn test_empty_import() {
        assert_eq!(kind_of(&[import("A", &[])]), Some(ErrorKind::EmptyImport));
    }
}
