//! Filesystem lookup of imported modules.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use log::{debug, trace, warn};

use tessel_parser::{
    Diagnostic, ErrorKind, ModuleResolver, SourceLocation, ast::Module, parse_source,
};

/// Source file extension of Tessel modules.
pub const MODULE_EXTENSION: &str = "tsl";

/// Resolves `A.B.C` to `<dir>/A/B/C.tsl` in the first search directory that
/// has it.
///
/// Parsed modules are cached, so one resolver can serve several
/// compilations, including concurrent ones.
#[derive(Debug, Default)]
pub struct FilesystemModuleResolver {
    search_paths: Vec<PathBuf>,
    cache: RwLock<HashMap<String, Arc<Module>>>,
}

impl FilesystemModuleResolver {
    pub fn new(search_paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
            cache: RwLock::default(),
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Relative path of module `name`, or `None` for names that cannot be
    /// module paths.
    pub fn module_path(name: &str) -> Option<PathBuf> {
        let mut path = PathBuf::new();
        for part in name.split('.') {
            if part.is_empty() || part.contains(['/', '\\']) || part == ".." {
                return None;
            }
            path.push(part);
        }
        path.set_extension(MODULE_EXTENSION);
        Some(path)
    }

    fn find(&self, relative: &Path) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_file())
    }

    fn load(&self, name: &str, path: &Path) -> Result<Module, Diagnostic> {
        let source = fs::read_to_string(path).map_err(|err| {
            Diagnostic::new(ErrorKind::ModuleNotFound(name.to_string()), SourceLocation::unknown())
                .with_help(format!("failed to read {}: {err}", path.display()))
        })?;
        let display_path = path.display().to_string();
        let module = parse_source(&source, Some(&display_path))?;
        if module.name() != Some(name) {
            warn!(
                module = name,
                declared = module.name().unwrap_or("<unnamed>"),
                path = display_path;
                "Module file declares another name"
            );
        }
        Ok(module)
    }
}

impl ModuleResolver for FilesystemModuleResolver {
    fn resolve(&self, name: &str) -> Result<Option<Arc<Module>>, Diagnostic> {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        if let Some(module) = cached {
            trace!(module = name; "Module cache hit");
            return Ok(Some(module));
        }

        let Some(relative) = Self::module_path(name) else {
            return Ok(None);
        };
        let Some(path) = self.find(&relative) else {
            debug!(module = name, searched = self.search_paths.len(); "Module file not found");
            return Ok(None);
        };

        debug!(module = name, path = path.display().to_string(); "Loading module");
        let module = Arc::new(self.load(name, &path)?);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let module = cache.entry(name.to_string()).or_insert(module);
        Ok(Some(Arc::clone(module)))
    }
}
