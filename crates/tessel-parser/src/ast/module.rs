//! The compilation unit.

use std::{fmt, sync::Arc};

use tessel_core::attribute::ModuleFeature;

use crate::ast::Statement;

/// Language version from the `nzsl_version` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LangVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LangVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses `major.minor` or `major.minor.patch`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('.');
        let mut next = || -> Option<Option<u32>> {
            match parts.next() {
                None => Some(None),
                Some(part) if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) => {
                    part.parse().ok().map(Some)
                }
                Some(_) => None,
            }
        };
        let major = next()??;
        let minor = next()??;
        let patch = next()?.unwrap_or(0);
        if next()?.is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for LangVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Metadata collected from the `module` statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleMetadata {
    pub module_name: Option<String>,
    pub lang_version: LangVersion,
    pub enabled_features: Vec<ModuleFeature>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
}

impl ModuleMetadata {
    pub fn has_feature(&self, feature: ModuleFeature) -> bool {
        self.enabled_features.contains(&feature)
    }
}

/// A module pulled in by an import, sanitized into the importer's registries.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedModule {
    pub identifier: String,
    pub module: Arc<Module>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub metadata: ModuleMetadata,
    pub statements: Vec<Statement>,
    pub imported_modules: Vec<ImportedModule>,
}

impl Module {
    pub fn name(&self) -> Option<&str> {
        self.metadata.module_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!(LangVersion::parse("1.0"), Some(LangVersion::new(1, 0, 0)));
        assert_eq!(LangVersion::parse("1.2.3"), Some(LangVersion::new(1, 2, 3)));
        assert_eq!(LangVersion::parse("1"), None);
        assert_eq!(LangVersion::parse("1.2.3.4"), None);
        assert_eq!(LangVersion::parse("1..2"), None);
        assert_eq!(LangVersion::parse("a.b"), None);
        assert_eq!(LangVersion::parse("1.-2"), None);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(LangVersion::new(1, 1, 0).to_string(), "1.1.0");
    }
}
