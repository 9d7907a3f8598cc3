//! Configuration types for Tessel compilation.
//!
//! All types implement [`serde::Deserialize`] so a configuration can be
//! loaded from TOML. Every field is defaulted.
//!
//! - [`CompilerConfig`] - Top-level configuration.
//! - [`SanitizeConfig`] - Semantic analysis settings (`[sanitize]`).
//! - [`ModulesConfig`] - Where imported modules are looked up (`[modules]`).
//!
//! # Example
//!
//! ```
//! # use tessel::config::{CompilerConfig, OptionValue};
//! let config: CompilerConfig = toml::from_str(r#"
//!     [sanitize]
//!     features = ["float64"]
//!     options = { LightCount = 4, UseShadows = true }
//!
//!     [modules]
//!     search_paths = ["shaders/modules"]
//! "#).unwrap();
//!
//! assert_eq!(config.sanitize().options()["LightCount"], OptionValue::Integer(4));
//! assert_eq!(config.modules().search_paths().len(), 1);
//! ```

use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use serde::Deserialize;

use tessel_core::{
    attribute::ModuleFeature,
    constant::{ConstantSingleValue, ConstantValue},
};

/// Top-level compiler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    sanitize: SanitizeConfig,

    #[serde(default)]
    modules: ModulesConfig,
}

impl CompilerConfig {
    pub fn new(sanitize: SanitizeConfig, modules: ModulesConfig) -> Self {
        Self { sanitize, modules }
    }

    pub fn sanitize(&self) -> &SanitizeConfig {
        &self.sanitize
    }

    pub fn sanitize_mut(&mut self) -> &mut SanitizeConfig {
        &mut self.sanitize
    }

    pub fn modules(&self) -> &ModulesConfig {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut ModulesConfig {
        &mut self.modules
    }
}

/// Semantic analysis settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SanitizeConfig {
    /// Analyze modules whose imports cannot be resolved.
    #[serde(default)]
    partial: bool,

    /// Features enabled on top of those each module declares.
    #[serde(default)]
    features: Vec<ModuleFeature>,

    /// Option overrides, by option name.
    #[serde(default)]
    options: BTreeMap<String, OptionValue>,
}

impl SanitizeConfig {
    pub fn partial(&self) -> bool {
        self.partial
    }

    pub fn set_partial(&mut self, partial: bool) {
        self.partial = partial;
    }

    pub fn features(&self) -> &[ModuleFeature] {
        &self.features
    }

    /// Enables `feature` unless it is already enabled.
    pub fn add_feature(&mut self, feature: ModuleFeature) {
        if !self.features.contains(&feature) {
            self.features.push(feature);
        }
    }

    pub fn options(&self) -> &BTreeMap<String, OptionValue> {
        &self.options
    }

    /// Overrides option `name`, replacing any previous override.
    pub fn set_option(&mut self, name: impl Into<String>, value: OptionValue) {
        self.options.insert(name.into(), value);
    }
}

/// Module lookup settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModulesConfig {
    /// Directories searched, in order, for imported modules.
    #[serde(default)]
    search_paths: Vec<PathBuf>,
}

impl ModulesConfig {
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }
}

/// Value of an option override.
///
/// Overrides carry no type of their own: integers and floats take the type
/// of the option they are applied to.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl From<OptionValue> for ConstantValue {
    fn from(value: OptionValue) -> Self {
        let value = match value {
            OptionValue::Bool(value) => ConstantSingleValue::Bool(value),
            OptionValue::Integer(value) => ConstantSingleValue::UntypedInteger(value),
            OptionValue::Float(value) => ConstantSingleValue::UntypedFloat(value),
        };
        value.into()
    }
}

impl FromStr for OptionValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "true" => return Ok(OptionValue::Bool(true)),
            "false" => return Ok(OptionValue::Bool(false)),
            _ => {}
        }
        if let Ok(value) = s.parse::<i64>() {
            return Ok(OptionValue::Integer(value));
        }
        match s.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(OptionValue::Float(value)),
            _ => Err(format!("invalid option value `{s}`")),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(value) => write!(f, "{value}"),
            OptionValue::Integer(value) => write!(f, "{value}"),
            OptionValue::Float(value) => write!(f, "{value:?}"),
        }
    }
}
