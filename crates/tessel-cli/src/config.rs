//! Configuration file loading for the CLI
//!
//! This module handles finding and loading TOML configuration files
//! from various locations (explicit path, local directory, system directory)
//! and merging command-line overrides on top.

use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use tessel::{
    TesselError,
    config::{CompilerConfig, ModulesConfig},
};

use crate::Args;

/// Configuration-related errors for CLI
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(String),

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for TesselError {
    fn from(err: ConfigError) -> Self {
        TesselError::Config(err.to_string())
    }
}

/// Find and load configuration from various locations
///
/// Search order:
/// 1. Explicit path if provided
/// 2. Local project directory (tessel/config.toml)
/// 3. Platform-specific config directory
/// 4. Default config if none found
///
/// Relative module search paths in a file are taken relative to that file.
///
/// # Errors
///
/// Returns error if:
/// - Explicit path is provided but file doesn't exist
/// - Config file exists but cannot be parsed
/// - A module search path is not a directory
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<CompilerConfig, TesselError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        return load_config_file(path);
    }

    let local_config = Path::new("tessel/config.toml");
    if local_config.exists() {
        info!(path = local_config.display().to_string(); "Loading configuration from local path");
        return load_config_file(local_config);
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "tessel", "tessel") {
        let system_config = proj_dirs.config_dir().join("config.toml");

        if system_config.exists() {
            info!(path = system_config.display().to_string(); "Loading configuration from system path");
            return load_config_file(system_config);
        }

        debug!(path = system_config.display().to_string(); "System configuration file not found");
    } else {
        debug!("Could not determine platform-specific config directory");
    }

    debug!("No configuration file found, using default configuration");
    Ok(CompilerConfig::default())
}

/// Apply command-line overrides to a loaded configuration.
///
/// Module directories given on the command line are searched before the
/// configured ones.
pub fn apply_args(mut config: CompilerConfig, args: &Args) -> CompilerConfig {
    let sanitize = config.sanitize_mut();
    if args.partial {
        sanitize.set_partial(true);
    }
    for feature in &args.features {
        sanitize.add_feature(*feature);
    }
    for (name, value) in &args.options {
        debug!(option = name, value:% = value; "Overriding option");
        sanitize.set_option(name.clone(), *value);
    }

    if args.module_dirs.is_empty() {
        return config;
    }
    let mut modules = ModulesConfig::default();
    for dir in &args.module_dirs {
        modules.add_search_path(dir);
    }
    for path in config.modules().search_paths() {
        modules.add_search_path(path.clone());
    }
    CompilerConfig::new(config.sanitize().clone(), modules)
}

/// Load configuration from a TOML file
///
/// # Errors
///
/// Returns error if:
/// - File doesn't exist
/// - File cannot be read
/// - TOML parsing fails
/// - A module search path is not a directory
fn load_config_file(path: impl AsRef<Path>) -> Result<CompilerConfig, TesselError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)?;

    let config: CompilerConfig =
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let mut modules = ModulesConfig::default();
    for search_path in config.modules().search_paths() {
        let search_path = base.join(search_path);
        if !search_path.is_dir() {
            return Err(ConfigError::Validation(format!(
                "module search path {} is not a directory",
                search_path.display()
            ))
            .into());
        }
        modules.add_search_path(search_path);
    }

    Ok(CompilerConfig::new(config.sanitize().clone(), modules))
}
