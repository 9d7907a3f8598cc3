//! Command-line argument definitions for the Tessel CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the input module, configuration file,
//! semantic analysis settings and logging verbosity.

use clap::Parser;

use tessel::{attribute::ModuleFeature, config::OptionValue};

/// Command-line arguments for the Tessel shader compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input Tessel module
    #[arg(help = "Path to the input file")]
    pub input: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable a module feature (float64, primitive_externals, texture1D)
    #[arg(short = 'F', long = "feature", value_name = "FEATURE", value_parser = parse_feature)]
    pub features: Vec<ModuleFeature>,

    /// Override an option value
    #[arg(short = 'D', long = "option", value_name = "NAME=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, OptionValue)>,

    /// Directory searched for imported modules
    #[arg(short = 'M', long = "module-dir", value_name = "DIR")]
    pub module_dirs: Vec<String>,

    /// Accept modules whose imports or options cannot be resolved
    #[arg(long)]
    pub partial: bool,

    /// Print the token stream before compiling
    #[arg(long)]
    pub dump_tokens: bool,

    /// Print the sanitized AST
    #[arg(long)]
    pub dump_ast: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn parse_feature(value: &str) -> Result<ModuleFeature, String> {
    value
        .parse()
        .map_err(|()| format!("unknown module feature `{value}`"))
}

fn parse_option(value: &str) -> Result<(String, OptionValue), String> {
    let Some((name, value)) = value.split_once('=') else {
        return Err(format!("expected NAME=VALUE, got `{value}`"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("option name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_option() {
        assert_eq!(
            parse_option("LightCount=4"),
            Ok(("LightCount".to_string(), OptionValue::Integer(4)))
        );
        assert_eq!(
            parse_option("UseShadows = false"),
            Ok(("UseShadows".to_string(), OptionValue::Bool(false)))
        );
        assert!(parse_option("LightCount").is_err());
        assert!(parse_option("=4").is_err());
        assert!(parse_option("LightCount=many").is_err());
    }

    #[test]
    fn test_parse_command_line() {
        let args = Args::parse_from([
            "tessel",
            "shader.tsl",
            "-F",
            "float64",
            "--option",
            "Scale=0.5",
            "-M",
            "modules",
            "--partial",
        ]);
        assert_eq!(args.input, "shader.tsl");
        assert_eq!(args.features, vec![ModuleFeature::Float64]);
        assert_eq!(
            args.options,
            vec![("Scale".to_string(), OptionValue::Float(0.5))]
        );
        assert_eq!(args.module_dirs, vec!["modules".to_string()]);
        assert!(args.partial);
        assert!(!args.dump_ast);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_unknown_feature() {
        assert!(Args::try_parse_from(["tessel", "shader.tsl", "-F", "float128"]).is_err());
    }
}
