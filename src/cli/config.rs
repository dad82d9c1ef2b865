use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::Value as JsonValue;

use super::output::{emit, OutputFormat};
use super::runtime::LoadedConfig;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Get one configuration value by dotted key
    Get {
        /// Configuration key, e.g. analytics.pool_size
        key: String,
    },

    /// Validate the effective configuration
    Validate,
}

pub fn cmd_config(args: ConfigArgs, loaded: &LoadedConfig, output: OutputFormat) -> Result<()> {
    let config = &loaded.config;
    match args.action {
        ConfigAction::Show => emit(output, config, |config| {
            match &loaded.path {
                Some(path) => println!("Effective configuration ({}):", path.display()),
                None => println!("Effective configuration (defaults and environment):"),
            }
            match serde_yaml::to_string(config) {
                Ok(rendered) => print!("{rendered}"),
                Err(err) => println!("<unrenderable: {err}>"),
            }
        }),
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(config)?;
            let segments = split_key(&key)?;
            match get_json_value(&json, &segments) {
                Some(value) => emit(output, value, |value| match value {
                    JsonValue::String(s) => println!("{s}"),
                    other => println!("{other}"),
                }),
                None => bail!("{} not found in configuration", key),
            }
        }
        ConfigAction::Validate => {
            let errors = config.validate();
            if errors.is_empty() {
                println!("Configuration is valid");
                Ok(())
            } else {
                for error in &errors {
                    println!("- {error}");
                }
                bail!("configuration has {} problem(s)", errors.len());
            }
        }
    }
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
