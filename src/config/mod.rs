pub mod builder;
pub mod defaults;
pub mod merge;
pub mod types;


pub use builder::ConfigBuilder;
pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dbpatcher.yaml";

/// Read the YAML configuration file; a missing file yields empty input
pub fn load_config(config_file: &str) -> Result<ConfigInput> {
    if !Path::new(config_file).exists() {
        return Ok(ConfigInput::default());
    }

    let contents = std::fs::read_to_string(config_file)
        .with_context(|| format!("Failed to read config file {}", config_file))?;
    parse_config(&contents).with_context(|| format!("Invalid config file {}", config_file))
}

pub fn parse_config(contents: &str) -> Result<ConfigInput> {
    if contents.trim().is_empty() {
        return Ok(ConfigInput::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}
