//! # Configuration File Loading
//!
//! Loads alias configuration from TOML or YAML files, picking the format from
//! the file extension.

use std::path::Path;

use validator::Validate;

use crate::config::AliasConfig;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String)
}

/// Load configuration from a TOML file.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_toml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("aliases.toml"))?;
///     println!("Backend: {}", config.storage.backend);
///     Ok(())
/// }
/// ```
///
/// Missing sections fall back to their defaults. The parsed configuration is
/// validated before it is returned.
pub fn load_from_toml(path: &Path) -> Result<AliasConfig, ConfigFileError> {
    let contents = read(path)?;
    let config: AliasConfig =
        toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))?;
    validated(config)
}

/// Load configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<AliasConfig, ConfigFileError> {
    let contents = read(path)?;
    let config: AliasConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))?;
    validated(config)
}

/// Load configuration from file with auto-detection.
///
/// ## Supported Formats
/// - `.toml`
/// - `.yaml` / `.yml`
pub fn load_from_file(path: &Path) -> Result<AliasConfig, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string()))
    }
}

fn read(path: &Path) -> Result<String, ConfigFileError> {
    std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))
}

fn validated(config: AliasConfig) -> Result<AliasConfig, ConfigFileError> {
    config
        .validate()
        .map_err(|e| ConfigFileError::Invalid(e.to_string()))?;
    Ok(config)
}
