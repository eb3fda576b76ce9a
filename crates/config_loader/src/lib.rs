//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Overlay `LOG_PROCESSOR_*` environment variables
//! - Validate configuration legality
//! - Generate `ProcessorBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Source: {}", blueprint.source.topic);
//! ```

mod env;
mod parser;
mod validator;

pub use contracts::ProcessorBlueprint;
pub use env::{ENV_KEYS, ENV_PREFIX};
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ProcessorBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from file path, then overlay the process
    /// environment
    ///
    /// Returns the blueprint and the names of the variables that were applied.
    /// Validation runs on the merged result, so a variable may supply a value
    /// the file lacks (e.g. `LOG_PROCESSOR_DATA_DIR`).
    pub fn load_with_env(path: &Path) -> Result<(ProcessorBlueprint, Vec<String>), ContractError> {
        Self::load_with_lookup(path, |name| std::env::var(name).ok())
    }

    /// [`ConfigLoader::load_with_env`] with an explicit variable lookup
    pub fn load_with_lookup<F>(
        path: &Path,
        lookup: F,
    ) -> Result<(ProcessorBlueprint, Vec<String>), ContractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let mut blueprint = parser::parse(&content, format)?;
        let applied = env::apply_overrides(&mut blueprint, lookup)?;
        validator::validate(&blueprint)?;
        Ok((blueprint, applied))
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ProcessorBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an in-memory blueprint (e.g. after CLI overrides)
    pub fn validate(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize ProcessorBlueprint to TOML string
    pub fn to_toml(blueprint: &ProcessorBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize ProcessorBlueprint to JSON string
    pub fn to_json(blueprint: &ProcessorBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ProcessorBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
