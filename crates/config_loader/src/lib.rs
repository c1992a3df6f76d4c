//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `RouterBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("router.toml")).unwrap();
//! println!("Senders: {}", blueprint.senders.len());
//! ```

mod parser;
mod validator;

pub use contracts::RouterBlueprint;
pub use parser::ConfigFormat;

use contracts::{ChannelId, ContractError, SenderKind};
use serde::Serialize;
use std::path::Path;

/// One channel to sender mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub channel: ChannelId,
    pub sender: String,
    pub kind: SenderKind,
}

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
    pub fn load_from_path(path: &Path) -> Result<RouterBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RouterBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Routing table described by the configuration, sorted by channel
    pub fn routes(blueprint: &RouterBlueprint) -> Vec<Route> {
        let mut routes: Vec<Route> = blueprint
            .senders
            .iter()
            .map(|sender| Route {
                channel: ChannelId::normalize(&sender.channel),
                sender: sender.name.clone(),
                kind: sender.kind,
            })
            .collect();
        routes.sort_by(|a, b| a.channel.cmp(&b.channel));
        routes
    }

    /// Serialize RouterBlueprint to TOML string
    pub fn to_toml(blueprint: &RouterBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize RouterBlueprint to JSON string
    pub fn to_json(blueprint: &RouterBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        ConfigFormat::from_path(path)
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RouterBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
