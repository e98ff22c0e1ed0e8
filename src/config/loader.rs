//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Expected token hash override.
pub const ENV_TOKEN_HASH: &str = "SEARCH_GATE_TOKEN_HASH";
/// Listener bind address override.
pub const ENV_BIND: &str = "SEARCH_GATE_BIND";
/// Admin API key override.
pub const ENV_ADMIN_KEY: &str = "SEARCH_GATE_ADMIN_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// [`load_config`] with overrides read from `lookup` instead of the process
/// environment.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<GateConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GateConfig::default(),
    };

    let config = apply_overrides(config, lookup);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply overrides from `lookup` (normally the process environment).
pub fn apply_overrides<F>(mut config: GateConfig, lookup: F) -> GateConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(hash) = lookup(ENV_TOKEN_HASH).filter(|v| !v.is_empty()) {
        config.access.token_hash = hash;
    }
    if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.is_empty()) {
        config.listener.bind_address = bind;
    }
    if let Some(key) = lookup(ENV_ADMIN_KEY).filter(|v| !v.is_empty()) {
        config.admin.api_key = key;
    }
    config
}
