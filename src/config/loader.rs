//! Settings loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Environment, MirrorSettings};
use crate::config::validation::{validate_settings, ValidationError};

/// Environment variable that overrides `environment` from the file.
pub const ENV_OVERRIDE_VAR: &str = "CONF_ENV";

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid CONF_ENV value: {0}")]
    Environment(String),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<MirrorSettings, SettingsError> {
    let content = fs::read_to_string(path)?;
    let override_env = std::env::var(ENV_OVERRIDE_VAR).ok();
    parse_settings(&content, override_env.as_deref())
}

/// Parse and validate settings text, applying an environment override.
pub fn parse_settings(content: &str, override_env: Option<&str>) -> Result<MirrorSettings, SettingsError> {
    let mut settings: MirrorSettings = toml::from_str(content)?;

    if let Some(raw) = override_env.filter(|v| !v.trim().is_empty()) {
        let env: Environment = raw.parse().map_err(SettingsError::Environment)?;
        if env != settings.environment {
            tracing::info!(from = %settings.environment, to = %env, "Environment overridden");
        }
        settings.environment = env;
    }

    validate_settings(&settings).map_err(SettingsError::Validation)?;
    Ok(settings)
}
