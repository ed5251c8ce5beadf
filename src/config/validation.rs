//! Settings validation.
//!
//! # Responsibilities
//! - Module name usable as a single path segment
//! - Root prefix is an absolute path ending in `/`
//! - An endpoint exists for the selected environment
//! - Metrics address parses when metrics are on
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MirrorSettings → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::MirrorSettings;

/// A single semantic problem in the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check `settings`, collecting every problem found.
pub fn validate_settings(settings: &MirrorSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.module.trim().is_empty() {
        errors.push(ValidationError::new("module", "must not be empty"));
    } else if settings.module.contains('/') {
        errors.push(ValidationError::new("module", "must not contain '/'"));
    }

    let prefix = &settings.root_prefix;
    if !prefix.starts_with('/') || !prefix.ends_with('/') {
        errors.push(ValidationError::new("root_prefix", "must start and end with '/'"));
    }

    if settings.endpoint().is_none() {
        errors.push(ValidationError::new(
            "endpoints",
            format!("no endpoint for environment {}", settings.environment),
        ));
    }

    if settings.poll_interval_ms == 0 {
        errors.push(ValidationError::new("poll_interval_ms", "must be greater than 0"));
    }

    let obs = &settings.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> MirrorSettings {
        let mut settings = MirrorSettings::default();
        settings.module = "billing".into();
        settings.endpoints.dev = Some("/tmp/coord".into());
        settings
    }

    #[test]
    fn test_valid_settings() {
        assert!(validate_settings(&valid()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut settings = valid();
        settings.module = "a/b".into();
        settings.root_prefix = "mars".into();
        settings.endpoints.dev = None;
        settings.poll_interval_ms = 0;
        settings.observability.metrics_enabled = true;
        settings.observability.metrics_address = "nope".into();

        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "module",
                "root_prefix",
                "endpoints",
                "poll_interval_ms",
                "observability.metrics_address"
            ]
        );
    }
}
