//! Settings schema definitions.
//!
//! All types derive Serde traits for deserialization from settings files.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root settings for the mirror process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// Module whose subtree is mirrored (`<root_prefix><module>`).
    pub module: String,

    /// Prefix under which every module lives.
    pub root_prefix: String,

    /// Deploy environment; selects the endpoint.
    pub environment: Environment,

    /// Coordination endpoints per environment.
    pub endpoints: EndpointConfig,

    /// Which coordination client to build.
    pub backend: BackendKind,

    /// Rescan interval of the filesystem backend when the platform watcher
    /// falls back to polling.
    pub poll_interval_ms: u64,

    /// Local config files loaded before the remote tree, one section per file.
    pub local_files: Vec<PathBuf>,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            module: String::new(),
            root_prefix: "/mars/".to_string(),
            environment: Environment::Dev,
            endpoints: EndpointConfig::default(),
            backend: BackendKind::Filesystem,
            poll_interval_ms: 2_000,
            local_files: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl MirrorSettings {
    /// Endpoint for the selected environment, if configured.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoints
            .for_env(self.environment)
            .filter(|e| !e.trim().is_empty())
    }
}

/// Deploy environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Formal,
    Preview,
    Dev,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "formal" | "production" => Ok(Environment::Formal),
            "preview" => Ok(Environment::Preview),
            "dev" => Ok(Environment::Dev),
            other => Err(format!("unknown environment {:?}", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Formal => "formal",
            Environment::Preview => "preview",
            Environment::Dev => "dev",
        };
        f.write_str(name)
    }
}

/// Coordination endpoint per environment.
///
/// For the filesystem backend an endpoint is the directory holding the tree.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub formal: Option<String>,
    pub preview: Option<String>,
    pub dev: Option<String>,
}

impl EndpointConfig {
    pub fn for_env(&self, env: Environment) -> Option<&str> {
        match env {
            Environment::Formal => self.formal.as_deref(),
            Environment::Preview => self.preview.as_deref(),
            Environment::Dev => self.dev.as_deref(),
        }
    }
}

/// Coordination client implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process tree; useful for tests and local runs.
    Memory,
    /// Directory tree observed with filesystem notifications.
    Filesystem,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level for this crate when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = MirrorSettings::default();
        assert_eq!(settings.root_prefix, "/mars/");
        assert_eq!(settings.environment, Environment::Dev);
        assert_eq!(settings.poll_interval_ms, 2_000);
        assert!(settings.endpoint().is_none());
    }

    #[test]
    fn test_minimal_toml() {
        let settings: MirrorSettings = toml::from_str(
            r#"
            module = "billing"
            environment = "preview"

            [endpoints]
            preview = "preview.coord:2181"
            "#,
        )
        .unwrap();

        assert_eq!(settings.module, "billing");
        assert_eq!(settings.endpoint(), Some("preview.coord:2181"));
        assert_eq!(settings.backend, BackendKind::Filesystem);
        assert_eq!(settings.observability.log_level, "info");
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("FORMAL".parse::<Environment>(), Ok(Environment::Formal));
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Formal));
        assert_eq!(" dev ".parse::<Environment>(), Ok(Environment::Dev));
        assert!("staging".parse::<Environment>().is_err());
        assert_eq!(Environment::Preview.to_string(), "preview");
    }
}
