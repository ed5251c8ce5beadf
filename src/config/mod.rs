//! Process settings.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (read, deserialize, CONF_ENV override)
//!     → validation.rs (semantic checks)
//!     → MirrorSettings (validated, immutable)
//!     → lifecycle::startup resolves the endpoint and builds the mirror
//! ```
//!
//! # Design Decisions
//! - These are the settings of the mirror process itself; the mirrored
//!   configuration lives in the coordination service
//! - All fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, SettingsError};
pub use schema::{BackendKind, EndpointConfig, Environment, MirrorSettings, ObservabilityConfig};
pub use validation::ValidationError;
