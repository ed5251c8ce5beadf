//! Local mirror of the remote configuration.
//!
//! # Data Flow
//! ```text
//! raw blob (UTF-8 text)
//!     → parser.rs (sections of key=value entries)
//!     → cache.rs (whole-section atomic replace)
//!     → readers (get / typed accessors / gray rules)
//!
//! local file (key=value lines, section named after the file)
//!     → local.rs → parser.rs → cache.rs
//! ```
//!
//! # Design Decisions
//! - Parsing never fails; malformed lines are dropped
//! - A section is replaced as a whole, never patched key by key
//! - Missing or unparsable values collapse to the caller's default

pub mod cache;
pub mod local;
pub mod parser;

pub use cache::{ConfigCache, ConfigSection};
pub use local::{load_file, read_flat, read_raw, section_name, LocalConfigError};
pub use parser::{parse, parse_entries, ParsedConfig};

/// Split a dotted `section.key` name on its first `.`.
///
/// Returns `None` when either half would be empty.
pub fn split_config_name(name: &str) -> Option<(&str, &str)> {
    let (section, key) = name.split_once('.')?;
    if section.is_empty() || key.is_empty() {
        None
    } else {
        Some((section, key))
    }
}
