//! Coordination service client abstraction.
//!
//! # Data Flow
//! ```text
//! SyncEngine
//!     → Coordinator::list_children / get_data (read + arm watch, one call)
//!     → backend (memory.rs | fs.rs)
//!
//! On remote change:
//!     backend fires the armed Watch exactly once
//!     → SyncEngine handler re-reads with a fresh Watch
//! ```
//!
//! # Design Decisions
//! - Watches are `FnOnce`, so a fired watch cannot fire again
//! - Reading and arming are one trait call; there is no separate subscribe
//! - Notifications run on the backend's thread, never on a worker pool

pub mod fs;
pub mod memory;
pub mod types;

pub use fs::FsCoordinator;
pub use memory::MemoryCoordinator;
pub use types::{CoordinationError, CoordinationResult, EventKind, Watch, WatchEvent};

/// Client surface of a hierarchical coordination service.
///
/// Every `watch` argument, when supplied, arms exactly one future
/// notification for `path` which is consumed when it fires.
pub trait Coordinator: Send + Sync {
    /// List the child names of `path`, arming a children-changed watch.
    fn list_children(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<Vec<String>>;

    /// Check whether `path` exists, arming a created/deleted/data watch.
    fn exists(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<bool>;

    /// Read the payload stored at `path`, arming a data-changed watch.
    fn get_data(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<Vec<u8>>;

    /// Overwrite the payload at `path`. Last writer wins.
    fn set_data(&self, path: &str, data: &[u8]) -> CoordinationResult<()>;
}

/// Join a parent path and a child name with a single separator.
pub fn child_path(parent: &str, child: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Last segment of a slash separated path.
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of a slash separated path (`/` for top level nodes).
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_helpers() {
        assert_eq!(child_path("/mars/app", "db"), "/mars/app/db");
        assert_eq!(child_path("/mars/", "app"), "/mars/app");
        assert_eq!(node_name("/mars/app/db"), "db");
        assert_eq!(parent_path("/mars/app/db"), "/mars/app");
        assert_eq!(parent_path("/mars"), "/");
    }
}
