//! Watch events and error definitions for coordination backends.

use std::fmt;
use thiserror::Error;

/// Kind of change a fired watch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The child list of the watched node changed.
    ChildrenChanged,
    /// The payload of the watched node changed.
    DataChanged,
    /// The watched node was created.
    Created,
    /// The watched node was deleted.
    Deleted,
}

/// Notification delivered to a fired watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub path: String,
}

impl WatchEvent {
    pub fn new(kind: EventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind, self.path)
    }
}

/// A one-shot watch callback.
pub type Watch = Box<dyn FnOnce(WatchEvent) + Send + 'static>;

/// Errors returned by coordination backends.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The node does not exist.
    #[error("no node at {0}")]
    NoNode(String),

    /// The session with the service is gone; no further calls can succeed.
    #[error("coordination session expired")]
    SessionExpired,

    /// The path is not a valid absolute node path.
    #[error("invalid node path: {0}")]
    InvalidPath(String),

    /// Local I/O failure in a file-backed store.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The service could not be reached.
    #[error("coordination service unavailable: {0}")]
    Unavailable(String),
}

impl CoordinationError {
    /// True when the session is lost and retrying on the same client is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoordinationError::SessionExpired)
    }
}

/// Result type for coordination calls.
pub type CoordinationResult<T> = Result<T, CoordinationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoordinationError::NoNode("/mars/app".into());
        assert_eq!(err.to_string(), "no node at /mars/app");
        assert!(CoordinationError::SessionExpired.is_fatal());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_event_display() {
        let event = WatchEvent::new(EventKind::DataChanged, "/mars/app/db");
        assert_eq!(event.to_string(), "DataChanged@/mars/app/db");
    }
}
