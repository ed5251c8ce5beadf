//! Synchronization with the coordination service.
//!
//! # Data Flow
//! ```text
//! watch fires (coordinator thread)
//!     → engine.rs re-reads with a fresh watch
//!     → store::parse → ConfigCache::replace_section (per section)
//!     → GrayRuleEngine::reset
//!     → registry.rs dispatch (per section, listener failures isolated)
//! ```
//!
//! # Design Decisions
//! - All reload work runs on the notifying thread; there is no worker pool
//! - No lock is held across a coordinator call
//! - After init everything fails open: stale config beats no config

pub mod engine;
pub mod registry;

pub use engine::{ReloadOutcome, SyncEngine, SyncError, SyncState};
pub use registry::{CallbackRegistry, DispatchReport, ListenerError, ReloadListener};
