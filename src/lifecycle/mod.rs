//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → resolve endpoint → build coordinator → ConfigMirror::init
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop the sync engine → exit
//! ```
//!
//! # Design Decisions
//! - Startup failures are fatal; nothing is cached yet to fall back to
//! - Shutdown only stops reacting to notifications; readers keep the last cache

pub mod signals;
pub mod startup;

pub use startup::{connect, start, start_with, StartupError};
