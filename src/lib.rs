//! Eventually consistent local mirror of configuration held in a hierarchical
//! coordination service, with gray release rules on top.

pub mod config;
pub mod coordination;
pub mod gray;
pub mod lifecycle;
pub mod mirror;
pub mod observability;
pub mod store;
pub mod sync;

pub use config::MirrorSettings;
pub use coordination::Coordinator;
pub use gray::GrayRuleEngine;
pub use mirror::ConfigMirror;
pub use store::ConfigCache;
pub use sync::{CallbackRegistry, ReloadListener, SyncEngine};
