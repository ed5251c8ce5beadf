//! Reload listener registry.
//!
//! # Responsibilities
//! - Keep section name -> ordered listeners
//! - Deduplicate listeners by identity
//! - Dispatch reload notifications, isolating each listener's failure
//!
//! # Design Decisions
//! - The map is copy-on-write behind `ArcSwap`: dispatch iterates a snapshot
//!   and holds no lock, so a listener may register or unregister while it is
//!   being notified
//! - Panics are caught like errors; one broken listener never skips the rest

use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::observability::metrics;

/// Error a listener may report from `reload_config`.
pub type ListenerError = Box<dyn Error + Send + Sync>;

/// Application hook notified after a section reloads.
pub trait ReloadListener: Send + Sync {
    /// Section this listener cares about.
    fn watched_section(&self) -> &str;

    /// Called after the watched section was replaced in the cache.
    fn reload_config(&self) -> Result<(), ListenerError>;
}

type ListenerMap = HashMap<String, Vec<Arc<dyn ReloadListener>>>;

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub notified: usize,
    pub failed: usize,
}

/// Section name -> registered listeners.
#[derive(Default)]
pub struct CallbackRegistry {
    listeners: ArcSwap<ListenerMap>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `section`.
    ///
    /// Returns `false` (and changes nothing) when the section name is empty or
    /// the same listener instance is already registered for it.
    pub fn register(&self, section: &str, listener: Arc<dyn ReloadListener>) -> bool {
        if section.is_empty() {
            return false;
        }
        let mut added = false;
        self.listeners.rcu(|current| {
            let mut next = ListenerMap::clone(current);
            let list = next.entry(section.to_string()).or_default();
            added = !list.iter().any(|l| same_listener(l, &listener));
            if added {
                list.push(listener.clone());
            }
            next
        });
        if added {
            tracing::debug!(section, "Reload listener registered");
        }
        added
    }

    /// Register `listener` for the section it declares.
    pub fn subscribe(&self, listener: Arc<dyn ReloadListener>) -> bool {
        let section = listener.watched_section().to_string();
        self.register(&section, listener)
    }

    /// Remove `listener` from every section it is registered for.
    pub fn unregister(&self, listener: &Arc<dyn ReloadListener>) {
        self.listeners.rcu(|current| {
            let mut next = ListenerMap::clone(current);
            for list in next.values_mut() {
                list.retain(|l| !same_listener(l, listener));
            }
            next.retain(|_, list| !list.is_empty());
            next
        });
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.listeners.store(Arc::new(ListenerMap::new()));
    }

    /// Number of listeners registered for `section`.
    pub fn listener_count(&self, section: &str) -> usize {
        self.listeners.load().get(section).map_or(0, Vec::len)
    }

    /// Notify every listener of `section`, in registration order.
    pub fn dispatch(&self, section: &str) -> DispatchReport {
        let snapshot = self.listeners.load_full();
        let mut report = DispatchReport::default();
        let Some(list) = snapshot.get(section) else {
            return report;
        };

        for listener in list {
            report.notified += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.reload_config()));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            report.failed += 1;
            metrics::record_listener_failure(section);
            tracing::error!(section, error = %failure, "Reload listener failed");
        }
        report
    }
}

fn same_listener(a: &Arc<dyn ReloadListener>, b: &Arc<dyn ReloadListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
