//! Watch-then-reload synchronization.
//!
//! # State Transitions
//! ```text
//! Uninitialized → Watching: init() listed the module root and loaded every child
//! Watching → Stopped: shutdown(), a failed init(), or a lost session
//! ```
//!
//! # Watches
//! - One children watch on the module root
//! - One data watch per known child (section node)
//!
//! Every handler re-reads with a fresh watch in the same coordinator call, so
//! there is no instant at which a watched path has nothing armed.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use thiserror::Error;

use crate::coordination::{
    child_path, node_name, CoordinationError, Coordinator, EventKind, Watch, WatchEvent,
};
use crate::gray::GrayRuleEngine;
use crate::observability::metrics;
use crate::store::{parse, ConfigCache};
use crate::sync::registry::CallbackRegistry;

/// Lifecycle of a [`SyncEngine`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized = 0,
    Watching = 1,
    Stopped = 2,
}

impl From<u8> for SyncState {
    fn from(val: u8) -> Self {
        match val {
            1 => SyncState::Watching,
            2 => SyncState::Stopped,
            _ => SyncState::Uninitialized,
        }
    }
}

/// Errors surfaced by the synchronization engine.
///
/// Only `init` and `publish` return them; failures inside watch handlers are
/// logged and the last good cache keeps serving.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync engine already initialized")]
    AlreadyInitialized,

    #[error("sync engine not initialized")]
    NotInitialized,

    #[error("invalid module name {0:?}")]
    InvalidModule(String),

    #[error("{op} failed at {path}: {source}")]
    Remote {
        op: &'static str,
        path: String,
        #[source]
        source: CoordinationError,
    },
}

impl SyncError {
    fn remote(op: &'static str, path: &str, source: CoordinationError) -> Self {
        SyncError::Remote {
            op,
            path: path.to_string(),
            source,
        }
    }
}

/// What happened to one payload handed to the reload pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Sections replaced in the cache.
    Applied(Vec<String>),
    /// Nothing changed; the reason is a short label.
    Skipped(&'static str),
}

struct Inner {
    coordinator: Arc<dyn Coordinator>,
    cache: Arc<ConfigCache>,
    gray: Arc<GrayRuleEngine>,
    registry: Arc<CallbackRegistry>,
    root_prefix: String,
    root: Mutex<Option<String>>,
    known: Mutex<BTreeSet<String>>,
    state: AtomicU8,
}

/// Keeps a [`ConfigCache`] in step with one module subtree of the coordinator.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    /// Create an engine for modules under `root_prefix` (e.g. `/mars/`).
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        cache: Arc<ConfigCache>,
        gray: Arc<GrayRuleEngine>,
        registry: Arc<CallbackRegistry>,
        root_prefix: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                coordinator,
                cache,
                gray,
                registry,
                root_prefix: root_prefix.into(),
                root: Mutex::new(None),
                known: Mutex::new(BTreeSet::new()),
                state: AtomicU8::new(SyncState::Uninitialized as u8),
            }),
        }
    }

    /// Load every section of `module` and start watching for changes.
    ///
    /// Any failure here is returned, since there is no earlier cache to fall
    /// back to. A failed engine moves to `Stopped` and cannot be re-initialized.
    pub fn init(&self, module: &str) -> Result<(), SyncError> {
        if module.is_empty() || module.contains('/') {
            return Err(SyncError::InvalidModule(module.to_string()));
        }
        let claimed = self.inner.state.compare_exchange(
            SyncState::Uninitialized as u8,
            SyncState::Watching as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if claimed.is_err() {
            return Err(SyncError::AlreadyInitialized);
        }

        let started = Instant::now();
        let root = child_path(&self.inner.root_prefix, module);
        *self.inner.lock_root() = Some(root.clone());

        let result = self.inner.load_root(&root);
        match &result {
            Ok(()) => tracing::info!(
                module,
                root = %root,
                sections = self.inner.cache.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Config mirror initialized"
            ),
            Err(e) => {
                self.inner.set_state(SyncState::Stopped);
                tracing::error!(module, root = %root, error = %e, "Config mirror initialization failed");
            }
        }
        result
    }

    /// Stop reacting to notifications. Already armed watches fire into a no-op.
    pub fn shutdown(&self) {
        self.inner.set_state(SyncState::Stopped);
        tracing::info!("Sync engine stopped");
    }

    pub fn state(&self) -> SyncState {
        self.inner.state()
    }

    /// Module root path, once initialized.
    pub fn root(&self) -> Option<String> {
        self.inner.lock_root().clone()
    }

    /// Section nodes currently tracked under the root.
    pub fn known_sections(&self) -> Vec<String> {
        self.inner.lock_known().iter().cloned().collect()
    }

    /// Write `blob` to the node of `section`. Last writer wins; the local cache
    /// updates when the resulting notification arrives.
    pub fn publish(&self, section: &str, blob: &str) -> Result<(), SyncError> {
        let root = self.root().ok_or(SyncError::NotInitialized)?;
        let path = child_path(&root, section);
        self.inner
            .coordinator
            .set_data(&path, blob.as_bytes())
            .map_err(|e| SyncError::remote("set_data", &path, e))?;
        tracing::info!(path = %path, bytes = blob.len(), "Published section");
        Ok(())
    }

    /// Run `payload` through the reload pipeline as if it had been read from
    /// the node named `node`.
    pub fn reload(&self, node: &str, payload: &[u8]) -> ReloadOutcome {
        self.inner.apply(node, payload)
    }
}

impl Inner {
    fn state(&self) -> SyncState {
        SyncState::from(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SyncState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_stopped(&self) -> bool {
        self.state() == SyncState::Stopped
    }

    fn lock_root(&self) -> MutexGuard<'_, Option<String>> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_known(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Watches ---

    fn children_watch(self: &Arc<Self>) -> Watch {
        let weak = Arc::downgrade(self);
        Box::new(move |event| {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.on_children_changed(event);
            }
        })
    }

    fn data_watch(self: &Arc<Self>) -> Watch {
        let weak = Arc::downgrade(self);
        Box::new(move |event| {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.on_data_changed(event);
            }
        })
    }

    fn root_recreated_watch(self: &Arc<Self>) -> Watch {
        let weak = Arc::downgrade(self);
        Box::new(move |event| {
            if let Some(inner) = Weak::upgrade(&weak) {
                inner.on_root_exists_changed(event);
            }
        })
    }

    // --- Loading ---

    /// List the root with a watch and load every child not yet known.
    fn load_root(self: &Arc<Self>, root: &str) -> Result<(), SyncError> {
        let children = self
            .coordinator
            .list_children(root, Some(self.children_watch()))
            .map_err(|e| SyncError::remote("list_children", root, e))?;

        for child in self.claim_new(&children) {
            let path = child_path(root, &child);
            let payload = self
                .coordinator
                .get_data(&path, Some(self.data_watch()))
                .map_err(|e| SyncError::remote("get_data", &path, e))?;
            self.apply(&child, &payload);
        }
        Ok(())
    }

    /// Start tracking the listed names not tracked yet, returning them.
    ///
    /// Listings only ever add. Handlers may run concurrently, and one holding
    /// an older listing must not evict a child that a newer one already armed.
    /// A child leaves the set through its own data watch (see `release`).
    fn claim_new(&self, children: &[String]) -> Vec<String> {
        let mut known = self.lock_known();
        children
            .iter()
            .filter(|name| known.insert((*name).clone()))
            .cloned()
            .collect()
    }

    /// Re-read a tracked child, arming its next data watch.
    fn reload_child(self: &Arc<Self>, root: &str, name: &str) {
        let path = child_path(root, name);
        match self.coordinator.get_data(&path, Some(self.data_watch())) {
            Ok(payload) => {
                self.apply(name, &payload);
            }
            Err(CoordinationError::NoNode(_)) => self.release(root, name),
            Err(e) => {
                self.remote_failure("get_data", &path, e);
                if !self.is_stopped() {
                    // Nothing is armed on the node now; the next listing retries it.
                    self.lock_known().remove(name);
                }
            }
        }
    }

    /// Stop tracking a child whose node is gone and has no watch left.
    ///
    /// A listing that ran before the removal skipped the node as tracked, so
    /// check once more and reclaim it if it already came back.
    fn release(self: &Arc<Self>, root: &str, name: &str) {
        self.lock_known().remove(name);
        tracing::warn!(section = %name, "Section node deleted; keeping its cached entries");

        let path = child_path(root, name);
        match self.coordinator.exists(&path, None) {
            Ok(true) => {
                if self.lock_known().insert(name.to_string()) {
                    tracing::info!(section = %name, "Section node reappeared");
                    self.reload_child(root, name);
                }
            }
            Ok(false) => {}
            Err(e) => self.remote_failure("exists", &path, e),
        }
    }

    // --- Notification handlers ---

    fn on_children_changed(self: &Arc<Self>, event: WatchEvent) {
        if self.is_stopped() {
            return;
        }
        let Some(root) = self.lock_root().clone() else {
            return;
        };

        if event.kind == EventKind::Deleted {
            tracing::error!(root = %root, "Module root deleted; waiting for it to reappear");
            self.watch_root_recreation(&root);
            return;
        }

        let children = match self.coordinator.list_children(&root, Some(self.children_watch())) {
            Ok(children) => children,
            Err(CoordinationError::NoNode(_)) => {
                self.watch_root_recreation(&root);
                return;
            }
            Err(e) => return self.remote_failure("list_children", &root, e),
        };

        for child in self.claim_new(&children) {
            tracing::info!(section = %child, "New section node");
            self.reload_child(&root, &child);
        }
    }

    fn on_data_changed(self: &Arc<Self>, event: WatchEvent) {
        if self.is_stopped() {
            return;
        }
        let Some(root) = self.lock_root().clone() else {
            return;
        };
        // A deleted node may already be back; the re-read finds out and
        // releases the child when it is not.
        self.reload_child(&root, node_name(&event.path));
    }

    fn on_root_exists_changed(self: &Arc<Self>, event: WatchEvent) {
        if self.is_stopped() {
            return;
        }
        if event.kind != EventKind::Created {
            return;
        }
        tracing::info!(root = %event.path, "Module root reappeared");
        self.on_children_changed(WatchEvent::new(EventKind::ChildrenChanged, event.path));
    }

    fn watch_root_recreation(self: &Arc<Self>, root: &str) {
        match self.coordinator.exists(root, Some(self.root_recreated_watch())) {
            Ok(true) => {
                // Reappeared before the check. The exists watch only reacts to
                // creation, so the copy armed here stays inert.
                self.on_children_changed(WatchEvent::new(EventKind::ChildrenChanged, root));
            }
            Ok(false) => {}
            Err(e) => self.remote_failure("exists", root, e),
        }
    }

    fn remote_failure(&self, op: &'static str, path: &str, error: CoordinationError) {
        metrics::record_remote_error(op);
        if error.is_fatal() {
            self.set_state(SyncState::Stopped);
            tracing::error!(
                op,
                path,
                error = %error,
                "Coordination session lost; cache will no longer refresh"
            );
        } else {
            tracing::error!(op, path, error = %error, "Coordination call failed; keeping last good config");
        }
    }

    // --- Reload pipeline ---

    fn apply(&self, node: &str, payload: &[u8]) -> ReloadOutcome {
        let started = Instant::now();
        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(e) => return skip(node, "invalid_utf8", Some(e.to_string())),
        };
        if text.trim().is_empty() {
            return skip(node, "empty", None);
        }

        let parsed = parse(text);
        if parsed.is_empty() {
            return skip(node, "no_sections", None);
        }

        let mut sections: Vec<String> = Vec::with_capacity(parsed.len());
        for (name, entries) in parsed {
            self.cache.replace_section(&name, entries);
            metrics::record_reload(&name);
            sections.push(name);
        }
        self.gray.reset();

        tracing::info!(
            node,
            sections = ?sections,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Config reloaded"
        );

        let mut notify: Vec<&str> = vec![node];
        notify.extend(sections.iter().map(String::as_str).filter(|s| *s != node));
        for section in notify {
            let report = self.registry.dispatch(section);
            if report.failed > 0 {
                tracing::warn!(section, failed = report.failed, notified = report.notified, "Some listeners failed");
            }
        }

        ReloadOutcome::Applied(sections)
    }
}

fn skip(node: &str, reason: &'static str, detail: Option<String>) -> ReloadOutcome {
    metrics::record_reload_skipped(reason);
    tracing::warn!(node, reason, detail = detail.as_deref().unwrap_or(""), "Payload ignored");
    ReloadOutcome::Skipped(reason)
}
