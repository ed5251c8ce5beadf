//! The assembled mirror: cache, gray rules, listeners and sync engine.

use std::path::Path;
use std::sync::Arc;

use crate::coordination::Coordinator;
use crate::gray::{GrayRuleEngine, Subject};
use crate::observability::metrics;
use crate::store::{load_file, ConfigCache};
use crate::sync::{CallbackRegistry, ReloadListener, SyncEngine, SyncError};

/// One explicitly constructed mirror of a module's configuration.
///
/// Callers pass this (or the pieces it hands out) to whoever needs config;
/// there is no ambient global instance.
pub struct ConfigMirror {
    cache: Arc<ConfigCache>,
    gray: Arc<GrayRuleEngine>,
    registry: Arc<CallbackRegistry>,
    sync: SyncEngine,
}

impl ConfigMirror {
    /// Wire up an uninitialized mirror for modules under `root_prefix`.
    pub fn new(coordinator: Arc<dyn Coordinator>, root_prefix: &str) -> Self {
        let cache = Arc::new(ConfigCache::new());
        let gray = Arc::new(GrayRuleEngine::new(cache.clone()));
        let registry = Arc::new(CallbackRegistry::new());
        let sync = SyncEngine::new(
            coordinator,
            cache.clone(),
            gray.clone(),
            registry.clone(),
            root_prefix,
        );
        Self {
            cache,
            gray,
            registry,
            sync,
        }
    }

    /// Perform the initial load of `module` and start watching it.
    pub fn init(&self, module: &str) -> Result<(), SyncError> {
        self.sync.init(module)
    }

    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    pub fn gray(&self) -> &Arc<GrayRuleEngine> {
        &self.gray
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.cache.get(section, key)
    }

    pub fn is_allowed<'a>(&self, config_name: &str, subject: impl Into<Subject<'a>>) -> bool {
        self.gray.is_allowed(config_name, subject)
    }

    /// Load local config files into the cache, one section per file.
    ///
    /// Unreadable files and files without entries are logged and skipped.
    /// Each loaded section replaces any cached one wholesale, the gray memo is
    /// reset and listeners are notified as for a remote reload. Returns the
    /// sections loaded.
    pub fn load_local<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<String> {
        let mut loaded = Vec::new();
        for path in paths {
            let path: &Path = path.as_ref();
            match load_file(path) {
                Ok((name, entries)) if entries.is_empty() => {
                    metrics::record_reload_skipped("local_empty");
                    tracing::warn!(path = %path.display(), section = %name, "Local config file has no entries");
                }
                Ok((name, entries)) => {
                    self.cache.replace_section(&name, entries);
                    metrics::record_reload(&name);
                    loaded.push(name);
                }
                Err(e) => {
                    metrics::record_reload_skipped("local_unreadable");
                    tracing::error!(path = %path.display(), error = %e, "Local config file not loaded");
                }
            }
        }
        if loaded.is_empty() {
            return loaded;
        }

        self.gray.reset();
        tracing::info!(sections = ?loaded, "Local config loaded");
        for section in &loaded {
            self.registry.dispatch(section);
        }
        loaded
    }

    /// Register `listener` for the section it declares.
    pub fn add_listener(&self, listener: Arc<dyn ReloadListener>) -> bool {
        self.registry.subscribe(listener)
    }

    pub fn shutdown(&self) {
        self.sync.shutdown();
        self.registry.clear();
    }
}
