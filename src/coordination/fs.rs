//! Directory-backed coordination tree.
//!
//! # Responsibilities
//! - Map node paths onto a directory (`/mars/app/db` → `<root>/mars/app/db`)
//! - Files are leaf nodes carrying data, directories are inner nodes
//! - Translate filesystem notifications into one-shot watch events
//!
//! # Design Decisions
//! - Reads happen while the watch table is locked, and the notify thread takes
//!   the same lock before firing. A change that races a read fires the freshly
//!   armed watch instead of slipping through.
//! - Writes go to a hidden temp file that is renamed over the target, so a
//!   reader never sees a half written payload. Dot files are not nodes.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind as FsEventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::coordination::types::{
    CoordinationError, CoordinationResult, EventKind, Watch, WatchEvent,
};
use crate::coordination::{node_name, parent_path, Coordinator};

#[derive(Default)]
struct WatchTable {
    data: HashMap<String, Vec<Watch>>,
    children: HashMap<String, Vec<Watch>>,
}

struct Shared {
    root: PathBuf,
    watches: Mutex<WatchTable>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WatchTable> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn to_fs(&self, path: &str) -> CoordinationResult<PathBuf> {
        if !path.starts_with('/') {
            return Err(CoordinationError::InvalidPath(path.to_string()));
        }
        let relative = Path::new(path.trim_start_matches('/'));
        let clean = relative.components().all(|c| match c {
            Component::Normal(part) => !part.to_string_lossy().starts_with('.'),
            _ => false,
        });
        if !clean {
            return Err(CoordinationError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn to_node(&self, fs_path: &Path) -> Option<String> {
        let relative = fs_path.strip_prefix(&self.root).ok()?;
        let mut node = String::new();
        for component in relative.components() {
            let part = component.as_os_str().to_str()?;
            if part.starts_with('.') {
                return None;
            }
            node.push('/');
            node.push_str(part);
        }
        if node.is_empty() {
            node.push('/');
        }
        Some(node)
    }

    fn handle(&self, event: Event) {
        let mut fired: Vec<(Watch, WatchEvent)> = Vec::new();
        {
            let mut table = self.lock();
            for fs_path in &event.paths {
                let Some(node) = self.to_node(fs_path) else {
                    continue;
                };
                let parent = parent_path(&node).to_string();
                match event.kind {
                    FsEventKind::Create(_) => {
                        drain(&mut table.data, &node, EventKind::Created, &mut fired);
                        drain(&mut table.children, &parent, EventKind::ChildrenChanged, &mut fired);
                    }
                    FsEventKind::Remove(_) => {
                        drain(&mut table.data, &node, EventKind::Deleted, &mut fired);
                        drain(&mut table.children, &node, EventKind::Deleted, &mut fired);
                        drain(&mut table.children, &parent, EventKind::ChildrenChanged, &mut fired);
                    }
                    FsEventKind::Modify(ModifyKind::Name(_)) => {
                        if fs_path.exists() {
                            drain(&mut table.data, &node, EventKind::DataChanged, &mut fired);
                        } else {
                            drain(&mut table.data, &node, EventKind::Deleted, &mut fired);
                        }
                        drain(&mut table.children, &parent, EventKind::ChildrenChanged, &mut fired);
                    }
                    FsEventKind::Modify(_) => {
                        if fs_path.is_file() {
                            drain(&mut table.data, &node, EventKind::DataChanged, &mut fired);
                        }
                    }
                    _ => {}
                }
            }
        }
        for (watch, event) in fired {
            tracing::debug!(event = %event, "Filesystem change delivered");
            watch(event);
        }
    }
}

fn drain(
    map: &mut HashMap<String, Vec<Watch>>,
    node: &str,
    kind: EventKind,
    fired: &mut Vec<(Watch, WatchEvent)>,
) {
    if let Some(watches) = map.remove(node) {
        fired.extend(watches.into_iter().map(|w| (w, WatchEvent::new(kind, node))));
    }
}

fn io_error(path: &str, source: std::io::Error) -> CoordinationError {
    if source.kind() == ErrorKind::NotFound {
        CoordinationError::NoNode(path.to_string())
    } else {
        CoordinationError::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Rescan interval used when the platform watcher falls back to polling.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Coordination tree stored in a local directory and observed through `notify`.
pub struct FsCoordinator {
    shared: Arc<Shared>,
    poll_interval: Duration,
    _watcher: RecommendedWatcher,
}

impl FsCoordinator {
    /// Open (creating if needed) the directory `root` and start watching it.
    pub fn open(root: &Path) -> CoordinationResult<Self> {
        Self::open_with(root, DEFAULT_POLL_INTERVAL)
    }

    /// Like [`open`](Self::open) with an explicit polling fallback interval.
    pub fn open_with(root: &Path, poll_interval: Duration) -> CoordinationResult<Self> {
        let display = root.display().to_string();
        fs::create_dir_all(root).map_err(|e| io_error(&display, e))?;
        let root = fs::canonicalize(root).map_err(|e| io_error(&display, e))?;

        let shared = Arc::new(Shared {
            root: root.clone(),
            watches: Mutex::new(WatchTable::default()),
        });

        let handler_shared = shared.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => handler_shared.handle(event),
                Err(e) => tracing::error!(error = %e, "Filesystem watch error"),
            },
            Config::default().with_poll_interval(poll_interval),
        )
        .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;

        tracing::info!(
            root = %root.display(),
            poll_interval_ms = poll_interval.as_millis() as u64,
            "Filesystem coordinator started"
        );
        Ok(Self {
            shared,
            poll_interval,
            _watcher: watcher,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Directory backing the tree.
    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Create a leaf node (and missing parent directories) holding `data`.
    pub fn create(&self, path: &str, data: &[u8]) -> CoordinationResult<()> {
        let target = self.shared.to_fs(path)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| io_error(path, e))?;
        }
        write_atomically(path, &target, data)
    }
}

impl Coordinator for FsCoordinator {
    fn list_children(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<Vec<String>> {
        let dir = self.shared.to_fs(path)?;
        let mut table = self.shared.lock();

        let children = if dir.is_file() {
            Vec::new()
        } else {
            let mut names = Vec::new();
            for entry in fs::read_dir(&dir).map_err(|e| io_error(path, e))? {
                let entry = entry.map_err(|e| io_error(path, e))?;
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with('.') {
                        names.push(name.to_string());
                    }
                }
            }
            names.sort();
            names
        };

        if let Some(watch) = watch {
            table.children.entry(path.to_string()).or_default().push(watch);
        }
        Ok(children)
    }

    fn exists(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<bool> {
        let target = self.shared.to_fs(path)?;
        let mut table = self.shared.lock();
        let exists = target.exists();
        if let Some(watch) = watch {
            table.data.entry(path.to_string()).or_default().push(watch);
        }
        Ok(exists)
    }

    fn get_data(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<Vec<u8>> {
        let target = self.shared.to_fs(path)?;
        let mut table = self.shared.lock();
        let data = if target.is_dir() {
            Vec::new()
        } else {
            fs::read(&target).map_err(|e| io_error(path, e))?
        };
        if let Some(watch) = watch {
            table.data.entry(path.to_string()).or_default().push(watch);
        }
        Ok(data)
    }

    fn set_data(&self, path: &str, data: &[u8]) -> CoordinationResult<()> {
        let target = self.shared.to_fs(path)?;
        if !target.is_file() {
            return Err(CoordinationError::NoNode(path.to_string()));
        }
        write_atomically(path, &target, data)
    }
}

fn write_atomically(path: &str, target: &Path, data: &[u8]) -> CoordinationResult<()> {
    let name = node_name(path);
    let temp = target.with_file_name(format!(".{}.tmp", name));
    fs::write(&temp, data).map_err(|e| io_error(path, e))?;
    fs::rename(&temp, target).map_err(|e| io_error(path, e))
}
