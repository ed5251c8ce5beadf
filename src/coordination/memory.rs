//! In-process coordination tree.
//!
//! # Responsibilities
//! - Hold a hierarchical tree of nodes with byte payloads
//! - Arm one-shot watches atomically with the read that requests them
//! - Fire watches on create, delete and data change
//! - Simulate session loss
//!
//! Fired watches are drained while the tree lock is held and invoked after it
//! is released, on the thread that performed the mutation. A watch callback
//! can therefore call back into the tree without deadlocking.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::coordination::types::{
    CoordinationError, CoordinationResult, EventKind, Watch, WatchEvent,
};
use crate::coordination::{parent_path, Coordinator};

#[derive(Default)]
struct Tree {
    /// Node path -> payload. The root `/` always exists implicitly.
    nodes: BTreeMap<String, Vec<u8>>,
    /// Watches armed by `get_data` and `exists`.
    data_watches: HashMap<String, Vec<Watch>>,
    /// Watches armed by `list_children`.
    child_watches: HashMap<String, Vec<Watch>>,
    expired: bool,
}

impl Tree {
    fn contains(&self, path: &str) -> bool {
        path == "/" || self.nodes.contains_key(path)
    }

    fn children(&self, path: &str) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|k| parent_path(k) == path && k.as_str() != path)
            .map(|k| crate::coordination::node_name(k).to_string())
            .collect()
    }

    fn drain(
        map: &mut HashMap<String, Vec<Watch>>,
        path: &str,
        kind: EventKind,
        fired: &mut Vec<(Watch, WatchEvent)>,
    ) {
        if let Some(watches) = map.remove(path) {
            for watch in watches {
                fired.push((watch, WatchEvent::new(kind, path)));
            }
        }
    }

    fn check_session(&self) -> CoordinationResult<()> {
        if self.expired {
            Err(CoordinationError::SessionExpired)
        } else {
            Ok(())
        }
    }
}

/// Coordination service held entirely in memory.
#[derive(Default)]
pub struct MemoryCoordinator {
    tree: Mutex<Tree>,
}

impl MemoryCoordinator {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(fired: Vec<(Watch, WatchEvent)>) {
        for (watch, event) in fired {
            tracing::trace!(event = %event, "Firing watch");
            watch(event);
        }
    }

    /// Create `path` with `data`, creating missing ancestors with empty payloads.
    ///
    /// Creating an existing node overwrites its payload like `set_data`.
    pub fn create(&self, path: &str, data: &[u8]) -> CoordinationResult<()> {
        validate_path(path)?;
        let mut fired = Vec::new();
        {
            let mut tree = self.lock();
            tree.check_session()?;

            if tree.contains(path) {
                tree.nodes.insert(path.to_string(), data.to_vec());
                Tree::drain(&mut tree.data_watches, path, EventKind::DataChanged, &mut fired);
            } else {
                let mut missing = vec![path.to_string()];
                let mut cursor = parent_path(path);
                while !tree.contains(cursor) {
                    missing.push(cursor.to_string());
                    cursor = parent_path(cursor);
                }
                for node in missing.iter().rev() {
                    let payload = if node == path { data.to_vec() } else { Vec::new() };
                    tree.nodes.insert(node.clone(), payload);
                    Tree::drain(&mut tree.data_watches, node, EventKind::Created, &mut fired);
                    let parent = parent_path(node).to_string();
                    Tree::drain(&mut tree.child_watches, &parent, EventKind::ChildrenChanged, &mut fired);
                }
            }
        }
        Self::fire(fired);
        Ok(())
    }

    /// Delete `path` and everything below it.
    pub fn delete(&self, path: &str) -> CoordinationResult<()> {
        validate_path(path)?;
        let mut fired = Vec::new();
        {
            let mut tree = self.lock();
            tree.check_session()?;
            if !tree.nodes.contains_key(path) {
                return Err(CoordinationError::NoNode(path.to_string()));
            }

            let prefix = format!("{}/", path);
            let doomed: Vec<String> = tree
                .nodes
                .keys()
                .filter(|k| k.as_str() == path || k.starts_with(&prefix))
                .cloned()
                .collect();
            for node in &doomed {
                tree.nodes.remove(node);
                Tree::drain(&mut tree.data_watches, node, EventKind::Deleted, &mut fired);
                Tree::drain(&mut tree.child_watches, node, EventKind::Deleted, &mut fired);
            }
            let parent = parent_path(path).to_string();
            Tree::drain(&mut tree.child_watches, &parent, EventKind::ChildrenChanged, &mut fired);
        }
        Self::fire(fired);
        Ok(())
    }

    /// Drop the session. Every later call fails with `SessionExpired`.
    ///
    /// Outstanding watches fire once more so their owners observe the loss on
    /// the re-read, the way a real client wakes its watchers on expiry.
    pub fn expire_session(&self) {
        let mut fired = Vec::new();
        {
            let mut tree = self.lock();
            tree.expired = true;
            let data: Vec<String> = tree.data_watches.keys().cloned().collect();
            for path in data {
                Tree::drain(&mut tree.data_watches, &path, EventKind::DataChanged, &mut fired);
            }
            let children: Vec<String> = tree.child_watches.keys().cloned().collect();
            for path in children {
                Tree::drain(&mut tree.child_watches, &path, EventKind::ChildrenChanged, &mut fired);
            }
        }
        tracing::warn!(watches = fired.len(), "Memory coordinator session expired");
        Self::fire(fired);
    }

    /// Number of armed data watches on `path`.
    pub fn data_watch_count(&self, path: &str) -> usize {
        self.lock().data_watches.get(path).map_or(0, Vec::len)
    }

    /// Number of armed children watches on `path`.
    pub fn child_watch_count(&self, path: &str) -> usize {
        self.lock().child_watches.get(path).map_or(0, Vec::len)
    }
}

impl Coordinator for MemoryCoordinator {
    fn list_children(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<Vec<String>> {
        validate_path(path)?;
        let mut tree = self.lock();
        tree.check_session()?;
        if !tree.contains(path) {
            return Err(CoordinationError::NoNode(path.to_string()));
        }
        let children = tree.children(path);
        if let Some(watch) = watch {
            tree.child_watches.entry(path.to_string()).or_default().push(watch);
        }
        Ok(children)
    }

    fn exists(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<bool> {
        validate_path(path)?;
        let mut tree = self.lock();
        tree.check_session()?;
        let exists = tree.contains(path);
        if let Some(watch) = watch {
            tree.data_watches.entry(path.to_string()).or_default().push(watch);
        }
        Ok(exists)
    }

    fn get_data(&self, path: &str, watch: Option<Watch>) -> CoordinationResult<Vec<u8>> {
        validate_path(path)?;
        let mut tree = self.lock();
        tree.check_session()?;
        let data = match tree.nodes.get(path) {
            Some(data) => data.clone(),
            None if path == "/" => Vec::new(),
            None => return Err(CoordinationError::NoNode(path.to_string())),
        };
        if let Some(watch) = watch {
            tree.data_watches.entry(path.to_string()).or_default().push(watch);
        }
        Ok(data)
    }

    fn set_data(&self, path: &str, data: &[u8]) -> CoordinationResult<()> {
        validate_path(path)?;
        let mut fired = Vec::new();
        {
            let mut tree = self.lock();
            tree.check_session()?;
            match tree.nodes.get_mut(path) {
                Some(slot) => *slot = data.to_vec(),
                None => return Err(CoordinationError::NoNode(path.to_string())),
            }
            Tree::drain(&mut tree.data_watches, path, EventKind::DataChanged, &mut fired);
        }
        Self::fire(fired);
        Ok(())
    }
}

fn validate_path(path: &str) -> CoordinationResult<()> {
    let valid = path.starts_with('/')
        && (path == "/" || !path.ends_with('/'))
        && !path.contains("//");
    if valid {
        Ok(())
    } else {
        Err(CoordinationError::InvalidPath(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_watch(counter: &Arc<AtomicUsize>) -> Watch {
        let counter = counter.clone();
        Box::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_create_and_read() {
        let tree = MemoryCoordinator::new();
        tree.create("/mars/app/db", b"[db]\nhost=a").unwrap();

        assert_eq!(tree.list_children("/mars/app", None).unwrap(), vec!["db"]);
        assert_eq!(tree.get_data("/mars/app/db", None).unwrap(), b"[db]\nhost=a");
        assert!(tree.exists("/mars", None).unwrap());
        assert!(!tree.exists("/other", None).unwrap());
    }

    #[test]
    fn test_watch_fires_once() {
        let tree = MemoryCoordinator::new();
        tree.create("/mars/app/db", b"v1").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        tree.get_data("/mars/app/db", Some(counting_watch(&fired))).unwrap();
        assert_eq!(tree.data_watch_count("/mars/app/db"), 1);

        tree.set_data("/mars/app/db", b"v2").unwrap();
        tree.set_data("/mars/app/db", b"v3").unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(tree.data_watch_count("/mars/app/db"), 0);
    }

    #[test]
    fn test_children_watch_on_create_and_delete() {
        let tree = MemoryCoordinator::new();
        tree.create("/mars/app", b"").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        tree.list_children("/mars/app", Some(counting_watch(&fired))).unwrap();
        tree.create("/mars/app/db", b"x").unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tree.list_children("/mars/app", Some(counting_watch(&fired))).unwrap();
        tree.delete("/mars/app/db").unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(tree.list_children("/mars/app", None).unwrap().is_empty());
    }

    #[test]
    fn test_watch_can_reenter_tree() {
        let tree = Arc::new(MemoryCoordinator::new());
        tree.create("/a", b"1").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (t, s) = (tree.clone(), seen.clone());
        tree.get_data(
            "/a",
            Some(Box::new(move |event| {
                let data = t.get_data(&event.path, None).unwrap();
                s.lock().unwrap().push(data);
            })),
        )
        .unwrap();

        tree.set_data("/a", b"2").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![b"2".to_vec()]);
    }

    #[test]
    fn test_missing_node_does_not_arm() {
        let tree = MemoryCoordinator::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let err = tree.get_data("/missing", Some(counting_watch(&fired))).unwrap_err();
        assert!(matches!(err, CoordinationError::NoNode(_)));
        assert_eq!(tree.data_watch_count("/missing"), 0);
        assert!(tree.set_data("/missing", b"x").is_err());
    }

    #[test]
    fn test_expired_session() {
        let tree = MemoryCoordinator::new();
        tree.create("/a", b"1").unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        tree.get_data("/a", Some(counting_watch(&fired))).unwrap();

        tree.expire_session();
        assert!(matches!(tree.get_data("/a", None), Err(CoordinationError::SessionExpired)));
        assert!(matches!(tree.set_data("/a", b"2"), Err(CoordinationError::SessionExpired)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(tree.data_watch_count("/a"), 0);
    }

    #[test]
    fn test_invalid_paths() {
        let tree = MemoryCoordinator::new();
        assert!(matches!(tree.get_data("relative", None), Err(CoordinationError::InvalidPath(_))));
        assert!(matches!(tree.get_data("/a//b", None), Err(CoordinationError::InvalidPath(_))));
        assert!(matches!(tree.get_data("/a/", None), Err(CoordinationError::InvalidPath(_))));
    }
}
