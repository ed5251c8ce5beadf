//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use config_mirror::coordination::{child_path, MemoryCoordinator};
use config_mirror::sync::{ListenerError, ReloadListener};
use config_mirror::ConfigMirror;

pub const PREFIX: &str = "/mars/";
pub const MODULE: &str = "app";
pub const ROOT: &str = "/mars/app";

/// Memory tree holding `/mars/app` with one child node per `(name, blob)`.
pub fn seeded_tree(nodes: &[(&str, &str)]) -> Arc<MemoryCoordinator> {
    let tree = Arc::new(MemoryCoordinator::new());
    tree.create(ROOT, b"").unwrap();
    for (name, blob) in nodes {
        tree.create(&child_path(ROOT, name), blob.as_bytes()).unwrap();
    }
    tree
}

/// Initialized mirror of `app` over `tree`.
pub fn start_mirror(tree: &Arc<MemoryCoordinator>) -> ConfigMirror {
    let mirror = ConfigMirror::new(tree.clone(), PREFIX);
    mirror.init(MODULE).unwrap();
    mirror
}

/// Listener that counts its invocations and optionally fails.
pub struct CountingListener {
    section: String,
    calls: AtomicUsize,
    fail: bool,
}

impl CountingListener {
    pub fn new(section: &str) -> Arc<Self> {
        Arc::new(Self {
            section: section.to_string(),
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing(section: &str) -> Arc<Self> {
        Arc::new(Self {
            section: section.to_string(),
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReloadListener for CountingListener {
    fn watched_section(&self) -> &str {
        &self.section
    }

    fn reload_config(&self) -> Result<(), ListenerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(format!("{} listener refused the reload", self.section).into())
        } else {
            Ok(())
        }
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    check()
}
