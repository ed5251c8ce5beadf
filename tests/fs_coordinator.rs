//! Mirror over a directory tree observed with filesystem notifications.

use std::sync::Arc;
use std::time::Duration;

use config_mirror::coordination::FsCoordinator;
use config_mirror::ConfigMirror;

mod common;
use common::{wait_until, CountingListener, MODULE, PREFIX};

const PATIENCE: Duration = Duration::from_secs(10);

fn mirror_over(dir: &std::path::Path) -> (Arc<FsCoordinator>, ConfigMirror) {
    let tree = Arc::new(FsCoordinator::open(dir).unwrap());
    tree.create("/mars/app/db", b"[db]\nhost=primary\n").unwrap();
    let mirror = ConfigMirror::new(tree.clone(), PREFIX);
    mirror.init(MODULE).unwrap();
    (tree, mirror)
}

#[test]
fn test_initial_load_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (_tree, mirror) = mirror_over(dir.path());

    assert_eq!(mirror.get("db", "host").as_deref(), Some("primary"));
    assert_eq!(mirror.sync().known_sections(), vec!["db"]);
}

#[test]
fn test_published_change_is_observed() {
    let dir = tempfile::tempdir().unwrap();
    let (_tree, mirror) = mirror_over(dir.path());
    let listener = CountingListener::new("db");
    mirror.add_listener(listener.clone());

    mirror.sync().publish("db", "[db]\nhost=replica\n").unwrap();

    assert!(wait_until(PATIENCE, || mirror.get("db", "host").as_deref() == Some("replica")));
    assert!(listener.calls() >= 1);
}

#[test]
fn test_external_edit_is_observed() {
    let dir = tempfile::tempdir().unwrap();
    let (tree, mirror) = mirror_over(dir.path());

    std::fs::write(tree.root().join("mars/app/db"), "[db]\nhost=edited\n").unwrap();

    assert!(wait_until(PATIENCE, || mirror.get("db", "host").as_deref() == Some("edited")));
}

#[test]
fn test_new_file_becomes_section() {
    let dir = tempfile::tempdir().unwrap();
    let (tree, mirror) = mirror_over(dir.path());

    tree.create("/mars/app/feature", b"[feature]\nnew_ui=deny;42\n").unwrap();

    assert!(wait_until(PATIENCE, || mirror.is_allowed("feature.new_ui", 42i64)));
    assert!(!mirror.is_allowed("feature.new_ui", 7i64));
    assert!(mirror.sync().known_sections().contains(&"feature".to_string()));
}
