//! Startup: settings to a running mirror.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{BackendKind, Environment, MirrorSettings};
use crate::coordination::{child_path, CoordinationError, Coordinator, FsCoordinator, MemoryCoordinator};
use crate::mirror::ConfigMirror;
use crate::sync::SyncError;

/// Fatal errors while bringing the mirror up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no coordination endpoint configured for environment {0}")]
    NoEndpoint(Environment),

    #[error("cannot reach coordination service: {0}")]
    Coordination(#[from] CoordinationError),

    #[error("initial load failed: {0}")]
    Sync(#[from] SyncError),
}

/// Build the coordination client selected by `settings`.
///
/// The memory backend starts with an empty module root so a local run has
/// something to watch.
pub fn connect(settings: &MirrorSettings) -> Result<Arc<dyn Coordinator>, StartupError> {
    let endpoint = settings
        .endpoint()
        .ok_or(StartupError::NoEndpoint(settings.environment))?;

    tracing::info!(
        environment = %settings.environment,
        endpoint,
        backend = ?settings.backend,
        poll_interval_ms = settings.poll_interval_ms,
        "Connecting to coordination service"
    );

    let coordinator: Arc<dyn Coordinator> = match settings.backend {
        BackendKind::Memory => {
            let tree = MemoryCoordinator::new();
            tree.create(&child_path(&settings.root_prefix, &settings.module), b"")?;
            Arc::new(tree)
        }
        BackendKind::Filesystem => {
            let poll_interval = Duration::from_millis(settings.poll_interval_ms);
            Arc::new(FsCoordinator::open_with(Path::new(endpoint), poll_interval)?)
        }
    };
    Ok(coordinator)
}

/// Connect and perform the initial load.
pub fn start(settings: &MirrorSettings) -> Result<ConfigMirror, StartupError> {
    let coordinator = connect(settings)?;
    start_with(coordinator, settings)
}

/// Perform the initial load against an already built coordinator.
///
/// Local files load first, so a remote section of the same name wins.
pub fn start_with(
    coordinator: Arc<dyn Coordinator>,
    settings: &MirrorSettings,
) -> Result<ConfigMirror, StartupError> {
    let mirror = ConfigMirror::new(coordinator, &settings.root_prefix);
    if !settings.local_files.is_empty() {
        mirror.load_local(&settings.local_files);
    }
    mirror.init(&settings.module)?;
    Ok(mirror)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(backend: BackendKind, endpoint: Option<&str>) -> MirrorSettings {
        let mut settings = MirrorSettings::default();
        settings.module = "billing".into();
        settings.backend = backend;
        settings.endpoints.dev = endpoint.map(str::to_string);
        settings
    }

    #[test]
    fn test_missing_endpoint_is_fatal() {
        let err = start(&settings(BackendKind::Memory, None)).err().unwrap();
        assert!(matches!(err, StartupError::NoEndpoint(Environment::Dev)));
    }

    #[test]
    fn test_memory_backend_starts_empty() {
        let mirror = start(&settings(BackendKind::Memory, Some("local"))).unwrap();
        assert!(mirror.cache().is_empty());
        assert_eq!(mirror.sync().root().as_deref(), Some("/mars/billing"));
    }

    #[test]
    fn test_filesystem_backend_loads_tree() {
        let dir = tempfile::tempdir().unwrap();
        let module_dir = dir.path().join("mars/billing");
        std::fs::create_dir_all(&module_dir).unwrap();
        std::fs::write(module_dir.join("db"), "[db]\nhost=primary\n").unwrap();

        let endpoint = dir.path().to_str().unwrap();
        let mirror = start(&settings(BackendKind::Filesystem, Some(endpoint))).unwrap();
        assert_eq!(mirror.get("db", "host").as_deref(), Some("primary"));
        mirror.shutdown();
    }

    #[test]
    fn test_local_files_load_before_remote() {
        let dir = tempfile::tempdir().unwrap();
        let module_dir = dir.path().join("mars/billing");
        std::fs::create_dir_all(&module_dir).unwrap();
        std::fs::write(module_dir.join("db"), "[db]\nhost=remote\n").unwrap();
        let local_dir = dir.path().join("local");
        std::fs::create_dir_all(&local_dir).unwrap();
        std::fs::write(local_dir.join("db.cfg"), "host=local\nport=5432\n").unwrap();
        std::fs::write(local_dir.join("user_conf.cfg"), "system_user=1001\n").unwrap();

        let endpoint = dir.path().to_str().unwrap();
        let mut settings = settings(BackendKind::Filesystem, Some(endpoint));
        settings.local_files = vec![local_dir.join("db.cfg"), local_dir.join("user_conf.cfg")];

        let mirror = start(&settings).unwrap();
        assert_eq!(mirror.get("db", "host").as_deref(), Some("remote"));
        assert!(mirror.get("db", "port").is_none());
        assert_eq!(mirror.get("user_conf", "system_user").as_deref(), Some("1001"));
        mirror.shutdown();
    }

    #[test]
    fn test_filesystem_missing_module_fails() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().to_str().unwrap();
        let err = start(&settings(BackendKind::Filesystem, Some(endpoint))).err().unwrap();
        assert!(matches!(err, StartupError::Sync(_)));
    }
}
