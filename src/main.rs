//! Config mirror daemon.
//!
//! Mirrors one module's configuration subtree from the coordination service,
//! logs every reload, and exposes Prometheus metrics when enabled.
//!
//! ```text
//! mirror.toml → load_settings → init_logging / init_metrics
//!             → lifecycle::start (connect + initial load)
//!             → watch until SIGINT/SIGTERM → shutdown
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use config_mirror::config::load_settings;
use config_mirror::lifecycle::{self, signals};
use config_mirror::observability::{logging, metrics};
use config_mirror::store::ConfigCache;
use config_mirror::sync::{ListenerError, ReloadListener};

#[derive(Parser)]
#[command(name = "config-mirror")]
#[command(about = "Mirror a module's configuration from the coordination service", long_about = None)]
struct Args {
    /// Settings file
    #[arg(short, long, default_value = "mirror.toml")]
    settings: PathBuf,
}

/// Logs the new shape of a section whenever it reloads.
///
/// Registered only for the sections cached once startup completes. Sections
/// that appear later are still reported by the sync engine's own
/// `Config reloaded` line, just without a key count.
struct SectionLogger {
    section: String,
    cache: Arc<ConfigCache>,
}

impl ReloadListener for SectionLogger {
    fn watched_section(&self) -> &str {
        &self.section
    }

    fn reload_config(&self) -> Result<(), ListenerError> {
        let keys = self.cache.section(&self.section).map_or(0, |s| s.entries.len());
        tracing::info!(section = %self.section, keys, "Section updated");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let settings = load_settings(&args.settings)?;

    logging::init_logging(&settings.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        settings = %args.settings.display(),
        module = %settings.module,
        environment = %settings.environment,
        "config-mirror starting"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mirror = lifecycle::start(&settings)?;

    for section in mirror.cache().section_names() {
        mirror.add_listener(Arc::new(SectionLogger {
            section,
            cache: mirror.cache().clone(),
        }));
    }

    let signal = signals::wait_for_termination().await?;
    tracing::info!(signal, "Termination signal received");

    mirror.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
