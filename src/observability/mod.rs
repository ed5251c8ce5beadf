//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every remote failure is logged with its path and operation
//! - Metric helpers are plain functions so call sites stay one line
//! - Without an installed recorder metric calls are no-ops

pub mod logging;
pub mod metrics;
