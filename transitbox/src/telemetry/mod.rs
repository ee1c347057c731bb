//! Ingestion telemetry for observability and display.
//!
//! Lock-free atomic counters updated by the ingestion engine, copied into a
//! [`TelemetrySnapshot`] whenever a view wants to show them.
//!
//! ```text
//! FeedIngestionEngine ─────► IngestionMetrics ─────► TelemetrySnapshot ─────► Views
//!                           (atomic counters)       (point-in-time copy)      (CLI, etc.)
//! ```
//!
//! # Example
//!
//! ```
//! use transitbox::telemetry::IngestionMetrics;
//!
//! let metrics = IngestionMetrics::new();
//! metrics.cycle_started();
//! metrics.cycle_completed(42, 1_024, 85);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.cycles_completed, 1);
//! assert_eq!(snapshot.vehicles_last_cycle, 42);
//! ```

mod metrics;
mod snapshot;

pub use metrics::IngestionMetrics;
pub use snapshot::TelemetrySnapshot;
