//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Session / RequestLifecycle produce:
//!     → logging.rs (structured log events, subscriber setup)
//!     → metrics.rs (Telemetry seam; counters, gauges, histograms)
//!     → tracing.rs (per-lifecycle spans with request ids)
//!
//! Consumers:
//!     → stderr (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request id flows through every event of a lifecycle
//! - Metrics are cheap (atomic increments in the recorder)
//! - Without an installed recorder, metric calls are no-ops

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use metrics::{MetricsTelemetry, NoopTelemetry, PeerLabels, RequestOutcome, Telemetry};
