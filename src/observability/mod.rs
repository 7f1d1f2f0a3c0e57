//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Envelope, monitor, status server produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (call counters, attempt counters, circuit state gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with circuit identity as a field
//! - Metric updates are cheap; recording is a no-op until an exporter is installed

pub mod logging;
pub mod metrics;
