//! Dependency health subsystem.
//!
//! # Data Flow
//! ```text
//! Active probing (active.rs):
//!     Periodic timer
//!     → GET probe_url of each dependency, through the envelope
//!     → circuits record the outcome like any other call
//!
//! Reporting (report.rs):
//!     Circuit snapshots + catalog
//!     → DependencyHealth per identity
//!     → HealthReport (healthy / degraded)
//! ```
//!
//! # Design Decisions
//! - Probes go through the same circuits as real traffic, so there is one
//!   source of truth for dependency health
//! - An open circuit short-circuits its probe; the half-open probe is what
//!   eventually closes it
//! - Health state is per dependency identity

pub mod active;
pub mod report;

pub use active::DependencyMonitor;
pub use report::{DependencyHealth, HealthReport};
