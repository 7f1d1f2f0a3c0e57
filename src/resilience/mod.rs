//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → envelope.rs (single entry point for every outbound call)
//!     → registry.rs / circuit_breaker.rs (admit, record outcomes, trip)
//!     → timeouts.rs (enforce per-attempt deadline, honor cancellation)
//!     → On failure: retries.rs (is it retryable?) + backoff.rs (how long to wait)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Retries only when the operation classifies its error as retryable
//! - Circuit breaker per dependency identity, never global
//! - Failures are returned as classified `FailureKind` values, never logged
//!   and dropped

pub mod backoff;
pub mod circuit_breaker;
pub mod envelope;
pub mod error;
pub mod policy;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitSnapshot, CircuitStatus, WindowSettings};
pub use envelope::Envelope;
pub use error::FailureKind;
pub use policy::{CallPolicy, PolicyError};
pub use registry::CircuitRegistry;
pub use retries::{HttpCallError, Retryable};
