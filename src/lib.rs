//! Dependency guard library: a resilience envelope for outbound calls.

pub mod admin;
pub mod config;
pub mod dependencies;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GuardConfig;
pub use dependencies::DependencyGuard;
pub use lifecycle::Shutdown;
pub use resilience::{CallPolicy, CircuitStatus, Envelope, FailureKind, Retryable};
