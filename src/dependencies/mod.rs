//! Dependency catalog and guard.
//!
//! # Data Flow
//! ```text
//! GuardConfig
//!     → catalog.rs (identity → class policy, probe url)
//!     → guard.rs   (call(identity, op) picks the policy and runs the envelope)
//!
//! On reload:
//!     new GuardConfig → new DependencyCatalog → ArcSwap store
//!     (circuits live in the registry and survive the swap)
//! ```

pub mod catalog;
pub mod guard;

pub use catalog::{DependencyCatalog, DependencySpec};
pub use guard::DependencyGuard;
