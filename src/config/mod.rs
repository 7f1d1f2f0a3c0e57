//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, add built-in classes)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → policies become CallPolicy values in the dependency catalog
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the catalog; circuit state is kept
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Invalid values fail at startup, never at the first call

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, DependencyConfig, GuardConfig, MonitorConfig, ObservabilityConfig, PolicyConfig,
};
pub use validation::{validate_config, ValidationError};
