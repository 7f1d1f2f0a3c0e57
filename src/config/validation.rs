//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (dependencies reference existing classes)
//! - Validate value ranges (timeouts > 0, ratios in range, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GuardConfig;
use crate::resilience::policy::PolicyError;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("policy '{class}': {source}")]
    Policy {
        class: String,
        #[source]
        source: PolicyError,
    },

    #[error("window: min_samples ({min_samples}) must be between 1 and size ({size})")]
    Window { size: usize, min_samples: usize },

    #[error("dependency with empty identity")]
    EmptyIdentity,

    #[error("dependency '{0}' is declared more than once")]
    DuplicateIdentity(String),

    #[error("dependency '{identity}' references unknown class '{class}'")]
    UnknownClass { identity: String, class: String },

    #[error("dependency '{identity}' has invalid probe url '{url}': {reason}")]
    InvalidProbeUrl {
        identity: String,
        url: String,
        reason: String,
    },

    #[error("monitor interval must be greater than zero")]
    ZeroMonitorInterval,

    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (class, policy) in &config.policies {
        if let Err(source) = policy.to_policy() {
            errors.push(ValidationError::Policy {
                class: class.clone(),
                source,
            });
        }
    }

    let window = config.window;
    if window.min_samples == 0 || window.min_samples > window.size {
        errors.push(ValidationError::Window {
            size: window.size,
            min_samples: window.min_samples,
        });
    }

    let mut seen = HashSet::new();
    for dep in &config.dependencies {
        if dep.identity.trim().is_empty() {
            errors.push(ValidationError::EmptyIdentity);
            continue;
        }
        if !seen.insert(dep.identity.as_str()) {
            errors.push(ValidationError::DuplicateIdentity(dep.identity.clone()));
        }
        if !config.policies.contains_key(&dep.class) {
            errors.push(ValidationError::UnknownClass {
                identity: dep.identity.clone(),
                class: dep.class.clone(),
            });
        }
        if let Some(url) = &dep.probe_url {
            if let Err(reason) = check_probe_url(url) {
                errors.push(ValidationError::InvalidProbeUrl {
                    identity: dep.identity.clone(),
                    url: url.clone(),
                    reason,
                });
            }
        }
    }

    if config.monitor.enabled && config.monitor.interval_secs == 0 {
        errors.push(ValidationError::ZeroMonitorInterval);
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_probe_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{other}'")),
    }
}
