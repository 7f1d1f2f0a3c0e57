//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::resilience::circuit_breaker::WindowSettings;
use crate::resilience::policy::{CallPolicy, PolicyError};

/// Built-in dependency classes, always present after loading.
pub const DATABASE_CLASS: &str = "database";
pub const CACHE_CLASS: &str = "cache";
pub const EXTERNAL_AI_CLASS: &str = "external-ai";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Rolling window shared by every circuit.
    pub window: WindowSettings,

    /// Policy per dependency class.
    pub policies: BTreeMap<String, PolicyConfig>,

    /// Known dependencies and the class each one uses.
    pub dependencies: Vec<DependencyConfig>,

    /// Active dependency probing.
    pub monitor: MonitorConfig,

    /// Status HTTP surface.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        let mut config = Self {
            window: WindowSettings::default(),
            policies: BTreeMap::new(),
            dependencies: Vec::new(),
            monitor: MonitorConfig::default(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
        };
        config.fill_builtin_classes();
        config
    }
}

impl GuardConfig {
    /// Add the built-in classes that the file did not override.
    pub fn fill_builtin_classes(&mut self) {
        let builtins = [
            (DATABASE_CLASS, CallPolicy::database()),
            (CACHE_CLASS, CallPolicy::cache()),
            (EXTERNAL_AI_CLASS, CallPolicy::external_ai()),
        ];
        for (class, policy) in builtins {
            self.policies
                .entry(class.to_string())
                .or_insert_with(|| PolicyConfig::from(&policy));
        }
    }

    pub fn dependency(&self, identity: &str) -> Option<&DependencyConfig> {
        self.dependencies.iter().find(|d| d.identity == identity)
    }
}

/// Policy for one dependency class, in config-file units.
///
/// Missing fields fall back to the `database` defaults.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// First backoff delay in milliseconds.
    pub backoff_base_ms: u64,

    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,

    /// Upper bound of the exponential part in milliseconds.
    pub backoff_cap_ms: u64,

    /// Random jitter window in milliseconds.
    pub jitter_ms: u64,

    /// Failure ratio in (0, 1] that opens the circuit.
    pub failure_threshold_ratio: f64,

    /// Milliseconds the circuit stays open before probing.
    pub reset_timeout_ms: u64,

    /// Concurrent probes allowed while half-open.
    pub half_open_probe_count: u32,
}

impl PolicyConfig {
    /// Validate and convert into an immutable policy.
    pub fn to_policy(&self) -> Result<CallPolicy, PolicyError> {
        CallPolicy::new(
            Duration::from_millis(self.timeout_ms),
            self.max_retries,
            Duration::from_millis(self.backoff_base_ms),
            self.backoff_multiplier,
            Duration::from_millis(self.backoff_cap_ms),
            Duration::from_millis(self.jitter_ms),
            self.failure_threshold_ratio,
            Duration::from_millis(self.reset_timeout_ms),
            self.half_open_probe_count,
        )
    }
}

impl From<&CallPolicy> for PolicyConfig {
    fn from(policy: &CallPolicy) -> Self {
        Self {
            timeout_ms: policy.timeout().as_millis() as u64,
            max_retries: policy.max_retries(),
            backoff_base_ms: policy.backoff_base().as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier(),
            backoff_cap_ms: policy.backoff_cap().as_millis() as u64,
            jitter_ms: policy.jitter().as_millis() as u64,
            failure_threshold_ratio: policy.failure_threshold_ratio(),
            reset_timeout_ms: policy.reset_timeout().as_millis() as u64,
            half_open_probe_count: policy.half_open_probe_count(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::from(&CallPolicy::database())
    }
}

/// A dependency the service talks to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DependencyConfig {
    /// Circuit identity (e.g., "postgres-auth", "openrouter-api").
    pub identity: String,

    /// Policy class name.
    pub class: String,

    /// Optional URL probed by the monitor with `GET`.
    #[serde(default)]
    pub probe_url: Option<String>,
}

/// Active dependency monitoring.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Enable periodic probes.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15,
        }
    }
}

/// Status HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the status endpoints.
    pub enabled: bool,

    /// Bind address for the status endpoints.
    pub bind_address: String,

    /// Bearer token required by the dependency endpoints, if set.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
