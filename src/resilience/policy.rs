//! Call policies.
//!
//! A `CallPolicy` is the immutable resilience configuration for one class of
//! dependency (database, cache, external AI API). Construction validates every
//! field, so a policy that exists is always usable by the envelope.

use std::time::Duration;
use thiserror::Error;

/// Errors raised when a policy is constructed with unusable values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("backoff multiplier must be a finite value >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("backoff cap {cap:?} is smaller than backoff base {base:?}")]
    CapBelowBase { base: Duration, cap: Duration },

    #[error("failure threshold ratio must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("reset timeout must be greater than zero")]
    ZeroResetTimeout,

    #[error("half-open probe count must be at least 1")]
    ZeroProbeCount,
}

/// Immutable resilience policy for a dependency class.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
    backoff_multiplier: f64,
    backoff_cap: Duration,
    jitter: Duration,
    failure_threshold_ratio: f64,
    reset_timeout: Duration,
    half_open_probe_count: u32,
}

impl CallPolicy {
    /// Build a validated policy.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timeout: Duration,
        max_retries: u32,
        backoff_base: Duration,
        backoff_multiplier: f64,
        backoff_cap: Duration,
        jitter: Duration,
        failure_threshold_ratio: f64,
        reset_timeout: Duration,
        half_open_probe_count: u32,
    ) -> Result<Self, PolicyError> {
        if timeout.is_zero() {
            return Err(PolicyError::ZeroTimeout);
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(backoff_multiplier));
        }
        if backoff_cap < backoff_base {
            return Err(PolicyError::CapBelowBase {
                base: backoff_base,
                cap: backoff_cap,
            });
        }
        // NaN fails both comparisons, so test for the accepted range instead.
        if !(failure_threshold_ratio > 0.0 && failure_threshold_ratio <= 1.0) {
            return Err(PolicyError::InvalidThreshold(failure_threshold_ratio));
        }
        if reset_timeout.is_zero() {
            return Err(PolicyError::ZeroResetTimeout);
        }
        if half_open_probe_count == 0 {
            return Err(PolicyError::ZeroProbeCount);
        }

        Ok(Self {
            timeout,
            max_retries,
            backoff_base,
            backoff_multiplier,
            backoff_cap,
            jitter,
            failure_threshold_ratio,
            reset_timeout,
            half_open_probe_count,
        })
    }

    /// Defaults for relational database calls.
    pub fn database() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            backoff_cap: Duration::from_secs(30),
            jitter: Duration::ZERO,
            failure_threshold_ratio: 0.5,
            reset_timeout: Duration::from_secs(30),
            half_open_probe_count: 1,
        }
    }

    /// Defaults for cache calls.
    pub fn cache() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            backoff_cap: Duration::from_secs(10),
            jitter: Duration::ZERO,
            failure_threshold_ratio: 0.5,
            reset_timeout: Duration::from_secs(15),
            half_open_probe_count: 1,
        }
    }

    /// Defaults for third-party AI / vector-search HTTP APIs.
    pub fn external_ai() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            max_retries: 5,
            backoff_base: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            backoff_cap: Duration::from_secs(16),
            jitter: Duration::from_secs(1),
            failure_threshold_ratio: 0.4,
            reset_timeout: Duration::from_secs(60),
            half_open_probe_count: 5,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn backoff_cap(&self) -> Duration {
        self.backoff_cap
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    pub fn failure_threshold_ratio(&self) -> f64 {
        self.failure_threshold_ratio
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    pub fn half_open_probe_count(&self) -> u32 {
        self.half_open_probe_count
    }

    /// Total number of invocations a Closed circuit allows per call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::database()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(threshold: f64, probes: u32) -> Result<CallPolicy, PolicyError> {
        CallPolicy::new(
            Duration::from_millis(100),
            2,
            Duration::from_millis(10),
            2.0,
            Duration::from_millis(100),
            Duration::ZERO,
            threshold,
            Duration::from_millis(200),
            probes,
        )
    }

    #[test]
    fn test_valid_policy() {
        let policy = build(0.5, 1).unwrap();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_threshold_bounds() {
        assert_eq!(build(0.0, 1), Err(PolicyError::InvalidThreshold(0.0)));
        assert!(build(1.0, 1).is_ok());
        assert!(matches!(build(1.5, 1), Err(PolicyError::InvalidThreshold(_))));
        assert!(matches!(build(f64::NAN, 1), Err(PolicyError::InvalidThreshold(_))));
    }

    #[test]
    fn test_zero_probes_rejected() {
        assert_eq!(build(0.5, 0), Err(PolicyError::ZeroProbeCount));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = CallPolicy::new(
            Duration::ZERO,
            0,
            Duration::ZERO,
            1.0,
            Duration::ZERO,
            Duration::ZERO,
            0.5,
            Duration::from_secs(1),
            1,
        )
        .unwrap_err();
        assert_eq!(err, PolicyError::ZeroTimeout);
    }

    #[test]
    fn test_cap_below_base_rejected() {
        let err = CallPolicy::new(
            Duration::from_secs(1),
            1,
            Duration::from_secs(2),
            2.0,
            Duration::from_secs(1),
            Duration::ZERO,
            0.5,
            Duration::from_secs(1),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::CapBelowBase { .. }));
    }

    #[test]
    fn test_builtin_classes() {
        let ai = CallPolicy::external_ai();
        assert_eq!(ai.max_retries(), 5);
        assert_eq!(ai.backoff_cap(), Duration::from_secs(16));
        assert_eq!(ai.half_open_probe_count(), 5);

        assert_eq!(CallPolicy::cache().timeout(), Duration::from_secs(2));
        assert_eq!(CallPolicy::default(), CallPolicy::database());
    }
}
