//! Health report built from circuit snapshots.

use serde::{Deserialize, Serialize};

use crate::dependencies::DependencyGuard;
use crate::resilience::{CircuitSnapshot, CircuitStatus};

/// Health of one dependency as seen by its circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub identity: String,
    /// Policy class; `None` for identities called without a catalog entry.
    pub class: Option<String>,
    pub status: CircuitStatus,
    pub failure_ratio: f64,
    pub samples: usize,
    pub failures: usize,
    pub opened_at_unix_ms: Option<u64>,
    pub probe_url: Option<String>,
}

impl DependencyHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == CircuitStatus::Closed
    }
}

/// Overall view served by the status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `healthy` when every circuit is closed, `degraded` otherwise.
    pub status: String,
    pub dependencies: Vec<DependencyHealth>,
}

impl HealthReport {
    pub const HEALTHY: &'static str = "healthy";
    pub const DEGRADED: &'static str = "degraded";

    /// Snapshot every circuit known to the guard, sorted by identity.
    pub fn collect(guard: &DependencyGuard) -> Self {
        let dependencies = guard
            .registry()
            .snapshots()
            .into_iter()
            .map(|snapshot| dependency_health(guard, snapshot))
            .collect();
        Self::from_dependencies(dependencies)
    }

    pub fn from_dependencies(dependencies: Vec<DependencyHealth>) -> Self {
        let status = if dependencies.iter().all(DependencyHealth::is_healthy) {
            Self::HEALTHY
        } else {
            Self::DEGRADED
        };
        Self {
            status: status.to_string(),
            dependencies,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == Self::HEALTHY
    }
}

/// Health of a single identity, if a circuit exists for it.
pub fn dependency(guard: &DependencyGuard, identity: &str) -> Option<DependencyHealth> {
    guard
        .status(identity)
        .map(|snapshot| dependency_health(guard, snapshot))
}

fn dependency_health(guard: &DependencyGuard, snapshot: CircuitSnapshot) -> DependencyHealth {
    let catalog = guard.catalog();
    let spec = catalog.dependency(&snapshot.identity);
    DependencyHealth {
        class: spec.map(|s| s.class.clone()),
        probe_url: spec.and_then(|s| s.probe_url.clone()),
        identity: snapshot.identity,
        status: snapshot.status,
        failure_ratio: snapshot.failure_ratio,
        samples: snapshot.samples,
        failures: snapshot.failures,
        opened_at_unix_ms: snapshot.opened_at_unix_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DependencyConfig, GuardConfig, PolicyConfig};
    use crate::resilience::{FailureKind, Retryable};

    #[derive(Debug)]
    struct Down;

    impl Retryable for Down {}

    fn guard() -> DependencyGuard {
        let mut config = GuardConfig::default();
        config.window.min_samples = 1;
        config.policies.insert(
            "fast".into(),
            PolicyConfig {
                max_retries: 0,
                ..PolicyConfig::default()
            },
        );
        for (identity, class) in [("postgres-auth", "fast"), ("redis-cache", "cache")] {
            config.dependencies.push(DependencyConfig {
                identity: identity.into(),
                class: class.into(),
                probe_url: None,
            });
        }
        DependencyGuard::from_config(&config).unwrap()
    }

    #[test]
    fn test_all_closed_is_healthy() {
        let report = HealthReport::collect(&guard());
        assert!(report.is_healthy());
        assert_eq!(report.dependencies.len(), 2);
        assert_eq!(report.dependencies[0].identity, "postgres-auth");
        assert_eq!(report.dependencies[0].class.as_deref(), Some("fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_degrades() {
        let guard = guard();
        let result: Result<(), FailureKind<Down>> =
            guard.call("postgres-auth", || async { Err(Down) }).await;
        assert!(result.is_err());

        let report = HealthReport::collect(&guard);
        assert_eq!(report.status, HealthReport::DEGRADED);
        let entry = dependency(&guard, "postgres-auth").unwrap();
        assert_eq!(entry.status, CircuitStatus::Open);
        assert_eq!(entry.failures, 1);
        assert!(entry.opened_at_unix_ms.is_some());
    }

    #[tokio::test]
    async fn test_uncatalogued_identity_has_no_class() {
        let guard = guard();
        let value: Result<u8, FailureKind<Down>> = guard.call("adhoc", || async { Ok(1) }).await;
        assert_eq!(value.unwrap(), 1);
        let entry = dependency(&guard, "adhoc").unwrap();
        assert_eq!(entry.class, None);
        assert!(dependency(&guard, "missing").is_none());
    }
}
