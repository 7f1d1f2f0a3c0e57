//! Per-service entry point for guarded dependency calls.

use arc_swap::ArcSwap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::schema::GuardConfig;
use crate::config::validation::ValidationError;
use crate::dependencies::catalog::DependencyCatalog;
use crate::resilience::{
    CallPolicy, CircuitRegistry, CircuitSnapshot, Envelope, FailureKind, Retryable,
};

/// Envelope plus the catalog that maps identities to policies.
///
/// Cloning is cheap; clones share the registry and the catalog.
#[derive(Debug, Clone)]
pub struct DependencyGuard {
    envelope: Envelope,
    catalog: Arc<ArcSwap<DependencyCatalog>>,
}

impl DependencyGuard {
    /// Create a guard and register a Closed circuit for every catalog entry,
    /// so health reports list dependencies before their first call.
    pub fn new(registry: Arc<CircuitRegistry>, catalog: DependencyCatalog) -> Self {
        for spec in catalog.dependencies() {
            registry.circuit(&spec.identity);
        }
        Self {
            envelope: Envelope::new(registry),
            catalog: Arc::new(ArcSwap::from_pointee(catalog)),
        }
    }

    /// Build registry and catalog from a configuration.
    pub fn from_config(config: &GuardConfig) -> Result<Self, Vec<ValidationError>> {
        let catalog = DependencyCatalog::from_config(config)?;
        let registry = Arc::new(CircuitRegistry::new(config.window));
        Ok(Self::new(registry, catalog))
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        self.envelope.registry()
    }

    /// Current catalog.
    pub fn catalog(&self) -> Arc<DependencyCatalog> {
        self.catalog.load_full()
    }

    pub fn policy_for(&self, identity: &str) -> Arc<CallPolicy> {
        self.catalog.load().policy_for(identity)
    }

    pub fn status(&self, identity: &str) -> Option<CircuitSnapshot> {
        self.envelope.status(identity)
    }

    /// Run `operation` against `identity` with its configured policy.
    pub async fn call<T, E, F, Fut>(&self, identity: &str, operation: F) -> Result<T, FailureKind<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let policy = self.policy_for(identity);
        self.envelope.execute(identity, &policy, operation).await
    }

    /// Like `call`, aborting when `cancel` fires.
    pub async fn call_with_cancel<T, E, F, Fut>(
        &self,
        identity: &str,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, FailureKind<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let policy = self.policy_for(identity);
        self.envelope
            .execute_with_cancel(identity, &policy, cancel, operation)
            .await
    }

    /// Swap in policies and dependencies from a new configuration.
    ///
    /// Circuit state is kept; the window settings of existing circuits do
    /// not change.
    pub fn reload(&self, config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
        let catalog = DependencyCatalog::from_config(config)?;
        if config.window != self.registry().settings() {
            tracing::warn!("Window settings changed; they apply after restart only");
        }
        for spec in catalog.dependencies() {
            self.registry().circuit(&spec.identity);
        }
        let count = catalog.dependencies().count();
        self.catalog.store(Arc::new(catalog));
        tracing::info!(dependencies = count, "Dependency catalog reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DependencyConfig, PolicyConfig};
    use crate::resilience::CircuitStatus;

    #[derive(Debug)]
    struct Down;

    impl Retryable for Down {}

    fn config() -> GuardConfig {
        let mut config = GuardConfig::default();
        config.window.min_samples = 1;
        config.policies.insert(
            "fast".into(),
            PolicyConfig {
                timeout_ms: 50,
                max_retries: 0,
                backoff_base_ms: 1,
                backoff_cap_ms: 1,
                ..PolicyConfig::default()
            },
        );
        config.dependencies.push(DependencyConfig {
            identity: "postgres-auth".into(),
            class: "fast".into(),
            probe_url: None,
        });
        config
    }

    #[test]
    fn test_circuits_registered_up_front() {
        let guard = DependencyGuard::from_config(&config()).unwrap();
        let snap = guard.status("postgres-auth").unwrap();
        assert_eq!(snap.status, CircuitStatus::Closed);
        assert_eq!(snap.samples, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_uses_class_policy() {
        let guard = DependencyGuard::from_config(&config()).unwrap();
        let result: Result<(), _> = guard.call("postgres-auth", || async { Err(Down) }).await;
        assert!(matches!(result, Err(FailureKind::DependencyFailure { attempts: 1, .. })));
        assert_eq!(guard.status("postgres-auth").unwrap().status, CircuitStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_keeps_circuit_state() {
        let guard = DependencyGuard::from_config(&config()).unwrap();
        let _: Result<(), _> = guard.call("postgres-auth", || async { Err(Down) }).await;

        let mut updated = config();
        updated.policies.get_mut("fast").unwrap().max_retries = 4;
        updated.dependencies.push(DependencyConfig {
            identity: "redis-cache".into(),
            class: "cache".into(),
            probe_url: None,
        });
        guard.reload(&updated).unwrap();

        assert_eq!(guard.policy_for("postgres-auth").max_retries(), 4);
        assert_eq!(guard.status("postgres-auth").unwrap().status, CircuitStatus::Open);
        assert!(guard.status("redis-cache").is_some());
    }

    #[test]
    fn test_reload_rejects_invalid() {
        let guard = DependencyGuard::from_config(&config()).unwrap();
        let mut broken = config();
        broken.window.min_samples = 0;
        assert!(guard.reload(&broken).is_err());
        assert_eq!(guard.policy_for("postgres-auth").max_retries(), 0);
    }
}
