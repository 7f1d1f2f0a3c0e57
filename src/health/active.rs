//! Active dependency probing.
//!
//! # Responsibilities
//! - Periodically probe dependencies that declare a `probe_url`
//! - Feed the outcome into the dependency's circuit via the envelope

use futures_util::future::join_all;
use std::time::{Duration, Instant};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::dependencies::{DependencyGuard, DependencySpec};
use crate::observability::metrics;
use crate::resilience::{FailureKind, HttpCallError};

pub struct DependencyMonitor {
    guard: DependencyGuard,
    config: MonitorConfig,
    client: reqwest::Client,
}

impl DependencyMonitor {
    /// Fails when the HTTP client cannot be built (e.g. no TLS backend).
    pub fn new(guard: DependencyGuard, config: MonitorConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dependency-guard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            guard,
            config,
            client,
        })
    }

    pub async fn run(self, shutdown: CancellationToken) {
        if !self.config.enabled {
            tracing::info!("Dependency monitor disabled");
            return;
        }

        tracing::info!(interval = self.config.interval_secs, "Dependency monitor starting");

        let interval = Duration::from_secs(self.config.interval_secs);
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Dependency monitor received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.check_all(&shutdown).await;
                }
            }
        }
    }

    /// Probe every dependency once. Returns `(identity, healthy)` pairs.
    pub async fn check_all(&self, shutdown: &CancellationToken) -> Vec<(String, bool)> {
        // The catalog may be swapped by a reload between ticks.
        let targets = self.guard.catalog().probe_targets();
        join_all(targets.iter().map(|target| self.check(target, shutdown))).await
    }

    async fn check(&self, target: &DependencySpec, shutdown: &CancellationToken) -> (String, bool) {
        let Some(url) = target.probe_url.as_deref() else {
            return (target.identity.clone(), true);
        };

        let client = &self.client;
        let start = Instant::now();
        let result = self
            .guard
            .call_with_cancel(&target.identity, shutdown, move || async move {
                let response = client.get(url).send().await?;
                HttpCallError::check(response).map(|_| ())
            })
            .await;

        let healthy = match result {
            Ok(()) => true,
            Err(FailureKind::CircuitOpen { .. }) => {
                tracing::debug!(circuit = %target.identity, "Probe skipped: circuit open");
                false
            }
            Err(FailureKind::Cancelled { .. }) => return (target.identity.clone(), false),
            Err(e) => {
                tracing::warn!(circuit = %target.identity, url, error = %e, "Dependency probe failed");
                false
            }
        };

        metrics::record_probe(&target.identity, healthy, start);
        (target.identity.clone(), healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DependencyConfig, GuardConfig};

    #[tokio::test]
    async fn test_targets_without_probe_url_are_skipped() {
        let mut config = GuardConfig::default();
        config.dependencies.push(DependencyConfig {
            identity: "postgres-auth".into(),
            class: "database".into(),
            probe_url: None,
        });
        let guard = DependencyGuard::from_config(&config).unwrap();

        let monitor = DependencyMonitor::new(guard, MonitorConfig::default()).unwrap();
        assert!(monitor.check_all(&CancellationToken::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_monitor_returns_immediately() {
        let guard = DependencyGuard::from_config(&GuardConfig::default()).unwrap();
        let config = MonitorConfig {
            enabled: false,
            interval_secs: 1,
        };
        let monitor = DependencyMonitor::new(guard, config).unwrap();
        // Never cancelled: only the disabled check lets this finish.
        monitor.run(CancellationToken::new()).await;
    }
}
