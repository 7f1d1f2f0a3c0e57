//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the dependency guard from a validated configuration
//! - Start background tasks (config watcher, dependency monitor)
//! - Bind the status listener last

use notify::RecommendedWatcher;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admin::{self, AdminState};
use crate::config::schema::GuardConfig;
use crate::config::validation::ValidationError;
use crate::config::watcher::ConfigWatcher;
use crate::config::ConfigError;
use crate::dependencies::DependencyGuard;
use crate::health::DependencyMonitor;
use crate::lifecycle::shutdown::Shutdown;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind status server on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to build probe client: {0}")]
    ProbeClient(#[from] reqwest::Error),
}

impl From<Vec<ValidationError>> for StartupError {
    fn from(errors: Vec<ValidationError>) -> Self {
        StartupError::Config(ConfigError::Validation(errors))
    }
}

/// Handles of a started service.
pub struct Running {
    pub guard: DependencyGuard,
    /// Bound address of the status server, if enabled.
    pub admin_address: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl Running {
    /// Wait for every background task to finish. Call after triggering
    /// shutdown.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task panicked");
            }
        }
    }
}

/// Start the guard and its background tasks.
///
/// When `config_path` is given the file is watched and valid changes are
/// applied with `DependencyGuard::reload`.
pub async fn start(
    config: &GuardConfig,
    config_path: Option<&Path>,
    shutdown: &Shutdown,
) -> Result<Running, StartupError> {
    let guard = DependencyGuard::from_config(config)?;
    tracing::info!(
        dependencies = config.dependencies.len(),
        classes = config.policies.len(),
        "Dependency guard initialized"
    );

    let mut tasks = Vec::new();

    let watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tasks.push(tokio::spawn(apply_reloads(
                guard.clone(),
                updates,
                shutdown.subscribe(),
            )));
            Some(handle)
        }
        None => None,
    };

    let monitor = DependencyMonitor::new(guard.clone(), config.monitor.clone())?;
    tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));

    let mut admin_address = None;
    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(|source| StartupError::Bind {
                address: config.admin.bind_address.clone(),
                source,
            })?;
        admin_address = listener.local_addr().ok();

        let state = AdminState::new(guard.clone(), config.admin.api_key.clone());
        let token = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, token).await {
                tracing::error!(error = %e, "Status server error");
            }
        }));
    }

    Ok(Running {
        guard,
        admin_address,
        tasks,
        _watcher: watcher,
    })
}

async fn apply_reloads(
    guard: DependencyGuard,
    mut updates: mpsc::UnboundedReceiver<GuardConfig>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            update = updates.recv() => {
                let Some(config) = update else { break };
                if let Err(errors) = guard.reload(&config) {
                    for error in errors {
                        tracing::error!(error = %error, "Rejected config reload");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GuardConfig {
        let mut config = GuardConfig::default();
        config.monitor.enabled = false;
        config.admin.bind_address = "127.0.0.1:0".to_string();
        config.observability.metrics_enabled = false;
        config
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let shutdown = Shutdown::new();
        let running = start(&config(), None, &shutdown).await.unwrap();
        assert!(running.admin_address.is_some());

        shutdown.trigger();
        running.join().await;
    }

    #[tokio::test]
    async fn test_invalid_config_fails_fast() {
        let mut config = config();
        config.window.min_samples = 0;
        let result = start(&config, None, &Shutdown::new()).await;
        assert!(matches!(
            result,
            Err(StartupError::Config(ConfigError::Validation(_)))
        ));
    }
}
