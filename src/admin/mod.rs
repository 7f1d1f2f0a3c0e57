//! Status HTTP surface.
//!
//! # Routes
//! - `GET /health`: liveness and overall status, always public
//! - `GET /health/dependencies`: every circuit as `DependencyHealth`
//! - `GET /health/dependencies/{identity}`: one circuit, 404 if unknown
//!
//! The dependency routes require a bearer token when an api key is set.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::dependencies::DependencyGuard;

/// Shared state of the status endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub guard: DependencyGuard,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(guard: DependencyGuard, api_key: Option<String>) -> Self {
        Self {
            guard,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    let protected = Router::new()
        .route("/health/dependencies", get(get_dependencies))
        .route("/health/dependencies/{identity}", get(get_dependency))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/health", get(get_status))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the status endpoints until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!(address = ?listener.local_addr().ok(), "Status server starting");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Status server stopped");
    Ok(())
}
