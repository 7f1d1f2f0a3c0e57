use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::health::report::{self, DependencyHealth, HealthReport};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let report = HealthReport::collect(&state.guard);
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: report.status,
    })
}

pub async fn get_dependencies(State(state): State<AdminState>) -> Json<HealthReport> {
    Json(HealthReport::collect(&state.guard))
}

pub async fn get_dependency(
    State(state): State<AdminState>,
    Path(identity): Path<String>,
) -> Result<Json<DependencyHealth>, StatusCode> {
    report::dependency(&state.guard, &identity)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::setup_admin_router;
    use crate::dependencies::DependencyGuard;
    use crate::config::schema::{DependencyConfig, GuardConfig};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(api_key: Option<&str>) -> AdminState {
        let mut config = GuardConfig::default();
        config.dependencies.push(DependencyConfig {
            identity: "postgres-auth".into(),
            class: "database".into(),
            probe_url: None,
        });
        let guard = DependencyGuard::from_config(&config).unwrap();
        AdminState::new(guard, api_key.map(str::to_string))
    }

    async fn get(state: AdminState, uri: &str, token: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let response = setup_admin_router(state)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_status_is_public() {
        let (status, body) = get(state(Some("secret")), "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"status\":\"healthy\""));
    }

    #[tokio::test]
    async fn test_dependencies_require_key() {
        let (status, _) = get(state(Some("secret")), "/health/dependencies", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = get(state(Some("secret")), "/health/dependencies", Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            get(state(Some("secret")), "/health/dependencies", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        let report: HealthReport = serde_json::from_str(&body).unwrap();
        assert_eq!(report.dependencies.len(), 1);
    }

    #[tokio::test]
    async fn test_single_dependency_lookup() {
        let (status, body) = get(state(None), "/health/dependencies/postgres-auth", None).await;
        assert_eq!(status, StatusCode::OK);
        let entry: DependencyHealth = serde_json::from_str(&body).unwrap();
        assert_eq!(entry.identity, "postgres-auth");
        assert_eq!(entry.class.as_deref(), Some("database"));

        let (status, _) = get(state(None), "/health/dependencies/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
