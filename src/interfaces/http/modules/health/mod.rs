//! `GET /health`
//!
//! Liveness plus a database round trip. Missing webhook or admin secrets do
//! not fail the check but are reported so a deploy without them is visible.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone)]
pub struct HealthState {
    pub db: DatabaseConnection,
    pub started_at: Arc<Instant>,
    pub webhooks_configured: bool,
    pub admin_configured: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: DatabaseHealth,
    pub webhooks_configured: bool,
    pub admin_configured: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatabaseHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

async fn ping_database(db: &DatabaseConnection) -> DatabaseHealth {
    let started = Instant::now();
    match db.ping().await {
        Ok(()) => DatabaseHealth {
            status: "ok".into(),
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            DatabaseHealth {
                status: "error".into(),
                latency_ms: None,
            }
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = ping_database(&state.db).await;
    let healthy = database.status == "ok";

    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database,
        webhooks_configured: state.webhooks_configured,
        admin_configured: state.admin_configured,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::test_database;

    #[tokio::test]
    async fn reports_missing_secrets_without_failing() {
        let state = HealthState {
            db: test_database().await,
            started_at: Arc::new(Instant::now()),
            webhooks_configured: false,
            admin_configured: true,
        };
        let (status, Json(body)) = health_check(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert!(!body.webhooks_configured);
        assert!(body.admin_configured);
    }

    #[tokio::test]
    async fn closed_database_is_degraded() {
        let db = test_database().await;
        db.clone().close().await.unwrap();
        let state = HealthState {
            db,
            started_at: Arc::new(Instant::now()),
            webhooks_configured: true,
            admin_configured: true,
        };
        let (status, Json(body)) = health_check(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.database.status, "error");
    }
}
