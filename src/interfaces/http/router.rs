use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::application::ReservationService;
use crate::infrastructure::payments::WebhookVerifier;

use super::common::ApiResponse;
use super::middleware::{admin_auth_middleware, AdminAuth};
use super::modules::admin::{self, AdminAppState};
use super::modules::health::{self, HealthState};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::request_id::request_id_middleware;
use super::modules::reservations::{self, ReservationAppState};
use super::modules::webhooks::{self, WebhookAppState};
use super::rate_limit::{rate_limit_middleware, ReservationRateLimiter};

/// Everything the HTTP layer needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub service: Arc<ReservationService>,
    pub webhook_verifier: Option<Arc<WebhookVerifier>>,
    pub admin_auth: AdminAuth,
    pub rate_limiter: ReservationRateLimiter,
    pub metrics: PrometheusHandle,
    pub started_at: Arc<Instant>,
}

impl FromRef<AppState> for ReservationAppState {
    fn from_ref(s: &AppState) -> Self {
        ReservationAppState {
            service: Arc::clone(&s.service),
        }
    }
}

impl FromRef<AppState> for WebhookAppState {
    fn from_ref(s: &AppState) -> Self {
        WebhookAppState {
            service: Arc::clone(&s.service),
            verifier: s.webhook_verifier.clone(),
        }
    }
}

impl FromRef<AppState> for AdminAppState {
    fn from_ref(s: &AppState) -> Self {
        AdminAppState {
            service: Arc::clone(&s.service),
        }
    }
}

impl FromRef<AppState> for HealthState {
    fn from_ref(s: &AppState) -> Self {
        HealthState {
            db: s.db.clone(),
            started_at: Arc::clone(&s.started_at),
            webhooks_configured: s.webhook_verifier.is_some(),
            admin_configured: s.admin_auth.is_configured(),
        }
    }
}

impl FromRef<AppState> for MetricsState {
    fn from_ref(s: &AppState) -> Self {
        MetricsState {
            handle: s.metrics.clone(),
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Basic)
                        .description(Some("Admin credentials"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        reservations::create_reservation,
        reservations::check_availability,
        webhooks::payment_webhook,
        admin::list_reservations,
    ),
    components(
        schemas(
            ApiResponse<String>,
            reservations::CreateReservationRequest,
            reservations::CreateReservationResponse,
            reservations::AvailabilityResponse,
            webhooks::WebhookAck,
            admin::AdminReservationDto,
            admin::ReservationStatsDto,
            admin::AdminReservationsResponse,
            health::HealthResponse,
            health::DatabaseHealth,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Reservations", description = "Parking reservations and availability"),
        (name = "Webhooks", description = "Signed payment provider callbacks"),
        (name = "Admin", description = "Reservation overview for operators"),
    ),
    info(
        title = "Staysville Parking API",
        version = "1.0.0",
        description = "Parking reservations with hosted checkout and signed payment confirmation"
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_api_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Creation is rate limited per client; the availability check is not.
    let create_routes = Router::new()
        .route("/api/v1/reservations", post(reservations::create_reservation))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    let admin_routes = Router::new()
        .route("/api/v1/admin/reservations", get(admin::list_reservations))
        .route_layer(middleware::from_fn_with_state(
            state.admin_auth.clone(),
            admin_auth_middleware,
        ));

    Router::new()
        .merge(create_routes)
        .merge(admin_routes)
        .route(
            "/api/v1/reservations/availability",
            get(reservations::check_availability),
        )
        .route("/api/v1/webhooks/payments", post(webhooks::payment_webhook))
        .route("/health", get(health::health_check))
        .route("/metrics", get(prometheus_metrics))
        .route("/api-doc/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────
