//! Payment webhook handler
//!
//! The body is taken raw because the signature covers the exact bytes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::application::{EventOutcome, ReservationService};
use crate::infrastructure::payments::{parse_event, WebhookVerifier, SIGNATURE_HEADER};
use crate::interfaces::http::common::ApiResponse;

#[derive(Clone)]
pub struct WebhookAppState {
    pub service: Arc<ReservationService>,
    /// `None` when no webhook secret is configured
    pub verifier: Option<Arc<WebhookVerifier>>,
}

/// Acknowledgement returned to the provider
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

fn reject(status: StatusCode, outcome: &'static str, message: &str) -> Response {
    counter!("payment_webhook_events_total", "outcome" => outcome).increment(1);
    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments",
    tag = "Webhooks",
    request_body(content = String, description = "Raw provider event JSON", content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Event processed or ignored", body = WebhookAck),
        (status = 400, description = "Signature or payload rejected"),
        (status = 500, description = "Webhook not configured or storage failure; provider should retry")
    )
)]
pub async fn payment_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(verifier) = state.verifier.as_ref() else {
        error!("Webhook received but no webhook secret is configured");
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unconfigured",
            "Webhook is not configured",
        );
    };

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = verifier.verify(signature, &body) {
        warn!(error = %e, "Webhook signature verification failed");
        return reject(
            StatusCode::BAD_REQUEST,
            "rejected",
            "Webhook signature verification failed",
        );
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Webhook payload rejected");
            return reject(StatusCode::BAD_REQUEST, "rejected", "Invalid event payload");
        }
    };

    match state.service.apply_payment_event(&event).await {
        Ok(outcome) => {
            counter!("payment_webhook_events_total", "outcome" => event.kind().to_string())
                .increment(1);
            let (result, transitioned) = outcome_label(&outcome);
            info!(event = event.kind(), result, transitioned, "Webhook processed");
            (StatusCode::OK, Json(WebhookAck { received: true })).into_response()
        }
        Err(e) => {
            error!(error = %e, event = event.kind(), "Failed to apply payment event");
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed",
                "Internal server error",
            )
        }
    }
}

fn outcome_label(outcome: &EventOutcome) -> (&'static str, usize) {
    match outcome {
        EventOutcome::Confirmed(r) => ("confirmed", r.len()),
        EventOutcome::Expired(r) => ("expired", r.len()),
        EventOutcome::PaidAfterRelease(_) => ("paid_after_release", 0),
        EventOutcome::Ignored => ("ignored", 0),
    }
}
