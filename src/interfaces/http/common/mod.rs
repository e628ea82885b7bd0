//! Response envelope and shared extractors

pub mod validated_json;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::domain::DomainError;

pub use validated_json::ValidatedJson;

/// Standard API response envelope
///
/// Success: `{"success": true, "data": {...}}`,
/// failure: `{"success": false, "data": null, "error": "..."}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    /// Payload; `null` on failure
    pub data: Option<T>,
    /// Failure reason; omitted on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

pub type ApiError<T> = (StatusCode, Json<ApiResponse<T>>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError<T>>;

pub fn api_error<T>(status: StatusCode, message: impl Into<String>) -> ApiError<T> {
    (status, Json(ApiResponse::error(message)))
}

/// Map a domain error onto a status code and client-safe message.
pub fn domain_error<T>(err: DomainError) -> ApiError<T> {
    match err {
        DomainError::Validation(message) => api_error(StatusCode::BAD_REQUEST, message),
        e @ DomainError::CapacityExceeded { .. } => api_error(StatusCode::CONFLICT, e.to_string()),
        e @ DomainError::NotFound { .. } => api_error(StatusCode::NOT_FOUND, e.to_string()),
        DomainError::Payment { message, transient } => {
            error!(error = %message, transient, "Payment provider failure");
            api_error(
                StatusCode::BAD_GATEWAY,
                "Payment provider is unavailable, please try again later",
            )
        }
        DomainError::Storage(message) => {
            error!(error = %message, "Storage failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
