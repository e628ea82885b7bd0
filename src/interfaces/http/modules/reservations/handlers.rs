//! Reservation HTTP handlers

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;

use crate::application::ReservationService;
use crate::domain::reservation::{DateRange, Location};
use crate::interfaces::http::common::{
    api_error, domain_error, ApiError, ApiResponse, ApiResult, ValidatedJson,
};

use super::dto::*;

fn bad_request(message: &str) -> ApiError<AvailabilityResponse> {
    api_error(StatusCode::BAD_REQUEST, message)
}

/// Application state for reservation handlers.
#[derive(Clone)]
pub struct ReservationAppState {
    pub service: Arc<ReservationService>,
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 200, description = "Pending reservation with checkout link", body = ApiResponse<CreateReservationResponse>),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "No capacity for the selected dates"),
        (status = 422, description = "Field exceeds its length limit"),
        (status = 429, description = "Too many requests"),
        (status = 502, description = "Payment provider unavailable")
    )
)]
pub async fn create_reservation(
    State(state): State<ReservationAppState>,
    ValidatedJson(request): ValidatedJson<CreateReservationRequest>,
) -> ApiResult<CreateReservationResponse> {
    let created = state
        .service
        .create_reservation(&request.into())
        .await
        .map_err(domain_error::<CreateReservationResponse>)?;

    Ok(Json(ApiResponse::success(created.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/availability",
    tag = "Reservations",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Whether one more reservation fits", body = ApiResponse<AvailabilityResponse>),
        (status = 400, description = "Invalid query")
    )
)]
pub async fn check_availability(
    State(state): State<ReservationAppState>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<AvailabilityResponse> {
    let location = query
        .location
        .parse::<Location>()
        .map_err(|_| bad_request("Invalid location"))?;
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| bad_request("Invalid date format, expected YYYY-MM-DD"))
    };
    let range = DateRange::new(parse(&query.start_date)?, parse(&query.end_date)?)
        .ok_or_else(|| bad_request("End date must be after start date"))?;

    let available = state
        .service
        .availability()
        .has_capacity(location, range, None)
        .await
        .map_err(domain_error::<AvailabilityResponse>)?;

    Ok(Json(ApiResponse::success(AvailabilityResponse {
        location: location.as_str().to_string(),
        available,
    })))
}
