//! Admin HTTP handlers

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::application::ReservationService;
use crate::domain::reservation::ReservationStats;
use crate::interfaces::http::common::{domain_error, ApiResponse, ApiResult};

use super::dto::*;

#[derive(Clone)]
pub struct AdminAppState {
    pub service: Arc<ReservationService>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/reservations",
    tag = "Admin",
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "All reservations, newest first, with totals", body = ApiResponse<AdminReservationsResponse>),
        (status = 401, description = "Missing or invalid admin credentials")
    )
)]
pub async fn list_reservations(
    State(state): State<AdminAppState>,
) -> ApiResult<AdminReservationsResponse> {
    let reservations = state
        .service
        .list_reservations()
        .await
        .map_err(domain_error::<AdminReservationsResponse>)?;

    let stats = ReservationStats::from_reservations(&reservations);

    Ok(Json(ApiResponse::success(AdminReservationsResponse {
        reservations: reservations.iter().map(AdminReservationDto::from).collect(),
        stats: stats.into(),
    })))
}
