//! Reservation DTOs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::{CreatedReservation, ReservationRequest};

/// Request to reserve a parking space
///
/// Every field is optional at the JSON level so that a missing field is
/// reported as a validation failure rather than a parse error.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub full_name: Option<String>,
    #[validate(length(max = 254, message = "must be at most 254 characters"))]
    pub email: Option<String>,
    /// `YYYY-MM-DD`
    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, exclusive
    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub end_date: Option<String>,
    /// `jens-zetlitz-gate`, `saudagata` or `torbjorn-hornkloves-gate`
    #[validate(length(max = 64, message = "must be at most 64 characters"))]
    pub location: Option<String>,
    #[validate(length(max = 20, message = "must be at most 20 characters"))]
    pub license_plate: Option<String>,
    /// Plate not yet known
    #[serde(default)]
    pub no_license_plate: bool,
}

impl From<CreateReservationRequest> for ReservationRequest {
    fn from(r: CreateReservationRequest) -> Self {
        ReservationRequest {
            full_name: r.full_name,
            email: r.email,
            start_date: r.start_date,
            end_date: r.end_date,
            location: r.location,
            license_plate: r.license_plate,
            no_license_plate: r.no_license_plate,
        }
    }
}

/// Pending reservation and where to pay for it
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationResponse {
    pub reservation_id: i32,
    /// Hosted checkout page to redirect the customer to
    pub payment_url: String,
    pub session_id: String,
    pub nights: i32,
    /// Minor currency units
    pub total_price: i64,
    pub currency: String,
}

impl From<CreatedReservation> for CreateReservationResponse {
    fn from(c: CreatedReservation) -> Self {
        Self {
            reservation_id: c.reservation.id,
            payment_url: c.session.url,
            session_id: c.session.id,
            nights: c.reservation.nights,
            total_price: c.reservation.total_price,
            currency: c.reservation.currency,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    pub location: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityResponse {
    pub location: String,
    pub available: bool,
}
