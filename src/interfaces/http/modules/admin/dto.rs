//! Admin DTOs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::reservation::{Reservation, ReservationStats};

/// Reservation as shown to operators; the plate is masked.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminReservationDto {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: String,
    pub location_name: String,
    /// Last four characters only, e.g. `****2345`
    pub license_plate: Option<String>,
    pub no_license_plate: bool,
    pub nights: i32,
    pub total_price: i64,
    pub currency: String,
    pub status: String,
    pub payment_reference: String,
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Reservation> for AdminReservationDto {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            full_name: r.full_name.clone(),
            email: r.email.clone(),
            start_date: r.start_date,
            end_date: r.end_date,
            location: r.location.as_str().to_string(),
            location_name: r.location.display_name().to_string(),
            license_plate: r.masked_license_plate(),
            no_license_plate: r.no_license_plate(),
            nights: r.nights,
            total_price: r.total_price,
            currency: r.currency.clone(),
            status: r.status.as_str().to_string(),
            payment_reference: r.payment_reference.clone(),
            checkout_session_id: r.checkout_session_id.clone(),
            created_at: r.created_at,
            completed_at: r.completed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationStatsDto {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub expired: u64,
    pub cancelled: u64,
    /// Completed reservations only, minor currency units
    pub revenue: i64,
    pub location_counts: BTreeMap<String, u64>,
}

impl From<ReservationStats> for ReservationStatsDto {
    fn from(s: ReservationStats) -> Self {
        Self {
            total: s.total,
            completed: s.completed,
            pending: s.pending,
            expired: s.expired,
            cancelled: s.cancelled,
            revenue: s.revenue,
            location_counts: s
                .location_counts
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminReservationsResponse {
    pub reservations: Vec<AdminReservationDto>,
    pub stats: ReservationStatsDto,
}
