//! Aggregate figures for the admin overview

use std::collections::BTreeMap;

use super::model::{Location, Reservation, ReservationStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReservationStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub expired: u64,
    pub cancelled: u64,
    /// Sum of completed reservations, minor currency units
    pub revenue: i64,
    /// Keyed by location key; every location is present
    pub location_counts: BTreeMap<&'static str, u64>,
}

impl ReservationStats {
    pub fn from_reservations(reservations: &[Reservation]) -> Self {
        let mut stats = ReservationStats {
            location_counts: Location::ALL.iter().map(|l| (l.as_str(), 0)).collect(),
            ..Default::default()
        };

        for r in reservations {
            stats.total += 1;
            match r.status {
                ReservationStatus::Completed => {
                    stats.completed += 1;
                    stats.revenue += r.total_price;
                }
                ReservationStatus::Pending => stats.pending += 1,
                ReservationStatus::Expired => stats.expired += 1,
                ReservationStatus::Cancelled => stats.cancelled += 1,
            }
            *stats.location_counts.entry(r.location.as_str()).or_insert(0) += 1;
        }

        stats
    }
}
