//! Reservation repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{DateRange, Location, NewReservation, Reservation, ReservationStatus};
use crate::shared::DomainResult;

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Count capacity-holding reservations at `location` overlapping `range`
    async fn count_overlapping(
        &self,
        location: Location,
        range: DateRange,
        exclude_id: Option<i32>,
    ) -> DomainResult<u64>;

    /// Insert a new reservation in `pending` state
    async fn insert_pending(&self, reservation: NewReservation) -> DomainResult<Reservation>;

    /// Count overlaps and insert in one database transaction.
    ///
    /// Returns `None` (and inserts nothing) when `limit` overlapping
    /// reservations already exist.
    async fn insert_pending_within_capacity(
        &self,
        reservation: NewReservation,
        limit: u64,
    ) -> DomainResult<Option<Reservation>>;

    /// Record the provider's checkout session id on a reservation
    async fn attach_checkout_session(&self, id: i32, session_id: &str) -> DomainResult<()>;

    /// Move `pending` reservations matching `reference` (payment reference or
    /// checkout session id) to `to`. Returns the rows actually transitioned.
    async fn transition_pending(
        &self,
        reference: &str,
        to: ReservationStatus,
    ) -> DomainResult<Vec<Reservation>>;

    /// Move a single `pending` reservation to `to`; `false` if it was not pending
    async fn transition_pending_by_id(&self, id: i32, to: ReservationStatus) -> DomainResult<bool>;

    /// Expire every `pending` reservation created before `cutoff`
    async fn expire_pending_created_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64>;

    /// Reservations matching `reference` that no longer hold capacity
    /// (expired or cancelled)
    async fn find_released_by_reference(&self, reference: &str) -> DomainResult<Vec<Reservation>>;

    /// Find reservation by ID
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Reservation>>;

    /// All reservations, newest first
    async fn find_all(&self) -> DomainResult<Vec<Reservation>>;
}
