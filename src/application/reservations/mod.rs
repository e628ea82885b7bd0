//! Reservation use cases: admission, lifecycle and the expiry sweep.

pub mod availability;
pub mod expiry;
pub mod lifecycle;
pub mod request;

pub use availability::AvailabilityChecker;
pub use expiry::start_expiry_sweep;
pub use lifecycle::{CreatedReservation, EventOutcome, ReservationService, ReservationSettings};
pub use request::{ReservationRequest, ValidReservation};
