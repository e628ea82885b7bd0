pub mod reservation;

pub use reservation::{
    DateRange, Location, NewReservation, Pricing, Reservation, ReservationRepository,
    ReservationStats, ReservationStatus,
};
pub use crate::shared::errors::{DomainError, DomainResult};
