//! Reservation aggregate
//!
//! Contains the Reservation entity, related types, and repository interface.

pub mod model;
pub mod repository;
pub mod stats;

pub use model::{
    DateRange, Location, NewReservation, Pricing, Reservation, ReservationStatus,
    CONSTRAINED_LOCATION_CAPACITY,
};
pub use repository::ReservationRepository;
pub use stats::ReservationStats;
