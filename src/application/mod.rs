pub mod ports;
pub mod reservations;

// Re-export key types for convenience
pub use ports::{CheckoutRequest, CheckoutSession, PaymentError, PaymentEvent, PaymentGateway};
pub use reservations::{
    start_expiry_sweep, AvailabilityChecker, CreatedReservation, EventOutcome, ReservationRequest,
    ReservationService, ReservationSettings,
};
