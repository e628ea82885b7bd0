//! Application ports (hexagonal architecture boundaries)

pub mod payment;

pub use payment::{CheckoutRequest, CheckoutSession, PaymentError, PaymentEvent, PaymentGateway};
