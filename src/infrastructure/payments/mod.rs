//! Hosted checkout provider integration

pub mod events;
pub mod signature;
pub mod stripe;

pub use events::{parse_event, EventParseError};
pub use signature::{SignatureError, WebhookVerifier, SIGNATURE_HEADER};
pub use stripe::{StripeCheckoutClient, StripeConfig};
