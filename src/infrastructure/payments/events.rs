//! Provider webhook payload parsing

use serde::Deserialize;
use thiserror::Error;

use crate::application::ports::PaymentEvent;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_ASYNC_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
pub const CHECKOUT_EXPIRED: &str = "checkout.session.expired";

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
}

impl CheckoutSessionObject {
    fn reference(self) -> String {
        self.client_reference_id
            .filter(|r| !r.is_empty())
            .unwrap_or(self.id)
    }
}

/// Parse a verified webhook body into the event the lifecycle acts on.
pub fn parse_event(body: &[u8]) -> Result<PaymentEvent, EventParseError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| EventParseError::InvalidPayload(e.to_string()))?;

    let kind = envelope.kind.as_str();
    if ![CHECKOUT_COMPLETED, CHECKOUT_ASYNC_SUCCEEDED, CHECKOUT_EXPIRED].contains(&kind) {
        return Ok(PaymentEvent::Ignored {
            kind: envelope.kind,
        });
    }

    let session: CheckoutSessionObject = serde_json::from_value(envelope.data.object)
        .map_err(|e| EventParseError::InvalidPayload(e.to_string()))?;

    let event = match kind {
        CHECKOUT_COMPLETED if session.payment_status.as_deref() == Some("unpaid") => {
            // Delayed payment methods settle later via async_payment_succeeded.
            PaymentEvent::Ignored {
                kind: format!("{CHECKOUT_COMPLETED} (unpaid)"),
            }
        }
        CHECKOUT_EXPIRED => PaymentEvent::Expired {
            reference: session.reference(),
        },
        _ => PaymentEvent::Completed {
            reference: session.reference(),
        },
    };
    Ok(event)
}
