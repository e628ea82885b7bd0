//! Outbound port to the hosted checkout provider
//!
//! [`PaymentGateway`] decouples the reservation lifecycle from the concrete
//! provider client. The production implementation is
//! [`StripeCheckoutClient`](crate::infrastructure::payments::StripeCheckoutClient).

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::DomainError;

/// Everything the provider needs to open a hosted checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub payment_reference: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub product_name: String,
    pub description: String,
    pub customer_email: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider request timed out")]
    Timeout,

    #[error("payment provider unreachable: {0}")]
    Transport(String),

    #[error("payment provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("malformed payment provider response: {0}")]
    InvalidResponse(String),

    #[error("payment provider is not configured")]
    NotConfigured,
}

impl PaymentError {
    /// Network failures, timeouts, 429 and 5xx may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Provider { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::NotConfigured => false,
        }
    }
}

impl From<PaymentError> for DomainError {
    fn from(e: PaymentError) -> Self {
        DomainError::Payment {
            transient: e.is_transient(),
            message: e.to_string(),
        }
    }
}

/// Port for opening hosted checkout sessions.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

/// A verified provider notification, reduced to what the lifecycle acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// Payment for the referenced checkout has been received
    Completed { reference: String },
    /// The referenced checkout session lapsed without payment
    Expired { reference: String },
    /// Anything else; acknowledged without effect
    Ignored { kind: String },
}

impl PaymentEvent {
    /// Label used for metrics and logs
    pub fn kind(&self) -> &str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Expired { .. } => "expired",
            Self::Ignored { .. } => "ignored",
        }
    }
}
