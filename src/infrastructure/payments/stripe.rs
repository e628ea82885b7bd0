//! Stripe-compatible hosted checkout client

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::application::ports::{CheckoutRequest, CheckoutSession, PaymentError, PaymentGateway};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// `None` leaves the client unable to create sessions
    pub secret_key: Option<String>,
    pub api_base: String,
    /// Public origin used for the success and cancel redirects
    pub public_base_url: String,
    pub request_timeout: Duration,
    /// Lifetime of the checkout session (Stripe requires at least 30 minutes)
    pub session_ttl: chrono::Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(10),
            session_ttl: chrono::Duration::minutes(60),
        }
    }
}

#[derive(Clone)]
pub struct StripeCheckoutClient {
    client: Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeCheckoutClient {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.secret_key.is_some()
    }

    fn form_params(&self, request: &CheckoutRequest) -> Vec<(String, String)> {
        let base = self.config.public_base_url.trim_end_matches('/');
        let expires_at = (Utc::now() + self.config.session_ttl).timestamp();

        let mut params: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            // Delayed methods can settle after the hold has been released.
            ("payment_method_types[0]".into(), "card".into()),
            ("client_reference_id".into(), request.payment_reference.clone()),
            ("customer_email".into(), request.customer_email.clone()),
            (
                "success_url".into(),
                format!("{base}/success?session_id={{CHECKOUT_SESSION_ID}}"),
            ),
            ("cancel_url".into(), format!("{base}/booking")),
            ("expires_at".into(), expires_at.to_string()),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "line_items[0][price_data][currency]".into(),
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                request.amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]".into(),
                request.description.clone(),
            ),
        ];
        params.extend(
            request
                .metadata
                .iter()
                .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
        );
        params
    }
}

fn transport_error(e: reqwest::Error) -> PaymentError {
    if e.is_timeout() {
        PaymentError::Timeout
    } else {
        PaymentError::Transport(e.to_string())
    }
}

#[async_trait]
impl PaymentGateway for StripeCheckoutClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let secret = self
            .config
            .secret_key
            .as_deref()
            .ok_or(PaymentError::NotConfigured)?;

        let url = format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.trim_end_matches('/')
        );
        debug!(reference = %request.payment_reference, amount = request.amount, "Creating checkout session");

        let response = self
            .client
            .post(url)
            .bearer_auth(secret)
            // Retries of the same reservation must not open a second session.
            .header("Idempotency-Key", request.payment_reference.as_str())
            .form(&self.form_params(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::InvalidResponse("checkout session has no url".into()))?;

        debug!(session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn checkout_request() -> CheckoutRequest {
        CheckoutRequest {
            payment_reference: "res_abc123".into(),
            amount: 45000,
            currency: "nok".into(),
            product_name: "Parking at Saudagata".into(),
            description: "3 nights parking from 2025-07-01 to 2025-07-04".into(),
            customer_email: "kari@example.no".into(),
            metadata: BTreeMap::from([("reservation_id".to_string(), "7".to_string())]),
        }
    }

    fn client(server: &MockServer) -> StripeCheckoutClient {
        StripeCheckoutClient::new(StripeConfig {
            secret_key: Some("sk_test_123".into()),
            api_base: server.uri(),
            public_base_url: "https://parking.example".into(),
            request_timeout: Duration::from_millis(500),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn creates_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(header("idempotency-key", "res_abc123"))
            .and(body_string_contains("payment_method_types%5B0%5D=card"))
            .and(body_string_contains("client_reference_id=res_abc123"))
            .and(body_string_contains("mode=payment"))
            .and(body_string_contains("unit_amount%5D=45000"))
            .and(body_string_contains("metadata%5Breservation_id%5D=7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_a1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_a1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = client(&server)
            .create_checkout_session(&checkout_request())
            .await
            .unwrap();
        assert_eq!(session.id, "cs_test_a1");
        assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_a1");
    }

    #[tokio::test]
    async fn client_errors_are_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid currency: xyz" }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_checkout_session(&checkout_request())
            .await
            .unwrap_err();
        match &err {
            PaymentError::Provider { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "Invalid currency: xyz");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_checkout_session(&checkout_request())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "cs_late", "url": "https://x"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .create_checkout_session(&checkout_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Timeout));
    }

    #[tokio::test]
    async fn missing_url_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cs_1"})))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_checkout_session(&checkout_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unconfigured_client_refuses() {
        let client = StripeCheckoutClient::new(StripeConfig::default()).unwrap();
        assert!(!client.is_configured());
        let err = client
            .create_checkout_session(&checkout_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotConfigured));
    }
}
