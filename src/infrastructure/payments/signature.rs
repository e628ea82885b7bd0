//! Webhook signature verification
//!
//! Header format: `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! The signed payload is `"<t>.<raw body>"`, HMAC-SHA256 with the endpoint
//! secret. Several `v1` entries appear while a secret is being rolled.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age (and clock skew) accepted for a signed event
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header")]
    MalformedHeader,

    #[error("no signature matches the payload")]
    NoMatch,

    #[error("signature timestamp outside tolerance")]
    TimestampOutOfTolerance,
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn verify(&self, header: Option<&str>, payload: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(header, payload, Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        header: Option<&str>,
        payload: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;
        let (timestamp, candidates) = parse_header(header)?;

        let mac = self.mac(timestamp, payload)?;
        let matched = candidates
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
        if !matched {
            return Err(SignatureError::NoMatch);
        }

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(SignatureError::TimestampOutOfTolerance);
        }
        Ok(())
    }

    /// Header value for `payload` signed at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let signature = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| SignatureError::NoMatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

/// Split the header into its timestamp and decoded `v1` signatures.
/// Other schemes (`v0`, unknown keys) are ignored.
fn parse_header(header: &str) -> Result<(i64, Vec<Vec<u8>>), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader)?,
                )
            }
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !candidates.is_empty() => Ok((t, candidates)),
        _ => Err(SignatureError::MalformedHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"type":"checkout.session.completed"}"#;
    const NOW: i64 = 1_750_000_000;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SECRET)
    }

    #[test]
    fn accepts_own_signature() {
        let header = verifier().sign(BODY, NOW).unwrap();
        assert!(header.starts_with(&format!("t={NOW},v1=")));
        assert_eq!(verifier().verify_at(Some(&header), BODY, NOW + 10), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let header = verifier().sign(BODY, NOW).unwrap();
        let tampered = br#"{"type":"checkout.session.expired"}"#;
        assert_eq!(
            verifier().verify_at(Some(&header), tampered, NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn rejects_other_secret() {
        let header = WebhookVerifier::new("whsec_other").sign(BODY, NOW).unwrap();
        assert_eq!(
            verifier().verify_at(Some(&header), BODY, NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let good = verifier().sign(BODY, NOW).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1={},v0=ignored,v1={good_sig}", "ab".repeat(32));
        assert_eq!(verifier().verify_at(Some(&header), BODY, NOW), Ok(()));
    }

    #[test]
    fn enforces_tolerance() {
        let header = verifier().sign(BODY, NOW).unwrap();
        assert_eq!(
            verifier().verify_at(Some(&header), BODY, NOW + 301),
            Err(SignatureError::TimestampOutOfTolerance)
        );
        assert_eq!(
            verifier().verify_at(Some(&header), BODY, NOW - 301),
            Err(SignatureError::TimestampOutOfTolerance)
        );
        assert_eq!(
            verifier()
                .with_tolerance(600)
                .verify_at(Some(&header), BODY, NOW + 301),
            Ok(())
        );
    }

    #[test]
    fn header_shape_errors() {
        assert_eq!(
            verifier().verify_at(None, BODY, NOW),
            Err(SignatureError::MissingHeader)
        );
        let timestamp_only = format!("t={NOW}");
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", timestamp_only.as_str()] {
            assert_eq!(
                verifier().verify_at(Some(header), BODY, NOW),
                Err(SignatureError::MalformedHeader),
                "header {header:?}"
            );
        }
    }
}
