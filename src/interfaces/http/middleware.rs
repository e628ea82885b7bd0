//! Admin authentication middleware for Axum
//!
//! HTTP Basic auth against a single configured credential pair. Without a
//! configured pair every request is refused.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Authentication error types
#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidCredentials,
    NotConfigured,
}

struct AdminCredentials {
    user: [u8; 32],
    pass: [u8; 32],
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Admin credential gate shared by the admin routes
#[derive(Clone, Default)]
pub struct AdminAuth {
    credentials: Option<Arc<AdminCredentials>>,
}

impl AdminAuth {
    /// Both parts must be present and non-empty, otherwise the gate stays closed.
    pub fn new(user: Option<&str>, pass: Option<&str>) -> Self {
        let credentials = match (user, pass) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some(Arc::new(AdminCredentials {
                    user: digest(user),
                    pass: digest(pass),
                }))
            }
            _ => None,
        };
        Self { credentials }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn authorize(&self, auth_header: Option<&str>) -> Result<(), AuthError> {
        let expected = self.credentials.as_ref().ok_or(AuthError::NotConfigured)?;
        let (user, pass) = auth_header
            .and_then(decode_basic)
            .ok_or(AuthError::MissingCredentials)?;

        // Compare fixed-size digests so the work does not depend on input length.
        let user_ok = digest(&user) == expected.user;
        let pass_ok = digest(&pass) == expected.pass;
        if user_ok & pass_ok {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

fn decode_basic(auth_header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = auth_header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Basic-auth gate for admin routes
pub async fn admin_auth_middleware(
    State(auth): State<AdminAuth>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth.authorize(auth_header) {
        Ok(()) => next.run(request).await,
        Err(e) => auth_error_response(e),
    }
}

fn auth_error_response(error: AuthError) -> Response {
    let message = match error {
        AuthError::MissingCredentials => "Authentication required",
        AuthError::InvalidCredentials => "Invalid credentials",
        AuthError::NotConfigured => {
            warn!("Admin request refused: no admin credentials configured");
            "Authentication required"
        }
    };

    let body = Json(json!({
        "success": false,
        "data": null,
        "error": message
    }));

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"admin\"")],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn accepts_configured_pair() {
        let auth = AdminAuth::new(Some("admin"), Some("s3cret:with:colons"));
        assert!(auth
            .authorize(Some(&basic("admin", "s3cret:with:colons")))
            .is_ok());
    }

    #[test]
    fn rejects_wrong_or_missing_credentials() {
        let auth = AdminAuth::new(Some("admin"), Some("s3cret"));
        assert!(matches!(
            auth.authorize(Some(&basic("admin", "wrong"))),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.authorize(Some(&basic("root", "s3cret"))),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(auth.authorize(None), Err(AuthError::MissingCredentials)));
        assert!(matches!(
            auth.authorize(Some("Bearer abc")),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            auth.authorize(Some("Basic !!!not-base64")),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn unconfigured_gate_refuses_everything() {
        for auth in [
            AdminAuth::default(),
            AdminAuth::new(Some("admin"), None),
            AdminAuth::new(Some("admin"), Some("")),
        ] {
            assert!(!auth.is_configured());
            assert!(matches!(
                auth.authorize(Some(&basic("admin", ""))),
                Err(AuthError::NotConfigured)
            ));
        }
    }
}
