//! Per-client rate limiting for reservation creation
//!
//! Keyed GCRA limiter from `governor`. The limiter is an explicit handle
//! built at startup and handed to the router, so tests get their own.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use tracing::warn;

use super::common::ApiResponse;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Tracked clients above which stale entries are pruned
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone)]
pub struct ReservationRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl ReservationRateLimiter {
    /// Allow `requests` per minute per client, as a burst that refills evenly.
    pub fn per_minute(requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// `true` if the request from `client` is within quota.
    pub fn check(&self, client: &str) -> bool {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }
        self.limiter.check_key(&client.to_string()).is_ok()
    }
}

/// Client identity: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// peer address.
pub fn client_key(request: &Request<Body>) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<ReservationRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&request);
    if !limiter.check(&client) {
        warn!(client = %client, "Reservation rate limit exceeded");
        metrics::counter!("rate_limited_requests_total").increment(1);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::error(
                "Too many requests. Please try again later.",
            )),
        )
            .into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn allows_quota_then_refuses() {
        let limiter = ReservationRateLimiter::per_minute(10);
        for _ in 0..10 {
            assert!(limiter.check("203.0.113.7"));
        }
        assert!(!limiter.check("203.0.113.7"));
        assert!(limiter.check("198.51.100.1"));
    }

    #[test]
    fn client_key_precedence() {
        let req = request_with(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
        ]);
        assert_eq!(client_key(&req), "203.0.113.7");

        let req = request_with(&[("x-real-ip", "10.0.0.2")]);
        assert_eq!(client_key(&req), "10.0.0.2");

        let mut req = request_with(&[]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 5555))));
        assert_eq!(client_key(&req), "192.0.2.4");

        assert_eq!(client_key(&request_with(&[])), "unknown");
    }
}
