//! HTTP REST API interfaces
//!
//! - `modules`: handlers and DTOs per resource
//! - `middleware`: admin basic-auth gate
//! - `rate_limit`: per-client limiter for reservation creation
//! - `router`: API router with the OpenAPI document

pub mod common;
pub mod middleware;
pub mod modules;
pub mod rate_limit;
pub mod router;

pub use middleware::AdminAuth;
pub use rate_limit::ReservationRateLimiter;
pub use router::{create_api_router, ApiDoc, AppState};
