pub mod admin;
pub mod health;
pub mod metrics;
pub mod request_id;
pub mod reservations;
pub mod webhooks;
