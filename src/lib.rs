//! # Staysville Parking
//!
//! Parking reservation service: capacity-checked admission, hosted checkout
//! redirect and signed webhook reconciliation.
//!
//! ## Architecture
//!
//! - **domain**: reservation entity, locations, pricing and the repository trait
//! - **application**: availability checker, reservation lifecycle, expiry sweep
//! - **infrastructure**: SeaORM persistence and the Stripe checkout client
//! - **interfaces**: REST API with OpenAPI document
//! - **server**: runtime wiring shared by both binaries

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use infrastructure::{init_database, DatabaseConfig};

pub use interfaces::create_api_router;
