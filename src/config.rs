//! Application configuration
//!
//! Loaded from a TOML file (default `~/.config/staysville-parking/config.toml`).
//! Every section and field is optional; missing values fall back to the
//! defaults below. Secrets can be supplied through the environment instead
//! of the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ReservationSettings;
use crate::domain::Pricing;
use crate::infrastructure::{DatabaseConfig, StripeConfig};
use crate::shared::RetryConfig;

/// Stripe refuses checkout sessions that expire in under 30 minutes.
pub const MIN_PENDING_HOLD_MINUTES: i64 = 31;
/// Stripe refuses checkout sessions that expire more than 24 hours out.
pub const MAX_PENDING_HOLD_MINUTES: i64 = 1440;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub payments: PaymentsConfig,
    pub booking: BookingConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for in-flight requests on shutdown
    pub shutdown_timeout: u64,
    /// Public origin used in checkout redirect URLs
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            shutdown_timeout: 30,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let db = DatabaseConfig::default();
        Self {
            url: db.url,
            max_connections: db.max_connections,
            connect_timeout_secs: db.connect_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Credential pair for the admin listing. Both unset keeps the endpoint closed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    pub stripe_secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub request_timeout_secs: u64,
    /// Attempts at creating a checkout session, including the first
    pub checkout_max_attempts: u32,
    pub webhook_tolerance_secs: i64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            webhook_secret: None,
            api_base: crate::infrastructure::payments::stripe::DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 10,
            checkout_max_attempts: 3,
            webhook_tolerance_secs: crate::infrastructure::payments::signature::DEFAULT_TOLERANCE_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Price per night in minor units (øre)
    pub nightly_rate: i64,
    pub currency: String,
    pub pending_hold_minutes: i64,
    pub expiry_grace_minutes: i64,
    pub sweep_interval_secs: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            nightly_rate: 15000,
            currency: "nok".to_string(),
            pending_hold_minutes: 60,
            expiry_grace_minutes: 5,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Reservation requests per client IP per minute
    pub reservations_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            reservations_per_minute: 10,
        }
    }
}

/// `<user config dir>/staysville-parking/config.toml`, or `./config.toml`
/// when the platform has no config dir.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("staysville-parking").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl AppConfig {
    /// Load from `path` and apply environment overrides. A missing file
    /// yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).and_then(non_empty);

        if let Some(url) = get("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(key) = get("STRIPE_SECRET_KEY") {
            self.payments.stripe_secret_key = Some(key);
        }
        if let Some(secret) = get("STRIPE_WEBHOOK_SECRET") {
            self.payments.webhook_secret = Some(secret);
        }
        if let Some(user) = get("ADMIN_USER") {
            self.admin.username = Some(user);
        }
        if let Some(pass) = get("ADMIN_PASS") {
            self.admin.password = Some(pass);
        }
        if let Some(base) = get("PUBLIC_BASE_URL") {
            self.server.public_base_url = base;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty");
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return invalid("logging.format must be \"text\" or \"json\"");
        }
        if !self.server.public_base_url.starts_with("http://")
            && !self.server.public_base_url.starts_with("https://")
        {
            return invalid("server.public_base_url must be an http(s) URL");
        }
        if self.booking.nightly_rate <= 0 {
            return invalid("booking.nightly_rate must be positive");
        }
        if self.booking.currency.len() != 3
            || !self.booking.currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return invalid("booking.currency must be a three-letter ISO code");
        }
        if self.booking.pending_hold_minutes < MIN_PENDING_HOLD_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "booking.pending_hold_minutes must be at least {MIN_PENDING_HOLD_MINUTES}"
            )));
        }
        if self.booking.pending_hold_minutes > MAX_PENDING_HOLD_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "booking.pending_hold_minutes must be at most {MAX_PENDING_HOLD_MINUTES}"
            )));
        }
        if self.booking.expiry_grace_minutes < 0 {
            return invalid("booking.expiry_grace_minutes must not be negative");
        }
        if self.booking.sweep_interval_secs == 0 {
            return invalid("booking.sweep_interval_secs must be positive");
        }
        if self.payments.checkout_max_attempts == 0 {
            return invalid("payments.checkout_max_attempts must be at least 1");
        }
        if self.payments.request_timeout_secs == 0 {
            return invalid("payments.request_timeout_secs must be positive");
        }
        if self.payments.webhook_tolerance_secs <= 0 {
            return invalid("payments.webhook_tolerance_secs must be positive");
        }
        if self.rate_limit.reservations_per_minute == 0 {
            return invalid("rate_limit.reservations_per_minute must be positive");
        }
        Ok(())
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
        }
    }

    pub fn stripe_config(&self) -> StripeConfig {
        StripeConfig {
            secret_key: self.payments.stripe_secret_key.clone(),
            api_base: self.payments.api_base.clone(),
            public_base_url: self.server.public_base_url.clone(),
            request_timeout: Duration::from_secs(self.payments.request_timeout_secs),
            session_ttl: chrono::Duration::minutes(self.booking.pending_hold_minutes),
        }
    }

    pub fn reservation_settings(&self) -> ReservationSettings {
        ReservationSettings {
            pricing: Pricing::new(self.booking.nightly_rate, self.booking.currency.to_lowercase()),
            pending_hold: chrono::Duration::minutes(self.booking.pending_hold_minutes),
            expiry_grace: chrono::Duration::minutes(self.booking.expiry_grace_minutes),
            checkout_timeout: Duration::from_secs(self.payments.request_timeout_secs),
            checkout_retry: RetryConfig::default()
                .with_max_attempts(self.payments.checkout_max_attempts),
        }
    }
}
