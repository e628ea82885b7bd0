//! Staysville Parking CLI server
//!
//! Headless parking reservation service suitable for deployment as a
//! systemd service, Docker container, or standalone process.
//!
//! ```sh
//! # Run with default config (~/.config/staysville-parking/config.toml)
//! parking-cli
//!
//! # Custom config path
//! parking-cli --config /etc/staysville-parking/config.toml
//!
//! # Override the API port
//! parking-cli --api-port 8080
//!
//! # Validate config without starting
//! parking-cli --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use staysville_parking::config::AppConfig;
use staysville_parking::server::{init_tracing, ServerHandle, ServerOptions};

/// Staysville Parking reservation server.
#[derive(Parser, Debug)]
#[command(
    name = "parking-cli",
    version,
    about = "Parking reservation service with hosted checkout",
    long_about = "Staysville Parking REST API server: reservations, payment \
                  webhooks and the admin listing.\n\n\
                  Default config: ~/.config/staysville-parking/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "PARKING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

fn configured(value: bool) -> &'static str {
    if value {
        "configured"
    } else {
        "NOT configured"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(staysville_parking::default_config_path);

    let loaded = AppConfig::load(&config_path);

    // ── Check mode: report and exit ────────────────────────────
    if cli.check {
        let mut config = loaded?;
        if let Some(port) = cli.api_port {
            config.server.api_port = port;
        }
        config.validate()?;
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.api_host, config.server.api_port);
        println!("   Database    : {}", config.database.url);
        println!("   Log level   : {}", config.logging.level);
        println!(
            "   Stripe key  : {}",
            configured(config.payments.stripe_secret_key.is_some())
        );
        println!(
            "   Webhook     : {}",
            configured(config.payments.webhook_secret.is_some())
        );
        println!(
            "   Admin       : {}",
            configured(config.admin.username.is_some() && config.admin.password.is_some())
        );
        return Ok(());
    }

    let (mut config, load_error) = match loaded {
        Ok(cfg) => (cfg, None),
        Err(e) => {
            let mut cfg = AppConfig::default();
            cfg.apply_env_overrides();
            (cfg, Some(e))
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);

    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }
    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
