//! Reusable parking service runtime.
//!
//! [`ServerHandle`] owns the full server lifecycle: database init,
//! migrations, the checkout client, the REST API, the expiry sweep,
//! metrics and graceful shutdown. The CLI binary and `main.rs` both start
//! the service through it.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::application::{start_expiry_sweep, ReservationService};
use crate::config::AppConfig;
use crate::infrastructure::database::repositories::SeaOrmReservationRepository;
use crate::infrastructure::{init_database, run_migrations, StripeCheckoutClient, WebhookVerifier};
use crate::interfaces::http::{AdminAuth, ReservationRateLimiter};
use crate::interfaces::{create_api_router, AppState};
use crate::shared::{ShutdownCoordinator, ShutdownSignal};

/// Initialise the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the parking service.
pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running parking service.
///
/// ```rust,no_run
/// use staysville_parking::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.shutdown_signal().wait().await;
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub service: Arc<ReservationService>,
    pub config: AppConfig,
    /// Address the REST API is bound to
    pub local_addr: SocketAddr,
    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    api_task: JoinHandle<()>,
    sweep_task: JoinHandle<()>,
}

/// The global metrics recorder can only be installed once per process,
/// so a restart within the same process reuses it.
fn prometheus_handle() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("📊 Prometheus metrics recorder installed");
    Ok(PROM_HANDLE.get_or_init(|| handle).clone())
}

impl ServerHandle {
    /// Start the service:
    /// 1. Install the Prometheus recorder
    /// 2. Connect to the database and run migrations
    /// 3. Build the checkout client and reservation service
    /// 4. Start the REST API and the expiry sweep
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        app_cfg.validate()?;
        info!("Starting Staysville parking service...");

        let metrics = prometheus_handle()?;

        // ── Database ───────────────────────────────────────────
        let db = init_database(&app_cfg.database_config()).await?;
        if opts.auto_migrate {
            info!("Running database migrations...");
            run_migrations(&db).await?;
            info!("Migrations completed");
        }

        // ── Payments ───────────────────────────────────────────
        let gateway = StripeCheckoutClient::new(app_cfg.stripe_config())?;
        if !gateway.is_configured() {
            warn!("⚠️  No Stripe secret key configured; reservations cannot be paid");
        }
        let webhook_verifier = match app_cfg.payments.webhook_secret.as_deref() {
            Some(secret) => Some(Arc::new(
                WebhookVerifier::new(secret).with_tolerance(app_cfg.payments.webhook_tolerance_secs),
            )),
            None => {
                warn!("⚠️  No webhook secret configured; payment webhooks will be refused");
                None
            }
        };

        // ── Services ───────────────────────────────────────────
        let repo = Arc::new(SeaOrmReservationRepository::new(db.clone()));
        let service = Arc::new(ReservationService::new(
            repo,
            Arc::new(gateway),
            app_cfg.reservation_settings(),
        ));

        let admin_auth = AdminAuth::new(
            app_cfg.admin.username.as_deref(),
            app_cfg.admin.password.as_deref(),
        );
        if !admin_auth.is_configured() {
            warn!("⚠️  No admin credentials configured; the admin listing is closed");
        }

        let rate_limiter =
            ReservationRateLimiter::per_minute(app_cfg.rate_limit.reservations_per_minute);

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── Background tasks ───────────────────────────────────
        let sweep_task = start_expiry_sweep(
            service.clone(),
            shutdown_signal.clone(),
            app_cfg.booking.sweep_interval_secs,
        );

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(AppState {
            db: db.clone(),
            service: service.clone(),
            webhook_verifier,
            admin_auth,
            rate_limiter,
            metrics,
            started_at: Arc::new(Instant::now()),
        });

        let api_addr = format!("{}:{}", app_cfg.server.api_host, app_cfg.server.api_port);
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API server listening on http://{}", local_addr);
        info!("OpenAPI document at http://{}/api-doc/openapi.json", local_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(
            listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });
        info!("🚀 Parking service started");

        Ok(Self {
            service,
            config: app_cfg,
            local_addr,
            db,
            shutdown,
            api_task,
            sweep_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to stop after shutdown has been triggered, giving
    /// in-flight requests up to `server.shutdown_timeout` seconds.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");
        let timeout = self.shutdown.drain_timeout();

        match tokio::time::timeout(timeout, self.api_task).await {
            Ok(Ok(())) => info!("REST API server stopped"),
            Ok(Err(e)) => error!("REST API server task panicked: {}", e),
            Err(_) => warn!("REST API server did not stop within {:?}", timeout),
        }
        if let Err(e) = self.sweep_task.await {
            error!("Expiry sweep task panicked: {}", e);
        }

        if let Err(e) = self.db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }
        info!("👋 Parking service shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down parking service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}
