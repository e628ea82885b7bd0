//! Graceful shutdown handling
//!
//! One latched flag on a `watch` channel, shared by the HTTP server and the
//! expiry sweep. Once triggered it stays triggered, so late subscribers
//! return immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

/// Shutdown signal that can be cloned and shared across tasks
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn trigger(&self) {
        if !self.tx.send_replace(true) {
            info!("Shutdown signal triggered");
        }
    }

    pub async fn wait(&self) {
        self.notified().wait().await;
    }

    /// Subscribe now, wait later. Take this before a `select!` loop so a
    /// trigger between iterations is not missed.
    pub fn notified(&self) -> ShutdownNotified {
        ShutdownNotified {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ShutdownNotified {
    rx: watch::Receiver<bool>,
}

impl ShutdownNotified {
    pub async fn wait(mut self) {
        // The sender lives as long as any ShutdownSignal clone, so an error
        // here only means every owner is gone.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

/// Resolves on SIGTERM or SIGINT. `None` if the handlers could not be
/// installed.
#[cfg(unix)]
async fn os_shutdown_request() -> Option<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| warn!(error = %e, "Failed to install SIGTERM handler"))
        .ok()?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| warn!(error = %e, "Failed to install SIGINT handler"))
        .ok()?;

    tokio::select! {
        _ = sigterm.recv() => Some("SIGTERM"),
        _ = sigint.recv() => Some("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn os_shutdown_request() -> Option<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| warn!(error = %e, "Failed to install Ctrl+C handler"))
        .ok()?;
    Some("Ctrl+C")
}

/// Owns the process-wide shutdown signal and the drain timeout
pub struct ShutdownCoordinator {
    signal: ShutdownSignal,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            signal: ShutdownSignal::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// How long in-flight work may take to finish after the trigger
    pub fn drain_timeout(&self) -> Duration {
        self.timeout
    }

    /// Trigger shutdown when the process receives SIGTERM or SIGINT.
    pub fn start_signal_listener(&self) {
        let signal = self.signal.clone();
        tokio::spawn(async move {
            if let Some(name) = os_shutdown_request().await {
                info!(signal = name, "Received OS shutdown signal");
                signal.trigger();
            }
        });
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(30)
    }
}
