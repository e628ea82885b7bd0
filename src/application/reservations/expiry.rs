//! Background task that periodically expires lapsed pending reservations.
//!
//! A pending reservation holds a slot while its checkout session is open.
//! Once the hold plus a grace period has passed without a confirmation the
//! sweep moves it to `expired`, releasing the slot.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::shared::ShutdownSignal;

use super::lifecycle::ReservationService;

/// Start the expiry sweep, running every `check_interval_secs`.
pub fn start_expiry_sweep(
    service: Arc<ReservationService>,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(check_interval = check_interval_secs, "Expiry sweep started");

        let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = service.expire_stale().await {
                        warn!(error = %e, "Expiry sweep error");
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("Expiry sweep shutting down");
                    break;
                }
            }
        }

        info!("Expiry sweep stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reservations::lifecycle::tests::{request, test_service, FakeGateway};
    use crate::domain::reservation::ReservationStatus;

    #[tokio::test]
    async fn sweep_stops_on_shutdown() {
        let (service, _) = test_service(Arc::new(FakeGateway::default())).await;
        let shutdown = ShutdownSignal::new();
        let handle = start_expiry_sweep(Arc::new(service), shutdown.clone(), 3600);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweep did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn first_tick_leaves_fresh_reservations_alone() {
        let (service, repo) = test_service(Arc::new(FakeGateway::default())).await;
        let created = service
            .create_reservation(&request("saudagata", "2025-07-01", "2025-07-02"))
            .await
            .unwrap();

        let shutdown = ShutdownSignal::new();
        let handle = start_expiry_sweep(Arc::new(service), shutdown.clone(), 3600);
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        handle.await.unwrap();

        let stored = repo.find_by_id(created.reservation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Pending);
    }
}
