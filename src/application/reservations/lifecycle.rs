//! Reservation lifecycle
//!
//! Creates pending reservations behind a hosted checkout and reconciles the
//! provider's asynchronous outcome. Status is only ever changed through
//! conditional `pending -> *` transitions, so replayed events are no-ops.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use metrics::counter;
use tracing::{error, info, warn};

use crate::application::ports::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentEvent, PaymentGateway,
};
use crate::domain::reservation::{
    NewReservation, Pricing, Reservation, ReservationRepository, ReservationStatus,
};
use crate::domain::{DomainError, DomainResult};
use crate::shared::{retry_with_backoff, RetryConfig};

use super::availability::AvailabilityChecker;
use super::request::ReservationRequest;

/// Tunables for reservation creation and checkout.
#[derive(Debug, Clone)]
pub struct ReservationSettings {
    pub pricing: Pricing,
    /// How long a pending reservation holds its slot
    pub pending_hold: chrono::Duration,
    /// Extra time after the hold before the sweep expires a reservation
    pub expiry_grace: chrono::Duration,
    pub checkout_timeout: Duration,
    pub checkout_retry: RetryConfig,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            pricing: Pricing::new(15000, "nok"),
            pending_hold: chrono::Duration::minutes(60),
            expiry_grace: chrono::Duration::minutes(5),
            checkout_timeout: Duration::from_secs(10),
            checkout_retry: RetryConfig::default(),
        }
    }
}

/// A pending reservation and the checkout session the customer pays through.
#[derive(Debug, Clone)]
pub struct CreatedReservation {
    pub reservation: Reservation,
    pub session: CheckoutSession,
}

/// Outcome of applying a payment event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Confirmed(Vec<Reservation>),
    Expired(Vec<Reservation>),
    /// Payment arrived for reservations that had already released their
    /// slot. Nothing is reinstated; these need a refund or manual rebooking.
    PaidAfterRelease(Vec<Reservation>),
    Ignored,
}

pub struct ReservationService {
    repo: Arc<dyn ReservationRepository>,
    availability: AvailabilityChecker,
    gateway: Arc<dyn PaymentGateway>,
    settings: ReservationSettings,
    today: fn() -> NaiveDate,
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

impl ReservationService {
    pub fn new(
        repo: Arc<dyn ReservationRepository>,
        gateway: Arc<dyn PaymentGateway>,
        settings: ReservationSettings,
    ) -> Self {
        Self {
            availability: AvailabilityChecker::new(repo.clone()),
            repo,
            gateway,
            settings,
            today: utc_today,
        }
    }

    /// Replace the clock used for the "start date not in the past" check.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn availability(&self) -> &AvailabilityChecker {
        &self.availability
    }

    pub fn settings(&self) -> &ReservationSettings {
        &self.settings
    }

    pub async fn list_reservations(&self) -> DomainResult<Vec<Reservation>> {
        self.repo.find_all().await
    }

    /// Validate, admit as pending, then open a checkout session for it.
    ///
    /// If the session cannot be opened the reservation is cancelled, which
    /// releases its slot, and the provider error is returned.
    pub async fn create_reservation(
        &self,
        request: &ReservationRequest,
    ) -> DomainResult<CreatedReservation> {
        let valid = request.validate((self.today)())?;
        let nights = i32::try_from(valid.range.nights())
            .map_err(|_| DomainError::validation("End date must be after start date"))?;

        let new = NewReservation {
            full_name: valid.full_name,
            email: valid.email,
            range: valid.range,
            license_plate: valid.license_plate,
            location: valid.location,
            nights,
            total_price: self.settings.pricing.total_for(&valid.range),
            currency: self.settings.pricing.currency.clone(),
            payment_reference: NewReservation::generate_payment_reference(),
        };

        let mut reservation = self.availability.admit(new).await?;
        counter!("reservations_created_total", "location" => reservation.location.as_str())
            .increment(1);
        info!(
            reservation_id = reservation.id,
            reference = %reservation.payment_reference,
            location = %reservation.location,
            nights = reservation.nights,
            total_price = reservation.total_price,
            "Reservation admitted as pending"
        );

        let checkout = checkout_request(&reservation);
        let session = match self.open_checkout(&checkout).await {
            Ok(session) => session,
            Err(e) => {
                counter!("checkout_session_failures_total").increment(1);
                self.cancel_after_checkout_failure(&reservation, &e).await;
                return Err(e.into());
            }
        };

        // The provider echoes the payment reference back, so a failed attach
        // still lets the confirmation find this row.
        if let Err(e) = self
            .repo
            .attach_checkout_session(reservation.id, &session.id)
            .await
        {
            warn!(
                reservation_id = reservation.id,
                session_id = %session.id,
                error = %e,
                "Failed to record checkout session id"
            );
        } else {
            reservation.checkout_session_id = Some(session.id.clone());
        }

        Ok(CreatedReservation {
            reservation,
            session,
        })
    }

    async fn open_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let timeout = self.settings.checkout_timeout;
        retry_with_backoff(
            self.settings.checkout_retry.clone(),
            || async move {
                tokio::time::timeout(timeout, self.gateway.create_checkout_session(request))
                    .await
                    .unwrap_or(Err(PaymentError::Timeout))
            },
            PaymentError::is_transient,
            "create_checkout_session",
        )
        .await
    }

    async fn cancel_after_checkout_failure(&self, reservation: &Reservation, cause: &PaymentError) {
        warn!(
            reservation_id = reservation.id,
            reference = %reservation.payment_reference,
            error = %cause,
            "Checkout session failed, cancelling reservation"
        );
        match self
            .repo
            .transition_pending_by_id(reservation.id, ReservationStatus::Cancelled)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                reservation_id = reservation.id,
                "Reservation left pending before it could be cancelled"
            ),
            Err(e) => error!(
                reservation_id = reservation.id,
                error = %e,
                "Failed to cancel reservation; the expiry sweep will release it"
            ),
        }
    }

    /// Mark pending reservations matching `reference` as completed.
    ///
    /// Already-settled or unknown references transition nothing and are not
    /// an error.
    pub async fn confirm_reservation(&self, reference: &str) -> DomainResult<Vec<Reservation>> {
        let confirmed = self
            .repo
            .transition_pending(reference, ReservationStatus::Completed)
            .await?;

        if confirmed.is_empty() {
            warn!(reference = %reference, "No pending reservation for confirmation");
        } else {
            counter!("reservations_confirmed_total").increment(confirmed.len() as u64);
            for r in &confirmed {
                info!(reservation_id = r.id, reference = %reference, "Reservation completed");
            }
        }
        Ok(confirmed)
    }

    /// Expire pending reservations whose checkout session lapsed.
    pub async fn expire_reservation(&self, reference: &str) -> DomainResult<Vec<Reservation>> {
        let expired = self
            .repo
            .transition_pending(reference, ReservationStatus::Expired)
            .await?;

        if expired.is_empty() {
            warn!(reference = %reference, "No pending reservation to expire");
        } else {
            counter!("reservations_expired_total", "source" => "provider")
                .increment(expired.len() as u64);
            info!(reference = %reference, count = expired.len(), "Reservation expired by provider");
        }
        Ok(expired)
    }

    /// Expire every pending reservation whose checkout hold has lapsed.
    pub async fn expire_stale(&self) -> DomainResult<u64> {
        let cutoff = Utc::now() - (self.settings.pending_hold + self.settings.expiry_grace);
        let expired = self.repo.expire_pending_created_before(cutoff).await?;
        if expired > 0 {
            counter!("reservations_expired_total", "source" => "sweep").increment(expired);
            info!(count = expired, cutoff = %cutoff, "Expired stale pending reservations");
        }
        Ok(expired)
    }

    pub async fn apply_payment_event(&self, event: &PaymentEvent) -> DomainResult<EventOutcome> {
        match event {
            PaymentEvent::Completed { reference } => {
                let confirmed = self.confirm_reservation(reference).await?;
                if !confirmed.is_empty() {
                    return Ok(EventOutcome::Confirmed(confirmed));
                }
                let released = self.repo.find_released_by_reference(reference).await?;
                if released.is_empty() {
                    return Ok(EventOutcome::Confirmed(confirmed));
                }
                counter!("payments_after_release_total").increment(released.len() as u64);
                for r in &released {
                    error!(
                        reservation_id = r.id,
                        reference = %reference,
                        status = %r.status,
                        "Payment completed for a reservation that no longer holds its slot"
                    );
                }
                Ok(EventOutcome::PaidAfterRelease(released))
            }
            PaymentEvent::Expired { reference } => {
                self.expire_reservation(reference).await.map(EventOutcome::Expired)
            }
            PaymentEvent::Ignored { kind } => {
                info!(event_type = %kind, "Unhandled payment event");
                Ok(EventOutcome::Ignored)
            }
        }
    }
}

fn checkout_request(r: &Reservation) -> CheckoutRequest {
    let plural = if r.nights == 1 { "" } else { "s" };
    let metadata = BTreeMap::from([
        ("reservation_id".to_string(), r.id.to_string()),
        ("payment_reference".to_string(), r.payment_reference.clone()),
        ("location".to_string(), r.location.as_str().to_string()),
        ("start_date".to_string(), r.start_date.to_string()),
        ("end_date".to_string(), r.end_date.to_string()),
        ("nights".to_string(), r.nights.to_string()),
        ("total_price".to_string(), r.total_price.to_string()),
        ("full_name".to_string(), r.full_name.clone()),
        ("email".to_string(), r.email.clone()),
        (
            "license_plate".to_string(),
            r.license_plate.clone().unwrap_or_default(),
        ),
    ]);

    CheckoutRequest {
        payment_reference: r.payment_reference.clone(),
        amount: r.total_price,
        currency: r.currency.clone(),
        product_name: format!("Parking at {}", r.location.display_name()),
        description: format!(
            "{} night{} parking from {} to {}",
            r.nights, plural, r.start_date, r.end_date
        ),
        customer_email: r.email.clone(),
        metadata,
    }
}

// ── Tests ──────────────────────────────────────────────────────
