//! Capacity-constrained admission
//!
//! Only locations with a capacity limit touch the store. Admission at such a
//! location is serialized by a per-location lock and counts plus inserts in
//! one database transaction.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::reservation::{
    DateRange, Location, NewReservation, Reservation, ReservationRepository,
};
use crate::domain::{DomainError, DomainResult};

pub struct AvailabilityChecker {
    repo: Arc<dyn ReservationRepository>,
    admission_locks: HashMap<Location, Mutex<()>>,
}

impl AvailabilityChecker {
    pub fn new(repo: Arc<dyn ReservationRepository>) -> Self {
        let admission_locks = Location::ALL
            .into_iter()
            .filter(|l| l.capacity().is_some())
            .map(|l| (l, Mutex::new(())))
            .collect();
        Self {
            repo,
            admission_locks,
        }
    }

    /// Whether one more reservation fits at `location` over `range`.
    pub async fn has_capacity(
        &self,
        location: Location,
        range: DateRange,
        exclude_id: Option<i32>,
    ) -> DomainResult<bool> {
        let Some(limit) = location.capacity() else {
            return Ok(true);
        };
        let taken = self
            .repo
            .count_overlapping(location, range, exclude_id)
            .await?;
        debug!(location = %location, taken, limit, "Capacity check");
        Ok(taken < limit)
    }

    /// Persist `reservation` as pending if its location has room.
    pub async fn admit(&self, reservation: NewReservation) -> DomainResult<Reservation> {
        let location = reservation.location;
        let (Some(limit), Some(lock)) = (location.capacity(), self.admission_locks.get(&location))
        else {
            return self.repo.insert_pending(reservation).await;
        };

        let _guard = lock.lock().await;
        self.repo
            .insert_pending_within_capacity(reservation, limit)
            .await?
            .ok_or(DomainError::CapacityExceeded { location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::ReservationStatus;
    use crate::infrastructure::database::repositories::SeaOrmReservationRepository;
    use crate::infrastructure::database::test_database;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(a: &str, b: &str) -> DateRange {
        DateRange::new(date(a), date(b)).unwrap()
    }

    fn new_reservation(location: Location, range: DateRange) -> NewReservation {
        NewReservation {
            full_name: "Ola Nordmann".into(),
            email: "ola@example.no".into(),
            range,
            license_plate: None,
            location,
            nights: range.nights() as i32,
            total_price: range.nights() * 15000,
            currency: "nok".into(),
            payment_reference: NewReservation::generate_payment_reference(),
        }
    }

    async fn checker() -> (AvailabilityChecker, Arc<dyn ReservationRepository>) {
        let repo: Arc<dyn ReservationRepository> =
            Arc::new(SeaOrmReservationRepository::new(test_database().await));
        (AvailabilityChecker::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn unconstrained_locations_always_have_capacity() {
        let (checker, _) = checker().await;
        let r = range("2025-06-01", "2025-06-05");
        for _ in 0..5 {
            checker
                .admit(new_reservation(Location::JensZetlitzGate, r))
                .await
                .unwrap();
        }
        assert!(checker
            .has_capacity(Location::JensZetlitzGate, r, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn third_overlapping_admission_is_refused() {
        let (checker, _) = checker().await;
        let r = range("2025-06-01", "2025-06-10");

        checker.admit(new_reservation(Location::Saudagata, r)).await.unwrap();
        let second = checker.admit(new_reservation(Location::Saudagata, r)).await.unwrap();

        let window = range("2025-06-04", "2025-06-06");
        assert!(!checker.has_capacity(Location::Saudagata, window, None).await.unwrap());
        assert!(checker
            .has_capacity(Location::Saudagata, window, Some(second.id))
            .await
            .unwrap());

        let err = checker
            .admit(new_reservation(Location::Saudagata, window))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::CapacityExceeded {
                location: Location::Saudagata
            }
        ));

        let disjoint = range("2025-06-10", "2025-06-12");
        assert!(checker.has_capacity(Location::Saudagata, disjoint, None).await.unwrap());
        checker
            .admit(new_reservation(Location::Saudagata, disjoint))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn released_slots_are_reusable() {
        let (checker, repo) = checker().await;
        let r = range("2025-06-01", "2025-06-03");

        let first = checker.admit(new_reservation(Location::Saudagata, r)).await.unwrap();
        checker.admit(new_reservation(Location::Saudagata, r)).await.unwrap();
        assert!(!checker.has_capacity(Location::Saudagata, r, None).await.unwrap());

        repo.transition_pending_by_id(first.id, ReservationStatus::Cancelled)
            .await
            .unwrap();
        assert!(checker.has_capacity(Location::Saudagata, r, None).await.unwrap());
    }

    #[tokio::test]
    async fn paid_reservations_still_fill_the_location() {
        let (checker, repo) = checker().await;
        let r = range("2025-07-01", "2025-07-05");

        for _ in 0..2 {
            let admitted = checker.admit(new_reservation(Location::Saudagata, r)).await.unwrap();
            assert!(repo
                .transition_pending_by_id(admitted.id, ReservationStatus::Completed)
                .await
                .unwrap());
        }

        let paid = repo.find_all().await.unwrap();
        assert!(paid.iter().all(|p| p.status == ReservationStatus::Completed));

        let err = checker
            .admit(new_reservation(Location::Saudagata, range("2025-07-04", "2025-07-08")))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::CapacityExceeded { .. }));
        assert_eq!(repo.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_admissions_never_exceed_capacity() {
        let (checker, repo) = checker().await;
        let checker = Arc::new(checker);
        let r = range("2025-09-01", "2025-09-08");

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let checker = checker.clone();
                tokio::spawn(async move {
                    checker.admit(new_reservation(Location::Saudagata, r)).await
                })
            })
            .collect();

        let mut admitted = 0;
        let mut refused = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(DomainError::CapacityExceeded { .. }) => refused += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(admitted, 2);
        assert_eq!(refused, 6);
        assert_eq!(
            repo.count_overlapping(Location::Saudagata, r, None).await.unwrap(),
            2
        );
    }
}
