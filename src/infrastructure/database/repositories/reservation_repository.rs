//! SeaORM implementation of ReservationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use crate::domain::reservation::{
    DateRange, Location, NewReservation, Reservation, ReservationRepository, ReservationStatus,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::reservation;

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    let location = m
        .location
        .parse::<Location>()
        .map_err(|e| DomainError::Storage(format!("reservation {}: {}", m.id, e)))?;
    let status = m
        .status
        .parse::<ReservationStatus>()
        .map_err(|e| DomainError::Storage(format!("reservation {}: {}", m.id, e)))?;

    Ok(Reservation {
        id: m.id,
        full_name: m.full_name,
        email: m.email,
        start_date: m.start_date,
        end_date: m.end_date,
        license_plate: if m.no_license_plate {
            None
        } else {
            m.license_plate
        },
        location,
        nights: m.nights,
        total_price: m.total_price,
        currency: m.currency,
        payment_reference: m.payment_reference,
        checkout_session_id: m.checkout_session_id,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
        completed_at: m.completed_at,
    })
}

fn new_active_model(r: NewReservation) -> reservation::ActiveModel {
    let now = Utc::now();
    reservation::ActiveModel {
        full_name: Set(r.full_name),
        email: Set(r.email),
        start_date: Set(r.range.start),
        end_date: Set(r.range.end),
        no_license_plate: Set(r.license_plate.is_none()),
        license_plate: Set(r.license_plate),
        location: Set(r.location.as_str().to_string()),
        nights: Set(r.nights),
        total_price: Set(r.total_price),
        currency: Set(r.currency),
        payment_reference: Set(r.payment_reference),
        checkout_session_id: Set(None),
        status: Set(ReservationStatus::Pending.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        completed_at: Set(None),
        ..Default::default()
    }
}

/// Capacity-holding reservations at `location` overlapping `range`.
///
/// SQL narrows to rows at the location that end after `range.start`; the
/// status and overlap decision is `ReservationStatus::holds_capacity` and
/// `DateRange::overlaps`.
async fn count_overlapping_on<C: ConnectionTrait>(
    conn: &C,
    location: Location,
    range: DateRange,
    exclude_id: Option<i32>,
) -> DomainResult<u64> {
    let mut query = reservation::Entity::find()
        .filter(reservation::Column::Location.eq(location.as_str()))
        .filter(reservation::Column::EndDate.gt(range.start));
    if let Some(id) = exclude_id {
        query = query.filter(reservation::Column::Id.ne(id));
    }

    let mut taken = 0;
    for model in query.all(conn).await? {
        let r = model_to_domain(model)?;
        if r.status.holds_capacity() && r.range().overlaps(&range) {
            taken += 1;
        }
    }
    Ok(taken)
}

fn matches_reference(reference: &str) -> Condition {
    Condition::any()
        .add(reservation::Column::PaymentReference.eq(reference))
        .add(reservation::Column::CheckoutSessionId.eq(reference))
}

/// `UPDATE ... SET status = to WHERE id = ? AND status = 'pending'`
async fn transition_one<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    to: ReservationStatus,
    now: DateTime<Utc>,
) -> DomainResult<bool> {
    let mut update = reservation::Entity::update_many()
        .col_expr(reservation::Column::Status, Expr::value(to.as_str()))
        .col_expr(reservation::Column::UpdatedAt, Expr::value(now));
    if to == ReservationStatus::Completed {
        update = update.col_expr(reservation::Column::CompletedAt, Expr::value(now));
    }
    let result = update
        .filter(reservation::Column::Id.eq(id))
        .filter(reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn count_overlapping(
        &self,
        location: Location,
        range: DateRange,
        exclude_id: Option<i32>,
    ) -> DomainResult<u64> {
        count_overlapping_on(&self.db, location, range, exclude_id).await
    }

    async fn insert_pending(&self, r: NewReservation) -> DomainResult<Reservation> {
        debug!(reference = %r.payment_reference, location = %r.location, "Inserting reservation");
        let model = new_active_model(r).insert(&self.db).await?;
        model_to_domain(model)
    }

    async fn insert_pending_within_capacity(
        &self,
        r: NewReservation,
        limit: u64,
    ) -> DomainResult<Option<Reservation>> {
        let txn = self.db.begin().await?;

        let taken = count_overlapping_on(&txn, r.location, r.range, None).await?;
        if taken >= limit {
            debug!(location = %r.location, taken, limit, "No capacity left");
            txn.rollback().await?;
            return Ok(None);
        }

        debug!(reference = %r.payment_reference, location = %r.location, taken, "Inserting reservation within capacity");
        let model = new_active_model(r).insert(&txn).await?;
        txn.commit().await?;
        model_to_domain(model).map(Some)
    }

    async fn attach_checkout_session(&self, id: i32, session_id: &str) -> DomainResult<()> {
        let result = reservation::Entity::update_many()
            .col_expr(reservation::Column::CheckoutSessionId, Expr::value(session_id))
            .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(reservation::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound {
                entity: "Reservation",
                field: "id",
                value: id.to_string(),
            });
        }
        Ok(())
    }

    async fn transition_pending(
        &self,
        reference: &str,
        to: ReservationStatus,
    ) -> DomainResult<Vec<Reservation>> {
        let candidates = reservation::Entity::find()
            .filter(matches_reference(reference))
            .filter(reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
            .all(&self.db)
            .await?;

        let now = Utc::now();
        let mut transitioned = Vec::with_capacity(candidates.len());
        for model in candidates {
            // A concurrent delivery may have won the race since the select.
            if !transition_one(&self.db, model.id, to, now).await? {
                debug!(id = model.id, "Reservation already left pending");
                continue;
            }
            let mut r = model_to_domain(model)?;
            r.status = to;
            r.updated_at = now;
            if to == ReservationStatus::Completed {
                r.completed_at = Some(now);
            }
            transitioned.push(r);
        }
        Ok(transitioned)
    }

    async fn transition_pending_by_id(&self, id: i32, to: ReservationStatus) -> DomainResult<bool> {
        transition_one(&self.db, id, to, Utc::now()).await
    }

    async fn expire_pending_created_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let result = reservation::Entity::update_many()
            .col_expr(
                reservation::Column::Status,
                Expr::value(ReservationStatus::Expired.as_str()),
            )
            .col_expr(reservation::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
            .filter(reservation::Column::CreatedAt.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn find_released_by_reference(&self, reference: &str) -> DomainResult<Vec<Reservation>> {
        let mut released = Vec::new();
        for model in reservation::Entity::find()
            .filter(matches_reference(reference))
            .all(&self.db)
            .await?
        {
            let r = model_to_domain(model)?;
            if !r.status.holds_capacity() {
                released.push(r);
            }
        }
        Ok(released)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        reservation::Entity::find()
            .order_by_desc(reservation::Column::CreatedAt)
            .order_by_desc(reservation::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::test_database;
    use chrono::{Duration, NaiveDate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_reservation(location: Location, start: NaiveDate, end: NaiveDate) -> NewReservation {
        let range = DateRange::new(start, end).unwrap();
        NewReservation {
            full_name: "Ola Nordmann".into(),
            email: "ola@example.no".into(),
            range,
            license_plate: Some("EL12345".into()),
            location,
            nights: range.nights() as i32,
            total_price: range.nights() * 15000,
            currency: "nok".into(),
            payment_reference: NewReservation::generate_payment_reference(),
        }
    }

    async fn repo() -> SeaOrmReservationRepository {
        SeaOrmReservationRepository::new(test_database().await)
    }

    #[tokio::test]
    async fn insert_and_find_roundtrip() {
        let repo = repo().await;
        let mut new = new_reservation(Location::JensZetlitzGate, date(2025, 7, 1), date(2025, 7, 4));
        new.license_plate = None;
        let saved = repo.insert_pending(new.clone()).await.unwrap();

        assert_eq!(saved.status, ReservationStatus::Pending);
        assert_eq!(saved.payment_reference, new.payment_reference);
        assert!(saved.no_license_plate());

        let found = repo.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found, saved);
        assert!(repo.find_by_id(saved.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overlap_count_ignores_touching_and_inactive() {
        let repo = repo().await;
        let a = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 1), date(2025, 6, 3)))
            .await
            .unwrap();
        let b = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 2), date(2025, 6, 6)))
            .await
            .unwrap();
        repo.insert_pending(new_reservation(Location::JensZetlitzGate, date(2025, 6, 3), date(2025, 6, 5)))
            .await
            .unwrap();

        let window = DateRange::new(date(2025, 6, 3), date(2025, 6, 5)).unwrap();
        assert_eq!(repo.count_overlapping(Location::Saudagata, window, None).await.unwrap(), 1);
        assert_eq!(
            repo.count_overlapping(Location::Saudagata, window, Some(b.id)).await.unwrap(),
            0
        );

        let wide = DateRange::new(date(2025, 5, 1), date(2025, 7, 1)).unwrap();
        assert_eq!(repo.count_overlapping(Location::Saudagata, wide, None).await.unwrap(), 2);

        assert!(repo
            .transition_pending_by_id(a.id, ReservationStatus::Expired)
            .await
            .unwrap());
        assert_eq!(repo.count_overlapping(Location::Saudagata, wide, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn insert_within_capacity_refuses_when_full() {
        let repo = repo().await;
        let start = date(2025, 8, 1);
        let end = date(2025, 8, 5);

        for _ in 0..2 {
            let admitted = repo
                .insert_pending_within_capacity(new_reservation(Location::Saudagata, start, end), 2)
                .await
                .unwrap();
            assert!(admitted.is_some());
        }

        let refused = repo
            .insert_pending_within_capacity(new_reservation(Location::Saudagata, start, end), 2)
            .await
            .unwrap();
        assert!(refused.is_none());
        assert_eq!(repo.find_all().await.unwrap().len(), 2);

        let disjoint = repo
            .insert_pending_within_capacity(
                new_reservation(Location::Saudagata, end, date(2025, 8, 7)),
                2,
            )
            .await
            .unwrap();
        assert!(disjoint.is_some());
    }

    #[tokio::test]
    async fn transition_is_conditional_on_pending() {
        let repo = repo().await;
        let saved = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();

        let first = repo
            .transition_pending(&saved.payment_reference, ReservationStatus::Completed)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, ReservationStatus::Completed);
        assert!(first[0].completed_at.is_some());

        let second = repo
            .transition_pending(&saved.payment_reference, ReservationStatus::Completed)
            .await
            .unwrap();
        assert!(second.is_empty());

        let expired = repo
            .transition_pending(&saved.payment_reference, ReservationStatus::Expired)
            .await
            .unwrap();
        assert!(expired.is_empty());

        let stored = repo.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Completed);
    }

    #[tokio::test]
    async fn transition_matches_checkout_session_id() {
        let repo = repo().await;
        let saved = repo
            .insert_pending(new_reservation(Location::JensZetlitzGate, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();
        repo.attach_checkout_session(saved.id, "cs_test_123").await.unwrap();

        let done = repo
            .transition_pending("cs_test_123", ReservationStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].checkout_session_id.as_deref(), Some("cs_test_123"));
    }

    #[tokio::test]
    async fn attach_to_missing_reservation_is_not_found() {
        let repo = repo().await;
        let err = repo.attach_checkout_session(42, "cs_test").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn expire_only_touches_old_pending_rows() {
        let repo = repo().await;
        let pending = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();
        let paid = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();
        repo.transition_pending(&paid.payment_reference, ReservationStatus::Completed)
            .await
            .unwrap();

        let none = repo
            .expire_pending_created_before(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(none, 0);

        let expired = repo
            .expire_pending_created_before(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(expired, 1);

        let pending = repo.find_by_id(pending.id).await.unwrap().unwrap();
        let paid = repo.find_by_id(paid.id).await.unwrap().unwrap();
        assert_eq!(pending.status, ReservationStatus::Expired);
        assert_eq!(paid.status, ReservationStatus::Completed);
    }

    #[tokio::test]
    async fn find_all_is_newest_first() {
        let repo = repo().await;
        let first = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();
        let second = repo
            .insert_pending(new_reservation(Location::JensZetlitzGate, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn completed_rows_keep_holding_capacity() {
        let repo = repo().await;
        let start = date(2025, 9, 1);
        let end = date(2025, 9, 4);

        for _ in 0..2 {
            let admitted = repo
                .insert_pending_within_capacity(new_reservation(Location::Saudagata, start, end), 2)
                .await
                .unwrap()
                .unwrap();
            let paid = repo
                .transition_pending(&admitted.payment_reference, ReservationStatus::Completed)
                .await
                .unwrap();
            assert_eq!(paid.len(), 1);
        }

        let range = DateRange::new(start, end).unwrap();
        assert_eq!(repo.count_overlapping(Location::Saudagata, range, None).await.unwrap(), 2);

        let refused = repo
            .insert_pending_within_capacity(
                new_reservation(Location::Saudagata, date(2025, 9, 3), date(2025, 9, 6)),
                2,
            )
            .await
            .unwrap();
        assert!(refused.is_none());
    }

    #[tokio::test]
    async fn released_lookup_skips_rows_holding_capacity() {
        let repo = repo().await;
        let lapsed = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();
        repo.attach_checkout_session(lapsed.id, "cs_test_lapsed").await.unwrap();
        let also_lapsed = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();

        repo.expire_pending_created_before(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        let still_pending = repo
            .insert_pending(new_reservation(Location::Saudagata, date(2025, 6, 1), date(2025, 6, 2)))
            .await
            .unwrap();

        let released = repo.find_released_by_reference("cs_test_lapsed").await.unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].id, lapsed.id);
        assert_eq!(released[0].status, ReservationStatus::Expired);

        assert_eq!(
            repo.find_released_by_reference(&also_lapsed.payment_reference)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(repo
            .find_released_by_reference(&still_pending.payment_reference)
            .await
            .unwrap()
            .is_empty());
    }
}
