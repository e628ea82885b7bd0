//! Reservation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub full_name: String,
    pub email: String,

    /// First night, inclusive
    pub start_date: Date,
    /// Departure day, exclusive
    pub end_date: Date,

    #[sea_orm(nullable)]
    pub license_plate: Option<String>,
    pub no_license_plate: bool,

    /// Location key: jens-zetlitz-gate, saudagata, torbjorn-hornkloves-gate
    pub location: String,
    pub nights: i32,
    /// Minor currency units
    pub total_price: i64,
    pub currency: String,

    #[sea_orm(unique)]
    pub payment_reference: String,
    #[sea_orm(nullable, unique)]
    pub checkout_session_id: Option<String>,

    /// Reservation status: pending, completed, expired, cancelled
    pub status: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    #[sea_orm(nullable)]
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
