//! Create reservations table
//!
//! One row per parking reservation. The payment reference and checkout
//! session id are unique so confirmation events resolve to one row.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reservations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reservations::FullName).string().not_null())
                    .col(ColumnDef::new(Reservations::Email).string().not_null())
                    .col(ColumnDef::new(Reservations::StartDate).date().not_null())
                    .col(ColumnDef::new(Reservations::EndDate).date().not_null())
                    .col(ColumnDef::new(Reservations::LicensePlate).string())
                    .col(
                        ColumnDef::new(Reservations::NoLicensePlate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Reservations::Location).string().not_null())
                    .col(ColumnDef::new(Reservations::Nights).integer().not_null())
                    .col(
                        ColumnDef::new(Reservations::TotalPrice)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::Currency)
                            .string()
                            .not_null()
                            .default("nok"),
                    )
                    .col(
                        ColumnDef::new(Reservations::PaymentReference)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reservations::CheckoutSessionId).string())
                    .col(
                        ColumnDef::new(Reservations::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Reservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reservations::CompletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_payment_reference")
                    .table(Reservations::Table)
                    .col(Reservations::PaymentReference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_checkout_session")
                    .table(Reservations::Table)
                    .col(Reservations::CheckoutSessionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_location_status")
                    .table(Reservations::Table)
                    .col(Reservations::Location)
                    .col(Reservations::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_status_created")
                    .table(Reservations::Table)
                    .col(Reservations::Status)
                    .col(Reservations::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reservations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Reservations {
    Table,
    Id,
    FullName,
    Email,
    StartDate,
    EndDate,
    LicensePlate,
    NoLicensePlate,
    Location,
    Nights,
    TotalPrice,
    Currency,
    PaymentReference,
    CheckoutSessionId,
    Status,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}
