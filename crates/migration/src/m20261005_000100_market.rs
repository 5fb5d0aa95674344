//! Market schema: instruments, their price history and per-account holdings.

use sea_orm_migration::prelude::*;

use crate::m20261005_000000_ledger::{Accounts, Classrooms};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Instruments {
    Table,
    Id,
    ClassroomId,
    Name,
    PriceMinor,
    VolatilityBp,
    CreatedAt,
}

#[derive(Iden)]
enum PriceHistory {
    Table,
    Id,
    InstrumentId,
    PriceMinor,
    RecordedAt,
}

#[derive(Iden)]
enum Holdings {
    Table,
    AccountId,
    InstrumentId,
    ClassroomId,
    Quantity,
    AvgPriceScaled,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Instruments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Instruments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Instruments::ClassroomId).string().not_null())
                    .col(ColumnDef::new(Instruments::Name).string().not_null())
                    .col(
                        ColumnDef::new(Instruments::PriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Instruments::VolatilityBp)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Instruments::CreatedAt).timestamp().not_null())
                    .check(Expr::col(Instruments::PriceMinor).gt(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-instruments-classroom_id")
                            .from(Instruments::Table, Instruments::ClassroomId)
                            .to(Classrooms::Table, Classrooms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-instruments-classroom_id-name-unique")
                    .table(Instruments::Table)
                    .col(Instruments::ClassroomId)
                    .col(Instruments::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PriceHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceHistory::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PriceHistory::InstrumentId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceHistory::PriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceHistory::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-price_history-instrument_id")
                            .from(PriceHistory::Table, PriceHistory::InstrumentId)
                            .to(Instruments::Table, Instruments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-price_history-instrument_id-recorded_at")
                    .table(PriceHistory::Table)
                    .col(PriceHistory::InstrumentId)
                    .col(PriceHistory::RecordedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Holdings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Holdings::AccountId).string().not_null())
                    .col(ColumnDef::new(Holdings::InstrumentId).string().not_null())
                    .col(ColumnDef::new(Holdings::ClassroomId).string().not_null())
                    .col(ColumnDef::new(Holdings::Quantity).big_integer().not_null())
                    .col(
                        ColumnDef::new(Holdings::AvgPriceScaled)
                            .big_integer()
                            .not_null(),
                    )
                    .check(Expr::col(Holdings::Quantity).gte(0))
                    .primary_key(
                        Index::create()
                            .col(Holdings::AccountId)
                            .col(Holdings::InstrumentId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-holdings-account_id")
                            .from(Holdings::Table, Holdings::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-holdings-instrument_id")
                            .from(Holdings::Table, Holdings::InstrumentId)
                            .to(Instruments::Table, Instruments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-holdings-instrument_id")
                    .table(Holdings::Table)
                    .col(Holdings::InstrumentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Holdings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PriceHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Instruments::Table).to_owned())
            .await?;
        Ok(())
    }
}
