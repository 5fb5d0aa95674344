use sea_orm_migration::prelude::*;

use crate::m20261005_000000_ledger::{Accounts, Classrooms};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum SavingsProducts {
    Table,
    Id,
    ClassroomId,
    Name,
    MaturityDays,
    RateBp,
    CancellationRateBp,
    MaxAmountMinor,
    CreatedAt,
}

#[derive(Iden)]
enum SavingsSubscriptions {
    Table,
    Id,
    ClassroomId,
    AccountId,
    ProductId,
    PrincipalMinor,
    JoinedAt,
    MaturesAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SavingsProducts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SavingsProducts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SavingsProducts::ClassroomId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SavingsProducts::Name).string().not_null())
                    .col(
                        ColumnDef::new(SavingsProducts::MaturityDays)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SavingsProducts::RateBp).integer().not_null())
                    .col(
                        ColumnDef::new(SavingsProducts::CancellationRateBp)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SavingsProducts::MaxAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SavingsProducts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-savings_products-classroom_id")
                            .from(SavingsProducts::Table, SavingsProducts::ClassroomId)
                            .to(Classrooms::Table, Classrooms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SavingsSubscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SavingsSubscriptions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SavingsSubscriptions::ClassroomId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SavingsSubscriptions::AccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SavingsSubscriptions::ProductId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SavingsSubscriptions::PrincipalMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SavingsSubscriptions::JoinedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SavingsSubscriptions::MaturesAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-savings_subscriptions-account_id")
                            .from(SavingsSubscriptions::Table, SavingsSubscriptions::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-savings_subscriptions-product_id")
                            .from(SavingsSubscriptions::Table, SavingsSubscriptions::ProductId)
                            .to(SavingsProducts::Table, SavingsProducts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-savings_subscriptions-matures_at")
                    .table(SavingsSubscriptions::Table)
                    .col(SavingsSubscriptions::ClassroomId)
                    .col(SavingsSubscriptions::MaturesAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-savings_subscriptions-account_id")
                    .table(SavingsSubscriptions::Table)
                    .col(SavingsSubscriptions::AccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SavingsSubscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SavingsProducts::Table).to_owned())
            .await?;
        Ok(())
    }
}
