//! Ledger schema: classrooms, accounts and the append-only transaction log.
//!
//! - `classrooms`: one row per teacher-scoped economy
//! - `accounts`: participant wallets and per-classroom system accounts
//! - `transactions`: one row per balance change (a transfer writes two rows
//!   sharing a `correlation_id`)

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum Classrooms {
    Table,
    Id,
    Name,
    TeacherUserId,
    CreatedAt,
}

#[derive(Iden)]
pub enum Accounts {
    Table,
    Id,
    ClassroomId,
    UserId,
    Name,
    Role,
    SystemKind,
    Balance,
    Revision,
    Archived,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    CorrelationId,
    ClassroomId,
    AccountId,
    Kind,
    AmountMinor,
    BalanceAfter,
    OccurredAt,
    Description,
    CounterpartyAccountId,
    IdempotencyKey,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Classrooms
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Classrooms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Classrooms::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Classrooms::Name).string().not_null())
                    .col(ColumnDef::new(Classrooms::TeacherUserId).string().not_null())
                    .col(ColumnDef::new(Classrooms::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::ClassroomId).string().not_null())
                    .col(ColumnDef::new(Accounts::UserId).string())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Role).string().not_null())
                    .col(ColumnDef::new(Accounts::SystemKind).string())
                    .col(
                        ColumnDef::new(Accounts::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::Revision)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Accounts::CreatedAt).timestamp().not_null())
                    .check(Expr::col(Accounts::Balance).gte(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-classroom_id")
                            .from(Accounts::Table, Accounts::ClassroomId)
                            .to(Classrooms::Table, Classrooms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // SQLite treats NULLs as distinct, so system accounts (no user) and
        // user accounts (no system kind) both fit these unique indexes.
        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-classroom_id-user_id-unique")
                    .table(Accounts::Table)
                    .col(Accounts::ClassroomId)
                    .col(Accounts::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-classroom_id-system_kind-unique")
                    .table(Accounts::Table)
                    .col(Accounts::ClassroomId)
                    .col(Accounts::SystemKind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CorrelationId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::ClassroomId).string().not_null())
                    .col(ColumnDef::new(Transactions::AccountId).string().not_null())
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Description).string().not_null())
                    .col(ColumnDef::new(Transactions::CounterpartyAccountId).string())
                    .col(ColumnDef::new(Transactions::IdempotencyKey).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-classroom_id")
                            .from(Transactions::Table, Transactions::ClassroomId)
                            .to(Classrooms::Table, Classrooms::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-account_id")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-account_id-occurred_at")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-correlation_id")
                    .table(Transactions::Table)
                    .col(Transactions::CorrelationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-classroom_id-idempotency_key")
                    .table(Transactions::Table)
                    .col(Transactions::ClassroomId)
                    .col(Transactions::IdempotencyKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Classrooms::Table).to_owned())
            .await?;
        Ok(())
    }
}
