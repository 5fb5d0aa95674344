use sea_orm_migration::prelude::*;

use crate::m20261005_000000_ledger::{Accounts, Classrooms};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum TaxBills {
    Table,
    Id,
    ClassroomId,
    Name,
    AmountMinor,
    DueAt,
    IssuedAt,
    IssuedBy,
}

#[derive(Iden)]
enum TaxRecipients {
    Table,
    BillId,
    AccountId,
    ClassroomId,
    Paid,
    PaidAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TaxBills::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TaxBills::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TaxBills::ClassroomId).string().not_null())
                    .col(ColumnDef::new(TaxBills::Name).string().not_null())
                    .col(ColumnDef::new(TaxBills::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(TaxBills::DueAt).timestamp().not_null())
                    .col(ColumnDef::new(TaxBills::IssuedAt).timestamp().not_null())
                    .col(ColumnDef::new(TaxBills::IssuedBy).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-tax_bills-classroom_id")
                            .from(TaxBills::Table, TaxBills::ClassroomId)
                            .to(Classrooms::Table, Classrooms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaxRecipients::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaxRecipients::BillId).string().not_null())
                    .col(ColumnDef::new(TaxRecipients::AccountId).string().not_null())
                    .col(
                        ColumnDef::new(TaxRecipients::ClassroomId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TaxRecipients::Paid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TaxRecipients::PaidAt).timestamp())
                    .primary_key(
                        Index::create()
                            .col(TaxRecipients::BillId)
                            .col(TaxRecipients::AccountId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-tax_recipients-bill_id")
                            .from(TaxRecipients::Table, TaxRecipients::BillId)
                            .to(TaxBills::Table, TaxBills::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-tax_recipients-account_id")
                            .from(TaxRecipients::Table, TaxRecipients::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-tax_recipients-account_id")
                    .table(TaxRecipients::Table)
                    .col(TaxRecipients::AccountId)
                    .col(TaxRecipients::Paid)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TaxRecipients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaxBills::Table).to_owned())
            .await?;
        Ok(())
    }
}
