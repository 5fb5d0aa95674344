use sea_orm_migration::prelude::*;

use crate::m20261005_000000_ledger::{Accounts, Classrooms};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Funds {
    Table,
    Id,
    ClassroomId,
    Name,
    Description,
    CreatorAccountId,
    UnitPriceMinor,
    TargetAmountMinor,
    BaseRewardMinor,
    IncentiveRewardMinor,
    RecruitmentDeadline,
    MaturityAt,
    Status,
    CreatedAt,
    SettledAt,
}

#[derive(Iden)]
enum FundInvestments {
    Table,
    FundId,
    AccountId,
    ClassroomId,
    Units,
    InvestedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Funds::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Funds::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Funds::ClassroomId).string().not_null())
                    .col(ColumnDef::new(Funds::Name).string().not_null())
                    .col(ColumnDef::new(Funds::Description).string())
                    .col(ColumnDef::new(Funds::CreatorAccountId).string().not_null())
                    .col(
                        ColumnDef::new(Funds::UnitPriceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Funds::TargetAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Funds::BaseRewardMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Funds::IncentiveRewardMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Funds::RecruitmentDeadline)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Funds::MaturityAt).timestamp().not_null())
                    .col(ColumnDef::new(Funds::Status).string().not_null())
                    .col(ColumnDef::new(Funds::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Funds::SettledAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-funds-classroom_id")
                            .from(Funds::Table, Funds::ClassroomId)
                            .to(Classrooms::Table, Classrooms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-funds-classroom_id-status")
                    .table(Funds::Table)
                    .col(Funds::ClassroomId)
                    .col(Funds::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FundInvestments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FundInvestments::FundId).string().not_null())
                    .col(
                        ColumnDef::new(FundInvestments::AccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FundInvestments::ClassroomId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(FundInvestments::Units).big_integer().not_null())
                    .col(
                        ColumnDef::new(FundInvestments::InvestedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(FundInvestments::FundId)
                            .col(FundInvestments::AccountId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-fund_investments-fund_id")
                            .from(FundInvestments::Table, FundInvestments::FundId)
                            .to(Funds::Table, Funds::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-fund_investments-account_id")
                            .from(FundInvestments::Table, FundInvestments::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FundInvestments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Funds::Table).to_owned())
            .await?;
        Ok(())
    }
}
