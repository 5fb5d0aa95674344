//! Ledger rows.
//!
//! A `Transaction` is one balance change on one account. A transfer writes two
//! of them (the debit and the credit leg) sharing a `correlation_id`; mint and
//! burn write a single row. Rows are append-only.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
    MartSettlement,
    Salary,
    StockBuy,
    StockSell,
    SavingsJoin,
    SavingsCancel,
    SavingsMaturity,
    Tax,
    FundJoin,
    FundPayout,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
            Self::MartSettlement => "mart_settlement",
            Self::Salary => "salary",
            Self::StockBuy => "stock_buy",
            Self::StockSell => "stock_sell",
            Self::SavingsJoin => "savings_join",
            Self::SavingsCancel => "savings_cancel",
            Self::SavingsMaturity => "savings_maturity",
            Self::Tax => "tax",
            Self::FundJoin => "fund_join",
            Self::FundPayout => "fund_payout",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer" => Ok(Self::Transfer),
            "mart_settlement" => Ok(Self::MartSettlement),
            "salary" => Ok(Self::Salary),
            "stock_buy" => Ok(Self::StockBuy),
            "stock_sell" => Ok(Self::StockSell),
            "savings_join" => Ok(Self::SavingsJoin),
            "savings_cancel" => Ok(Self::SavingsCancel),
            "savings_maturity" => Ok(Self::SavingsMaturity),
            "tax" => Ok(Self::Tax),
            "fund_join" => Ok(Self::FundJoin),
            "fund_payout" => Ok(Self::FundPayout),
            other => Err(EngineError::InvalidId(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// UUIDv7, so ids sort in creation order.
    pub id: Uuid,
    pub correlation_id: Uuid,
    pub classroom_id: Uuid,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    /// Signed: negative on the debit leg.
    pub amount_minor: i64,
    /// Account balance right after this row was applied.
    pub balance_after: i64,
    pub occurred_at: DateTime<Utc>,
    pub description: String,
    pub counterparty_account_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
}

/// The two rows written by one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub correlation_id: Uuid,
    pub debit: Transaction,
    pub credit: Transaction,
}

impl TransferReceipt {
    /// Positive amount moved.
    pub fn amount_minor(&self) -> i64 {
        self.credit.amount_minor
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub correlation_id: String,
    pub classroom_id: String,
    pub account_id: String,
    pub kind: String,
    pub amount_minor: i64,
    pub balance_after: i64,
    pub occurred_at: DateTimeUtc,
    pub description: String,
    pub counterparty_account_id: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            correlation_id: ActiveValue::Set(tx.correlation_id.to_string()),
            classroom_id: ActiveValue::Set(tx.classroom_id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            balance_after: ActiveValue::Set(tx.balance_after),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            description: ActiveValue::Set(tx.description.clone()),
            counterparty_account_id: ActiveValue::Set(
                tx.counterparty_account_id.map(|id| id.to_string()),
            ),
            idempotency_key: ActiveValue::Set(tx.idempotency_key.clone()),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            correlation_id: parse_uuid(&model.correlation_id, "correlation")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            balance_after: model.balance_after,
            occurred_at: model.occurred_at,
            description: model.description,
            counterparty_account_id: parse_optional_uuid(
                model.counterparty_account_id.as_deref(),
                "counterparty",
            )?,
            idempotency_key: model.idempotency_key,
        })
    }
}
