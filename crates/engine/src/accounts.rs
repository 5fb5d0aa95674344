//! The module contains `Account` and the roles an account can play.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// What a participant is allowed to do inside a classroom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Student,
    Teacher,
    Mart,
    Banker,
    /// Escrow and settlement accounts owned by the classroom itself.
    System,
}

impl AccountRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Mart => "mart",
            Self::Banker => "banker",
            Self::System => "system",
        }
    }

    /// Roles allowed to mint and burn currency.
    pub const ISSUERS: &'static [AccountRole] = &[Self::Banker, Self::Teacher];

    /// Roles that can save and invest. The teacher pays interest and rewards,
    /// so it cannot also receive them.
    pub const PARTICIPANTS: &'static [AccountRole] = &[Self::Student, Self::Mart, Self::Banker];

    pub fn can_issue_currency(self) -> bool {
        Self::ISSUERS.contains(&self)
    }
}

impl TryFrom<&str> for AccountRole {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "mart" => Ok(Self::Mart),
            "banker" => Ok(Self::Banker),
            "system" => Ok(Self::System),
            other => Err(EngineError::InvalidId(format!(
                "invalid account role: {other}"
            ))),
        }
    }
}

/// The per-classroom accounts that hold money on behalf of the engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAccountKind {
    /// Receives buy proceeds and pays sell proceeds.
    Market,
    /// Holds savings principal until cancellation or maturity.
    SavingsEscrow,
    /// Holds fund investments until settlement or deletion.
    FundEscrow,
}

impl SystemAccountKind {
    pub const ALL: [SystemAccountKind; 3] = [Self::Market, Self::SavingsEscrow, Self::FundEscrow];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::SavingsEscrow => "savings_escrow",
            Self::FundEscrow => "fund_escrow",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Market => "Market",
            Self::SavingsEscrow => "Savings escrow",
            Self::FundEscrow => "Fund escrow",
        }
    }
}

impl TryFrom<&str> for SystemAccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "market" => Ok(Self::Market),
            "savings_escrow" => Ok(Self::SavingsEscrow),
            "fund_escrow" => Ok(Self::FundEscrow),
            other => Err(EngineError::InvalidId(format!(
                "invalid system account kind: {other}"
            ))),
        }
    }
}

/// A participant's wallet inside one classroom.
///
/// `balance` is denormalized from the transaction log and only ever written by
/// the ledger, guarded by `revision`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub classroom_id: Uuid,
    /// `None` for system accounts.
    pub user_id: Option<String>,
    pub name: String,
    pub role: AccountRole,
    pub system_kind: Option<SystemAccountKind>,
    pub balance: i64,
    pub revision: i64,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        classroom_id: Uuid,
        user_id: String,
        name: String,
        role: AccountRole,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            classroom_id,
            user_id: Some(user_id),
            name,
            role,
            system_kind: None,
            balance: 0,
            revision: 0,
            archived: false,
            created_at,
        }
    }

    pub fn system(classroom_id: Uuid, kind: SystemAccountKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            classroom_id,
            user_id: None,
            name: kind.display_name().to_string(),
            role: AccountRole::System,
            system_kind: Some(kind),
            balance: 0,
            revision: 0,
            archived: false,
            created_at,
        }
    }

    pub fn is_system(&self) -> bool {
        self.system_kind.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub classroom_id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub role: String,
    pub system_kind: Option<String>,
    pub balance: i64,
    pub revision: i64,
    pub archived: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::classrooms::Entity",
        from = "Column::ClassroomId",
        to = "super::classrooms::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Classrooms,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::classrooms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Classrooms.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(value: &Account) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            user_id: ActiveValue::Set(value.user_id.clone()),
            name: ActiveValue::Set(value.name.clone()),
            role: ActiveValue::Set(value.role.as_str().to_string()),
            system_kind: ActiveValue::Set(value.system_kind.map(|k| k.as_str().to_string())),
            balance: ActiveValue::Set(value.balance),
            revision: ActiveValue::Set(value.revision),
            archived: ActiveValue::Set(value.archived),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            user_id: model.user_id,
            name: model.name,
            role: AccountRole::try_from(model.role.as_str())?,
            system_kind: model
                .system_kind
                .as_deref()
                .map(SystemAccountKind::try_from)
                .transpose()?,
            balance: model.balance,
            revision: model.revision,
            archived: model.archived,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_storage_strings() {
        for role in [
            AccountRole::Student,
            AccountRole::Teacher,
            AccountRole::Mart,
            AccountRole::Banker,
            AccountRole::System,
        ] {
            assert_eq!(AccountRole::try_from(role.as_str()).unwrap(), role);
        }
        assert!(AccountRole::try_from("principal").is_err());
    }

    #[test]
    fn only_bankers_and_teachers_issue_currency() {
        assert!(AccountRole::Banker.can_issue_currency());
        assert!(AccountRole::Teacher.can_issue_currency());
        assert!(!AccountRole::Student.can_issue_currency());
        assert!(!AccountRole::Mart.can_issue_currency());
    }

    #[test]
    fn system_accounts_have_no_owner() {
        let account = Account::system(Uuid::new_v4(), SystemAccountKind::Market, Utc::now());
        assert!(account.user_id.is_none());
        assert!(account.is_system());
        assert_eq!(account.role, AccountRole::System);
    }
}
