//! The module contains `Fund`, a crowdfunding campaign, and its state machine.
//!
//! ```text
//! RECRUITING ──deadline──▶ ONGOING ──settle──▶ SUCCESS | EXCEED | FAIL
//! ```
//!
//! Terminal states never change again.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{checked_total, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundStatus {
    Recruiting,
    Ongoing,
    Success,
    Exceed,
    Fail,
}

impl FundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recruiting => "recruiting",
            Self::Ongoing => "ongoing",
            Self::Success => "success",
            Self::Exceed => "exceed",
            Self::Fail => "fail",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Exceed | Self::Fail)
    }
}

impl TryFrom<&str> for FundStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "recruiting" => Ok(Self::Recruiting),
            "ongoing" => Ok(Self::Ongoing),
            "success" => Ok(Self::Success),
            "exceed" => Ok(Self::Exceed),
            "fail" => Ok(Self::Fail),
            other => Err(EngineError::InvalidTransition(format!(
                "invalid fund status: {other}"
            ))),
        }
    }
}

/// How the teacher resolves an ongoing fund.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundOutcome {
    Success,
    Exceed,
    Fail,
}

impl FundOutcome {
    pub fn status(self) -> FundStatus {
        match self {
            Self::Success => FundStatus::Success,
            Self::Exceed => FundStatus::Exceed,
            Self::Fail => FundStatus::Fail,
        }
    }
}

impl TryFrom<&str> for FundOutcome {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "exceed" => Ok(Self::Exceed),
            "fail" => Ok(Self::Fail),
            other => Err(EngineError::InvalidTransition(format!(
                "invalid fund outcome: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fund {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub creator_account_id: Uuid,
    pub unit_price_minor: i64,
    /// Informational goal; recruitment ends at the deadline regardless.
    pub target_amount_minor: i64,
    pub base_reward_minor: i64,
    pub incentive_reward_minor: i64,
    pub recruitment_deadline: DateTime<Utc>,
    pub maturity_at: DateTime<Utc>,
    pub status: FundStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Fund {
    /// Reward per unit on top of the principal for a given outcome.
    pub fn reward_per_unit(&self, outcome: FundOutcome) -> i64 {
        match outcome {
            FundOutcome::Fail => 0,
            FundOutcome::Success => self.base_reward_minor,
            FundOutcome::Exceed => self.base_reward_minor + self.incentive_reward_minor,
        }
    }

    /// `(principal, reward)` owed to an investor holding `units`.
    pub fn payout_for(&self, units: i64, outcome: FundOutcome) -> ResultEngine<(i64, i64)> {
        let principal = checked_total(units, self.unit_price_minor, "fund principal")?;
        let reward = checked_total(units, self.reward_per_unit(outcome), "fund reward")?;
        Ok((principal, reward))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "funds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub classroom_id: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_account_id: String,
    pub unit_price_minor: i64,
    pub target_amount_minor: i64,
    pub base_reward_minor: i64,
    pub incentive_reward_minor: i64,
    pub recruitment_deadline: DateTimeUtc,
    pub maturity_at: DateTimeUtc,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub settled_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::fund_investments::Entity")]
    Investments,
}

impl Related<super::fund_investments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Investments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Fund> for ActiveModel {
    fn from(value: &Fund) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            description: ActiveValue::Set(value.description.clone()),
            creator_account_id: ActiveValue::Set(value.creator_account_id.to_string()),
            unit_price_minor: ActiveValue::Set(value.unit_price_minor),
            target_amount_minor: ActiveValue::Set(value.target_amount_minor),
            base_reward_minor: ActiveValue::Set(value.base_reward_minor),
            incentive_reward_minor: ActiveValue::Set(value.incentive_reward_minor),
            recruitment_deadline: ActiveValue::Set(value.recruitment_deadline),
            maturity_at: ActiveValue::Set(value.maturity_at),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            created_at: ActiveValue::Set(value.created_at),
            settled_at: ActiveValue::Set(value.settled_at),
        }
    }
}

impl TryFrom<Model> for Fund {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "fund")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            name: model.name,
            description: model.description,
            creator_account_id: parse_uuid(&model.creator_account_id, "account")?,
            unit_price_minor: model.unit_price_minor,
            target_amount_minor: model.target_amount_minor,
            base_reward_minor: model.base_reward_minor,
            incentive_reward_minor: model.incentive_reward_minor,
            recruitment_deadline: model.recruitment_deadline,
            maturity_at: model.maturity_at,
            status: FundStatus::try_from(model.status.as_str())?,
            created_at: model.created_at,
            settled_at: model.settled_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fund() -> Fund {
        let now = Utc::now();
        Fund {
            id: Uuid::new_v4(),
            classroom_id: Uuid::new_v4(),
            name: "Class trip".to_string(),
            description: None,
            creator_account_id: Uuid::new_v4(),
            unit_price_minor: 100,
            target_amount_minor: 1_000,
            base_reward_minor: 10,
            incentive_reward_minor: 5,
            recruitment_deadline: now,
            maturity_at: now,
            status: FundStatus::Recruiting,
            created_at: now,
            settled_at: None,
        }
    }

    #[test]
    fn payout_depends_on_outcome() {
        let f = fund();
        assert_eq!(f.payout_for(3, FundOutcome::Fail).unwrap(), (300, 0));
        assert_eq!(f.payout_for(3, FundOutcome::Success).unwrap(), (300, 30));
        assert_eq!(f.payout_for(3, FundOutcome::Exceed).unwrap(), (300, 45));
    }

    #[test]
    fn only_settled_states_are_terminal() {
        assert!(!FundStatus::Recruiting.is_terminal());
        assert!(!FundStatus::Ongoing.is_terminal());
        assert!(FundStatus::Success.is_terminal());
        assert!(FundStatus::Exceed.is_terminal());
        assert!(FundStatus::Fail.is_terminal());
    }

    #[test]
    fn outcomes_parse_case_insensitively() {
        assert_eq!(FundOutcome::try_from("EXCEED").unwrap(), FundOutcome::Exceed);
        assert!(FundOutcome::try_from("ongoing").is_err());
    }
}
