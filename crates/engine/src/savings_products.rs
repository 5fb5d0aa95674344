//! The module contains `SavingsProduct`, an interest-bearing deposit offer.

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{EngineError, Rate, ResultEngine, util::parse_uuid};

/// Longest accepted savings term, one hundred years.
pub const MAX_MATURITY_DAYS: i32 = 36_500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavingsProduct {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub name: String,
    /// Term length in days.
    pub maturity_days: i32,
    /// Interest paid at maturity.
    pub rate: Rate,
    /// Applied to the principal on early cancellation; may be negative.
    pub cancellation_rate: Rate,
    pub max_amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl SavingsProduct {
    pub fn new(
        classroom_id: Uuid,
        name: String,
        maturity_days: i32,
        rate: Rate,
        cancellation_rate: Rate,
        max_amount_minor: i64,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !(1..=MAX_MATURITY_DAYS).contains(&maturity_days) {
            return Err(EngineError::InvalidAmount(format!(
                "maturity period must be between 1 and {MAX_MATURITY_DAYS} days"
            )));
        }
        if max_amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "max amount must be > 0".to_string(),
            ));
        }
        if cancellation_rate > rate {
            return Err(EngineError::InvalidRate(format!(
                "cancellation rate {cancellation_rate} exceeds interest rate {rate}"
            )));
        }
        // A saver can lose at most the whole principal.
        if cancellation_rate.bp() < -(Rate::BASIS as i32) {
            return Err(EngineError::InvalidRate(format!(
                "cancellation rate {cancellation_rate} is below -100%"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            classroom_id,
            name,
            maturity_days,
            rate,
            cancellation_rate,
            max_amount_minor,
            created_at,
        })
    }

    pub fn term(&self) -> Duration {
        Duration::days(i64::from(self.maturity_days))
    }

    pub fn maturity_at(&self, joined_at: DateTime<Utc>) -> ResultEngine<DateTime<Utc>> {
        offset(joined_at, self.term())
    }

    /// Two thirds of the term after joining. Display hint only; the engine
    /// accepts cancellation at any time.
    pub fn earliest_cancel_at(&self, joined_at: DateTime<Utc>) -> ResultEngine<DateTime<Utc>> {
        offset(joined_at, Duration::seconds(self.term().num_seconds() * 2 / 3))
    }

    /// `round(principal × (1 + rate))`.
    pub fn maturity_payout(&self, principal_minor: i64) -> i64 {
        self.rate.grow(principal_minor)
    }

    /// `round(principal × (1 + cancellationRate))`.
    pub fn cancellation_refund(&self, principal_minor: i64) -> i64 {
        self.cancellation_rate.grow(principal_minor)
    }
}

fn offset(at: DateTime<Utc>, by: Duration) -> ResultEngine<DateTime<Utc>> {
    at.checked_add_signed(by)
        .ok_or_else(|| EngineError::InvalidAmount("savings term is out of range".to_string()))
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "savings_products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub classroom_id: String,
    pub name: String,
    pub maturity_days: i32,
    pub rate_bp: i32,
    pub cancellation_rate_bp: i32,
    pub max_amount_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::savings_subscriptions::Entity")]
    Subscriptions,
}

impl Related<super::savings_subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&SavingsProduct> for ActiveModel {
    fn from(value: &SavingsProduct) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            maturity_days: ActiveValue::Set(value.maturity_days),
            rate_bp: ActiveValue::Set(value.rate.bp()),
            cancellation_rate_bp: ActiveValue::Set(value.cancellation_rate.bp()),
            max_amount_minor: ActiveValue::Set(value.max_amount_minor),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for SavingsProduct {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "savings product")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            name: model.name,
            maturity_days: model.maturity_days,
            rate: Rate::from_bp(model.rate_bp),
            cancellation_rate: Rate::from_bp(model.cancellation_rate_bp),
            max_amount_minor: model.max_amount_minor,
            created_at: model.created_at,
        })
    }
}
