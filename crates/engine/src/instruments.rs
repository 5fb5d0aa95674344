//! The module contains `Instrument`, a tradable stock product, and the sell-side
//! fee curve.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    money::{parse_fixed, round_div},
    util::parse_uuid,
};

/// Lowest accepted volatility coefficient (k = 0.01), in basis points.
pub const MIN_VOLATILITY_BP: i32 = 100;
/// Highest accepted volatility coefficient (k = 1.0), in basis points.
pub const MAX_VOLATILITY_BP: i32 = 10_000;

/// `10k` expressed against a basis-point `k` is `k_bp / 1000`.
const FEE_CURVE_BASE: i64 = 1_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instrument {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub name: String,
    /// Current price of one unit, always > 0.
    pub price_minor: i64,
    /// Volatility coefficient `k` in basis points.
    pub volatility_bp: i32,
    pub created_at: DateTime<Utc>,
}

impl Instrument {
    pub fn new(
        classroom_id: Uuid,
        name: String,
        price_minor: i64,
        volatility_bp: i32,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        validate_price(price_minor)?;
        validate_volatility(volatility_bp)?;
        Ok(Self {
            id: Uuid::new_v4(),
            classroom_id,
            name,
            price_minor,
            volatility_bp,
            created_at,
        })
    }

    /// Fee applied on sells, in basis points of the gross amount.
    pub fn fee_rate_bp(&self) -> i64 {
        fee_rate_bp(self.volatility_bp)
    }
}

pub(crate) fn validate_price(price_minor: i64) -> ResultEngine<()> {
    if price_minor <= 0 {
        return Err(EngineError::InvalidPrice("price must be > 0".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_volatility(volatility_bp: i32) -> ResultEngine<()> {
    if !(MIN_VOLATILITY_BP..=MAX_VOLATILITY_BP).contains(&volatility_bp) {
        return Err(EngineError::InvalidRate(format!(
            "volatility must be between 0.01 and 1.0, got {volatility_bp} bp"
        )));
    }
    Ok(())
}

/// Parses a decimal volatility coefficient (`"0.02"`) into basis points.
pub fn parse_volatility(input: &str) -> ResultEngine<i32> {
    let bp = parse_fixed(input, 4).map_err(|reason| EngineError::InvalidRate(reason.to_string()))?;
    let bp = i32::try_from(bp)
        .map_err(|_| EngineError::InvalidRate("volatility too large".to_string()))?;
    validate_volatility(bp)?;
    Ok(bp)
}

/// Net amount paid for a sale of `gross_minor`.
///
/// `gross × (1 − 10k/(1+10k))` simplifies to `gross / (1 + 10k)`, which with
/// `k` in basis points is `gross × 1000 / (1000 + k_bp)`.
pub fn sell_proceeds(gross_minor: i64, volatility_bp: i32) -> i64 {
    round_div(
        i128::from(gross_minor) * i128::from(FEE_CURVE_BASE),
        i128::from(FEE_CURVE_BASE) + i128::from(volatility_bp),
    )
}

/// `10k/(1+10k)` in basis points.
pub fn fee_rate_bp(volatility_bp: i32) -> i64 {
    round_div(
        i128::from(volatility_bp) * 10_000,
        i128::from(FEE_CURVE_BASE) + i128::from(volatility_bp),
    )
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "instruments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub classroom_id: String,
    pub name: String,
    pub price_minor: i64,
    pub volatility_bp: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::price_history::Entity")]
    PriceHistory,
}

impl Related<super::price_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Instrument> for ActiveModel {
    fn from(value: &Instrument) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            price_minor: ActiveValue::Set(value.price_minor),
            volatility_bp: ActiveValue::Set(value.volatility_bp),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Instrument {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "instrument")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            name: model.name,
            price_minor: model.price_minor,
            volatility_bp: model.volatility_bp,
            created_at: model.created_at,
        })
    }
}
