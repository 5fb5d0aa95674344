//! The module contains `Holding`, the quantity of one instrument owned by one
//! account, with its volume-weighted average purchase price.

use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, money::round_div, util::parse_uuid};

/// Fixed-point scale of `avg_price_scaled` (4 extra decimals over minor units).
pub const AVG_PRICE_SCALE: i64 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Holding {
    pub account_id: Uuid,
    pub instrument_id: Uuid,
    pub classroom_id: Uuid,
    pub quantity: i64,
    /// Average purchase price × [`AVG_PRICE_SCALE`].
    pub avg_price_scaled: i64,
}

impl Holding {
    pub fn empty(account_id: Uuid, instrument_id: Uuid, classroom_id: Uuid) -> Self {
        Self {
            account_id,
            instrument_id,
            classroom_id,
            quantity: 0,
            avg_price_scaled: 0,
        }
    }

    /// Average purchase price rounded to minor units.
    pub fn avg_price_minor(&self) -> i64 {
        round_div(
            i128::from(self.avg_price_scaled),
            i128::from(AVG_PRICE_SCALE),
        )
    }

    /// Adds `quantity` units bought at `price_minor`, recomputing the average.
    ///
    /// `newAvg = (oldQty × oldAvg + quantity × price) / (oldQty + quantity)`
    pub fn record_buy(&mut self, quantity: i64, price_minor: i64) -> ResultEngine<()> {
        if quantity <= 0 {
            return Err(EngineError::InvalidQuantity(
                "quantity must be > 0".to_string(),
            ));
        }
        let new_quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| EngineError::InvalidQuantity("quantity overflows".to_string()))?;
        let weighted = i128::from(self.quantity) * i128::from(self.avg_price_scaled)
            + i128::from(quantity) * i128::from(price_minor) * i128::from(AVG_PRICE_SCALE);
        self.avg_price_scaled = round_div(weighted, i128::from(new_quantity));
        self.quantity = new_quantity;
        Ok(())
    }

    /// Removes `quantity` units. The average price is unaffected by sells.
    pub fn record_sell(&mut self, quantity: i64) -> ResultEngine<()> {
        if quantity <= 0 {
            return Err(EngineError::InvalidQuantity(
                "quantity must be > 0".to_string(),
            ));
        }
        if self.quantity < quantity {
            return Err(EngineError::InsufficientHoldings(format!(
                "holding has {} units, tried to sell {quantity}",
                self.quantity
            )));
        }
        self.quantity -= quantity;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "holdings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub instrument_id: String,
    pub classroom_id: String,
    pub quantity: i64,
    pub avg_price_scaled: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Holding> for ActiveModel {
    fn from(value: &Holding) -> Self {
        Self {
            account_id: ActiveValue::Set(value.account_id.to_string()),
            instrument_id: ActiveValue::Set(value.instrument_id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            quantity: ActiveValue::Set(value.quantity),
            avg_price_scaled: ActiveValue::Set(value.avg_price_scaled),
        }
    }
}

impl TryFrom<Model> for Holding {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            account_id: parse_uuid(&model.account_id, "account")?,
            instrument_id: parse_uuid(&model.instrument_id, "instrument")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            quantity: model.quantity,
            avg_price_scaled: model.avg_price_scaled,
        })
    }
}
