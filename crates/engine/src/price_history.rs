use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// One price change of an instrument. Append-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricePoint {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub price_minor: i64,
    pub recorded_at: DateTime<Utc>,
}

impl PricePoint {
    pub fn new(instrument_id: Uuid, price_minor: i64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            instrument_id,
            price_minor,
            recorded_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "price_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub instrument_id: String,
    pub price_minor: i64,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::instruments::Entity",
        from = "Column::InstrumentId",
        to = "super::instruments::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Instruments,
}

impl Related<super::instruments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instruments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PricePoint> for ActiveModel {
    fn from(value: &PricePoint) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            instrument_id: ActiveValue::Set(value.instrument_id.to_string()),
            price_minor: ActiveValue::Set(value.price_minor),
            recorded_at: ActiveValue::Set(value.recorded_at),
        }
    }
}

impl TryFrom<Model> for PricePoint {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "price point")?,
            instrument_id: parse_uuid(&model.instrument_id, "instrument")?,
            price_minor: model.price_minor,
            recorded_at: model.recorded_at,
        })
    }
}
