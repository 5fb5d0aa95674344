use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// Principal escrowed by one account into one savings product.
///
/// The row exists from join until cancellation or maturity; both delete it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavingsSubscription {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub account_id: Uuid,
    pub product_id: Uuid,
    pub principal_minor: i64,
    pub joined_at: DateTime<Utc>,
    pub matures_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "savings_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub classroom_id: String,
    pub account_id: String,
    pub product_id: String,
    pub principal_minor: i64,
    pub joined_at: DateTimeUtc,
    pub matures_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::savings_products::Entity",
        from = "Column::ProductId",
        to = "super::savings_products::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Products,
}

impl Related<super::savings_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&SavingsSubscription> for ActiveModel {
    fn from(value: &SavingsSubscription) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            account_id: ActiveValue::Set(value.account_id.to_string()),
            product_id: ActiveValue::Set(value.product_id.to_string()),
            principal_minor: ActiveValue::Set(value.principal_minor),
            joined_at: ActiveValue::Set(value.joined_at),
            matures_at: ActiveValue::Set(value.matures_at),
        }
    }
}

impl TryFrom<Model> for SavingsSubscription {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "savings subscription")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            product_id: parse_uuid(&model.product_id, "savings product")?,
            principal_minor: model.principal_minor,
            joined_at: model.joined_at,
            matures_at: model.matures_at,
        })
    }
}
