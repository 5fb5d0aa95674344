use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// A tax bill issued by the teacher to a chosen set of accounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaxBill {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub name: String,
    /// Amount each recipient owes.
    pub amount_minor: i64,
    pub due_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    /// Account that issued the bill.
    pub issued_by: Uuid,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tax_bills")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub classroom_id: String,
    pub name: String,
    pub amount_minor: i64,
    pub due_at: DateTimeUtc,
    pub issued_at: DateTimeUtc,
    pub issued_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tax_recipients::Entity")]
    Recipients,
}

impl Related<super::tax_recipients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&TaxBill> for ActiveModel {
    fn from(value: &TaxBill) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            amount_minor: ActiveValue::Set(value.amount_minor),
            due_at: ActiveValue::Set(value.due_at),
            issued_at: ActiveValue::Set(value.issued_at),
            issued_by: ActiveValue::Set(value.issued_by.to_string()),
        }
    }
}

impl TryFrom<Model> for TaxBill {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "tax bill")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            name: model.name,
            amount_minor: model.amount_minor,
            due_at: model.due_at,
            issued_at: model.issued_at,
            issued_by: parse_uuid(&model.issued_by, "account")?,
        })
    }
}
