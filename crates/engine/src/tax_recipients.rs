use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// Payment status of one account for one bill.
///
/// Flips from unpaid to paid exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaxRecipient {
    pub bill_id: Uuid,
    pub account_id: Uuid,
    pub classroom_id: Uuid,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

impl TaxRecipient {
    pub fn unpaid(bill_id: Uuid, account_id: Uuid, classroom_id: Uuid) -> Self {
        Self {
            bill_id,
            account_id,
            classroom_id,
            paid: false,
            paid_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tax_recipients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub bill_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    pub classroom_id: String,
    pub paid: bool,
    pub paid_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tax_bills::Entity",
        from = "Column::BillId",
        to = "super::tax_bills::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Bills,
}

impl Related<super::tax_bills::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bills.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&TaxRecipient> for ActiveModel {
    fn from(value: &TaxRecipient) -> Self {
        Self {
            bill_id: ActiveValue::Set(value.bill_id.to_string()),
            account_id: ActiveValue::Set(value.account_id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            paid: ActiveValue::Set(value.paid),
            paid_at: ActiveValue::Set(value.paid_at),
        }
    }
}

impl TryFrom<Model> for TaxRecipient {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            bill_id: parse_uuid(&model.bill_id, "tax bill")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            paid: model.paid,
            paid_at: model.paid_at,
        })
    }
}
