use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// Units of a fund bought by one account. Repeated investments add up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundInvestment {
    pub fund_id: Uuid,
    pub account_id: Uuid,
    pub classroom_id: Uuid,
    pub units: i64,
    /// Time of the latest investment.
    pub invested_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "fund_investments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub fund_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    pub classroom_id: String,
    pub units: i64,
    pub invested_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::funds::Entity",
        from = "Column::FundId",
        to = "super::funds::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Funds,
}

impl Related<super::funds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Funds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&FundInvestment> for ActiveModel {
    fn from(value: &FundInvestment) -> Self {
        Self {
            fund_id: ActiveValue::Set(value.fund_id.to_string()),
            account_id: ActiveValue::Set(value.account_id.to_string()),
            classroom_id: ActiveValue::Set(value.classroom_id.to_string()),
            units: ActiveValue::Set(value.units),
            invested_at: ActiveValue::Set(value.invested_at),
        }
    }
}

impl TryFrom<Model> for FundInvestment {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            fund_id: parse_uuid(&model.fund_id, "fund")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            classroom_id: parse_uuid(&model.classroom_id, "classroom")?,
            units: model.units,
            invested_at: model.invested_at,
        })
    }
}
