//! The module contains `Classroom`, the tenant every other entity is scoped to.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{ResultEngine, util::parse_uuid};

/// A classroom economy.
///
/// Accounts, instruments, savings products, bills and funds all carry the id
/// of the classroom they belong to, and every query filters on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classroom {
    pub id: Uuid,
    pub name: String,
    /// Identity of the teacher in the outer user directory.
    pub teacher_user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Classroom {
    pub fn new(name: String, teacher_user_id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            teacher_user_id,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "classrooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub teacher_user_id: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::accounts::Entity")]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Classroom> for ActiveModel {
    fn from(value: &Classroom) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            teacher_user_id: ActiveValue::Set(value.teacher_user_id.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Classroom {
    type Error = crate::EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "classroom")?,
            name: model.name,
            teacher_user_id: model.teacher_user_id,
            created_at: model.created_at,
        })
    }
}
