use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use uuid::Uuid;

use crate::{
    AccountRole, EngineError, ResultEngine, SystemAccountKind, accounts, classrooms, funds,
    instruments, savings_products, savings_subscriptions, tax_bills,
};

use super::Engine;

/// Generates a `require_*` lookup that only finds rows of the given
/// classroom, so ids leaked from another tenant resolve to `KeyNotFound`.
macro_rules! impl_scoped_lookup {
    ($require_fn:ident, $entity:path, $model:path, $classroom_col:expr, $err_msg:literal) => {
        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            classroom_id: Uuid,
            target_id: Uuid,
        ) -> ResultEngine<$model> {
            <$entity>::find_by_id(target_id.to_string())
                .filter($classroom_col.eq(classroom_id.to_string()))
                .one(db)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound($err_msg.to_string()))
        }
    };
}

impl Engine {
    impl_scoped_lookup!(
        require_account,
        accounts::Entity,
        accounts::Model,
        accounts::Column::ClassroomId,
        "account not exists"
    );

    impl_scoped_lookup!(
        require_instrument,
        instruments::Entity,
        instruments::Model,
        instruments::Column::ClassroomId,
        "instrument not exists"
    );

    impl_scoped_lookup!(
        require_savings_product,
        savings_products::Entity,
        savings_products::Model,
        savings_products::Column::ClassroomId,
        "savings product not exists"
    );

    impl_scoped_lookup!(
        require_subscription,
        savings_subscriptions::Entity,
        savings_subscriptions::Model,
        savings_subscriptions::Column::ClassroomId,
        "savings subscription not exists"
    );

    impl_scoped_lookup!(
        require_bill,
        tax_bills::Entity,
        tax_bills::Model,
        tax_bills::Column::ClassroomId,
        "tax bill not exists"
    );

    impl_scoped_lookup!(
        require_fund,
        funds::Entity,
        funds::Model,
        funds::Column::ClassroomId,
        "fund not exists"
    );

    pub(super) async fn require_classroom(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
    ) -> ResultEngine<classrooms::Model> {
        classrooms::Entity::find_by_id(classroom_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("classroom not exists".to_string()))
    }

    /// Resolves the acting account and checks it holds one of `allowed`.
    pub(super) async fn require_actor(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
        actor: Uuid,
        allowed: &[AccountRole],
        action: &str,
    ) -> ResultEngine<accounts::Model> {
        let model = self.require_account(db, classroom_id, actor).await?;
        let role = AccountRole::try_from(model.role.as_str())?;
        if model.archived || !allowed.contains(&role) {
            return Err(EngineError::Forbidden(format!(
                "{} account cannot {action}",
                role.as_str()
            )));
        }
        Ok(model)
    }

    pub(super) async fn require_teacher(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
        actor: Uuid,
        action: &str,
    ) -> ResultEngine<accounts::Model> {
        self.require_actor(db, classroom_id, actor, &[AccountRole::Teacher], action)
            .await
    }

    pub(super) async fn require_system_account(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
        kind: SystemAccountKind,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find()
            .filter(accounts::Column::ClassroomId.eq(classroom_id.to_string()))
            .filter(accounts::Column::SystemKind.eq(kind.as_str()))
            .one(db)
            .await?
            .ok_or_else(|| {
                EngineError::KeyNotFound(format!("{} account not exists", kind.as_str()))
            })
    }

    /// The teacher's account, which issues interest, rewards and collects taxes.
    pub(super) async fn require_treasury(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
    ) -> ResultEngine<accounts::Model> {
        let classroom = self.require_classroom(db, classroom_id).await?;
        accounts::Entity::find()
            .filter(accounts::Column::ClassroomId.eq(classroom.id))
            .filter(accounts::Column::UserId.eq(classroom.teacher_user_id))
            .filter(accounts::Column::Role.eq(AccountRole::Teacher.as_str()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("treasury not exists".to_string()))
    }

    /// Loads and locks the given accounts in ascending id order.
    ///
    /// Two concurrent movements over the same pair of accounts always lock
    /// them in the same sequence, whatever their direction.
    pub(super) async fn lock_accounts(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
        ids: &[Uuid],
    ) -> ResultEngine<Vec<accounts::Model>> {
        let mut ordered: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        ordered.sort();
        ordered.dedup();

        let mut locked = Vec::with_capacity(ordered.len());
        for id in ordered {
            let model = accounts::Entity::find_by_id(id)
                .filter(accounts::Column::ClassroomId.eq(classroom_id.to_string()))
                .lock_exclusive()
                .one(db)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))?;
            locked.push(model);
        }
        Ok(locked)
    }

    /// All classroom ids, oldest first.
    pub(super) async fn classroom_ids(&self, db: &DatabaseTransaction) -> ResultEngine<Vec<Uuid>> {
        let rows = classrooms::Entity::find()
            .order_by_asc(classrooms::Column::CreatedAt)
            .order_by_asc(classrooms::Column::Id)
            .all(db)
            .await?;
        rows.iter()
            .map(|row| crate::util::parse_uuid(&row.id, "classroom"))
            .collect()
    }
}
