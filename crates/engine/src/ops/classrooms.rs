use chrono::Utc;
use sea_orm::{
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Account, AccountRole, Classroom, EngineError, FundStatus, ResultEngine, SystemAccountKind,
    accounts, classrooms, fund_investments, funds, holdings, savings_subscriptions,
    util::normalize_required_name,
};

use super::{Engine, with_tx};

const TREASURY_NAME: &str = "Treasury";

impl Engine {
    /// Creates a classroom together with the teacher's treasury account and
    /// the market, savings escrow and fund escrow system accounts.
    pub async fn new_classroom(&self, name: &str, teacher_user_id: &str) -> ResultEngine<Classroom> {
        let name = normalize_required_name(name, "classroom")?;
        let teacher_user_id = teacher_user_id.trim();
        if teacher_user_id.is_empty() {
            return Err(EngineError::InvalidId(
                "teacher user id must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let classroom = Classroom::new(name, teacher_user_id.to_string(), now);
        with_tx!(self, |db_tx| {
            classrooms::ActiveModel::from(&classroom)
                .insert(&db_tx)
                .await?;

            let treasury = Account::new(
                classroom.id,
                classroom.teacher_user_id.clone(),
                TREASURY_NAME.to_string(),
                AccountRole::Teacher,
                now,
            );
            accounts::ActiveModel::from(&treasury).insert(&db_tx).await?;

            for kind in SystemAccountKind::ALL {
                let account = Account::system(classroom.id, kind, now);
                accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            }
            Ok(())
        })?;

        tracing::info!(classroom_id = %classroom.id, name = %classroom.name, "classroom created");
        Ok(classroom)
    }

    pub async fn classroom(&self, classroom_id: Uuid) -> ResultEngine<Classroom> {
        with_tx!(self, |db_tx| {
            let model = self.require_classroom(&db_tx, classroom_id).await?;
            Classroom::try_from(model)
        })
    }

    pub async fn classrooms(&self) -> ResultEngine<Vec<Classroom>> {
        with_tx!(self, |db_tx| {
            classrooms::Entity::find()
                .order_by_asc(classrooms::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Classroom::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Provisions a participant account.
    ///
    /// Only student, mart and banker accounts can be opened; the teacher and
    /// system accounts come with the classroom. One account per user.
    pub async fn open_account(
        &self,
        classroom_id: Uuid,
        user_id: &str,
        name: &str,
        role: AccountRole,
    ) -> ResultEngine<Account> {
        if matches!(role, AccountRole::Teacher | AccountRole::System) {
            return Err(EngineError::Forbidden(format!(
                "{} accounts are provisioned with the classroom",
                role.as_str()
            )));
        }
        let name = normalize_required_name(name, "account")?;
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(EngineError::InvalidId("user id must not be empty".to_string()));
        }

        let account = with_tx!(self, |db_tx| {
            self.require_classroom(&db_tx, classroom_id).await?;
            let existing = accounts::Entity::find()
                .filter(accounts::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(accounts::Column::UserId.eq(user_id))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(format!("account for user {user_id}")));
            }

            let account = Account::new(classroom_id, user_id.to_string(), name, role, Utc::now());
            accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            Ok(account)
        })?;

        tracing::info!(
            %classroom_id,
            account_id = %account.id,
            role = role.as_str(),
            "account opened"
        );
        Ok(account)
    }

    /// Soft-removes an account. Its history stays; it can no longer send or
    /// receive money. The balance must be zero and nothing may be left in
    /// holdings, savings or open funds.
    pub async fn archive_account(
        &self,
        classroom_id: Uuid,
        actor: Uuid,
        account_id: Uuid,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, classroom_id, actor, "archive accounts")
                .await?;
            let model = self.require_account(&db_tx, classroom_id, account_id).await?;
            let role = AccountRole::try_from(model.role.as_str())?;
            if matches!(role, AccountRole::Teacher | AccountRole::System) {
                return Err(EngineError::Forbidden(format!(
                    "{} accounts cannot be archived",
                    role.as_str()
                )));
            }
            if model.balance != 0 {
                return Err(EngineError::InvalidAmount(format!(
                    "account {} must have a zero balance to be archived",
                    model.name
                )));
            }
            if model.archived {
                return Ok(());
            }
            let open_holdings = holdings::Entity::find()
                .filter(holdings::Column::AccountId.eq(model.id.clone()))
                .filter(holdings::Column::Quantity.gt(0))
                .count(&db_tx)
                .await?;
            if open_holdings > 0 {
                return Err(EngineError::Forbidden(format!(
                    "account {} still holds instruments",
                    model.name
                )));
            }
            let open_savings = savings_subscriptions::Entity::find()
                .filter(savings_subscriptions::Column::AccountId.eq(model.id.clone()))
                .count(&db_tx)
                .await?;
            let open_investments = fund_investments::Entity::find()
                .join(JoinType::InnerJoin, fund_investments::Relation::Funds.def())
                .filter(fund_investments::Column::AccountId.eq(model.id.clone()))
                .filter(funds::Column::Status.is_in([
                    FundStatus::Recruiting.as_str(),
                    FundStatus::Ongoing.as_str(),
                ]))
                .count(&db_tx)
                .await?;
            if open_savings + open_investments > 0 {
                return Err(EngineError::Forbidden(format!(
                    "account {} still has open savings or fund investments",
                    model.name
                )));
            }

            let result = accounts::Entity::update_many()
                .col_expr(accounts::Column::Archived, Expr::value(true))
                .col_expr(
                    accounts::Column::Revision,
                    Expr::col(accounts::Column::Revision).add(1),
                )
                .filter(accounts::Column::Id.eq(model.id.clone()))
                .filter(accounts::Column::Revision.eq(model.revision))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::ConcurrentModification(format!(
                    "account {} changed, retry",
                    model.name
                )));
            }
            Ok(())
        })?;

        tracing::info!(%classroom_id, %account_id, "account archived");
        Ok(())
    }

    pub async fn account(&self, classroom_id: Uuid, account_id: Uuid) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = self.require_account(&db_tx, classroom_id, account_id).await?;
            Account::try_from(model)
        })
    }

    pub async fn account_for_user(&self, classroom_id: Uuid, user_id: &str) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = accounts::Entity::find()
                .filter(accounts::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(accounts::Column::UserId.eq(user_id))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))?;
            Account::try_from(model)
        })
    }

    /// Every account of the classroom, archived included.
    pub async fn accounts(&self, classroom_id: Uuid) -> ResultEngine<Vec<Account>> {
        with_tx!(self, |db_tx| {
            self.require_classroom(&db_tx, classroom_id).await?;
            accounts::Entity::find()
                .filter(accounts::Column::ClassroomId.eq(classroom_id.to_string()))
                .order_by_asc(accounts::Column::CreatedAt)
                .order_by_asc(accounts::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Account::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    pub async fn treasury(&self, classroom_id: Uuid) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = self.require_treasury(&db_tx, classroom_id).await?;
            Account::try_from(model)
        })
    }

    pub async fn system_account(
        &self,
        classroom_id: Uuid,
        kind: SystemAccountKind,
    ) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = self.require_system_account(&db_tx, classroom_id, kind).await?;
            Account::try_from(model)
        })
    }
}
