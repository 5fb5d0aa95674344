//! Fund campaigns.
//!
//! Investments are escrowed in the classroom `fund_escrow` account. A fund
//! moves `recruiting -> ongoing` when the sweep passes its recruitment
//! deadline, then the teacher settles it into one of the terminal states.

use chrono::{DateTime, Utc};
use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    AccountRole, EngineError, Fund, FundInvestment, FundOutcome, FundStatus, NewFundCmd,
    ResultEngine, SystemAccountKind, TransactionKind, TransferReceipt, fund_investments, funds,
    util::{
        checked_sum, checked_total, normalize_optional_text, normalize_required_name, parse_uuid,
    },
};

use super::{Engine, ledger::Posting, with_tx};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundSettlement {
    pub fund_id: Uuid,
    pub status: FundStatus,
    pub investors: usize,
    pub principal_minor: i64,
    pub reward_minor: i64,
    pub receipts: Vec<TransferReceipt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundRefund {
    pub fund_id: Uuid,
    pub investors: usize,
    pub refunded_minor: i64,
    pub receipts: Vec<TransferReceipt>,
}

/// A fund together with what has been raised so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundSummary {
    pub fund: Fund,
    pub raised_minor: i64,
    pub investor_count: usize,
    pub units: i64,
}

impl Engine {
    async fn investments(
        &self,
        db: &DatabaseTransaction,
        fund_id: Uuid,
    ) -> ResultEngine<Vec<FundInvestment>> {
        fund_investments::Entity::find()
            .filter(fund_investments::Column::FundId.eq(fund_id.to_string()))
            .order_by_asc(fund_investments::Column::AccountId)
            .all(db)
            .await?
            .into_iter()
            .map(FundInvestment::try_from)
            .collect()
    }

    pub async fn create_fund(&self, cmd: NewFundCmd) -> ResultEngine<Fund> {
        let name = normalize_required_name(&cmd.name, "fund")?;
        if cmd.unit_price_minor <= 0 {
            return Err(EngineError::InvalidPrice(
                "unit price must be > 0".to_string(),
            ));
        }
        if cmd.target_amount_minor < 0 || cmd.base_reward_minor < 0 || cmd.incentive_reward_minor < 0
        {
            return Err(EngineError::InvalidAmount(
                "fund target and rewards must be >= 0".to_string(),
            ));
        }
        if cmd.recruitment_deadline > cmd.maturity_at {
            return Err(EngineError::InvalidTransition(
                "recruitment must end before maturity".to_string(),
            ));
        }

        let fund = with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, cmd.classroom_id, cmd.actor, "create funds")
                .await?;
            let fund = Fund {
                id: Uuid::new_v4(),
                classroom_id: cmd.classroom_id,
                name,
                description: normalize_optional_text(cmd.description.as_deref()),
                creator_account_id: cmd.actor,
                unit_price_minor: cmd.unit_price_minor,
                target_amount_minor: cmd.target_amount_minor,
                base_reward_minor: cmd.base_reward_minor,
                incentive_reward_minor: cmd.incentive_reward_minor,
                recruitment_deadline: cmd.recruitment_deadline,
                maturity_at: cmd.maturity_at,
                status: FundStatus::Recruiting,
                created_at: Utc::now(),
                settled_at: None,
            };
            funds::ActiveModel::from(&fund).insert(&db_tx).await?;
            Ok(fund)
        })?;

        tracing::info!(
            classroom_id = %cmd.classroom_id,
            fund_id = %fund.id,
            unit_price = fund.unit_price_minor,
            "fund created"
        );
        Ok(fund)
    }

    /// Buys `units` of a recruiting fund. Repeated investments add up.
    pub async fn invest(
        &self,
        classroom_id: Uuid,
        fund_id: Uuid,
        account_id: Uuid,
        units: i64,
    ) -> ResultEngine<FundInvestment> {
        if units <= 0 {
            return Err(EngineError::InvalidQuantity(
                "units must be > 0".to_string(),
            ));
        }

        let investment = with_tx!(self, |db_tx| {
            self.require_actor(
                &db_tx,
                classroom_id,
                account_id,
                AccountRole::PARTICIPANTS,
                "invest in funds",
            )
            .await?;
            let fund = Fund::try_from(self.require_fund(&db_tx, classroom_id, fund_id).await?)?;
            let now = Utc::now();
            if fund.status != FundStatus::Recruiting || now >= fund.recruitment_deadline {
                return Err(EngineError::FundClosed(format!(
                    "{} is no longer recruiting",
                    fund.name
                )));
            }
            let cost = checked_total(units, fund.unit_price_minor, "fund investment")?;
            let escrow = self
                .require_system_account(&db_tx, classroom_id, SystemAccountKind::FundEscrow)
                .await?;
            let posting = Posting::new(
                TransactionKind::FundJoin,
                account_id,
                parse_uuid(&escrow.id, "account")?,
                cost,
                format!("Fund: {}", fund.name),
            );
            self.post_transfer(&db_tx, classroom_id, posting, now)
                .await?;

            let existing =
                fund_investments::Entity::find_by_id((fund_id.to_string(), account_id.to_string()))
                    .one(&db_tx)
                    .await?;
            let investment = match existing {
                Some(model) => {
                    let mut investment = FundInvestment::try_from(model)?;
                    investment.units = investment.units.checked_add(units).ok_or_else(|| {
                        EngineError::InvalidQuantity("fund units overflow".to_string())
                    })?;
                    investment.invested_at = now;
                    fund_investments::ActiveModel::from(&investment)
                        .update(&db_tx)
                        .await?;
                    investment
                }
                None => {
                    let investment = FundInvestment {
                        fund_id,
                        account_id,
                        classroom_id,
                        units,
                        invested_at: now,
                    };
                    fund_investments::ActiveModel::from(&investment)
                        .insert(&db_tx)
                        .await?;
                    investment
                }
            };
            Ok(investment)
        })?;

        tracing::info!(%classroom_id, %fund_id, %account_id, units, "fund investment");
        Ok(investment)
    }

    /// Ends recruitment if the deadline has passed. Returns whether the fund
    /// changed state; a second call is a no-op.
    pub(super) async fn advance_recruitment(
        &self,
        classroom_id: Uuid,
        fund_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            let result = funds::Entity::update_many()
                .col_expr(funds::Column::Status, Expr::value(FundStatus::Ongoing.as_str()))
                .filter(funds::Column::Id.eq(fund_id.to_string()))
                .filter(funds::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(funds::Column::Status.eq(FundStatus::Recruiting.as_str()))
                .filter(funds::Column::RecruitmentDeadline.lte(now))
                .exec(&db_tx)
                .await?;
            Ok(result.rows_affected > 0)
        })
    }

    /// Recruiting funds whose deadline is at or before `now`.
    pub(super) async fn due_funds(
        &self,
        classroom_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Uuid>> {
        with_tx!(self, |db_tx| {
            let ids: Vec<String> = funds::Entity::find()
                .select_only()
                .column(funds::Column::Id)
                .filter(funds::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(funds::Column::Status.eq(FundStatus::Recruiting.as_str()))
                .filter(funds::Column::RecruitmentDeadline.lte(now))
                .order_by_asc(funds::Column::RecruitmentDeadline)
                .into_tuple()
                .all(&db_tx)
                .await?;
            ids.iter()
                .map(|id| parse_uuid(id, "fund"))
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Resolves an ongoing fund. Every investor gets the principal back from
    /// escrow plus `units × reward` from the treasury for the outcome.
    pub async fn settle_fund(
        &self,
        classroom_id: Uuid,
        actor: Uuid,
        fund_id: Uuid,
        outcome: FundOutcome,
    ) -> ResultEngine<FundSettlement> {
        let settlement = with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, classroom_id, actor, "settle funds")
                .await?;
            let fund = Fund::try_from(self.require_fund(&db_tx, classroom_id, fund_id).await?)?;
            if fund.status != FundStatus::Ongoing {
                return Err(EngineError::InvalidTransition(format!(
                    "{} is {}, only ongoing funds settle",
                    fund.name,
                    fund.status.as_str()
                )));
            }

            let escrow = self
                .require_system_account(&db_tx, classroom_id, SystemAccountKind::FundEscrow)
                .await?;
            let escrow_id = parse_uuid(&escrow.id, "account")?;
            let treasury = self.require_treasury(&db_tx, classroom_id).await?;
            let treasury_id = parse_uuid(&treasury.id, "account")?;

            let now = Utc::now();
            let investments = self.investments(&db_tx, fund_id).await?;
            let mut settlement = FundSettlement {
                fund_id,
                status: outcome.status(),
                investors: investments.len(),
                principal_minor: 0,
                reward_minor: 0,
                receipts: Vec::new(),
            };
            for investment in &investments {
                let (principal, reward) = fund.payout_for(investment.units, outcome)?;
                if principal > 0 {
                    let posting = Posting::new(
                        TransactionKind::FundPayout,
                        escrow_id,
                        investment.account_id,
                        principal,
                        format!("Fund settled: {}", fund.name),
                    );
                    settlement
                        .receipts
                        .push(self.post_transfer(&db_tx, classroom_id, posting, now).await?);
                }
                if reward > 0 {
                    let posting = Posting::new(
                        TransactionKind::FundPayout,
                        treasury_id,
                        investment.account_id,
                        reward,
                        format!("Fund reward: {}", fund.name),
                    );
                    settlement
                        .receipts
                        .push(self.post_transfer(&db_tx, classroom_id, posting, now).await?);
                }
                settlement.principal_minor += principal;
                settlement.reward_minor += reward;
            }

            let result = funds::Entity::update_many()
                .col_expr(funds::Column::Status, Expr::value(outcome.status().as_str()))
                .col_expr(funds::Column::SettledAt, Expr::value(now))
                .filter(funds::Column::Id.eq(fund_id.to_string()))
                .filter(funds::Column::Status.eq(FundStatus::Ongoing.as_str()))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::InvalidTransition(format!(
                    "{} was settled concurrently",
                    fund.name
                )));
            }
            Ok(settlement)
        })?;

        tracing::info!(
            %classroom_id,
            %fund_id,
            status = settlement.status.as_str(),
            investors = settlement.investors,
            principal = settlement.principal_minor,
            reward = settlement.reward_minor,
            "fund settled"
        );
        Ok(settlement)
    }

    /// Refunds every investor and removes the fund with its investments.
    pub async fn delete_fund(
        &self,
        classroom_id: Uuid,
        actor: Uuid,
        fund_id: Uuid,
    ) -> ResultEngine<FundRefund> {
        let refund = with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, classroom_id, actor, "delete funds")
                .await?;
            let fund = Fund::try_from(self.require_fund(&db_tx, classroom_id, fund_id).await?)?;
            if fund.status.is_terminal() {
                return Err(EngineError::FundClosed(format!(
                    "{} is already {}",
                    fund.name,
                    fund.status.as_str()
                )));
            }

            let escrow = self
                .require_system_account(&db_tx, classroom_id, SystemAccountKind::FundEscrow)
                .await?;
            let escrow_id = parse_uuid(&escrow.id, "account")?;
            let now = Utc::now();
            let investments = self.investments(&db_tx, fund_id).await?;
            let mut refund = FundRefund {
                fund_id,
                investors: investments.len(),
                refunded_minor: 0,
                receipts: Vec::new(),
            };
            for investment in &investments {
                let principal =
                    checked_total(investment.units, fund.unit_price_minor, "fund principal")?;
                let posting = Posting::new(
                    TransactionKind::FundPayout,
                    escrow_id,
                    investment.account_id,
                    principal,
                    format!("Fund cancelled: {}", fund.name),
                );
                refund
                    .receipts
                    .push(self.post_transfer(&db_tx, classroom_id, posting, now).await?);
                refund.refunded_minor += principal;
            }

            fund_investments::Entity::delete_many()
                .filter(fund_investments::Column::FundId.eq(fund_id.to_string()))
                .exec(&db_tx)
                .await?;
            funds::Entity::delete_by_id(fund_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(refund)
        })?;

        tracing::info!(
            %classroom_id,
            %fund_id,
            investors = refund.investors,
            refunded = refund.refunded_minor,
            "fund deleted"
        );
        Ok(refund)
    }

    pub async fn fund(&self, classroom_id: Uuid, fund_id: Uuid) -> ResultEngine<FundSummary> {
        with_tx!(self, |db_tx| {
            let fund = Fund::try_from(self.require_fund(&db_tx, classroom_id, fund_id).await?)?;
            let investments = self.investments(&db_tx, fund_id).await?;
            let units = checked_sum(investments.iter().map(|i| i.units), "fund units")?;
            Ok(FundSummary {
                raised_minor: checked_total(units, fund.unit_price_minor, "fund total")?,
                investor_count: investments.len(),
                units,
                fund,
            })
        })
    }

    pub async fn funds(&self, classroom_id: Uuid) -> ResultEngine<Vec<Fund>> {
        with_tx!(self, |db_tx| {
            funds::Entity::find()
                .filter(funds::Column::ClassroomId.eq(classroom_id.to_string()))
                .order_by_desc(funds::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Fund::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    pub async fn investments_of(
        &self,
        classroom_id: Uuid,
        fund_id: Uuid,
    ) -> ResultEngine<Vec<FundInvestment>> {
        with_tx!(self, |db_tx| {
            self.require_fund(&db_tx, classroom_id, fund_id).await?;
            self.investments(&db_tx, fund_id).await
        })
    }
}
