use std::collections::HashMap;

use sea_orm::{JoinType, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, FundStatus, ResultEngine, SystemAccountKind, accounts, fund_investments, funds,
    savings_subscriptions, transactions,
    util::{checked_sum, checked_total, parse_uuid},
};

use super::{Engine, with_tx};

/// An account whose stored balance disagrees with its ledger rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub account_id: Uuid,
    pub stored_minor: i64,
    pub ledger_minor: i64,
    /// First row whose `balance_after` does not follow from the rows before it.
    pub broken_chain_at: Option<Uuid>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub mismatches: Vec<BalanceMismatch>,
    pub savings_escrow_minor: i64,
    /// Sum of open subscription principals.
    pub savings_principal_minor: i64,
    pub fund_escrow_minor: i64,
    /// Principal of recruiting and ongoing funds.
    pub fund_principal_minor: i64,
}

impl AuditReport {
    /// Balances replay from the ledger and every escrow covers what it holds.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
            && self.savings_escrow_minor == self.savings_principal_minor
            && self.fund_escrow_minor == self.fund_principal_minor
    }
}

#[derive(Default)]
struct Replay {
    total: i64,
    broken_chain_at: Option<Uuid>,
}

impl Engine {
    /// Recomputes every account balance of the classroom from its ledger rows
    /// and checks the escrow accounts against open savings and funds.
    ///
    /// Read only; nothing is repaired.
    pub async fn verify_scope_balances(&self, classroom_id: Uuid) -> ResultEngine<AuditReport> {
        let report = with_tx!(self, |db_tx| {
            self.require_classroom(&db_tx, classroom_id).await?;
            let account_models = accounts::Entity::find()
                .filter(accounts::Column::ClassroomId.eq(classroom_id.to_string()))
                .order_by_asc(accounts::Column::Id)
                .all(&db_tx)
                .await?;

            // Row ids are time ordered, so id order is posting order.
            let rows = transactions::Entity::find()
                .filter(transactions::Column::ClassroomId.eq(classroom_id.to_string()))
                .order_by_asc(transactions::Column::Id)
                .all(&db_tx)
                .await?;
            let mut replays: HashMap<String, Replay> = HashMap::new();
            for row in rows {
                let replay = replays.entry(row.account_id.clone()).or_default();
                replay.total = replay
                    .total
                    .checked_add(row.amount_minor)
                    .ok_or_else(|| EngineError::InvalidAmount("ledger replay overflows".to_string()))?;
                if replay.broken_chain_at.is_none() && replay.total != row.balance_after {
                    replay.broken_chain_at = Some(parse_uuid(&row.id, "transaction")?);
                }
            }

            let mut report = AuditReport::default();
            for model in &account_models {
                let replay = replays.remove(&model.id).unwrap_or_default();
                if replay.total != model.balance || replay.broken_chain_at.is_some() {
                    report.mismatches.push(BalanceMismatch {
                        account_id: parse_uuid(&model.id, "account")?,
                        stored_minor: model.balance,
                        ledger_minor: replay.total,
                        broken_chain_at: replay.broken_chain_at,
                    });
                }
                match model.system_kind.as_deref() {
                    Some(kind) if kind == SystemAccountKind::SavingsEscrow.as_str() => {
                        report.savings_escrow_minor = model.balance;
                    }
                    Some(kind) if kind == SystemAccountKind::FundEscrow.as_str() => {
                        report.fund_escrow_minor = model.balance;
                    }
                    _ => {}
                }
            }

            let principals: Vec<i64> = savings_subscriptions::Entity::find()
                .select_only()
                .column(savings_subscriptions::Column::PrincipalMinor)
                .filter(savings_subscriptions::Column::ClassroomId.eq(classroom_id.to_string()))
                .into_tuple()
                .all(&db_tx)
                .await?;
            report.savings_principal_minor = checked_sum(principals, "savings principal")?;

            let open_investments: Vec<(i64, i64)> = fund_investments::Entity::find()
                .select_only()
                .column(fund_investments::Column::Units)
                .column(funds::Column::UnitPriceMinor)
                .join(JoinType::InnerJoin, fund_investments::Relation::Funds.def())
                .filter(fund_investments::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(funds::Column::Status.is_in([
                    FundStatus::Recruiting.as_str(),
                    FundStatus::Ongoing.as_str(),
                ]))
                .into_tuple()
                .all(&db_tx)
                .await?;
            report.fund_principal_minor = checked_sum(
                open_investments
                    .into_iter()
                    .map(|(units, unit_price)| checked_total(units, unit_price, "fund principal"))
                    .collect::<ResultEngine<Vec<_>>>()?,
                "fund principal",
            )?;

            Ok(report)
        })?;

        if report.is_consistent() {
            tracing::debug!(%classroom_id, "ledger audit clean");
        } else {
            tracing::warn!(
                %classroom_id,
                mismatches = report.mismatches.len(),
                savings_escrow = report.savings_escrow_minor,
                savings_principal = report.savings_principal_minor,
                fund_escrow = report.fund_escrow_minor,
                fund_principal = report.fund_principal_minor,
                "ledger audit found inconsistencies"
            );
        }
        Ok(report)
    }

    /// Sum of every account balance in the classroom, escrows included.
    ///
    /// Changes only through mint and burn.
    pub async fn total_balance(&self, classroom_id: Uuid) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            self.require_classroom(&db_tx, classroom_id).await?;
            let balances: Vec<i64> = accounts::Entity::find()
                .select_only()
                .column(accounts::Column::Balance)
                .filter(accounts::Column::ClassroomId.eq(classroom_id.to_string()))
                .into_tuple()
                .all(&db_tx)
                .await?;
            checked_sum(balances, "classroom balance")
        })
    }
}
