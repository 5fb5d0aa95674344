use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{
    AccountRole, EngineError, IssueBillCmd, ResultEngine, TaxBill, TaxRecipient, TransactionKind,
    TransferReceipt, tax_bills, tax_recipients,
    util::{normalize_required_name, parse_uuid, require_positive_amount},
};

use super::{Engine, ledger::Posting, with_tx};

impl Engine {
    /// Issues a bill and one unpaid recipient row per distinct account.
    pub async fn issue_bill(&self, cmd: IssueBillCmd) -> ResultEngine<TaxBill> {
        let name = normalize_required_name(&cmd.name, "tax bill")?;
        require_positive_amount(cmd.amount_minor, "tax amount")?;
        let recipients: BTreeSet<Uuid> = cmd.recipients.iter().copied().collect();
        if recipients.is_empty() {
            return Err(EngineError::EmptyRecipientSet(format!(
                "bill {name} has no recipients"
            )));
        }

        let bill = with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, cmd.classroom_id, cmd.actor, "issue bills")
                .await?;
            for account_id in &recipients {
                let model = self
                    .require_account(&db_tx, cmd.classroom_id, *account_id)
                    .await?;
                let role = AccountRole::try_from(model.role.as_str())?;
                if matches!(role, AccountRole::Teacher | AccountRole::System) {
                    return Err(EngineError::Forbidden(format!(
                        "{} accounts cannot be billed",
                        role.as_str()
                    )));
                }
            }

            let bill = TaxBill {
                id: Uuid::new_v4(),
                classroom_id: cmd.classroom_id,
                name,
                amount_minor: cmd.amount_minor,
                due_at: cmd.due_at,
                issued_at: Utc::now(),
                issued_by: cmd.actor,
            };
            tax_bills::ActiveModel::from(&bill).insert(&db_tx).await?;
            tax_recipients::Entity::insert_many(recipients.iter().map(|account_id| {
                tax_recipients::ActiveModel::from(&TaxRecipient::unpaid(
                    bill.id,
                    *account_id,
                    cmd.classroom_id,
                ))
            }))
            .exec(&db_tx)
            .await?;
            Ok(bill)
        })?;

        tracing::info!(
            classroom_id = %cmd.classroom_id,
            bill_id = %bill.id,
            recipients = recipients.len(),
            amount = bill.amount_minor,
            "bill issued"
        );
        Ok(bill)
    }

    /// Pays a bill from the account to the treasury, exactly once.
    pub async fn pay_bill(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
        bill_id: Uuid,
    ) -> ResultEngine<TransferReceipt> {
        let receipt = with_tx!(self, |db_tx| {
            let bill = TaxBill::try_from(self.require_bill(&db_tx, classroom_id, bill_id).await?)?;
            let recipient =
                tax_recipients::Entity::find_by_id((bill_id.to_string(), account_id.to_string()))
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| {
                        EngineError::NotARecipient(format!("bill {} was not issued to it", bill.name))
                    })?;
            if recipient.paid {
                return Err(EngineError::AlreadyPaid(bill.name));
            }

            let treasury = self.require_treasury(&db_tx, classroom_id).await?;
            let now = Utc::now();
            let posting = Posting::new(
                TransactionKind::Tax,
                account_id,
                parse_uuid(&treasury.id, "account")?,
                bill.amount_minor,
                format!("Tax: {}", bill.name),
            );
            let receipt = self.post_transfer(&db_tx, classroom_id, posting, now).await?;

            // Only an unpaid row flips; a concurrent payer sees zero rows.
            let flipped = tax_recipients::Entity::update_many()
                .col_expr(tax_recipients::Column::Paid, Expr::value(true))
                .col_expr(tax_recipients::Column::PaidAt, Expr::value(now))
                .filter(tax_recipients::Column::BillId.eq(bill_id.to_string()))
                .filter(tax_recipients::Column::AccountId.eq(account_id.to_string()))
                .filter(tax_recipients::Column::Paid.eq(false))
                .exec(&db_tx)
                .await?;
            if flipped.rows_affected == 0 {
                return Err(EngineError::AlreadyPaid(bill.name));
            }
            Ok(receipt)
        })?;

        tracing::info!(%classroom_id, %account_id, %bill_id, amount = receipt.amount_minor(), "bill paid");
        Ok(receipt)
    }

    pub async fn bills(&self, classroom_id: Uuid) -> ResultEngine<Vec<TaxBill>> {
        with_tx!(self, |db_tx| {
            tax_bills::Entity::find()
                .filter(tax_bills::Column::ClassroomId.eq(classroom_id.to_string()))
                .order_by_desc(tax_bills::Column::IssuedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(TaxBill::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Bills the account still owes, earliest due first.
    pub async fn unpaid_for(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
    ) -> ResultEngine<Vec<TaxBill>> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, classroom_id, account_id)
                .await?;
            let rows = tax_recipients::Entity::find()
                .filter(tax_recipients::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(tax_recipients::Column::AccountId.eq(account_id.to_string()))
                .filter(tax_recipients::Column::Paid.eq(false))
                .find_also_related(tax_bills::Entity)
                .order_by_asc(tax_bills::Column::DueAt)
                .all(&db_tx)
                .await?;
            rows.into_iter()
                .filter_map(|(_, bill)| bill)
                .map(TaxBill::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    pub async fn recipients_of(
        &self,
        classroom_id: Uuid,
        bill_id: Uuid,
    ) -> ResultEngine<Vec<TaxRecipient>> {
        with_tx!(self, |db_tx| {
            self.require_bill(&db_tx, classroom_id, bill_id).await?;
            tax_recipients::Entity::find()
                .filter(tax_recipients::Column::BillId.eq(bill_id.to_string()))
                .order_by_asc(tax_recipients::Column::AccountId)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(TaxRecipient::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}

