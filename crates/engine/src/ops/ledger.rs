//! Ledger core: the only code that writes balances.
//!
//! Every higher-level operation moves money through [`Engine::post_transfer`]
//! (two rows, one correlation id) or [`Engine::post_single`] (mint and burn).

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AccountRole, BurnCmd, EngineError, MintCmd, Money, ResultEngine, SalaryCmd, Transaction,
    TransactionKind, TransferCmd, TransferReceipt, accounts, transactions,
    util::{normalize_optional_text, parse_uuid, require_positive_amount},
};

use super::{Engine, with_tx};

/// One money movement between two accounts of the same classroom.
pub(super) struct Posting {
    pub kind: TransactionKind,
    pub from: Uuid,
    pub to: Uuid,
    pub amount_minor: i64,
    pub description: String,
    pub idempotency_key: Option<String>,
}

impl Posting {
    pub(super) fn new(
        kind: TransactionKind,
        from: Uuid,
        to: Uuid,
        amount_minor: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            from,
            to,
            amount_minor,
            description: description.into(),
            idempotency_key: None,
        }
    }
}

/// One page of an account's history, newest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryPage {
    pub items: Vec<Transaction>,
    /// Pass back to `history` to fetch the next (older) page.
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct HistoryCursor {
    occurred_at: DateTime<Utc>,
    transaction_id: String,
}

impl HistoryCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidId("invalid history cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidId("invalid history cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidId("invalid history cursor".to_string()))
    }
}

fn default_description(kind: TransactionKind, memo: Option<&str>) -> String {
    normalize_optional_text(memo).unwrap_or_else(|| kind.as_str().replace('_', " "))
}

fn ensure_active(model: &accounts::Model) -> ResultEngine<()> {
    if model.archived {
        return Err(EngineError::Forbidden(format!(
            "account {} is archived",
            model.name
        )));
    }
    Ok(())
}

fn receipt_from_rows(rows: Vec<transactions::Model>) -> ResultEngine<TransferReceipt> {
    let mut debit = None;
    let mut credit = None;
    for row in rows {
        let tx = Transaction::try_from(row)?;
        if tx.amount_minor < 0 {
            debit = Some(tx);
        } else {
            credit = Some(tx);
        }
    }
    match (debit, credit) {
        (Some(debit), Some(credit)) => Ok(TransferReceipt {
            correlation_id: debit.correlation_id,
            debit,
            credit,
        }),
        _ => Err(EngineError::KeyNotFound(
            "transfer legs not exists".to_string(),
        )),
    }
}

impl Engine {
    /// Compare-and-swap write of an account balance.
    ///
    /// Fails with `ConcurrentModification` if the row changed since `model`
    /// was read.
    async fn write_balance(
        &self,
        db: &DatabaseTransaction,
        model: &accounts::Model,
        new_balance: i64,
    ) -> ResultEngine<()> {
        if new_balance < 0 {
            return Err(EngineError::InsufficientFunds(format!(
                "account {} would go negative",
                model.name
            )));
        }
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::Balance, Expr::value(new_balance))
            .col_expr(
                accounts::Column::Revision,
                Expr::col(accounts::Column::Revision).add(1),
            )
            .filter(accounts::Column::Id.eq(model.id.clone()))
            .filter(accounts::Column::Revision.eq(model.revision))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::ConcurrentModification(format!(
                "account {} changed, retry",
                model.name
            )));
        }
        Ok(())
    }

    /// Debits `from`, credits `to` and appends both legs.
    pub(super) async fn post_transfer(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
        posting: Posting,
        at: DateTime<Utc>,
    ) -> ResultEngine<TransferReceipt> {
        require_positive_amount(posting.amount_minor, "amount")?;
        if posting.from == posting.to {
            return Err(EngineError::InvalidAmount(
                "from and to accounts must differ".to_string(),
            ));
        }

        let locked = self
            .lock_accounts(db, classroom_id, &[posting.from, posting.to])
            .await?;
        let from_id = posting.from.to_string();
        let (from_model, to_model) = match locked.as_slice() {
            [a, b] if a.id == from_id => (a, b),
            [a, b] => (b, a),
            _ => {
                return Err(EngineError::KeyNotFound("account not exists".to_string()));
            }
        };
        ensure_active(from_model)?;
        ensure_active(to_model)?;

        if from_model.balance < posting.amount_minor {
            return Err(EngineError::InsufficientFunds(format!(
                "{} has {}, needs {}",
                from_model.name,
                Money::new(from_model.balance),
                Money::new(posting.amount_minor)
            )));
        }
        let from_after = from_model.balance - posting.amount_minor;
        let to_after = to_model
            .balance
            .checked_add(posting.amount_minor)
            .ok_or_else(|| EngineError::InvalidAmount("balance overflows".to_string()))?;

        self.write_balance(db, from_model, from_after).await?;
        self.write_balance(db, to_model, to_after).await?;

        let correlation_id = Uuid::now_v7();
        let debit = Transaction {
            id: Uuid::now_v7(),
            correlation_id,
            classroom_id,
            account_id: posting.from,
            kind: posting.kind,
            amount_minor: -posting.amount_minor,
            balance_after: from_after,
            occurred_at: at,
            description: posting.description.clone(),
            counterparty_account_id: Some(posting.to),
            idempotency_key: posting.idempotency_key.clone(),
        };
        let credit = Transaction {
            id: Uuid::now_v7(),
            correlation_id,
            classroom_id,
            account_id: posting.to,
            kind: posting.kind,
            amount_minor: posting.amount_minor,
            balance_after: to_after,
            occurred_at: at,
            description: posting.description,
            counterparty_account_id: Some(posting.from),
            idempotency_key: posting.idempotency_key,
        };
        transactions::ActiveModel::from(&debit).insert(db).await?;
        transactions::ActiveModel::from(&credit).insert(db).await?;

        tracing::debug!(
            %classroom_id,
            %correlation_id,
            kind = posting.kind.as_str(),
            amount = posting.amount_minor,
            "posted transfer"
        );

        Ok(TransferReceipt {
            correlation_id,
            debit,
            credit,
        })
    }

    /// Applies a signed amount to one account with no counterparty.
    pub(super) async fn post_single(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
        account_id: Uuid,
        signed_amount_minor: i64,
        kind: TransactionKind,
        description: String,
        at: DateTime<Utc>,
    ) -> ResultEngine<Transaction> {
        let locked = self.lock_accounts(db, classroom_id, &[account_id]).await?;
        let model = locked
            .first()
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))?;
        ensure_active(model)?;

        if signed_amount_minor < 0 && model.balance < -signed_amount_minor {
            return Err(EngineError::InsufficientFunds(format!(
                "{} has {}, needs {}",
                model.name,
                Money::new(model.balance),
                Money::new(-signed_amount_minor)
            )));
        }
        let after = model
            .balance
            .checked_add(signed_amount_minor)
            .ok_or_else(|| EngineError::InvalidAmount("balance overflows".to_string()))?;
        self.write_balance(db, model, after).await?;

        let tx = Transaction {
            id: Uuid::now_v7(),
            correlation_id: Uuid::now_v7(),
            classroom_id,
            account_id,
            kind,
            amount_minor: signed_amount_minor,
            balance_after: after,
            occurred_at: at,
            description,
            counterparty_account_id: None,
            idempotency_key: None,
        };
        transactions::ActiveModel::from(&tx).insert(db).await?;
        Ok(tx)
    }

    async fn find_by_idempotency_key(
        &self,
        db: &DatabaseTransaction,
        classroom_id: Uuid,
        key: &str,
    ) -> ResultEngine<Option<TransferReceipt>> {
        let rows = transactions::Entity::find()
            .filter(transactions::Column::ClassroomId.eq(classroom_id.to_string()))
            .filter(transactions::Column::IdempotencyKey.eq(key))
            .order_by_asc(transactions::Column::Id)
            .all(db)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        receipt_from_rows(rows).map(Some)
    }

    /// Moves `amount` from one account to another.
    ///
    /// With an idempotency key, a repeated call returns the original receipt
    /// without moving money again; reusing the key for a different movement
    /// fails with `ExistingKey`.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<TransferReceipt> {
        let key = normalize_optional_text(cmd.idempotency_key.as_deref());
        let receipt = with_tx!(self, |db_tx| {
            let existing = match key.as_deref() {
                Some(key) => {
                    self.find_by_idempotency_key(&db_tx, cmd.classroom_id, key)
                        .await?
                }
                None => None,
            };
            match existing {
                Some(existing)
                    if existing.debit.account_id != cmd.from
                        || existing.credit.account_id != cmd.to
                        || existing.amount_minor() != cmd.amount_minor =>
                {
                    Err(EngineError::ExistingKey(key.clone().unwrap_or_default()))
                }
                Some(existing) => {
                    tracing::info!(
                        classroom_id = %cmd.classroom_id,
                        correlation_id = %existing.correlation_id,
                        "replayed transfer for idempotency key"
                    );
                    Ok(existing)
                }
                None => {
                    let mut posting = Posting::new(
                        TransactionKind::Transfer,
                        cmd.from,
                        cmd.to,
                        cmd.amount_minor,
                        default_description(TransactionKind::Transfer, cmd.memo.as_deref()),
                    );
                    posting.idempotency_key = key.clone();
                    self.post_transfer(&db_tx, cmd.classroom_id, posting, Utc::now())
                        .await
                }
            }
        })?;

        tracing::info!(
            classroom_id = %cmd.classroom_id,
            from = %cmd.from,
            to = %cmd.to,
            amount = cmd.amount_minor,
            "transfer committed"
        );
        Ok(receipt)
    }

    /// Buyer pays a mart account for goods.
    pub async fn mart_purchase(
        &self,
        classroom_id: Uuid,
        buyer: Uuid,
        mart: Uuid,
        amount_minor: i64,
        memo: Option<&str>,
    ) -> ResultEngine<TransferReceipt> {
        let receipt = with_tx!(self, |db_tx| {
            let mart_model = self.require_account(&db_tx, classroom_id, mart).await?;
            if AccountRole::try_from(mart_model.role.as_str())? != AccountRole::Mart {
                return Err(EngineError::Forbidden(format!(
                    "{} is not a mart",
                    mart_model.name
                )));
            }
            let posting = Posting::new(
                TransactionKind::MartSettlement,
                buyer,
                mart,
                amount_minor,
                default_description(TransactionKind::MartSettlement, memo),
            );
            self.post_transfer(&db_tx, classroom_id, posting, Utc::now())
                .await
        })?;

        tracing::info!(
            %classroom_id,
            %buyer,
            %mart,
            amount = amount_minor,
            "mart purchase committed"
        );
        Ok(receipt)
    }

    /// Pays every payee from the teacher's treasury, all or nothing.
    pub async fn pay_salary(&self, cmd: SalaryCmd) -> ResultEngine<Vec<TransferReceipt>> {
        if cmd.payees.is_empty() {
            return Err(EngineError::EmptyRecipientSet(
                "salary needs at least one payee".to_string(),
            ));
        }
        let receipts = with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, cmd.classroom_id, cmd.actor, "pay salaries")
                .await?;
            let treasury = self.require_treasury(&db_tx, cmd.classroom_id).await?;
            let treasury_id = parse_uuid(&treasury.id, "account")?;
            let description = default_description(TransactionKind::Salary, cmd.memo.as_deref());
            let now = Utc::now();

            let mut receipts = Vec::with_capacity(cmd.payees.len());
            for (payee, amount_minor) in &cmd.payees {
                let posting = Posting::new(
                    TransactionKind::Salary,
                    treasury_id,
                    *payee,
                    *amount_minor,
                    description.clone(),
                );
                receipts.push(
                    self.post_transfer(&db_tx, cmd.classroom_id, posting, now)
                        .await?,
                );
            }
            Ok(receipts)
        })?;

        tracing::info!(
            classroom_id = %cmd.classroom_id,
            payees = receipts.len(),
            total = receipts
                .iter()
                .map(TransferReceipt::amount_minor)
                .fold(0i64, i64::saturating_add),
            "salaries paid"
        );
        Ok(receipts)
    }

    /// Creates currency on an account. Banker or teacher only.
    pub async fn mint(&self, cmd: MintCmd) -> ResultEngine<Transaction> {
        require_positive_amount(cmd.amount_minor, "amount")?;
        let tx = with_tx!(self, |db_tx| {
            self.require_actor(
                &db_tx,
                cmd.classroom_id,
                cmd.actor,
                AccountRole::ISSUERS,
                "mint currency",
            )
            .await?;
            self.post_single(
                &db_tx,
                cmd.classroom_id,
                cmd.account,
                cmd.amount_minor,
                TransactionKind::Deposit,
                default_description(TransactionKind::Deposit, cmd.memo.as_deref()),
                Utc::now(),
            )
            .await
        })?;

        tracing::info!(
            classroom_id = %cmd.classroom_id,
            account = %cmd.account,
            amount = cmd.amount_minor,
            "minted"
        );
        Ok(tx)
    }

    /// Destroys currency from an account. Banker or teacher only.
    pub async fn burn(&self, cmd: BurnCmd) -> ResultEngine<Transaction> {
        require_positive_amount(cmd.amount_minor, "amount")?;
        let tx = with_tx!(self, |db_tx| {
            self.require_actor(
                &db_tx,
                cmd.classroom_id,
                cmd.actor,
                AccountRole::ISSUERS,
                "burn currency",
            )
            .await?;
            self.post_single(
                &db_tx,
                cmd.classroom_id,
                cmd.account,
                -cmd.amount_minor,
                TransactionKind::Withdrawal,
                default_description(TransactionKind::Withdrawal, cmd.memo.as_deref()),
                Utc::now(),
            )
            .await
        })?;

        tracing::info!(
            classroom_id = %cmd.classroom_id,
            account = %cmd.account,
            amount = cmd.amount_minor,
            "burned"
        );
        Ok(tx)
    }

    pub async fn balance(&self, classroom_id: Uuid, account_id: Uuid) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            let model = self.require_account(&db_tx, classroom_id, account_id).await?;
            Ok(model.balance)
        })
    }

    /// Lists an account's ledger rows, newest first, with cursor-based
    /// pagination over `(occurred_at DESC, id DESC)`.
    pub async fn history(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<HistoryPage> {
        if limit == 0 {
            return Err(EngineError::InvalidAmount(
                "history page size must be > 0".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, classroom_id, account_id)
                .await?;

            let mut query = transactions::Entity::find()
                .filter(transactions::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(transactions::Column::AccountId.eq(account_id.to_string()))
                .order_by_desc(transactions::Column::OccurredAt)
                .order_by_desc(transactions::Column::Id)
                .limit(limit.saturating_add(1));

            if let Some(cursor) = cursor {
                let cursor = HistoryCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(transactions::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(transactions::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(transactions::Column::Id.lt(cursor.transaction_id)),
                        ),
                );
            }

            let rows = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;
            let items = rows
                .into_iter()
                .take(limit as usize)
                .map(Transaction::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            let next_cursor = if has_more {
                items
                    .last()
                    .map(|tx| HistoryCursor {
                        occurred_at: tx.occurred_at,
                        transaction_id: tx.id.to_string(),
                    })
                    .map(|c| c.encode())
                    .transpose()?
            } else {
                None
            };

            tracing::debug!(%classroom_id, %account_id, rows = items.len(), "history page");
            Ok(HistoryPage { items, next_cursor })
        })
    }

    /// Every row written for one logical movement.
    pub async fn transactions_for(
        &self,
        classroom_id: Uuid,
        correlation_id: Uuid,
    ) -> ResultEngine<Vec<Transaction>> {
        with_tx!(self, |db_tx| {
            transactions::Entity::find()
                .filter(transactions::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(transactions::Column::CorrelationId.eq(correlation_id.to_string()))
                .order_by_asc(transactions::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Transaction::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }
}
