//! Savings engine.
//!
//! Principal sits in the classroom `savings_escrow` account while a
//! subscription is open. On release the escrow returns the principal; positive
//! interest comes from the treasury, a negative cancellation rate sends the
//! penalty from the escrow to the treasury.

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AccountRole, EngineError, NewSavingsProductCmd, ResultEngine, SavingsProduct,
    SavingsSubscription, SystemAccountKind, TransactionKind, TransferReceipt, savings_products,
    savings_subscriptions,
    util::{normalize_required_name, parse_uuid, require_positive_amount},
};

use super::{Engine, ledger::Posting, with_tx};

/// Money returned when a subscription is cancelled or matures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavingsSettlement {
    pub subscription_id: Uuid,
    pub account_id: Uuid,
    pub principal_minor: i64,
    /// Total credited to the saver.
    pub payout_minor: i64,
    pub receipts: Vec<TransferReceipt>,
}

/// An open subscription with its projected outcomes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavingsPosition {
    pub subscription: SavingsSubscription,
    pub product_name: String,
    pub maturity_payout_minor: i64,
    pub cancellation_refund_minor: i64,
    /// Two thirds of the term; a display hint, cancellation is always allowed.
    pub earliest_cancel_at: DateTime<Utc>,
}

impl Engine {
    /// Pays `payout` for a subscription and deletes it.
    async fn release_subscription(
        &self,
        db: &DatabaseTransaction,
        subscription: &SavingsSubscription,
        payout_minor: i64,
        kind: TransactionKind,
        description: &str,
        at: DateTime<Utc>,
    ) -> ResultEngine<SavingsSettlement> {
        let classroom_id = subscription.classroom_id;
        let principal = subscription.principal_minor;
        let escrow = self
            .require_system_account(db, classroom_id, SystemAccountKind::SavingsEscrow)
            .await?;
        let escrow_id = parse_uuid(&escrow.id, "account")?;

        let mut receipts = Vec::new();
        let from_escrow = payout_minor.min(principal);
        if from_escrow > 0 {
            let posting = Posting::new(
                kind,
                escrow_id,
                subscription.account_id,
                from_escrow,
                description,
            );
            receipts.push(self.post_transfer(db, classroom_id, posting, at).await?);
        }
        if payout_minor != principal {
            let treasury = self.require_treasury(db, classroom_id).await?;
            let treasury_id = parse_uuid(&treasury.id, "account")?;
            let posting = if payout_minor > principal {
                Posting::new(
                    kind,
                    treasury_id,
                    subscription.account_id,
                    payout_minor - principal,
                    format!("{description} interest"),
                )
            } else {
                Posting::new(
                    kind,
                    escrow_id,
                    treasury_id,
                    principal - payout_minor,
                    format!("{description} penalty"),
                )
            };
            receipts.push(self.post_transfer(db, classroom_id, posting, at).await?);
        }

        let deleted = savings_subscriptions::Entity::delete_by_id(subscription.id.to_string())
            .exec(db)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(EngineError::ConcurrentModification(
                "savings subscription already settled".to_string(),
            ));
        }

        Ok(SavingsSettlement {
            subscription_id: subscription.id,
            account_id: subscription.account_id,
            principal_minor: principal,
            payout_minor,
            receipts,
        })
    }

    pub async fn create_savings_product(
        &self,
        cmd: NewSavingsProductCmd,
    ) -> ResultEngine<SavingsProduct> {
        let name = normalize_required_name(&cmd.name, "savings product")?;
        let product = SavingsProduct::new(
            cmd.classroom_id,
            name,
            cmd.maturity_days,
            cmd.rate,
            cmd.cancellation_rate,
            cmd.max_amount_minor,
            Utc::now(),
        )?;
        with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, cmd.classroom_id, cmd.actor, "create savings products")
                .await?;
            savings_products::ActiveModel::from(&product)
                .insert(&db_tx)
                .await?;
            Ok(())
        })?;

        tracing::info!(
            classroom_id = %cmd.classroom_id,
            product_id = %product.id,
            rate = %product.rate,
            "savings product created"
        );
        Ok(product)
    }

    pub async fn savings_products(&self, classroom_id: Uuid) -> ResultEngine<Vec<SavingsProduct>> {
        with_tx!(self, |db_tx| {
            savings_products::Entity::find()
                .filter(savings_products::Column::ClassroomId.eq(classroom_id.to_string()))
                .order_by_asc(savings_products::Column::CreatedAt)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(SavingsProduct::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Escrows `amount` from the account into a new subscription.
    pub async fn join_savings(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
        product_id: Uuid,
        amount_minor: i64,
    ) -> ResultEngine<SavingsSubscription> {
        require_positive_amount(amount_minor, "savings amount")?;
        let subscription = with_tx!(self, |db_tx| {
            self.require_actor(
                &db_tx,
                classroom_id,
                account_id,
                AccountRole::PARTICIPANTS,
                "join savings",
            )
            .await?;
            let product = SavingsProduct::try_from(
                self.require_savings_product(&db_tx, classroom_id, product_id)
                    .await?,
            )?;
            if amount_minor > product.max_amount_minor {
                return Err(EngineError::ExceedsMaxAmount(format!(
                    "{} accepts at most {}",
                    product.name,
                    crate::Money::new(product.max_amount_minor)
                )));
            }
            let escrow = self
                .require_system_account(&db_tx, classroom_id, SystemAccountKind::SavingsEscrow)
                .await?;

            let now = Utc::now();
            let posting = Posting::new(
                TransactionKind::SavingsJoin,
                account_id,
                parse_uuid(&escrow.id, "account")?,
                amount_minor,
                format!("Savings: {}", product.name),
            );
            self.post_transfer(&db_tx, classroom_id, posting, now)
                .await?;

            let subscription = SavingsSubscription {
                id: Uuid::new_v4(),
                classroom_id,
                account_id,
                product_id,
                principal_minor: amount_minor,
                joined_at: now,
                matures_at: product.maturity_at(now)?,
            };
            savings_subscriptions::ActiveModel::from(&subscription)
                .insert(&db_tx)
                .await?;
            Ok(subscription)
        })?;

        tracing::info!(
            %classroom_id,
            %account_id,
            subscription_id = %subscription.id,
            amount = amount_minor,
            "savings joined"
        );
        Ok(subscription)
    }

    /// Cancels a subscription before maturity, refunding
    /// `round(principal × (1 + cancellationRate))`.
    pub async fn cancel_savings(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
        subscription_id: Uuid,
    ) -> ResultEngine<SavingsSettlement> {
        let settlement = with_tx!(self, |db_tx| {
            let subscription = SavingsSubscription::try_from(
                self.require_subscription(&db_tx, classroom_id, subscription_id)
                    .await?,
            )?;
            if subscription.account_id != account_id {
                return Err(EngineError::NotOwner(
                    "savings subscription belongs to another account".to_string(),
                ));
            }
            let product = SavingsProduct::try_from(
                self.require_savings_product(&db_tx, classroom_id, subscription.product_id)
                    .await?,
            )?;
            let refund = product.cancellation_refund(subscription.principal_minor);
            self.release_subscription(
                &db_tx,
                &subscription,
                refund,
                TransactionKind::SavingsCancel,
                &format!("Savings cancelled: {}", product.name),
                Utc::now(),
            )
            .await
        })?;

        tracing::info!(
            %classroom_id,
            %account_id,
            %subscription_id,
            refund = settlement.payout_minor,
            "savings cancelled"
        );
        Ok(settlement)
    }

    /// Pays out one subscription if it is due at `now`.
    ///
    /// Returns `None` when the subscription is already gone or not yet due, so
    /// a repeated sweep is a no-op.
    pub(super) async fn mature_subscription(
        &self,
        classroom_id: Uuid,
        subscription_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Option<SavingsSettlement>> {
        with_tx!(self, |db_tx| {
            let Some(model) = savings_subscriptions::Entity::find_by_id(subscription_id.to_string())
                .filter(savings_subscriptions::Column::ClassroomId.eq(classroom_id.to_string()))
                .one(&db_tx)
                .await?
            else {
                return Ok(None);
            };
            let subscription = SavingsSubscription::try_from(model)?;
            if subscription.matures_at > now {
                return Ok(None);
            }
            let product = SavingsProduct::try_from(
                self.require_savings_product(&db_tx, classroom_id, subscription.product_id)
                    .await?,
            )?;
            let payout = product.maturity_payout(subscription.principal_minor);
            self.release_subscription(
                &db_tx,
                &subscription,
                payout,
                TransactionKind::SavingsMaturity,
                &format!("Savings matured: {}", product.name),
                now,
            )
            .await
            .map(Some)
        })
    }

    /// Ids of subscriptions due at `now`, oldest maturity first.
    pub(super) async fn due_subscriptions(
        &self,
        classroom_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<Uuid>> {
        with_tx!(self, |db_tx| {
            let ids: Vec<String> = savings_subscriptions::Entity::find()
                .select_only()
                .column(savings_subscriptions::Column::Id)
                .filter(savings_subscriptions::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(savings_subscriptions::Column::MaturesAt.lte(now))
                .order_by_asc(savings_subscriptions::Column::MaturesAt)
                .into_tuple()
                .all(&db_tx)
                .await?;
            ids.iter()
                .map(|id| parse_uuid(id, "savings subscription"))
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Open subscriptions of an account with projected payouts.
    pub async fn savings_of(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
    ) -> ResultEngine<Vec<SavingsPosition>> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, classroom_id, account_id)
                .await?;
            let rows = savings_subscriptions::Entity::find()
                .filter(savings_subscriptions::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(savings_subscriptions::Column::AccountId.eq(account_id.to_string()))
                .order_by_asc(savings_subscriptions::Column::MaturesAt)
                .find_also_related(savings_products::Entity)
                .all(&db_tx)
                .await?;

            let mut positions = Vec::with_capacity(rows.len());
            for (subscription, product) in rows {
                let product = product.ok_or_else(|| {
                    EngineError::KeyNotFound("savings product not exists".to_string())
                })?;
                let product = SavingsProduct::try_from(product)?;
                let subscription = SavingsSubscription::try_from(subscription)?;
                positions.push(SavingsPosition {
                    maturity_payout_minor: product.maturity_payout(subscription.principal_minor),
                    cancellation_refund_minor: product
                        .cancellation_refund(subscription.principal_minor),
                    earliest_cancel_at: product.earliest_cancel_at(subscription.joined_at)?,
                    product_name: product.name,
                    subscription,
                });
            }
            Ok(positions)
        })
    }
}
