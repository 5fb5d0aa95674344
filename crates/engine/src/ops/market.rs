//! Market engine: instruments, price history and trades.
//!
//! Buys pay the classroom `market` account, sells are paid from it. Sell
//! proceeds carry the volatility fee, so the market account normally holds
//! enough; any shortfall is first drawn from the treasury.

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Holding, Instrument, Money, NewInstrumentCmd, PricePoint, ResultEngine,
    SystemAccountKind, TransactionKind, TransferReceipt, holdings,
    instruments::{self, sell_proceeds, validate_price},
    price_history,
    util::{checked_total, normalize_required_name, parse_uuid},
};

use super::{Engine, ledger::Posting, with_tx};

/// A filled buy or sell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trade {
    pub instrument_id: Uuid,
    pub quantity: i64,
    pub price_minor: i64,
    /// `quantity × price`.
    pub gross_minor: i64,
    /// What the account actually paid (buy) or received (sell).
    pub net_minor: i64,
    pub receipt: TransferReceipt,
    /// Position after the trade; `None` once sold out.
    pub holding: Option<Holding>,
}

/// A holding valued at the instrument's current price.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub holding: Holding,
    pub instrument_name: String,
    pub price_minor: i64,
    pub market_value_minor: i64,
}

fn require_quantity(quantity: i64) -> ResultEngine<()> {
    if quantity <= 0 {
        return Err(EngineError::InvalidQuantity(
            "quantity must be > 0".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    async fn load_holding(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        instrument_id: Uuid,
    ) -> ResultEngine<Option<Holding>> {
        holdings::Entity::find_by_id((account_id.to_string(), instrument_id.to_string()))
            .one(db)
            .await?
            .map(Holding::try_from)
            .transpose()
    }

    async fn store_holding(
        &self,
        db: &DatabaseTransaction,
        holding: &Holding,
        existed: bool,
    ) -> ResultEngine<()> {
        if holding.is_empty() {
            holdings::Entity::delete_by_id((
                holding.account_id.to_string(),
                holding.instrument_id.to_string(),
            ))
            .exec(db)
            .await?;
        } else if existed {
            holdings::ActiveModel::from(holding).update(db).await?;
        } else {
            holdings::ActiveModel::from(holding).insert(db).await?;
        }
        Ok(())
    }

    /// Lists a new instrument and records its opening price.
    pub async fn create_instrument(&self, cmd: NewInstrumentCmd) -> ResultEngine<Instrument> {
        let name = normalize_required_name(&cmd.name, "instrument")?;
        let instrument = with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, cmd.classroom_id, cmd.actor, "list instruments")
                .await?;
            let duplicate = instruments::Entity::find()
                .filter(instruments::Column::ClassroomId.eq(cmd.classroom_id.to_string()))
                .filter(instruments::Column::Name.eq(name.clone()))
                .one(&db_tx)
                .await?;
            if duplicate.is_some() {
                return Err(EngineError::ExistingKey(name));
            }

            let now = Utc::now();
            let instrument = Instrument::new(
                cmd.classroom_id,
                name,
                cmd.price_minor,
                cmd.volatility_bp,
                now,
            )?;
            instruments::ActiveModel::from(&instrument)
                .insert(&db_tx)
                .await?;
            let point = PricePoint::new(instrument.id, instrument.price_minor, now);
            price_history::ActiveModel::from(&point).insert(&db_tx).await?;
            Ok(instrument)
        })?;

        tracing::info!(
            classroom_id = %cmd.classroom_id,
            instrument_id = %instrument.id,
            price = instrument.price_minor,
            volatility_bp = instrument.volatility_bp,
            "instrument listed"
        );
        Ok(instrument)
    }

    /// Sets a new price and appends it to the price history. Teacher only.
    pub async fn set_price(
        &self,
        classroom_id: Uuid,
        actor: Uuid,
        instrument_id: Uuid,
        new_price_minor: i64,
    ) -> ResultEngine<PricePoint> {
        validate_price(new_price_minor)?;
        let point = with_tx!(self, |db_tx| {
            self.require_teacher(&db_tx, classroom_id, actor, "set prices")
                .await?;
            let model = self
                .require_instrument(&db_tx, classroom_id, instrument_id)
                .await?;

            let active = instruments::ActiveModel {
                id: ActiveValue::Set(model.id),
                price_minor: ActiveValue::Set(new_price_minor),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            let point = PricePoint::new(instrument_id, new_price_minor, Utc::now());
            price_history::ActiveModel::from(&point).insert(&db_tx).await?;
            Ok(point)
        })?;

        tracing::info!(%classroom_id, %instrument_id, price = new_price_minor, "price set");
        Ok(point)
    }

    /// Buys `quantity` units at the current price.
    pub async fn buy(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
        instrument_id: Uuid,
        quantity: i64,
    ) -> ResultEngine<Trade> {
        require_quantity(quantity)?;
        let trade = with_tx!(self, |db_tx| {
            let instrument = Instrument::try_from(
                self.require_instrument(&db_tx, classroom_id, instrument_id)
                    .await?,
            )?;
            let gross = checked_total(quantity, instrument.price_minor, "trade amount")?;
            let market = self
                .require_system_account(&db_tx, classroom_id, SystemAccountKind::Market)
                .await?;
            let market_id = parse_uuid(&market.id, "account")?;

            let posting = Posting::new(
                TransactionKind::StockBuy,
                account_id,
                market_id,
                gross,
                format!(
                    "Buy {quantity} {} @ {}",
                    instrument.name,
                    Money::new(instrument.price_minor)
                ),
            );
            let receipt = self
                .post_transfer(&db_tx, classroom_id, posting, Utc::now())
                .await?;

            let existing = self.load_holding(&db_tx, account_id, instrument_id).await?;
            let existed = existing.is_some();
            let mut holding = existing
                .unwrap_or_else(|| Holding::empty(account_id, instrument_id, classroom_id));
            holding.record_buy(quantity, instrument.price_minor)?;
            self.store_holding(&db_tx, &holding, existed).await?;

            Ok(Trade {
                instrument_id,
                quantity,
                price_minor: instrument.price_minor,
                gross_minor: gross,
                net_minor: gross,
                receipt,
                holding: Some(holding),
            })
        })?;

        tracing::info!(
            %classroom_id,
            %account_id,
            %instrument_id,
            quantity,
            amount = trade.gross_minor,
            "buy filled"
        );
        Ok(trade)
    }

    /// Sells `quantity` units at the current price, net of the volatility fee.
    ///
    /// Holdings are re-read inside the transaction; the holding is removed
    /// when it reaches zero.
    pub async fn sell(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
        instrument_id: Uuid,
        quantity: i64,
    ) -> ResultEngine<Trade> {
        require_quantity(quantity)?;
        let trade = with_tx!(self, |db_tx| {
            let instrument = Instrument::try_from(
                self.require_instrument(&db_tx, classroom_id, instrument_id)
                    .await?,
            )?;
            let mut holding = self
                .load_holding(&db_tx, account_id, instrument_id)
                .await?
                .ok_or_else(|| {
                    EngineError::InsufficientHoldings(format!(
                        "no {} units held",
                        instrument.name
                    ))
                })?;
            holding.record_sell(quantity)?;

            let gross = checked_total(quantity, instrument.price_minor, "trade amount")?;
            let net = sell_proceeds(gross, instrument.volatility_bp);
            if net <= 0 {
                return Err(EngineError::InvalidQuantity(
                    "sale proceeds round to zero".to_string(),
                ));
            }
            let now = Utc::now();

            let market = self
                .require_system_account(&db_tx, classroom_id, SystemAccountKind::Market)
                .await?;
            let market_id = parse_uuid(&market.id, "account")?;
            if market.balance < net {
                let treasury = self.require_treasury(&db_tx, classroom_id).await?;
                let shortfall = net - market.balance;
                let posting = Posting::new(
                    TransactionKind::StockSell,
                    parse_uuid(&treasury.id, "account")?,
                    market_id,
                    shortfall,
                    format!("Market liquidity for {}", instrument.name),
                );
                self.post_transfer(&db_tx, classroom_id, posting, now)
                    .await?;
                tracing::debug!(%classroom_id, shortfall, "market topped up from treasury");
            }

            let posting = Posting::new(
                TransactionKind::StockSell,
                market_id,
                account_id,
                net,
                format!(
                    "Sell {quantity} {} @ {}",
                    instrument.name,
                    Money::new(instrument.price_minor)
                ),
            );
            let receipt = self.post_transfer(&db_tx, classroom_id, posting, now).await?;
            self.store_holding(&db_tx, &holding, true).await?;

            Ok(Trade {
                instrument_id,
                quantity,
                price_minor: instrument.price_minor,
                gross_minor: gross,
                net_minor: net,
                receipt,
                holding: (!holding.is_empty()).then_some(holding),
            })
        })?;

        tracing::info!(
            %classroom_id,
            %account_id,
            %instrument_id,
            quantity,
            gross = trade.gross_minor,
            net = trade.net_minor,
            "sell filled"
        );
        Ok(trade)
    }

    pub async fn instrument(&self, classroom_id: Uuid, instrument_id: Uuid) -> ResultEngine<Instrument> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_instrument(&db_tx, classroom_id, instrument_id)
                .await?;
            Instrument::try_from(model)
        })
    }

    pub async fn instruments(&self, classroom_id: Uuid) -> ResultEngine<Vec<Instrument>> {
        with_tx!(self, |db_tx| {
            instruments::Entity::find()
                .filter(instruments::Column::ClassroomId.eq(classroom_id.to_string()))
                .order_by_asc(instruments::Column::Name)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Instrument::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Accounts holding the instrument, largest position first.
    pub async fn holders_of(
        &self,
        classroom_id: Uuid,
        instrument_id: Uuid,
    ) -> ResultEngine<Vec<Holding>> {
        with_tx!(self, |db_tx| {
            self.require_instrument(&db_tx, classroom_id, instrument_id)
                .await?;
            holdings::Entity::find()
                .filter(holdings::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(holdings::Column::InstrumentId.eq(instrument_id.to_string()))
                .filter(holdings::Column::Quantity.gt(0))
                .order_by_desc(holdings::Column::Quantity)
                .order_by_asc(holdings::Column::AccountId)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Holding::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Price changes of the instrument, oldest first.
    pub async fn history_of(
        &self,
        classroom_id: Uuid,
        instrument_id: Uuid,
    ) -> ResultEngine<Vec<PricePoint>> {
        with_tx!(self, |db_tx| {
            self.require_instrument(&db_tx, classroom_id, instrument_id)
                .await?;
            price_history::Entity::find()
                .filter(price_history::Column::InstrumentId.eq(instrument_id.to_string()))
                .order_by_asc(price_history::Column::RecordedAt)
                .order_by_asc(price_history::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(PricePoint::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Portfolio of an account, valued at current prices.
    pub async fn holdings_of(
        &self,
        classroom_id: Uuid,
        account_id: Uuid,
    ) -> ResultEngine<Vec<Position>> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, classroom_id, account_id)
                .await?;
            let rows = holdings::Entity::find()
                .filter(holdings::Column::ClassroomId.eq(classroom_id.to_string()))
                .filter(holdings::Column::AccountId.eq(account_id.to_string()))
                .filter(holdings::Column::Quantity.gt(0))
                .all(&db_tx)
                .await?;

            let mut positions = Vec::with_capacity(rows.len());
            for row in rows {
                let holding = Holding::try_from(row)?;
                let instrument = self
                    .require_instrument(&db_tx, classroom_id, holding.instrument_id)
                    .await?;
                let market_value_minor =
                    checked_total(holding.quantity, instrument.price_minor, "market value")?;
                positions.push(Position {
                    holding,
                    instrument_name: instrument.name,
                    price_minor: instrument.price_minor,
                    market_value_minor,
                });
            }
            positions.sort_by(|a, b| a.instrument_name.cmp(&b.instrument_name));
            tracing::debug!(%classroom_id, %account_id, positions = positions.len(), "holdings");
            Ok(positions)
        })
    }
}
