mod common;

use engine::{
    EngineError, NewInstrumentCmd, SystemAccountKind, TransactionKind, TransferCmd, sell_proceeds,
};

use common::fixture;

#[tokio::test]
async fn transfer_buy_sell_scenario() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;
    let instrument = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "ACME", 100, 200))
        .await
        .unwrap();

    let receipt = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.bob, 400))
        .await
        .unwrap();
    assert_eq!(fx.balance(fx.alice).await, 600);
    assert_eq!(fx.balance(fx.bob).await, 400);
    assert_eq!(receipt.debit.correlation_id, receipt.credit.correlation_id);

    let bought = fx
        .engine
        .buy(fx.classroom, fx.alice, instrument.id, 3)
        .await
        .unwrap();
    assert_eq!(bought.gross_minor, 300);
    assert_eq!(bought.receipt.debit.kind, TransactionKind::StockBuy);
    let holding = bought.holding.unwrap();
    assert_eq!(holding.quantity, 3);
    assert_eq!(holding.avg_price_minor(), 100);
    assert_eq!(fx.balance(fx.alice).await, 300);

    let sold = fx
        .engine
        .sell(fx.classroom, fx.alice, instrument.id, 3)
        .await
        .unwrap();
    assert_eq!(sold.gross_minor, 300);
    assert_eq!(sold.net_minor, 250);
    assert!(sold.holding.is_none());
    assert_eq!(fx.balance(fx.alice).await, 550);

    let holders = fx
        .engine
        .holders_of(fx.classroom, instrument.id)
        .await
        .unwrap();
    assert!(holders.is_empty());

    // the fee stays with the market account
    let market = fx
        .engine
        .system_account(fx.classroom, SystemAccountKind::Market)
        .await
        .unwrap();
    assert_eq!(market.balance, 50);
    assert_eq!(fx.engine.total_balance(fx.classroom).await.unwrap(), 1000);
    fx.assert_consistent().await;
}

#[tokio::test]
async fn average_price_is_volume_weighted_and_unchanged_by_sells() {
    let fx = fixture().await;
    fx.fund(fx.alice, 10_000).await;
    let instrument = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "ACME", 100, 100))
        .await
        .unwrap();

    fx.engine
        .buy(fx.classroom, fx.alice, instrument.id, 2)
        .await
        .unwrap();
    fx.engine
        .set_price(fx.classroom, fx.teacher, instrument.id, 130)
        .await
        .unwrap();
    let trade = fx
        .engine
        .buy(fx.classroom, fx.alice, instrument.id, 1)
        .await
        .unwrap();
    // (2×100 + 1×130) / 3 = 110
    assert_eq!(trade.holding.unwrap().avg_price_minor(), 110);

    let trade = fx
        .engine
        .sell(fx.classroom, fx.alice, instrument.id, 1)
        .await
        .unwrap();
    let holding = trade.holding.unwrap();
    assert_eq!(holding.quantity, 2);
    assert_eq!(holding.avg_price_minor(), 110);

    let positions = fx
        .engine
        .holdings_of(fx.classroom, fx.alice)
        .await
        .unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].market_value_minor, 260);
}

#[tokio::test]
async fn sell_rechecks_holdings() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;
    let instrument = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "ACME", 100, 200))
        .await
        .unwrap();

    let err = fx
        .engine
        .sell(fx.classroom, fx.alice, instrument.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientHoldings(_)));

    fx.engine
        .buy(fx.classroom, fx.alice, instrument.id, 2)
        .await
        .unwrap();
    let err = fx
        .engine
        .sell(fx.classroom, fx.alice, instrument.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientHoldings(_)));

    let err = fx
        .engine
        .buy(fx.classroom, fx.alice, instrument.id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuantity(_)));

    let err = fx
        .engine
        .buy(fx.classroom, fx.alice, instrument.id, 9)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(fx.balance(fx.alice).await, 800);
}

#[tokio::test]
async fn price_rise_shortfall_is_drawn_from_treasury() {
    let fx = fixture().await;
    fx.fund(fx.alice, 100).await;
    fx.fund(fx.teacher, 1000).await;
    let instrument = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "ACME", 100, 100))
        .await
        .unwrap();

    fx.engine
        .buy(fx.classroom, fx.alice, instrument.id, 1)
        .await
        .unwrap();
    fx.engine
        .set_price(fx.classroom, fx.teacher, instrument.id, 300)
        .await
        .unwrap();
    let trade = fx
        .engine
        .sell(fx.classroom, fx.alice, instrument.id, 1)
        .await
        .unwrap();

    let expected = sell_proceeds(300, 100);
    assert_eq!(trade.net_minor, expected);
    assert_eq!(fx.balance(fx.alice).await, expected);
    assert_eq!(fx.balance(fx.teacher).await, 1000 - (expected - 100));
    assert_eq!(fx.engine.total_balance(fx.classroom).await.unwrap(), 1100);
    fx.assert_consistent().await;
}

#[tokio::test]
async fn higher_volatility_pays_less() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;
    fx.fund(fx.bob, 1000).await;
    let calm = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "CALM", 100, 100))
        .await
        .unwrap();
    let wild = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "WILD", 100, 5000))
        .await
        .unwrap();

    fx.engine.buy(fx.classroom, fx.alice, calm.id, 5).await.unwrap();
    fx.engine.buy(fx.classroom, fx.bob, wild.id, 5).await.unwrap();
    let calm_sale = fx.engine.sell(fx.classroom, fx.alice, calm.id, 5).await.unwrap();
    let wild_sale = fx.engine.sell(fx.classroom, fx.bob, wild.id, 5).await.unwrap();

    assert!(wild_sale.net_minor < calm_sale.net_minor);
}

#[tokio::test]
async fn only_the_teacher_manages_instruments() {
    let fx = fixture().await;

    let err = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.banker, "ACME", 100, 200))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let instrument = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "ACME", 100, 200))
        .await
        .unwrap();
    let err = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "ACME", 50, 200))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let err = fx
        .engine
        .set_price(fx.classroom, fx.alice, instrument.id, 120)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = fx
        .engine
        .set_price(fx.classroom, fx.teacher, instrument.id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPrice(_)));

    fx.engine
        .set_price(fx.classroom, fx.teacher, instrument.id, 120)
        .await
        .unwrap();
    let history = fx
        .engine
        .history_of(fx.classroom, instrument.id)
        .await
        .unwrap();
    let prices: Vec<i64> = history.iter().map(|p| p.price_minor).collect();
    assert_eq!(prices, vec![100, 120]);
}

#[tokio::test]
async fn accounts_holding_shares_cannot_be_archived() {
    let fx = fixture().await;
    fx.fund(fx.alice, 300).await;
    let instrument = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "ACME", 100, 200))
        .await
        .unwrap();
    fx.engine
        .buy(fx.classroom, fx.alice, instrument.id, 3)
        .await
        .unwrap();
    assert_eq!(fx.balance(fx.alice).await, 0);

    let err = fx
        .engine
        .archive_account(fx.classroom, fx.teacher, fx.alice)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    // the shares can still be sold
    fx.engine
        .sell(fx.classroom, fx.alice, instrument.id, 3)
        .await
        .unwrap();
    assert!(!fx.engine.account(fx.classroom, fx.alice).await.unwrap().archived);
}
