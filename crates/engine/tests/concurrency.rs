mod common;

use engine::{EngineError, NewInstrumentCmd, ResultEngine, TransferCmd};

use common::file_fixture;

/// Counts successes; any failure must be one the caller may retry.
fn tally<T>(results: impl IntoIterator<Item = ResultEngine<T>>) -> usize {
    let mut ok = 0;
    for result in results {
        match result {
            Ok(_) => ok += 1,
            Err(err) => assert!(
                err.is_retryable() || matches!(err, EngineError::InsufficientFunds(_)),
                "unexpected error: {err:?}"
            ),
        }
    }
    ok
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_transfers_never_lose_money() {
    let (fx, _dir) = file_fixture().await;
    fx.fund(fx.alice, 1_000).await;
    fx.fund(fx.bob, 1_000).await;
    let total = fx.engine.total_balance(fx.classroom).await.unwrap();

    let a_to_b = |amount| {
        fx.engine
            .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.bob, amount))
    };
    let b_to_a = |amount| {
        fx.engine
            .transfer(TransferCmd::new(fx.classroom, fx.bob, fx.alice, amount))
    };
    let (r1, r2, r3, r4, r5, r6) = tokio::join!(
        a_to_b(10),
        b_to_a(20),
        a_to_b(30),
        b_to_a(40),
        a_to_b(50),
        b_to_a(60),
    );
    let forward: i64 = [(&r1, 10_i64), (&r3, 30), (&r5, 50)]
        .iter()
        .filter(|(result, _)| result.is_ok())
        .map(|(_, amount)| amount)
        .sum();
    let back: i64 = [(&r2, 20_i64), (&r4, 40), (&r6, 60)]
        .iter()
        .filter(|(result, _)| result.is_ok())
        .map(|(_, amount)| amount)
        .sum();
    let moved = forward - back;
    assert!(tally([r1, r2, r3, r4, r5, r6]) >= 1);

    assert_eq!(fx.balance(fx.alice).await, 1_000 - moved);
    assert_eq!(fx.balance(fx.bob).await, 1_000 + moved);
    assert_eq!(fx.engine.total_balance(fx.classroom).await.unwrap(), total);
    fx.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_sells_cannot_oversell_a_holding() {
    let (fx, _dir) = file_fixture().await;
    fx.fund(fx.alice, 1_000).await;
    let instrument = fx
        .engine
        .create_instrument(NewInstrumentCmd::new(fx.classroom, fx.teacher, "ACME", 100, 200))
        .await
        .unwrap();
    fx.engine
        .buy(fx.classroom, fx.alice, instrument.id, 3)
        .await
        .unwrap();
    let total = fx.engine.total_balance(fx.classroom).await.unwrap();

    let (first, second) = tokio::join!(
        fx.engine.sell(fx.classroom, fx.alice, instrument.id, 2),
        fx.engine.sell(fx.classroom, fx.alice, instrument.id, 2),
    );
    let sold = [&first, &second].iter().filter(|r| r.is_ok()).count() as i64;
    for result in [&first, &second] {
        if let Err(err) = result {
            assert!(
                err.is_retryable() || matches!(err, EngineError::InsufficientHoldings(_)),
                "unexpected error: {err:?}"
            );
        }
    }
    assert!(sold <= 1);

    let holders = fx
        .engine
        .holders_of(fx.classroom, instrument.id)
        .await
        .unwrap();
    let remaining = holders.first().map_or(0, |h| h.quantity);
    assert_eq!(remaining, 3 - 2 * sold);
    assert_eq!(fx.engine.total_balance(fx.classroom).await.unwrap(), total);
    fx.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payers_keep_the_ledger_consistent() {
    let (fx, _dir) = file_fixture().await;
    fx.fund(fx.alice, 300).await;
    fx.fund(fx.bob, 300).await;
    let total = fx.engine.total_balance(fx.classroom).await.unwrap();

    let (r1, r2, r3, r4) = tokio::join!(
        fx.engine
            .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.mart, 200)),
        fx.engine
            .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.mart, 200)),
        fx.engine
            .transfer(TransferCmd::new(fx.classroom, fx.bob, fx.mart, 200)),
        fx.engine
            .transfer(TransferCmd::new(fx.classroom, fx.bob, fx.alice, 200)),
    );
    assert!(tally([r1, r2, r3, r4]) >= 1);

    for account in fx.engine.accounts(fx.classroom).await.unwrap() {
        assert!(account.balance >= 0, "{} went negative", account.name);
    }
    assert_eq!(fx.engine.total_balance(fx.classroom).await.unwrap(), total);
    fx.assert_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn archive_racing_a_credit_never_strands_money() {
    let (fx, _dir) = file_fixture().await;
    fx.fund(fx.alice, 100).await;

    let (archived, credited) = tokio::join!(
        fx.engine.archive_account(fx.classroom, fx.teacher, fx.bob),
        fx.engine
            .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.bob, 50)),
    );
    assert!(!(archived.is_ok() && credited.is_ok()));
    if let Err(err) = &archived {
        assert!(
            err.is_retryable() || matches!(err, EngineError::InvalidAmount(_)),
            "unexpected error: {err:?}"
        );
    }
    if let Err(err) = &credited {
        assert!(
            err.is_retryable() || matches!(err, EngineError::Forbidden(_)),
            "unexpected error: {err:?}"
        );
    }

    let bob = fx.engine.account(fx.classroom, fx.bob).await.unwrap();
    if bob.archived {
        assert_eq!(bob.balance, 0);
    }
    fx.assert_consistent().await;
}
