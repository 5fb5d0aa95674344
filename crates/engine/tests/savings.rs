mod common;

use chrono::{Duration, Utc};
use engine::{EngineError, NewSavingsProductCmd, Rate, SystemAccountKind, TransactionKind};

use common::{Fixture, fixture};

async fn product(fx: &Fixture) -> engine::SavingsProduct {
    fx.engine
        .create_savings_product(
            NewSavingsProductCmd::new(
                fx.classroom,
                fx.teacher,
                "Monthly",
                30,
                Rate::from_bp(500),
                5_000,
            )
            .cancellation_rate(Rate::from_bp(-200)),
        )
        .await
        .unwrap()
}

async fn escrow_balance(fx: &Fixture) -> i64 {
    fx.engine
        .system_account(fx.classroom, SystemAccountKind::SavingsEscrow)
        .await
        .unwrap()
        .balance
}

#[tokio::test]
async fn cancel_refunds_principal_with_cancellation_rate() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;
    let product = product(&fx).await;

    let subscription = fx
        .engine
        .join_savings(fx.classroom, fx.alice, product.id, 1000)
        .await
        .unwrap();
    assert_eq!(fx.balance(fx.alice).await, 0);
    assert_eq!(escrow_balance(&fx).await, 1000);
    assert_eq!(
        subscription.matures_at - subscription.joined_at,
        Duration::days(30)
    );

    let positions = fx.engine.savings_of(fx.classroom, fx.alice).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].maturity_payout_minor, 1050);
    assert_eq!(positions[0].cancellation_refund_minor, 980);
    assert_eq!(
        positions[0].earliest_cancel_at - positions[0].subscription.joined_at,
        Duration::days(20)
    );

    let settlement = fx
        .engine
        .cancel_savings(fx.classroom, fx.alice, subscription.id)
        .await
        .unwrap();
    assert_eq!(settlement.payout_minor, 980);
    assert!(
        settlement
            .receipts
            .iter()
            .all(|r| r.credit.kind == TransactionKind::SavingsCancel)
    );
    assert_eq!(fx.balance(fx.alice).await, 980);
    assert_eq!(fx.balance(fx.teacher).await, 20);
    assert_eq!(escrow_balance(&fx).await, 0);
    assert!(fx.engine.savings_of(fx.classroom, fx.alice).await.unwrap().is_empty());

    let err = fx
        .engine
        .cancel_savings(fx.classroom, fx.alice, subscription.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn maturity_pays_interest_from_treasury_once() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;
    fx.fund(fx.teacher, 100).await;
    let product = product(&fx).await;
    fx.engine
        .join_savings(fx.classroom, fx.alice, product.id, 1000)
        .await
        .unwrap();

    let early = fx.engine.run_sweeps(Utc::now()).await.unwrap();
    assert_eq!(early.savings_matured, 0);

    let later = Utc::now() + Duration::days(31);
    let report = fx.engine.run_sweeps(later).await.unwrap();
    assert_eq!(report.savings_matured, 1);
    assert!(report.is_clean());
    assert_eq!(fx.balance(fx.alice).await, 1050);
    assert_eq!(fx.balance(fx.teacher).await, 50);
    assert_eq!(escrow_balance(&fx).await, 0);

    let again = fx.engine.run_sweeps(later).await.unwrap();
    assert_eq!(again.savings_matured, 0);
    assert_eq!(fx.balance(fx.alice).await, 1050);
    fx.assert_consistent().await;
}

#[tokio::test]
async fn unfunded_interest_is_retried_on_the_next_sweep() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;
    let product = product(&fx).await;
    fx.engine
        .join_savings(fx.classroom, fx.alice, product.id, 1000)
        .await
        .unwrap();

    let later = Utc::now() + Duration::days(31);
    let report = fx.engine.run_sweeps(later).await.unwrap();
    assert_eq!(report.savings_matured, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].subject, "savings");
    assert!(matches!(
        report.failures[0].error,
        EngineError::InsufficientFunds(_)
    ));
    assert_eq!(escrow_balance(&fx).await, 1000);

    fx.fund(fx.teacher, 50).await;
    let report = fx.engine.run_sweeps(later).await.unwrap();
    assert_eq!(report.savings_matured, 1);
    assert_eq!(fx.balance(fx.alice).await, 1050);
}

#[tokio::test]
async fn join_checks_amount_and_ownership() {
    let fx = fixture().await;
    fx.fund(fx.alice, 10_000).await;
    let product = product(&fx).await;

    let err = fx
        .engine
        .join_savings(fx.classroom, fx.alice, product.id, 5_001)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExceedsMaxAmount(_)));

    let err = fx
        .engine
        .join_savings(fx.classroom, fx.alice, product.id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = fx
        .engine
        .join_savings(fx.classroom, fx.bob, product.id, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    let subscription = fx
        .engine
        .join_savings(fx.classroom, fx.alice, product.id, 5_000)
        .await
        .unwrap();
    let err = fx
        .engine
        .cancel_savings(fx.classroom, fx.bob, subscription.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotOwner(_)));
}

#[tokio::test]
async fn accounts_with_open_savings_cannot_be_archived() {
    let fx = fixture().await;
    fx.fund(fx.bob, 100).await;
    let product = product(&fx).await;
    fx.engine
        .join_savings(fx.classroom, fx.bob, product.id, 100)
        .await
        .unwrap();
    assert_eq!(fx.balance(fx.bob).await, 0);

    let err = fx
        .engine
        .archive_account(fx.classroom, fx.teacher, fx.bob)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn products_are_teacher_only_and_validated() {
    let fx = fixture().await;

    let err = fx
        .engine
        .create_savings_product(NewSavingsProductCmd::new(
            fx.classroom,
            fx.banker,
            "Weekly",
            7,
            Rate::from_bp(100),
            1_000,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = fx
        .engine
        .create_savings_product(
            NewSavingsProductCmd::new(
                fx.classroom,
                fx.teacher,
                "Weekly",
                7,
                Rate::from_bp(100),
                1_000,
            )
            .cancellation_rate(Rate::from_bp(200)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRate(_)));

    product(&fx).await;
    let products = fx.engine.savings_products(fx.classroom).await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].rate, Rate::from_bp(500));
}

#[tokio::test]
async fn treasury_and_system_accounts_cannot_save() {
    let fx = fixture().await;
    fx.fund(fx.teacher, 1000).await;
    let product = product(&fx).await;

    let err = fx
        .engine
        .join_savings(fx.classroom, fx.teacher, product.id, 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert_eq!(fx.balance(fx.teacher).await, 1000);

    let market = fx
        .engine
        .system_account(fx.classroom, SystemAccountKind::Market)
        .await
        .unwrap();
    let err = fx
        .engine
        .join_savings(fx.classroom, market.id, product.id, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    // nothing is left in escrow for a sweep to trip over
    let report = fx
        .engine
        .run_sweeps(Utc::now() + Duration::days(31))
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(escrow_balance(&fx).await, 0);
}

#[tokio::test]
async fn savings_terms_are_bounded() {
    let fx = fixture().await;

    let err = fx
        .engine
        .create_savings_product(NewSavingsProductCmd::new(
            fx.classroom,
            fx.teacher,
            "Forever",
            200_000_000,
            Rate::from_bp(100),
            1_000,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let longest = fx
        .engine
        .create_savings_product(NewSavingsProductCmd::new(
            fx.classroom,
            fx.teacher,
            "Century",
            engine::MAX_MATURITY_DAYS,
            Rate::from_bp(100),
            1_000,
        ))
        .await
        .unwrap();
    fx.fund(fx.alice, 100).await;
    let subscription = fx
        .engine
        .join_savings(fx.classroom, fx.alice, longest.id, 100)
        .await
        .unwrap();
    assert_eq!(
        subscription.matures_at - subscription.joined_at,
        Duration::days(i64::from(engine::MAX_MATURITY_DAYS))
    );
}
