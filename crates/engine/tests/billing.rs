mod common;

use chrono::{Duration, Utc};
use engine::{EngineError, IssueBillCmd, TransactionKind};

use common::fixture;

#[tokio::test]
async fn bill_is_paid_exactly_once() {
    let fx = fixture().await;
    fx.fund(fx.alice, 500).await;
    let bill = fx
        .engine
        .issue_bill(
            IssueBillCmd::new(fx.classroom, fx.teacher, "Rent", 200, Utc::now() + Duration::days(7))
                .recipients([fx.alice, fx.bob, fx.alice]),
        )
        .await
        .unwrap();

    let recipients = fx.engine.recipients_of(fx.classroom, bill.id).await.unwrap();
    assert_eq!(recipients.len(), 2);
    assert!(recipients.iter().all(|r| !r.paid));

    let receipt = fx
        .engine
        .pay_bill(fx.classroom, fx.alice, bill.id)
        .await
        .unwrap();
    assert_eq!(receipt.debit.kind, TransactionKind::Tax);
    assert_eq!(receipt.credit.account_id, fx.teacher);
    assert_eq!(fx.balance(fx.alice).await, 300);
    assert_eq!(fx.balance(fx.teacher).await, 200);

    let err = fx
        .engine
        .pay_bill(fx.classroom, fx.alice, bill.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyPaid(_)));
    assert_eq!(fx.balance(fx.alice).await, 300);

    let recipients = fx.engine.recipients_of(fx.classroom, bill.id).await.unwrap();
    let alice = recipients.iter().find(|r| r.account_id == fx.alice).unwrap();
    assert!(alice.paid);
    assert!(alice.paid_at.is_some());
    fx.assert_consistent().await;
}

#[tokio::test]
async fn only_recipients_with_funds_can_pay() {
    let fx = fixture().await;
    let bill = fx
        .engine
        .issue_bill(
            IssueBillCmd::new(fx.classroom, fx.teacher, "Rent", 200, Utc::now())
                .recipient(fx.bob),
        )
        .await
        .unwrap();

    let err = fx
        .engine
        .pay_bill(fx.classroom, fx.alice, bill.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotARecipient(_)));

    let err = fx
        .engine
        .pay_bill(fx.classroom, fx.bob, bill.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    let unpaid = fx.engine.unpaid_for(fx.classroom, fx.bob).await.unwrap();
    assert_eq!(unpaid.len(), 1);
}

#[tokio::test]
async fn unpaid_bills_are_listed_by_due_date() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;
    let now = Utc::now();
    let late = fx
        .engine
        .issue_bill(
            IssueBillCmd::new(fx.classroom, fx.teacher, "Water", 10, now + Duration::days(9))
                .recipient(fx.alice),
        )
        .await
        .unwrap();
    let soon = fx
        .engine
        .issue_bill(
            IssueBillCmd::new(fx.classroom, fx.teacher, "Power", 20, now + Duration::days(2))
                .recipient(fx.alice),
        )
        .await
        .unwrap();

    let unpaid = fx.engine.unpaid_for(fx.classroom, fx.alice).await.unwrap();
    let ids: Vec<_> = unpaid.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![soon.id, late.id]);

    fx.engine
        .pay_bill(fx.classroom, fx.alice, soon.id)
        .await
        .unwrap();
    let unpaid = fx.engine.unpaid_for(fx.classroom, fx.alice).await.unwrap();
    assert_eq!(unpaid.len(), 1);
    assert_eq!(unpaid[0].id, late.id);
    assert_eq!(fx.engine.bills(fx.classroom).await.unwrap().len(), 2);
}

#[tokio::test]
async fn issuing_requires_teacher_and_recipients() {
    let fx = fixture().await;

    let err = fx
        .engine
        .issue_bill(IssueBillCmd::new(fx.classroom, fx.teacher, "Rent", 200, Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyRecipientSet(_)));

    let err = fx
        .engine
        .issue_bill(
            IssueBillCmd::new(fx.classroom, fx.banker, "Rent", 200, Utc::now())
                .recipient(fx.alice),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = fx
        .engine
        .issue_bill(
            IssueBillCmd::new(fx.classroom, fx.teacher, "Rent", 200, Utc::now())
                .recipient(fx.teacher),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = fx
        .engine
        .issue_bill(
            IssueBillCmd::new(fx.classroom, fx.teacher, "Rent", 0, Utc::now())
                .recipient(fx.alice),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}
