mod common;

use engine::{
    AccountRole, BurnCmd, EngineError, MintCmd, SalaryCmd, SystemAccountKind, TransactionKind,
    TransferCmd,
};
use uuid::Uuid;

use common::fixture;

#[tokio::test]
async fn new_classroom_provisions_treasury_and_system_accounts() {
    let fx = fixture().await;

    let treasury = fx.engine.treasury(fx.classroom).await.unwrap();
    assert_eq!(treasury.role, AccountRole::Teacher);
    assert_eq!(treasury.user_id.as_deref(), Some("ms-rossi"));

    for kind in SystemAccountKind::ALL {
        let account = fx.engine.system_account(fx.classroom, kind).await.unwrap();
        assert_eq!(account.role, AccountRole::System);
        assert_eq!(account.system_kind, Some(kind));
        assert_eq!(account.balance, 0);
    }

    // treasury + 3 system + banker, mart, alice, bob
    let accounts = fx.engine.accounts(fx.classroom).await.unwrap();
    assert_eq!(accounts.len(), 8);
}

#[tokio::test]
async fn transfer_moves_money_and_links_both_rows() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;

    let receipt = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.bob, 400).memo("lunch"))
        .await
        .unwrap();

    assert_eq!(fx.balance(fx.alice).await, 600);
    assert_eq!(fx.balance(fx.bob).await, 400);
    assert_eq!(receipt.debit.amount_minor, -400);
    assert_eq!(receipt.credit.amount_minor, 400);
    assert_eq!(receipt.debit.balance_after, 600);
    assert_eq!(receipt.credit.counterparty_account_id, Some(fx.alice));
    assert_eq!(receipt.debit.description, "lunch");

    let rows = fx
        .engine
        .transactions_for(fx.classroom, receipt.correlation_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.correlation_id == receipt.correlation_id));
    assert!(rows.iter().all(|r| r.kind == TransactionKind::Transfer));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn transfer_rejects_overdraft_and_leaves_state_unchanged() {
    let fx = fixture().await;
    fx.fund(fx.alice, 100).await;

    let err = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.bob, 101))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(fx.balance(fx.alice).await, 100);
    assert_eq!(fx.balance(fx.bob).await, 0);

    let page = fx.engine.history(fx.classroom, fx.bob, 10, None).await.unwrap();
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn transfer_validates_amount_and_accounts() {
    let fx = fixture().await;
    fx.fund(fx.alice, 100).await;

    let err = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.bob, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.alice, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.alice, Uuid::new_v4(), 10))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn accounts_of_another_classroom_do_not_resolve() {
    let fx = fixture().await;
    let other = fx.engine.new_classroom("5C", "mr-bianchi").await.unwrap();
    let carol = fx
        .engine
        .open_account(other.id, "carol", "Carol", AccountRole::Student)
        .await
        .unwrap();
    fx.fund(fx.alice, 100).await;

    let err = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.alice, carol.id, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = fx.engine.balance(other.id, fx.alice).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn idempotency_key_replays_the_original_transfer() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;

    let cmd = TransferCmd::new(fx.classroom, fx.alice, fx.bob, 250).idempotency_key("req-1");
    let first = fx.engine.transfer(cmd.clone()).await.unwrap();
    let second = fx.engine.transfer(cmd).await.unwrap();

    assert_eq!(first.correlation_id, second.correlation_id);
    assert_eq!(fx.balance(fx.alice).await, 750);
    assert_eq!(fx.balance(fx.bob).await, 250);

    let err = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.bob, 300).idempotency_key("req-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    assert_eq!(fx.balance(fx.alice).await, 750);
}

#[tokio::test]
async fn mint_and_burn_require_banker_or_teacher() {
    let fx = fixture().await;

    let err = fx
        .engine
        .mint(MintCmd::new(fx.classroom, fx.alice, fx.alice, 100))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    fx.engine
        .mint(MintCmd::new(fx.classroom, fx.teacher, fx.alice, 100))
        .await
        .unwrap();
    let tx = fx
        .engine
        .burn(BurnCmd::new(fx.classroom, fx.banker, fx.alice, 40).memo("withdrawal"))
        .await
        .unwrap();
    assert_eq!(tx.kind, TransactionKind::Withdrawal);
    assert_eq!(tx.amount_minor, -40);
    assert_eq!(tx.balance_after, 60);

    let err = fx
        .engine
        .burn(BurnCmd::new(fx.classroom, fx.banker, fx.alice, 61))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(fx.engine.total_balance(fx.classroom).await.unwrap(), 60);
}

#[tokio::test]
async fn salary_is_all_or_nothing() {
    let fx = fixture().await;
    fx.fund(fx.teacher, 500).await;

    let err = fx
        .engine
        .pay_salary(
            SalaryCmd::new(fx.classroom, fx.teacher)
                .payee(fx.alice, 300)
                .payee(fx.bob, 300),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(fx.balance(fx.alice).await, 0);
    assert_eq!(fx.balance(fx.teacher).await, 500);

    let receipts = fx
        .engine
        .pay_salary(
            SalaryCmd::new(fx.classroom, fx.teacher)
                .payee(fx.alice, 200)
                .payee(fx.bob, 300),
        )
        .await
        .unwrap();
    assert_eq!(receipts.len(), 2);
    assert_ne!(receipts[0].correlation_id, receipts[1].correlation_id);
    assert_eq!(fx.balance(fx.teacher).await, 0);

    let err = fx
        .engine
        .pay_salary(SalaryCmd::new(fx.classroom, fx.banker).payee(fx.alice, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = fx
        .engine
        .pay_salary(SalaryCmd::new(fx.classroom, fx.teacher))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyRecipientSet(_)));
}

#[tokio::test]
async fn mart_purchase_only_pays_marts() {
    let fx = fixture().await;
    fx.fund(fx.alice, 100).await;

    let receipt = fx
        .engine
        .mart_purchase(fx.classroom, fx.alice, fx.mart, 30, Some("pencils"))
        .await
        .unwrap();
    assert_eq!(receipt.credit.kind, TransactionKind::MartSettlement);
    assert_eq!(fx.balance(fx.mart).await, 30);

    let err = fx
        .engine
        .mart_purchase(fx.classroom, fx.alice, fx.bob, 30, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn history_pages_newest_first() {
    let fx = fixture().await;
    fx.fund(fx.alice, 1000).await;
    for amount in 1..=5 {
        fx.engine
            .transfer(TransferCmd::new(fx.classroom, fx.alice, fx.bob, amount))
            .await
            .unwrap();
    }

    let first = fx.engine.history(fx.classroom, fx.bob, 3, None).await.unwrap();
    let amounts: Vec<i64> = first.items.iter().map(|t| t.amount_minor).collect();
    assert_eq!(amounts, vec![5, 4, 3]);

    let cursor = first.next_cursor.expect("more rows");
    let second = fx
        .engine
        .history(fx.classroom, fx.bob, 3, Some(&cursor))
        .await
        .unwrap();
    let amounts: Vec<i64> = second.items.iter().map(|t| t.amount_minor).collect();
    assert_eq!(amounts, vec![2, 1]);
    assert!(second.next_cursor.is_none());

    let err = fx
        .engine
        .history(fx.classroom, fx.bob, 3, Some("not a cursor"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidId(_)));

    let err = fx
        .engine
        .history(fx.classroom, fx.bob, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn archived_accounts_cannot_move_money() {
    let fx = fixture().await;
    fx.fund(fx.bob, 10).await;

    let err = fx
        .engine
        .archive_account(fx.classroom, fx.teacher, fx.bob)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    fx.engine
        .archive_account(fx.classroom, fx.teacher, fx.alice)
        .await
        .unwrap();
    let err = fx
        .engine
        .transfer(TransferCmd::new(fx.classroom, fx.bob, fx.alice, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert!(fx.engine.account(fx.classroom, fx.alice).await.unwrap().archived);

    let err = fx
        .engine
        .archive_account(fx.classroom, fx.teacher, fx.teacher)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn one_account_per_user_and_no_privileged_roles() {
    let fx = fixture().await;

    let err = fx
        .engine
        .open_account(fx.classroom, "alice", "Alice again", AccountRole::Student)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let err = fx
        .engine
        .open_account(fx.classroom, "eve", "Eve", AccountRole::Teacher)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let alice = fx
        .engine
        .account_for_user(fx.classroom, "alice")
        .await
        .unwrap();
    assert_eq!(alice.id, fx.alice);
}
