//! Integration tests for the ledger, transfers, savings and ATM operations

use corebank::{EngineError, Timeframe};
use rust_decimal_macros::dec;
use uuid::Uuid;

mod common;

#[tokio::test]
async fn test_balance_is_opening_balance_plus_ledger() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let alice = bank.customer_checking(dec!(1000.00)).await;
    let bob = bank.customer_checking(dec!(0.00)).await;

    bank.transfers.transfer(dec!(100.00), alice, bob).await.unwrap();
    bank.transfers.transfer(dec!(50.00), bob, alice).await.unwrap();

    assert_eq!(bank.balances.balance(alice).await.unwrap(), dec!(950.00));
    assert_eq!(bank.balances.balance(bob).await.unwrap(), dec!(50.00));
}

#[tokio::test]
async fn test_transfer_validation_failures() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let alice = bank.customer_checking(dec!(100.00)).await;
    let bob = bank.customer_checking(dec!(0.00)).await;
    let ghost = Uuid::new_v4();

    let err = bank.transfers.transfer(dec!(10.00), ghost, bob).await.unwrap_err();
    assert!(matches!(err, EngineError::AccountNotFound(id) if id == ghost));

    let err = bank.transfers.transfer(dec!(10.00), alice, ghost).await.unwrap_err();
    assert!(matches!(err, EngineError::AccountNotFound(id) if id == ghost));

    let err = bank.transfers.transfer(dec!(0.00), alice, bob).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = bank.transfers.transfer(dec!(-5.00), alice, bob).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    // Nothing was recorded by the failed attempts
    assert_eq!(bank.balances.balance(alice).await.unwrap(), dec!(100.00));
    assert!(bank.ledger.history(alice, Timeframe::AllTime).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transfer_overdraft_boundary() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let alice = bank.customer_checking(dec!(100.00)).await;
    let bob = bank.customer_checking(dec!(0.00)).await;

    // balance - amount + limit == 0 passes exactly
    bank.transfers.transfer(dec!(1100.00), alice, bob).await.unwrap();
    assert_eq!(bank.balances.balance(alice).await.unwrap(), dec!(-1000.00));

    // One cent further fails
    let err = bank.transfers.transfer(dec!(0.01), alice, bob).await.unwrap_err();
    assert!(matches!(err, EngineError::OverdraftExceeded { .. }));
    assert_eq!(bank.balances.balance(alice).await.unwrap(), dec!(-1000.00));
}

#[tokio::test]
async fn test_validate_transfer_records_nothing() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let alice = bank.customer_checking(dec!(500.00)).await;
    let bob = bank.customer_checking(dec!(0.00)).await;

    bank.transfers.validate_transfer(dec!(100.00), alice, bob).await.unwrap();

    assert!(bank.ledger.history(alice, Timeframe::AllTime).await.unwrap().is_empty());
    assert_eq!(bank.balances.balance(alice).await.unwrap(), dec!(500.00));
}

#[tokio::test]
async fn test_history_newest_first_and_timeframe_bound() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let alice = bank.customer_checking(dec!(1000.00)).await;
    let bob = bank.customer_checking(dec!(0.00)).await;

    let first = bank.transfers.transfer(dec!(10.00), alice, bob).await.unwrap();
    let second = bank.transfers.transfer(dec!(20.00), alice, bob).await.unwrap();

    let history = bank.ledger.history(alice, Timeframe::AllTime).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].transaction_id, second.transaction_id);
    assert_eq!(history[1].transaction_id, first.transaction_id);

    // Both entries are recent, so the bounded timeframes see them too
    let recent = bank.ledger.history(alice, Timeframe::Days30).await.unwrap();
    assert_eq!(recent.len(), 2);
}

#[tokio::test]
async fn test_totals_by_side() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let alice = bank.customer_checking(dec!(1000.00)).await;
    let bob = bank.customer_checking(dec!(0.00)).await;

    bank.transfers.transfer(dec!(100.00), alice, bob).await.unwrap();
    bank.transfers.transfer(dec!(25.50), alice, bob).await.unwrap();
    bank.transfers.transfer(dec!(40.00), bob, alice).await.unwrap();

    let totals = bank.balances.totals(alice, Timeframe::AllTime).await.unwrap();
    assert_eq!(totals.total_sent, dec!(125.50));
    assert_eq!(totals.total_received, dec!(40.00));
}

#[tokio::test]
async fn test_savings_deposit_and_withdraw() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let owner = Uuid::new_v4();
    let checking = bank
        .registry
        .create_checking(Some(owner), dec!(1000.00), "1234", true)
        .await
        .unwrap()
        .account_id;
    let savings = bank
        .registry
        .create_savings(Some(owner), dec!(0.00), checking)
        .await
        .unwrap()
        .account_id;

    bank.accounts.deposit_savings(savings, dec!(300.00)).await.unwrap();
    assert_eq!(bank.balances.balance(checking).await.unwrap(), dec!(700.00));
    assert_eq!(bank.balances.balance(savings).await.unwrap(), dec!(300.00));

    bank.accounts.withdraw_savings(savings, dec!(120.00)).await.unwrap();
    assert_eq!(bank.balances.balance(checking).await.unwrap(), dec!(820.00));
    assert_eq!(bank.balances.balance(savings).await.unwrap(), dec!(180.00));
}

#[tokio::test]
async fn test_savings_withdrawal_cannot_overdraw() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let owner = Uuid::new_v4();
    let checking = bank
        .registry
        .create_checking(Some(owner), dec!(1000.00), "1234", true)
        .await
        .unwrap()
        .account_id;
    let savings = bank
        .registry
        .create_savings(Some(owner), dec!(100.00), checking)
        .await
        .unwrap()
        .account_id;

    // Savings never borrow: one cent over the balance fails, and the
    // failure leaves the ledger untouched
    let err = bank.accounts.withdraw_savings(savings, dec!(100.01)).await.unwrap_err();
    let EngineError::WithdrawalFailed(cause) = err else {
        panic!("expected WithdrawalFailed, got {err:?}");
    };
    assert!(matches!(*cause, EngineError::InsufficientFunds { .. }));

    assert_eq!(bank.balances.balance(savings).await.unwrap(), dec!(100.00));
    assert!(bank.ledger.history(savings, Timeframe::AllTime).await.unwrap().is_empty());

    // The full balance passes
    bank.accounts.withdraw_savings(savings, dec!(100.00)).await.unwrap();
    assert_eq!(bank.balances.balance(savings).await.unwrap(), dec!(0.00));
}

#[tokio::test]
async fn test_savings_deposit_validation() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let owner = Uuid::new_v4();
    let checking = bank
        .registry
        .create_checking(Some(owner), dec!(50.00), "1234", true)
        .await
        .unwrap()
        .account_id;
    let savings = bank
        .registry
        .create_savings(Some(owner), dec!(0.00), checking)
        .await
        .unwrap()
        .account_id;

    let err = bank.accounts.deposit_savings(savings, dec!(0.00)).await.unwrap_err();
    let EngineError::DepositFailed(cause) = err else {
        panic!("expected DepositFailed, got {err:?}");
    };
    assert!(matches!(*cause, EngineError::InvalidAmount(_)));

    // Deposits draw on the checking account's overdraft headroom
    bank.accounts.deposit_savings(savings, dec!(1050.00)).await.unwrap();
    assert_eq!(bank.balances.balance(checking).await.unwrap(), dec!(-1000.00));

    let err = bank.accounts.deposit_savings(savings, dec!(0.01)).await.unwrap_err();
    let EngineError::DepositFailed(cause) = err else {
        panic!("expected DepositFailed, got {err:?}");
    };
    assert!(matches!(*cause, EngineError::OverdraftExceeded { .. }));

    // A checking account cannot be deposited into as if it were savings
    let err = bank.accounts.deposit_savings(checking, dec!(10.00)).await.unwrap_err();
    let EngineError::DepositFailed(cause) = err else {
        panic!("expected DepositFailed, got {err:?}");
    };
    assert!(matches!(*cause, EngineError::AccountNotFound(_)));
}

#[tokio::test]
async fn test_atm_withdrawal() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let checking = bank.customer_checking(dec!(200.00)).await;
    let atm_id = Uuid::new_v4();

    bank.accounts
        .validate_account_for_atm(dec!(60.00), checking, "1234")
        .await
        .unwrap();
    // Validation alone records nothing
    assert_eq!(bank.balances.balance(checking).await.unwrap(), dec!(200.00));

    let record = bank
        .accounts
        .withdraw_atm(checking, dec!(60.00), "1234", atm_id)
        .await
        .unwrap();
    assert_eq!(record.receiving_account_id, None);
    assert_eq!(bank.balances.balance(checking).await.unwrap(), dec!(140.00));
}

#[tokio::test]
async fn test_atm_rejects_bad_pin_and_wrong_kind() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let owner = Uuid::new_v4();
    let checking = bank
        .registry
        .create_checking(Some(owner), dec!(200.00), "1234", true)
        .await
        .unwrap()
        .account_id;
    let savings = bank
        .registry
        .create_savings(Some(owner), dec!(0.00), checking)
        .await
        .unwrap()
        .account_id;
    let atm_id = Uuid::new_v4();

    let err = bank
        .accounts
        .withdraw_atm(checking, dec!(10.00), "9999", atm_id)
        .await
        .unwrap_err();
    let EngineError::WithdrawalFailed(cause) = err else {
        panic!("expected WithdrawalFailed, got {err:?}");
    };
    assert!(matches!(*cause, EngineError::InvalidPin));

    let err = bank
        .accounts
        .withdraw_atm(savings, dec!(10.00), "1234", atm_id)
        .await
        .unwrap_err();
    let EngineError::WithdrawalFailed(cause) = err else {
        panic!("expected WithdrawalFailed, got {err:?}");
    };
    assert!(matches!(*cause, EngineError::NotCheckingAccount(id) if id == savings));

    assert_eq!(bank.balances.balance(checking).await.unwrap(), dec!(200.00));
}

#[tokio::test]
async fn test_atm_honors_overdraft_rule() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let checking = bank.customer_checking(dec!(100.00)).await;
    let atm_id = Uuid::new_v4();

    bank.accounts
        .withdraw_atm(checking, dec!(1100.00), "1234", atm_id)
        .await
        .unwrap();
    assert_eq!(bank.balances.balance(checking).await.unwrap(), dec!(-1000.00));

    let err = bank
        .accounts
        .withdraw_atm(checking, dec!(0.01), "1234", atm_id)
        .await
        .unwrap_err();
    let EngineError::WithdrawalFailed(cause) = err else {
        panic!("expected WithdrawalFailed, got {err:?}");
    };
    assert!(matches!(*cause, EngineError::OverdraftExceeded { .. }));
}

#[tokio::test]
async fn test_concurrent_debits_cannot_both_pass() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    // 100 balance + 1000 overdraft: two 600 debits together exceed the
    // headroom, so exactly one must fail
    let alice = bank.customer_checking(dec!(100.00)).await;
    let bob = bank.customer_checking(dec!(0.00)).await;

    let t1 = {
        let transfers = bank.transfers.clone();
        tokio::spawn(async move { transfers.transfer(dec!(600.00), alice, bob).await })
    };
    let t2 = {
        let transfers = bank.transfers.clone();
        tokio::spawn(async move { transfers.transfer(dec!(600.00), alice, bob).await })
    };

    let results = [t1.await.unwrap(), t2.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent debit must settle");

    assert_eq!(bank.balances.balance(alice).await.unwrap(), dec!(-500.00));
    assert_eq!(bank.balances.balance(bob).await.unwrap(), dec!(600.00));
}

#[tokio::test]
async fn test_delete_checking_cascades_dependents() {
    let Some(pool) = common::try_pool().await else { return };
    let bank = common::TestBank::new(pool).await;

    let owner = Uuid::new_v4();
    let checking = bank
        .registry
        .create_checking(Some(owner), dec!(100.00), "1234", true)
        .await
        .unwrap()
        .account_id;
    let savings = bank
        .registry
        .create_savings(Some(owner), dec!(0.00), checking)
        .await
        .unwrap()
        .account_id;
    let custody = bank
        .registry
        .create_custody(Some(owner), checking)
        .await
        .unwrap()
        .account_id;

    bank.registry.delete_checking(checking).await.unwrap();

    assert!(bank.registry.get_account(checking).await.unwrap().is_none());
    assert!(bank.registry.get_account(savings).await.unwrap().is_none());
    assert!(bank.registry.get_account(custody).await.unwrap().is_none());
}
