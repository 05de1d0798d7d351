mod common;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{driver, ride_params, Harness};
use rideboard::api::{CreditAPI, PaymentAPI, RideAPI};
use rideboard::entities::{CreditSource, PaymentStatus, TransactionType};
use rideboard::error::ErrorKind;
use rideboard::external::Event;
use rideboard::store::Table;

#[tokio::test]
async fn ride_post_draws_from_the_oldest_lot() {
    let h = Harness::new();
    let driver = driver();

    let older = h.fund(&driver, 1).await;
    h.clock.advance(Duration::minutes(1));
    let newer = h.fund(&driver, 5).await;

    let ride = h
        .engine
        .post_ride(driver.clone(), ride_params(h.now(), 5, 3))
        .await
        .unwrap();

    let account = h
        .engine
        .credit_account(driver.clone(), driver.id)
        .await
        .unwrap();
    assert_eq!(account.balance, 5);

    let remaining = |id: Uuid| {
        account
            .lots
            .iter()
            .find(|lot| lot.id == id)
            .map(|lot| lot.credits_remaining)
    };
    assert_eq!(remaining(older.id), Some(0));
    assert_eq!(remaining(newer.id), Some(5));

    let transactions = h
        .engine
        .credit_transactions(driver.clone(), driver.id)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].credit_id, older.id);
    assert_eq!(transactions[0].ride_id, Some(ride.id));
    assert_eq!(transactions[0].credits_used, 1);
    assert_eq!(transactions[0].transaction_type, TransactionType::RidePost);
}

#[tokio::test]
async fn posting_without_credits_changes_nothing() {
    let h = Harness::new();
    let driver = driver();

    let err = h
        .engine
        .post_ride(driver.clone(), ride_params(h.now(), 5, 3))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InsufficientResource);
    assert_eq!(err.code, 150);
    assert!(h.engine.driver_rides(driver.clone()).await.unwrap().is_empty());
    assert!(h
        .engine
        .credit_transactions(driver.clone(), driver.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn schedule_conflict_keeps_the_credit() {
    let h = Harness::new();
    let driver = driver();
    h.fund(&driver, 2).await;

    h.engine
        .post_ride(driver.clone(), ride_params(h.now(), 5, 3))
        .await
        .unwrap();

    let err = h
        .engine
        .post_ride(driver.clone(), ride_params(h.now(), 6, 3))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.code, 143);

    assert_eq!(h.balance(&driver).await, 1);
    assert_eq!(h.engine.driver_rides(driver.clone()).await.unwrap().len(), 1);

    // exactly two hours apart is allowed
    h.engine
        .post_ride(driver.clone(), ride_params(h.now(), 7, 3))
        .await
        .unwrap();
    assert_eq!(h.balance(&driver).await, 0);
}

#[tokio::test]
async fn failed_audit_write_rolls_back_the_post() {
    let h = Harness::new();
    let driver = driver();
    h.fund(&driver, 1).await;

    h.engine
        .store()
        .fail_writes_to(Table::CreditTransactions)
        .await;

    let err = h
        .engine
        .post_ride(driver.clone(), ride_params(h.now(), 5, 3))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);

    assert_eq!(h.balance(&driver).await, 1);
    assert!(h.engine.driver_rides(driver.clone()).await.unwrap().is_empty());

    h.engine.store().clear_faults().await;

    h.engine
        .post_ride(driver.clone(), ride_params(h.now(), 5, 3))
        .await
        .unwrap();
    assert_eq!(h.balance(&driver).await, 0);
}

#[tokio::test]
async fn refund_adds_a_free_lot() {
    let h = Harness::new();
    let driver = driver();

    let err = h
        .engine
        .refund_credits(driver.clone(), driver.id, 3, "ride cancelled".into())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let lot = h
        .engine
        .refund_credits(h.admin.clone(), driver.id, 3, "ride cancelled".into())
        .await
        .unwrap();

    assert_eq!(lot.source, CreditSource::Adjustment);
    assert_eq!(lot.amount_paid, Decimal::ZERO);
    assert_eq!(lot.reason.as_deref(), Some("ride cancelled"));
    assert_eq!(h.balance(&driver).await, 3);
}

#[tokio::test]
async fn ledger_is_private() {
    let h = Harness::new();
    let owner = driver();
    h.fund(&owner, 2).await;

    let err = h
        .engine
        .credit_account(driver(), owner.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let err = h
        .engine
        .credit_transactions(driver(), owner.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn captured_payment_is_final() {
    let h = Harness::new();
    let driver = driver();

    let package = h
        .engine
        .create_package(h.admin.clone(), "starter".into(), 5, dec!(20))
        .await
        .unwrap();
    let lot = h
        .engine
        .purchase_credits(driver.clone(), package.id, Some("pay_1".into()))
        .await
        .unwrap();

    assert_eq!(lot.payment_status, PaymentStatus::Pending);
    assert_eq!(lot.credits_remaining, 5);
    assert_eq!(h.balance(&driver).await, 5);

    let captured = h
        .engine
        .confirm_payment(h.admin.clone(), "pay_1".into(), true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(captured.payment_status, PaymentStatus::Captured);

    {
        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, Event::CreditsPurchased);
        assert_eq!(sent[0].recipient, driver.id);
    }

    let err = h
        .engine
        .confirm_payment(h.admin.clone(), "pay_1".into(), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);
    assert_eq!(h.balance(&driver).await, 5);
}

#[tokio::test]
async fn failed_payment_removes_the_lot() {
    let h = Harness::new();
    let driver = driver();

    let package = h
        .engine
        .create_package(h.admin.clone(), "starter".into(), 5, dec!(20))
        .await
        .unwrap();
    h.engine
        .purchase_credits(driver.clone(), package.id, Some("pay_2".into()))
        .await
        .unwrap();

    let outcome = h
        .engine
        .confirm_payment(h.admin.clone(), "pay_2".into(), false)
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(h.balance(&driver).await, 0);

    let err = h
        .engine
        .confirm_payment(h.admin.clone(), "pay_2".into(), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.code, 106);

    let err = h
        .engine
        .confirm_payment(driver, "pay_3".into(), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn payment_ids_are_unique() {
    let h = Harness::new();
    let driver = driver();

    let package = h
        .engine
        .create_package(h.admin.clone(), "starter".into(), 5, dec!(20))
        .await
        .unwrap();
    h.engine
        .purchase_credits(driver.clone(), package.id, Some("pay_4".into()))
        .await
        .unwrap();

    let err = h
        .engine
        .purchase_credits(driver.clone(), package.id, Some("pay_4".into()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(h.balance(&driver).await, 5);
}

#[tokio::test]
async fn retired_packages_cannot_be_bought() {
    let h = Harness::new();

    let package = h
        .engine
        .create_package(h.admin.clone(), "legacy".into(), 3, dec!(12))
        .await
        .unwrap();
    h.engine
        .deactivate_package(h.admin.clone(), package.id)
        .await
        .unwrap();

    assert!(h
        .engine
        .list_packages(driver())
        .await
        .unwrap()
        .is_empty());

    let err = h
        .engine
        .purchase_credits(driver(), package.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.code, 104);
}

#[tokio::test]
async fn manual_rollback_deletes_the_lot() {
    let h = Harness::new();
    let driver = driver();
    let lot = h.fund(&driver, 4).await;

    let err = h
        .engine
        .rollback_lot(driver.clone(), lot.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    h.engine.rollback_lot(h.admin.clone(), lot.id).await.unwrap();
    assert_eq!(h.balance(&driver).await, 0);

    let err = h
        .engine
        .rollback_lot(h.admin.clone(), lot.id)
        .await
        .unwrap_err();
    assert_eq!(err.code, 105);
}
