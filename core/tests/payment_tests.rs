// tests/payment_tests.rs
mod common;

use common::*;
use orderflow::{
  CallbackResult, EngineError, FailPoint, InventoryAction, MemoryStore, OrderEngine, TransactionStatus,
};
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;

async fn pending_order() -> (OrderEngine<MemoryStore>, MemoryStore) {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(250000), &[(SHIRT, 2), (CAP, 1)]).await;
  (engine, store)
}

#[tokio::test]
async fn creation_is_idempotent_while_a_transaction_is_open() {
  let (engine, _store) = pending_order().await;

  let first = engine.create_transaction(1).await.unwrap();
  assert!(first.newly_created);
  assert_eq!(first.status, TransactionStatus::Created);
  assert_eq!(first.amount, dec!(250000));
  assert_eq!(first.payment_url, format!("/mock-pay/{}", first.transaction_id));
  assert!(first.transaction_id.starts_with("TXN_"));

  let second = engine.create_transaction(1).await.unwrap();
  assert!(!second.newly_created);
  assert_eq!(second.transaction_id, first.transaction_id);
  assert_eq!(engine.order_transactions(1).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creation_yields_a_single_open_transaction() {
  let (engine, store) = pending_order().await;
  let engine = Arc::new(engine);

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let engine = engine.clone();
      tokio::spawn(async move { engine.create_transaction(1).await })
    })
    .collect();

  let mut ids = HashSet::new();
  let mut minted = 0;
  for handle in handles {
    let txn = handle.await.unwrap().unwrap();
    if txn.newly_created {
      minted += 1;
    }
    ids.insert(txn.transaction_id);
  }
  assert_eq!(ids.len(), 1);
  assert_eq!(minted, 1);

  let state = store.snapshot().await;
  let open = state
    .transactions
    .values()
    .filter(|t| t.order_id == 1 && t.status == TransactionStatus::Created)
    .count();
  assert_eq!(open, 1);
}

#[tokio::test]
async fn losing_the_insert_race_returns_the_winning_transaction() {
  let (engine, store) = pending_order().await;
  store.fail_on(FailPoint::LostInsertRace);

  let txn = engine.create_transaction(1).await.unwrap();
  assert!(!txn.newly_created);
  assert_eq!(txn.status, TransactionStatus::Created);
  let state = store.snapshot().await;
  assert_eq!(state.transactions.len(), 1);
  assert!(state.transactions.contains_key(&txn.transaction_id));

  // The failure fires once; the winner is reused and can be settled.
  let again = engine.create_transaction(1).await.unwrap();
  assert_eq!(again.transaction_id, txn.transaction_id);
  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);
  let outcome = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap();
  assert_eq!(outcome.transaction_status, TransactionStatus::Success);
}

#[tokio::test]
async fn stored_signature_matches_locked_amount() {
  let (engine, _store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();
  let stored = engine.get_transaction(&txn.transaction_id).await.unwrap();
  assert_eq!(stored.signature, engine.signer().sign(&txn.transaction_id, dec!(250000)));
  assert!(engine.signer().verify(&stored.id, stored.amount, &stored.signature));
}

#[tokio::test]
async fn amount_stays_locked_after_repricing() {
  let (engine, store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();

  engine.reprice_order(1, dec!(300000)).await.unwrap();
  assert_eq!(store.order(1).await.unwrap().total_amount, dec!(300000));

  let again = engine.create_transaction(1).await.unwrap();
  assert_eq!(again.amount, dec!(250000));

  let signature = engine.signer().sign(&txn.transaction_id, dec!(250000));
  let outcome = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap();
  assert_eq!(outcome.amount, dec!(250000));
  let ledger = engine.payment_history(1).await.unwrap();
  assert_eq!(ledger.len(), 1);
  assert_eq!(ledger[0].amount, dec!(250000));
}

#[tokio::test]
async fn settled_order_cannot_open_another_transaction() {
  let (engine, _store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();
  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);
  engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap();

  assert!(matches!(
    engine.create_transaction(1).await.unwrap_err(),
    EngineError::AlreadyPaid { order_id: 1 }
  ));
}

#[tokio::test]
async fn unpayable_orders_are_rejected() {
  let (engine, store) = pending_order().await;
  seed_order(&store, 2, Some("Cancelled"), dec!(100000), &[(SHIRT, 1)]).await;
  seed_order(&store, 3, Some("Pending"), dec!(0), &[(SHIRT, 1)]).await;
  seed_order(&store, 4, Some("Shipped"), dec!(100000), &[(SHIRT, 1)]).await;

  assert!(matches!(engine.create_transaction(2).await.unwrap_err(), EngineError::InvalidInput(_)));
  assert!(matches!(engine.create_transaction(3).await.unwrap_err(), EngineError::InvalidInput(_)));
  assert!(matches!(engine.create_transaction(4).await.unwrap_err(), EngineError::AlreadyPaid { .. }));
  assert!(matches!(engine.create_transaction(9).await.unwrap_err(), EngineError::OrderNotFound(9)));
}

#[tokio::test]
async fn second_callback_is_refused_and_changes_nothing() {
  let (engine, store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();
  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);

  let outcome = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap();
  assert!(outcome.succeeded());
  assert_eq!(outcome.action, InventoryAction::Confirm);
  assert_eq!(outcome.order_status.as_deref(), Some("Confirmed"));
  assert_eq!(stock(&store, SHIRT).await, 8);
  assert_eq!(stock(&store, CAP).await, 1);

  let replay = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap_err();
  assert!(matches!(
    replay,
    EngineError::AlreadyProcessed {
      status: TransactionStatus::Success,
      ..
    }
  ));

  let late_failure = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Failed, &signature)
    .await
    .unwrap_err();
  assert!(matches!(late_failure, EngineError::AlreadyProcessed { .. }));

  assert_eq!(stock(&store, SHIRT).await, 8);
  assert_eq!(engine.payment_history(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn already_processed_wins_over_bad_signature() {
  let (engine, _store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();
  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);
  engine
    .handle_callback(&txn.transaction_id, CallbackResult::Canceled, &signature)
    .await
    .unwrap();

  let err = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, "deadbeef")
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::AlreadyProcessed { .. }));
}

#[tokio::test]
async fn failed_and_canceled_only_close_the_transaction() {
  let (engine, store) = pending_order().await;

  let first = engine.create_transaction(1).await.unwrap();
  let sig = engine.signer().sign(&first.transaction_id, first.amount);
  let outcome = engine
    .handle_callback(&first.transaction_id, CallbackResult::Failed, &sig)
    .await
    .unwrap();
  assert!(!outcome.succeeded());
  assert_eq!(outcome.transaction_status, TransactionStatus::Failed);
  assert_eq!(outcome.order_status.as_deref(), Some("Pending"));
  assert!(outcome.payment_record.is_none());
  assert_eq!(
    outcome.redirect_reference(),
    "/payment/failed?error=payment_failed&orderId=1"
  );
  assert_eq!(stock(&store, SHIRT).await, 10);

  // A closed transaction frees the slot for a fresh attempt.
  let retry = engine.create_transaction(1).await.unwrap();
  assert!(retry.newly_created);
  assert_ne!(retry.transaction_id, first.transaction_id);

  let sig = engine.signer().sign(&retry.transaction_id, retry.amount);
  let canceled = engine
    .handle_callback(&retry.transaction_id, CallbackResult::Canceled, &sig)
    .await
    .unwrap();
  assert_eq!(canceled.transaction_status, TransactionStatus::Canceled);
  assert!(canceled.redirect_reference().contains("error=payment_canceled"));
  assert!(engine.payment_history(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
  let (engine, _store) = pending_order().await;
  let err = engine
    .handle_callback("TXN_20240101000000_ABCDEF12", CallbackResult::Success, "00")
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::TransactionNotFound(_)));
  assert!(matches!(
    engine.get_transaction("nope").await.unwrap_err(),
    EngineError::TransactionNotFound(_)
  ));
}

#[tokio::test]
async fn ledger_failure_rolls_back_the_whole_settlement() {
  let (engine, store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();
  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);

  store.fail_on(FailPoint::AppendPaymentRecord);
  let err = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::Storage { .. }));

  let stored = engine.get_transaction(&txn.transaction_id).await.unwrap();
  assert_eq!(stored.status, TransactionStatus::Created);
  assert_eq!(store.order(1).await.unwrap().status.as_deref(), Some("Pending"));
  assert_eq!(stock(&store, SHIRT).await, 10);
  assert!(engine.payment_history(1).await.unwrap().is_empty());

  store.clear_failures();
  let outcome = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap();
  assert!(outcome.payment_record.is_some());
}

#[tokio::test]
async fn finalize_failure_keeps_transaction_open() {
  let (engine, store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();
  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);

  store.fail_on(FailPoint::FinalizeTransaction);
  assert!(engine
    .handle_callback(&txn.transaction_id, CallbackResult::Failed, &signature)
    .await
    .is_err());
  assert_eq!(
    engine.get_transaction(&txn.transaction_id).await.unwrap().status,
    TransactionStatus::Created
  );
}

#[tokio::test]
async fn success_without_enough_stock_leaves_transaction_open() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(150000), &[(CAP, 3)]).await;

  let txn = engine.create_transaction(1).await.unwrap();
  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);
  let err = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::InsufficientStock { .. }));
  assert_eq!(
    engine.get_transaction(&txn.transaction_id).await.unwrap().status,
    TransactionStatus::Created
  );
  assert_eq!(stock(&store, CAP).await, 2);
}

#[tokio::test]
async fn late_payment_on_cancelled_order_reconfirms_it() {
  let (engine, store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();
  engine.change_status(1, "Cancelled").await.unwrap();

  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);
  let outcome = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap();
  assert_eq!(outcome.action, InventoryAction::Confirm);
  assert_eq!(store.order(1).await.unwrap().status.as_deref(), Some("Confirmed"));
  assert_eq!(stock(&store, SHIRT).await, 8);
}

#[tokio::test]
async fn success_on_order_already_holding_stock_keeps_status() {
  let (engine, store) = pending_order().await;
  let txn = engine.create_transaction(1).await.unwrap();
  engine.change_status(1, "Confirmed").await.unwrap();
  engine.change_status(1, "Shipped").await.unwrap();

  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);
  let outcome = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await
    .unwrap();
  assert_eq!(outcome.action, InventoryAction::None);
  assert_eq!(outcome.order_status.as_deref(), Some("Shipped"));
  assert_eq!(stock(&store, SHIRT).await, 8);
  assert_eq!(engine.payment_history(1).await.unwrap().len(), 1);
}

#[test]
fn callback_result_parsing() {
  assert_eq!("success".parse::<CallbackResult>().unwrap(), CallbackResult::Success);
  assert_eq!("CANCELLED".parse::<CallbackResult>().unwrap(), CallbackResult::Canceled);
  assert!(matches!(
    "PENDING".parse::<CallbackResult>().unwrap_err(),
    EngineError::InvalidInput(_)
  ));
}
