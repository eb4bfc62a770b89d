// tests/inventory_tests.rs
mod common;

use common::*;
use orderflow::{EngineError, FailPoint, InventoryAction, MemoryStore, OrderEngine, StockRequest, Store};
use proptest::prelude::*;
use rust_decimal_macros::dec;

#[tokio::test]
async fn confirming_deducts_every_line() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(500000), &[(SHIRT, 3), (JEANS, 1)]).await;

  let change = engine.change_status(1, "Confirmed").await.unwrap();
  assert_eq!(change.action, InventoryAction::Confirm);
  assert!(change.inventory_updated);
  assert_eq!(change.stock_changes.len(), 2);
  assert_eq!(stock(&store, SHIRT).await, 7);
  assert_eq!(stock(&store, JEANS).await, 4);
}

#[tokio::test]
async fn shortfall_on_one_product_leaves_all_stock_untouched() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(500000), &[(SHIRT, 3), (CAP, 5)]).await;

  let err = engine.change_status(1, "Confirmed").await.unwrap_err();
  match err {
    EngineError::InsufficientStock { order_id, shortfalls } => {
      assert_eq!(order_id, Some(1));
      assert_eq!(shortfalls.len(), 1);
      assert_eq!(shortfalls[0].product_id, CAP);
      assert_eq!(shortfalls[0].available, 2);
      assert_eq!(shortfalls[0].required, 5);
      assert_eq!(shortfalls[0].shortfall, 3);
    }
    other => panic!("expected InsufficientStock, got {other}"),
  }
  assert_eq!(stock(&store, SHIRT).await, 10);
  assert_eq!(stock(&store, CAP).await, 2);
  assert_eq!(store.order(1).await.unwrap().status.as_deref(), Some("Pending"));
}

#[tokio::test]
async fn failed_status_write_rolls_back_deduction() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(300000), &[(SHIRT, 3)]).await;

  store.fail_on(FailPoint::SetOrderStatus);
  let err = engine.change_status(1, "Confirmed").await.unwrap_err();
  assert!(matches!(err, EngineError::Storage { .. }));
  assert_eq!(stock(&store, SHIRT).await, 10);
  assert_eq!(store.order(1).await.unwrap().status.as_deref(), Some("Pending"));

  store.clear_failures();
  engine.change_status(1, "Confirmed").await.unwrap();
  assert_eq!(stock(&store, SHIRT).await, 7);
}

#[tokio::test]
async fn failed_commit_discards_everything() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Confirmed"), dec!(300000), &[(SHIRT, 3)]).await;

  store.fail_on(FailPoint::Commit);
  assert!(engine.change_status(1, "Cancelled").await.is_err());
  assert_eq!(stock(&store, SHIRT).await, 10);
  assert_eq!(store.order(1).await.unwrap().status.as_deref(), Some("Confirmed"));
}

#[tokio::test]
async fn cancelling_a_pending_order_does_not_restore() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(300000), &[(SHIRT, 3)]).await;

  let change = engine.change_status(1, "Đã hủy").await.unwrap();
  assert_eq!(change.action, InventoryAction::None);
  assert_eq!(change.new_status, "Cancelled");
  assert_eq!(stock(&store, SHIRT).await, 10);
}

#[tokio::test]
async fn returning_a_delivered_order_releases_stock() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Delivered"), dec!(300000), &[(JEANS, 2)]).await;

  let change = engine.change_status(1, "Returned").await.unwrap();
  assert_eq!(change.action, InventoryAction::Release);
  assert_eq!(stock(&store, JEANS).await, 7);
}

#[tokio::test]
async fn order_without_lines_cannot_move_stock() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(0), &[]).await;

  let err = engine.change_status(1, "Confirmed").await.unwrap_err();
  assert!(matches!(err, EngineError::NoLineItems(1)));

  // No stock effect means no line items are needed.
  let change = engine.change_status(1, "Processing").await.unwrap();
  assert_eq!(change.action, InventoryAction::None);
}

#[tokio::test]
async fn unknown_status_label_is_rejected() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(0), &[(SHIRT, 1)]).await;

  let err = engine.change_status(1, "Teleported").await.unwrap_err();
  assert!(matches!(err, EngineError::UnknownStatus(ref s) if s == "Teleported"));
  assert!(matches!(
    engine.change_status(99, "Confirmed").await.unwrap_err(),
    EngineError::OrderNotFound(99)
  ));
}

#[tokio::test]
async fn legacy_status_label_can_still_be_confirmed() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Awaiting courier"), dec!(0), &[(SHIRT, 2)]).await;

  let change = engine.change_status(1, "Confirmed").await.unwrap();
  assert_eq!(change.action, InventoryAction::Confirm);
  assert_eq!(stock(&store, SHIRT).await, 8);
}

#[tokio::test]
async fn availability_reports_all_shortfalls_without_writing() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  seed_order(&store, 1, Some("Pending"), dec!(0), &[(JEANS, 6), (CAP, 3), (SHIRT, 1)]).await;

  let availability = engine.check_order_inventory(1).await.unwrap();
  assert!(!availability.available);
  let short: Vec<_> = availability.shortfalls.iter().map(|s| (s.product_id, s.shortfall)).collect();
  assert_eq!(short, vec![(JEANS, 1), (CAP, 1)]);
  assert_eq!(stock(&store, JEANS).await, 5);

  let ad_hoc = engine
    .check_availability(&[
      StockRequest { product_id: SHIRT, quantity: 4 },
      StockRequest { product_id: SHIRT, quantity: 6 },
    ])
    .await
    .unwrap();
  assert!(ad_hoc.available);
}

#[tokio::test]
async fn low_stock_uses_inclusive_threshold_and_hides_deleted() {
  let (engine, store) = engine().await;
  seed_catalog(&store).await;
  store.soft_delete_product(CAP).await;

  let low: Vec<_> = engine.low_stock_products(Some(5)).await.unwrap().into_iter().map(|p| p.id).collect();
  assert_eq!(low, vec![JEANS]);

  let default_threshold: Vec<_> = engine.low_stock_products(None).await.unwrap().into_iter().map(|p| p.id).collect();
  assert_eq!(default_threshold, vec![JEANS, SHIRT]);

  assert!(matches!(
    engine.low_stock_products(Some(-1)).await.unwrap_err(),
    EngineError::InvalidInput(_)
  ));
}

async fn confirm_then_cancel(stock_level: i32, quantity: i32) -> (bool, i32, i32) {
  let store = MemoryStore::new();
  let engine = OrderEngine::new(store.clone(), Default::default()).unwrap();
  store.seed_product(SHIRT, "Ao thun", dec!(1), stock_level).await;
  seed_order(&store, 1, Some("Pending"), dec!(1), &[(SHIRT, quantity)]).await;

  let confirmed = engine.change_status(1, "Confirmed").await.is_ok();
  let after_confirm = stock(&store, SHIRT).await;
  if confirmed {
    engine.change_status(1, "Cancelled").await.unwrap();
  }
  (confirmed, after_confirm, stock(&store, SHIRT).await)
}

proptest! {
  #[test]
  fn stock_never_goes_negative_and_cancel_restores(stock_level in 0i32..50, quantity in 1i32..60) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let (confirmed, after_confirm, after_cancel) = rt.block_on(confirm_then_cancel(stock_level, quantity));

    prop_assert_eq!(confirmed, quantity <= stock_level);
    prop_assert!(after_confirm >= 0);
    if confirmed {
      prop_assert_eq!(after_confirm, stock_level - quantity);
    } else {
      prop_assert_eq!(after_confirm, stock_level);
    }
    prop_assert_eq!(after_cancel, stock_level);
  }
}

#[tokio::test]
async fn deduct_through_a_raw_unit_of_work_is_all_or_nothing() {
  let (_engine, store) = engine().await;
  seed_catalog(&store).await;

  let mut uow = store.begin().await.unwrap();
  let err = orderflow::inventory::deduct(
    &mut uow,
    None,
    &[
      StockRequest { product_id: SHIRT, quantity: 1 },
      StockRequest { product_id: 404, quantity: 1 },
    ],
    InventoryAction::Reserve,
  )
  .await
  .unwrap_err();
  assert!(matches!(err, EngineError::ProductNotFound(404)));
  drop(uow);
  assert_eq!(stock(&store, SHIRT).await, 10);
}
