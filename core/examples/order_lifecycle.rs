// orderflow/examples/order_lifecycle.rs

//! Places an order, pays for it through a signed callback, then cancels it,
//! printing stock levels along the way. Runs entirely on `MemoryStore`.

use orderflow::{
  CallbackResult, EngineConfig, EngineError, MemoryStore, NewLineItem, NewOrder, OrderEngine, TransactionStatus,
};
use rust_decimal_macros::dec;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), EngineError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  let store = MemoryStore::new();
  store.seed_product(1, "Ao thun", dec!(100000), 10).await;
  store.seed_product(2, "Quan jean", dec!(300000), 5).await;
  let engine = OrderEngine::new(store.clone(), EngineConfig::default())?;

  let placed = engine
    .place_order(NewOrder {
      customer_id: 42,
      shipping_fee: Some(dec!(30000)),
      items: vec![
        NewLineItem {
          product_id: 1,
          quantity: 2,
          item_discount: dec!(0),
        },
        NewLineItem {
          product_id: 2,
          quantity: 1,
          item_discount: dec!(0),
        },
      ],
      ..Default::default()
    })
    .await?;
  let order_id = placed.order.id;
  info!(order_id, total = %placed.order.total_amount, "Placed; stock untouched while pending.");

  let txn = engine.create_transaction(order_id).await?;
  // Repricing after this point does not change what the payer owes.
  engine.reprice_order(order_id, dec!(1)).await?;

  let signature = engine.signer().sign(&txn.transaction_id, txn.amount);
  let outcome = engine
    .handle_callback(&txn.transaction_id, CallbackResult::Success, &signature)
    .await?;
  assert_eq!(outcome.transaction_status, TransactionStatus::Success);
  info!(
    order_status = ?outcome.order_status,
    paid = %outcome.amount,
    shirts = ?store.stock_of(1).await,
    jeans = ?store.stock_of(2).await,
    "Paid and confirmed."
  );

  let change = engine.change_status(order_id, "Đã hủy").await?;
  info!(
    new_status = %change.new_status,
    action = %change.action,
    shirts = ?store.stock_of(1).await,
    jeans = ?store.stock_of(2).await,
    "Cancelled; stock restored."
  );

  for record in engine.payment_history(order_id).await? {
    info!(method = %record.method, amount = %record.amount, "Ledger entry.");
  }
  Ok(())
}
