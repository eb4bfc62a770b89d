// tests/common/mod.rs
#![allow(dead_code)]

use chrono::Utc;
use once_cell::sync::Lazy;
use orderflow::{EngineConfig, MemoryStore, Order, OrderEngine, OrderId, OrderLineItem, ProductId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::Level;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub const SHIRT: ProductId = 1;
pub const JEANS: ProductId = 2;
pub const CAP: ProductId = 3;

pub async fn engine_with(config: EngineConfig) -> (OrderEngine<MemoryStore>, MemoryStore) {
  setup_tracing();
  let store = MemoryStore::new();
  let engine = OrderEngine::new(store.clone(), config).expect("engine config is valid");
  (engine, store)
}

pub async fn engine() -> (OrderEngine<MemoryStore>, MemoryStore) {
  engine_with(EngineConfig::default()).await
}

/// Catalog used by most tests: shirt 10 in stock, jeans 5, cap 2.
pub async fn seed_catalog(store: &MemoryStore) {
  store.seed_product(SHIRT, "Ao thun", dec!(100000), 10).await;
  store.seed_product(JEANS, "Quan jean", dec!(300000), 5).await;
  store.seed_product(CAP, "Mu luoi trai", dec!(50000), 2).await;
}

pub fn order(id: OrderId, status: Option<&str>, total: Decimal) -> Order {
  Order {
    id,
    placed_on: Utc::now(),
    total_amount: total,
    status: status.map(str::to_string),
    customer_id: 42,
    staff_id: None,
    shipper_id: None,
    discount_code: None,
    shipping_fee: None,
  }
}

pub fn line(order_id: OrderId, product_id: ProductId, quantity: i32) -> OrderLineItem {
  OrderLineItem {
    order_id,
    product_id,
    quantity,
    unit_price: dec!(100000),
    item_discount: dec!(0),
  }
}

/// Seeds an order with the given `(product, quantity)` lines.
pub async fn seed_order(
  store: &MemoryStore,
  id: OrderId,
  status: Option<&str>,
  total: Decimal,
  lines: &[(ProductId, i32)],
) {
  let items = lines.iter().map(|(p, q)| line(id, *p, *q)).collect();
  store.seed_order(order(id, status, total), items).await;
}

pub async fn stock(store: &MemoryStore, product_id: ProductId) -> i32 {
  store.stock_of(product_id).await.expect("product is seeded")
}
