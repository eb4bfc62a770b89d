// orderflow/src/inventory.rs

//! Applies resolved inventory actions to product stock inside the caller's
//! unit of work. Nothing here commits; the caller commits the stock changes
//! together with the order status that justified them.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

use crate::error::{EngineError, EngineResult};
use crate::model::{Availability, OrderId, ProductId, ProductStock, Shortfall, StockRequest};
use crate::status::InventoryAction;
use crate::store::UnitOfWork;

/// One applied stock change, kept for the audit trail and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
  pub product_id: ProductId,
  pub action: InventoryAction,
  pub quantity: i32,
  pub stock_after: i32,
}

/// Sums quantities per product. The map keeps ascending product id order,
/// which is the lock order every unit of work follows.
fn group_by_product(items: &[StockRequest]) -> EngineResult<BTreeMap<ProductId, i32>> {
  let mut grouped = BTreeMap::new();
  for item in items {
    if item.quantity <= 0 {
      return Err(EngineError::InvalidInput(format!(
        "quantity for product #{} must be positive, got {}",
        item.product_id, item.quantity
      )));
    }
    let entry = grouped.entry(item.product_id).or_insert(0i32);
    *entry = entry
      .checked_add(item.quantity)
      .ok_or_else(|| EngineError::InvalidInput(format!("quantity overflow for product #{}", item.product_id)))?;
  }
  Ok(grouped)
}

fn shortfall_for(product: &ProductStock, required: i32) -> Option<Shortfall> {
  if product.stock_quantity >= required {
    return None;
  }
  Some(Shortfall {
    product_id: product.id,
    name: product.name.clone(),
    available: product.stock_quantity,
    required,
    shortfall: required - product.stock_quantity,
  })
}

/// Applies `action` to every line item of `order_id`.
///
/// `None` returns immediately without touching the catalog. Deductions check
/// every product under lock first and fail with the complete shortfall list
/// before any counter moves; restorations add the quantities back unconditionally.
#[instrument(name = "inventory::apply", skip(uow), err(Display))]
pub async fn apply<U: UnitOfWork>(
  uow: &mut U,
  order_id: OrderId,
  action: InventoryAction,
) -> EngineResult<Vec<StockChange>> {
  if action == InventoryAction::None {
    return Ok(Vec::new());
  }

  if uow.order(order_id).await?.is_none() {
    return Err(EngineError::OrderNotFound(order_id));
  }
  let lines = uow.order_lines(order_id).await?;
  if lines.is_empty() {
    return Err(EngineError::NoLineItems(order_id));
  }
  let requests: Vec<StockRequest> = lines.iter().map(StockRequest::from).collect();

  if action.deducts() {
    deduct(uow, Some(order_id), &requests, action).await
  } else {
    restore(uow, &requests, action).await
  }
}

/// Decrements stock for every request or for none of them.
pub async fn deduct<U: UnitOfWork>(
  uow: &mut U,
  order_id: Option<OrderId>,
  requests: &[StockRequest],
  action: InventoryAction,
) -> EngineResult<Vec<StockChange>> {
  let grouped = group_by_product(requests)?;

  let mut locked = Vec::with_capacity(grouped.len());
  let mut shortfalls = Vec::new();
  for (&product_id, &required) in &grouped {
    let product = uow
      .lock_product(product_id)
      .await?
      .ok_or(EngineError::ProductNotFound(product_id))?;
    if let Some(short) = shortfall_for(&product, required) {
      shortfalls.push(short);
    }
    locked.push((product, required));
  }

  if !shortfalls.is_empty() {
    warn!(?order_id, shortfall_count = shortfalls.len(), "Stock deduction rejected, nothing applied.");
    return Err(EngineError::InsufficientStock { order_id, shortfalls });
  }

  let mut changes = Vec::with_capacity(locked.len());
  for (product, quantity) in locked {
    let stock_after = match uow.adjust_stock(product.id, -quantity).await? {
      Some(level) => level,
      None => {
        // Guarded update refused despite the lock: report what is there now.
        let current = uow.product(product.id).await?.unwrap_or(product);
        let shortfalls = shortfall_for(&current, quantity).into_iter().collect();
        return Err(EngineError::InsufficientStock { order_id, shortfalls });
      }
    };
    info!(
      product_id = product.id,
      action = %action,
      quantity,
      stock_after,
      "Stock decremented."
    );
    changes.push(StockChange {
      product_id: product.id,
      action,
      quantity,
      stock_after,
    });
  }
  Ok(changes)
}

async fn restore<U: UnitOfWork>(
  uow: &mut U,
  requests: &[StockRequest],
  action: InventoryAction,
) -> EngineResult<Vec<StockChange>> {
  let grouped = group_by_product(requests)?;
  let mut changes = Vec::with_capacity(grouped.len());
  for (product_id, quantity) in grouped {
    uow
      .lock_product(product_id)
      .await?
      .ok_or(EngineError::ProductNotFound(product_id))?;
    let stock_after = uow
      .adjust_stock(product_id, quantity)
      .await?
      .ok_or_else(|| EngineError::Conflict(format!("stock counter for product #{} cannot absorb {}", product_id, quantity)))?;
    info!(product_id, action = %action, quantity, stock_after, "Stock restored.");
    changes.push(StockChange {
      product_id,
      action,
      quantity,
      stock_after,
    });
  }
  Ok(changes)
}

/// Read-only availability check; reports every shortfall at once.
#[instrument(name = "inventory::check_availability", skip(uow, requests), fields(items = requests.len()))]
pub async fn check_availability<U: UnitOfWork>(uow: &mut U, requests: &[StockRequest]) -> EngineResult<Availability> {
  let grouped = group_by_product(requests)?;
  let mut shortfalls = Vec::new();
  for (product_id, required) in grouped {
    let product = uow
      .product(product_id)
      .await?
      .ok_or(EngineError::ProductNotFound(product_id))?;
    if let Some(short) = shortfall_for(&product, required) {
      shortfalls.push(short);
    }
  }
  Ok(Availability {
    available: shortfalls.is_empty(),
    shortfalls,
  })
}

pub async fn low_stock_products<U: UnitOfWork>(uow: &mut U, threshold: i32) -> EngineResult<Vec<ProductStock>> {
  if threshold < 0 {
    return Err(EngineError::InvalidInput(format!(
      "low stock threshold must not be negative, got {}",
      threshold
    )));
  }
  uow.low_stock_products(threshold).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{MemoryStore, Store};
  use chrono::Utc;
  use rust_decimal_macros::dec;

  use crate::model::{Order, OrderLineItem};

  async fn store_with_order(stock_a: i32, stock_b: i32, qty_a: i32, qty_b: i32) -> MemoryStore {
    let store = MemoryStore::new();
    store.seed_product(1, "Ao thun", dec!(100000), stock_a).await;
    store.seed_product(2, "Quan jean", dec!(300000), stock_b).await;
    let order = Order {
      id: 7,
      placed_on: Utc::now(),
      total_amount: dec!(0),
      status: Some("Pending".into()),
      customer_id: 1,
      staff_id: None,
      shipper_id: None,
      discount_code: None,
      shipping_fee: None,
    };
    let line = |product_id, quantity| OrderLineItem {
      order_id: 7,
      product_id,
      quantity,
      unit_price: dec!(1),
      item_discount: dec!(0),
    };
    store.seed_order(order, vec![line(1, qty_a), line(2, qty_b)]).await;
    store
  }

  #[tokio::test]
  async fn none_action_touches_nothing() {
    let store = MemoryStore::new();
    let mut uow = store.begin().await.unwrap();
    // Order 99 does not exist; `None` must not even look.
    let changes = apply(&mut uow, 99, InventoryAction::None).await.unwrap();
    assert!(changes.is_empty());
  }

  #[tokio::test]
  async fn shortfall_lists_every_short_product() {
    let store = store_with_order(1, 0, 3, 2).await;
    let mut uow = store.begin().await.unwrap();
    let err = apply(&mut uow, 7, InventoryAction::Confirm).await.unwrap_err();
    match err {
      EngineError::InsufficientStock { order_id, shortfalls } => {
        assert_eq!(order_id, Some(7));
        assert_eq!(shortfalls.len(), 2);
        assert_eq!(shortfalls[0].shortfall, 2);
        assert_eq!(shortfalls[1].available, 0);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn restore_adds_back_quantities() {
    let store = store_with_order(5, 5, 2, 3).await;
    let mut uow = store.begin().await.unwrap();
    let changes = apply(&mut uow, 7, InventoryAction::Cancel).await.unwrap();
    assert_eq!(changes.iter().map(|c| c.stock_after).collect::<Vec<_>>(), vec![7, 8]);
  }

  #[tokio::test]
  async fn rejects_non_positive_quantities() {
    let store = MemoryStore::new();
    let mut uow = store.begin().await.unwrap();
    let err = check_availability(&mut uow, &[StockRequest { product_id: 1, quantity: 0 }])
      .await
      .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
  }
}
