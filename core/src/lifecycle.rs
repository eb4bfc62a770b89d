// orderflow/src/lifecycle.rs

//! Order status changes, order placement and the inventory reads built on them.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, instrument};

use crate::engine::OrderEngine;
use crate::error::{EngineError, EngineResult};
use crate::inventory::{self, StockChange};
use crate::model::{
  Availability, NewOrder, Order, OrderDraft, OrderId, OrderLineItem, ProductStock, StockRequest,
};
use crate::status::{resolve, InventoryAction, OrderStatus, StatusValue};
use crate::store::{Store, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
  pub order_id: OrderId,
  pub old_status: Option<String>,
  pub new_status: String,
  pub action: InventoryAction,
  pub inventory_updated: bool,
  pub stock_changes: Vec<StockChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
  pub order: Order,
  pub items: Vec<OrderLineItem>,
  pub action: InventoryAction,
  pub stock_changes: Vec<StockChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
  pub order: Order,
  pub items: Vec<OrderLineItem>,
}

impl<S: Store> OrderEngine<S> {
  /// Skipping `Pending` on a brand-new order is a policy decision.
  fn guard_direct_confirm(&self, previous: Option<&StatusValue>, next: &StatusValue) -> EngineResult<()> {
    if previous.is_none() && next.known() == Some(OrderStatus::Confirmed) && !self.config.allow_direct_confirm {
      return Err(EngineError::TransitionNotAllowed {
        from: "(new order)".to_string(),
        to: next.to_string(),
      });
    }
    Ok(())
  }

  /// Moves an order to `requested` and applies the implied inventory action,
  /// all in one unit of work. The canonical status name is what gets stored.
  #[instrument(name = "OrderEngine::change_status", skip(self), err(Display))]
  pub async fn change_status(&self, order_id: OrderId, requested: &str) -> EngineResult<StatusChange> {
    let next = match StatusValue::parse(requested) {
      StatusValue::Unrecognized(label) => return Err(EngineError::UnknownStatus(label)),
      known => known,
    };

    let mut uow = self.store.begin().await?;
    let order = uow
      .lock_order(order_id)
      .await?
      .ok_or(EngineError::OrderNotFound(order_id))?;
    let previous = order.status_value();
    self.guard_direct_confirm(previous.as_ref(), &next)?;

    let action = resolve(previous.as_ref(), &next);
    let stock_changes = inventory::apply(&mut uow, order_id, action).await?;
    uow.set_order_status(order_id, next.as_str()).await?;
    uow.commit().await?;

    info!(
      order_id,
      old_status = ?order.status,
      new_status = %next,
      action = %action,
      changed_products = stock_changes.len(),
      "Order status changed."
    );

    Ok(StatusChange {
      order_id,
      old_status: order.status,
      new_status: next.to_string(),
      action,
      inventory_updated: !stock_changes.is_empty(),
      stock_changes,
    })
  }

  /// Creates an order with price snapshots taken from the catalog now. An order
  /// created directly in a stock-holding status deducts stock in the same unit
  /// of work.
  #[instrument(
    name = "OrderEngine::place_order",
    skip(self, request),
    fields(customer_id = request.customer_id, items = request.items.len()),
    err(Display)
  )]
  pub async fn place_order(&self, request: NewOrder) -> EngineResult<PlacedOrder> {
    let initial = match request.initial_status.as_deref() {
      None => StatusValue::Known(OrderStatus::Pending),
      Some(label) => match StatusValue::parse(label) {
        StatusValue::Unrecognized(label) => return Err(EngineError::UnknownStatus(label)),
        known => known,
      },
    };
    self.guard_direct_confirm(None, &initial)?;
    validate_new_order(&request)?;

    let mut uow = self.store.begin().await?;

    let mut priced = Vec::with_capacity(request.items.len());
    for item in &request.items {
      let product = uow
        .product(item.product_id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or(EngineError::ProductNotFound(item.product_id))?;
      if item.item_discount > product.price {
        return Err(EngineError::InvalidInput(format!(
          "discount {} exceeds unit price {} for product #{}",
          item.item_discount, product.price, product.id
        )));
      }
      priced.push((item, product.price));
    }

    let subtotal: Decimal = priced
      .iter()
      .map(|(item, price)| (*price - item.item_discount) * Decimal::from(item.quantity))
      .sum();
    let total = order_total(
      subtotal,
      request.shipping_fee.unwrap_or(Decimal::ZERO),
      request.order_discount.unwrap_or(Decimal::ZERO),
    );

    let draft = OrderDraft {
      placed_on: Utc::now(),
      total_amount: total,
      status: Some(initial.to_string()),
      customer_id: request.customer_id,
      staff_id: request.staff_id,
      shipper_id: request.shipper_id,
      discount_code: request.discount_code.clone(),
      shipping_fee: request.shipping_fee,
    };
    let order_id = uow.insert_order(&draft).await?;

    let mut items = Vec::with_capacity(priced.len());
    for (item, price) in priced {
      let line = OrderLineItem {
        order_id,
        product_id: item.product_id,
        quantity: item.quantity,
        unit_price: price,
        item_discount: item.item_discount,
      };
      uow.insert_line_item(&line).await?;
      items.push(line);
    }

    let action = resolve(None, &initial);
    let stock_changes = inventory::apply(&mut uow, order_id, action).await?;
    uow.commit().await?;

    info!(order_id, total = %total, status = %initial, action = %action, "Order placed.");
    Ok(PlacedOrder {
      order: draft.into_order(order_id),
      items,
      action,
      stock_changes,
    })
  }

  #[instrument(name = "OrderEngine::order_snapshot", skip(self), err(Display))]
  pub async fn order_snapshot(&self, order_id: OrderId) -> EngineResult<OrderSnapshot> {
    let mut uow = self.store.begin().await?;
    let order = uow.order(order_id).await?.ok_or(EngineError::OrderNotFound(order_id))?;
    let items = uow.order_lines(order_id).await?;
    uow.commit().await?;
    Ok(OrderSnapshot { order, items })
  }

  /// Administrative repricing. Payment transactions already created keep the
  /// amount they locked.
  #[instrument(name = "OrderEngine::reprice_order", skip(self), err(Display))]
  pub async fn reprice_order(&self, order_id: OrderId, total: Decimal) -> EngineResult<()> {
    if total.is_sign_negative() {
      return Err(EngineError::InvalidInput(format!("order total must not be negative, got {}", total)));
    }
    let mut uow = self.store.begin().await?;
    uow
      .lock_order(order_id)
      .await?
      .ok_or(EngineError::OrderNotFound(order_id))?;
    uow.set_order_total(order_id, total.round_dp(2)).await?;
    uow.commit().await
  }

  /// Whether every line item of the order can be covered by current stock.
  #[instrument(name = "OrderEngine::check_order_inventory", skip(self), err(Display))]
  pub async fn check_order_inventory(&self, order_id: OrderId) -> EngineResult<Availability> {
    let mut uow = self.store.begin().await?;
    uow.order(order_id).await?.ok_or(EngineError::OrderNotFound(order_id))?;
    let lines = uow.order_lines(order_id).await?;
    if lines.is_empty() {
      return Err(EngineError::NoLineItems(order_id));
    }
    let requests: Vec<StockRequest> = lines.iter().map(StockRequest::from).collect();
    let availability = inventory::check_availability(&mut uow, &requests).await?;
    uow.commit().await?;
    Ok(availability)
  }

  pub async fn check_availability(&self, requests: &[StockRequest]) -> EngineResult<Availability> {
    let mut uow = self.store.begin().await?;
    let availability = inventory::check_availability(&mut uow, requests).await?;
    uow.commit().await?;
    Ok(availability)
  }

  /// `threshold` falls back to the configured default.
  #[instrument(name = "OrderEngine::low_stock_products", skip(self), err(Display))]
  pub async fn low_stock_products(&self, threshold: Option<i32>) -> EngineResult<Vec<ProductStock>> {
    let threshold = threshold.unwrap_or(self.config.low_stock_threshold);
    let mut uow = self.store.begin().await?;
    let products = inventory::low_stock_products(&mut uow, threshold).await?;
    uow.commit().await?;
    Ok(products)
  }
}

fn validate_new_order(request: &NewOrder) -> EngineResult<()> {
  if request.items.is_empty() {
    return Err(EngineError::InvalidInput("an order needs at least one line item".to_string()));
  }
  let mut seen = HashSet::new();
  for item in &request.items {
    if item.quantity <= 0 {
      return Err(EngineError::InvalidInput(format!(
        "quantity for product #{} must be positive, got {}",
        item.product_id, item.quantity
      )));
    }
    if item.item_discount.is_sign_negative() {
      return Err(EngineError::InvalidInput(format!(
        "discount for product #{} must not be negative",
        item.product_id
      )));
    }
    if !seen.insert(item.product_id) {
      return Err(EngineError::InvalidInput(format!(
        "product #{} appears more than once",
        item.product_id
      )));
    }
  }
  if request.shipping_fee.is_some_and(|fee| fee.is_sign_negative()) {
    return Err(EngineError::InvalidInput("shipping fee must not be negative".to_string()));
  }
  if request.order_discount.is_some_and(|d| d.is_sign_negative()) {
    return Err(EngineError::InvalidInput("order discount must not be negative".to_string()));
  }
  Ok(())
}

/// `subtotal + shipping - discount`, floored at zero and rounded to currency precision.
pub fn order_total(subtotal: Decimal, shipping_fee: Decimal, order_discount: Decimal) -> Decimal {
  (subtotal + shipping_fee - order_discount).max(Decimal::ZERO).round_dp(2)
}
