// apps/order_service/src/db/rows.rs

//! Row shapes as stored, converted into engine models at the boundary.

use chrono::{DateTime, Utc};
use orderflow::{EngineError, Order, OrderLineItem, PaymentRecord, PaymentTransaction, ProductStock, TransactionStatus};
use rust_decimal::Decimal;

#[derive(Debug, sqlx::FromRow)]
pub(super) struct OrderRow {
  pub id: i64,
  pub placed_on: DateTime<Utc>,
  pub total_amount: Decimal,
  pub status: Option<String>,
  pub customer_id: i64,
  pub staff_id: Option<i64>,
  pub shipper_id: Option<i64>,
  pub discount_code: Option<String>,
  pub shipping_fee: Option<Decimal>,
}

impl From<OrderRow> for Order {
  fn from(row: OrderRow) -> Self {
    Order {
      id: row.id,
      placed_on: row.placed_on,
      total_amount: row.total_amount,
      status: row.status,
      customer_id: row.customer_id,
      staff_id: row.staff_id,
      shipper_id: row.shipper_id,
      discount_code: row.discount_code,
      shipping_fee: row.shipping_fee,
    }
  }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct LineRow {
  pub order_id: i64,
  pub product_id: i64,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub item_discount: Decimal,
}

impl From<LineRow> for OrderLineItem {
  fn from(row: LineRow) -> Self {
    OrderLineItem {
      order_id: row.order_id,
      product_id: row.product_id,
      quantity: row.quantity,
      unit_price: row.unit_price,
      item_discount: row.item_discount,
    }
  }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
  pub id: i64,
  pub name: String,
  pub price: Decimal,
  pub stock_quantity: i32,
  pub is_deleted: bool,
}

impl From<ProductRow> for ProductStock {
  fn from(row: ProductRow) -> Self {
    ProductStock {
      id: row.id,
      name: row.name,
      price: row.price,
      stock_quantity: row.stock_quantity,
      is_deleted: row.is_deleted,
    }
  }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct TransactionRow {
  pub id: String,
  pub order_id: i64,
  pub amount: Decimal,
  pub status: String,
  pub signature: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
  type Error = EngineError;

  fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
    let status: TransactionStatus = row.status.parse().map_err(|_| {
      EngineError::storage(anyhow::anyhow!(
        "payment transaction '{}' has unreadable status '{}'",
        row.id,
        row.status
      ))
    })?;
    Ok(PaymentTransaction {
      id: row.id,
      order_id: row.order_id,
      amount: row.amount,
      status,
      signature: row.signature,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct RecordRow {
  pub id: i64,
  pub order_id: i64,
  pub method: String,
  pub paid_on: DateTime<Utc>,
  pub amount: Decimal,
}

impl From<RecordRow> for PaymentRecord {
  fn from(row: RecordRow) -> Self {
    PaymentRecord {
      id: row.id,
      order_id: row.order_id,
      method: row.method,
      paid_on: row.paid_on,
      amount: row.amount,
    }
  }
}
