// orderflow/src/model.rs

//! Persisted entities the engine reads and writes, plus the request shapes used
//! to create them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::status::StatusValue;

pub type OrderId = i64;
pub type ProductId = i64;

/// Order header. `total_amount` is authoritative once written and is never
/// recomputed from the line items on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: OrderId,
  pub placed_on: DateTime<Utc>,
  pub total_amount: Decimal,
  /// Stored label. Legacy rows may carry localized labels; the engine only
  /// ever writes canonical names.
  pub status: Option<String>,
  pub customer_id: i64,
  pub staff_id: Option<i64>,
  pub shipper_id: Option<i64>,
  pub discount_code: Option<String>,
  pub shipping_fee: Option<Decimal>,
}

impl Order {
  pub fn status_value(&self) -> Option<StatusValue> {
    self.status.as_deref().map(StatusValue::parse)
  }
}

/// Header fields of an order about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
  pub placed_on: DateTime<Utc>,
  pub total_amount: Decimal,
  pub status: Option<String>,
  pub customer_id: i64,
  pub staff_id: Option<i64>,
  pub shipper_id: Option<i64>,
  pub discount_code: Option<String>,
  pub shipping_fee: Option<Decimal>,
}

impl OrderDraft {
  pub fn into_order(self, id: OrderId) -> Order {
    Order {
      id,
      placed_on: self.placed_on,
      total_amount: self.total_amount,
      status: self.status,
      customer_id: self.customer_id,
      staff_id: self.staff_id,
      shipper_id: self.shipper_id,
      discount_code: self.discount_code,
      shipping_fee: self.shipping_fee,
    }
  }
}

/// Identity is `(order_id, product_id)`. `unit_price` is the catalog price
/// captured when the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
  pub order_id: OrderId,
  pub product_id: ProductId,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub item_discount: Decimal,
}

impl OrderLineItem {
  pub fn line_total(&self) -> Decimal {
    (self.unit_price - self.item_discount) * Decimal::from(self.quantity)
  }
}

/// The slice of a catalog product this engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStock {
  pub id: ProductId,
  pub name: String,
  pub price: Decimal,
  pub stock_quantity: i32,
  pub is_deleted: bool,
}

/// A requested quantity of a product, used for availability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRequest {
  pub product_id: ProductId,
  pub quantity: i32,
}

impl From<&OrderLineItem> for StockRequest {
  fn from(item: &OrderLineItem) -> Self {
    StockRequest {
      product_id: item.product_id,
      quantity: item.quantity,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortfall {
  pub product_id: ProductId,
  pub name: String,
  pub available: i32,
  pub required: i32,
  pub shortfall: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
  pub available: bool,
  pub shortfalls: Vec<Shortfall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
  Created,
  Success,
  Failed,
  Canceled,
}

impl TransactionStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      TransactionStatus::Created => "CREATED",
      TransactionStatus::Success => "SUCCESS",
      TransactionStatus::Failed => "FAILED",
      TransactionStatus::Canceled => "CANCELED",
    }
  }

  pub fn is_terminal(&self) -> bool {
    !matches!(self, TransactionStatus::Created)
  }
}

impl fmt::Display for TransactionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TransactionStatus {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "CREATED" => Ok(TransactionStatus::Created),
      "SUCCESS" => Ok(TransactionStatus::Success),
      "FAILED" => Ok(TransactionStatus::Failed),
      "CANCELED" | "CANCELLED" => Ok(TransactionStatus::Canceled),
      other => Err(EngineError::InvalidInput(format!("unknown transaction status '{}'", other))),
    }
  }
}

/// Payment transaction. `amount` is locked at creation; once `status` leaves
/// `Created` the row is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
  pub id: String,
  pub order_id: OrderId,
  pub amount: Decimal,
  pub status: TransactionStatus,
  pub signature: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Append-only ledger row written when a transaction settles successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
  pub id: i64,
  pub order_id: OrderId,
  pub method: String,
  pub paid_on: DateTime<Utc>,
  pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentRecord {
  pub order_id: OrderId,
  pub method: String,
  pub paid_on: DateTime<Utc>,
  pub amount: Decimal,
}

// --- Order placement input ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
  pub product_id: ProductId,
  pub quantity: i32,
  #[serde(default)]
  pub item_discount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
  /// Zero when omitted; the service fills it from the caller for customers.
  #[serde(default)]
  pub customer_id: i64,
  #[serde(default)]
  pub staff_id: Option<i64>,
  #[serde(default)]
  pub shipper_id: Option<i64>,
  #[serde(default)]
  pub discount_code: Option<String>,
  #[serde(default)]
  pub shipping_fee: Option<Decimal>,
  /// Order-level discount computed by the pricing collaborator.
  #[serde(default)]
  pub order_discount: Option<Decimal>,
  /// Defaults to `Pending` when absent.
  #[serde(default)]
  pub initial_status: Option<String>,
  pub items: Vec<NewLineItem>,
}
