// orderflow/src/config.rs

use crate::error::{EngineError, EngineResult};
use crate::status::{resolve, OrderStatus, StatusValue};

/// Engine-level knobs. The service crate builds this from its environment
/// configuration; tests use `EngineConfig::default()`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub signing_secret: String,
  /// Status an order moves to when its payment settles successfully.
  pub paid_status: OrderStatus,
  /// Method label written to the payment ledger for settled transactions.
  pub payment_method: String,
  /// Whether an order may be created directly in `Confirmed`, skipping `Pending`.
  pub allow_direct_confirm: bool,
  pub low_stock_threshold: i32,
  /// Prefix of the payment page reference returned on transaction creation.
  pub payment_page_path: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      signing_secret: "orderflow-dev-secret".to_string(),
      paid_status: OrderStatus::Confirmed,
      payment_method: "QR_PAYMENT".to_string(),
      allow_direct_confirm: true,
      low_stock_threshold: 10,
      payment_page_path: "/mock-pay".to_string(),
    }
  }
}

impl EngineConfig {
  /// A settled payment must leave the order holding its stock, so the paid
  /// status has to deduct when reached from `Pending`.
  pub fn validate(&self) -> EngineResult<()> {
    let pending = StatusValue::Known(OrderStatus::Pending);
    let paid = StatusValue::Known(self.paid_status);
    if !resolve(Some(&pending), &paid).deducts() {
      return Err(EngineError::InvalidInput(format!(
        "paid status {} does not deduct stock from a pending order",
        self.paid_status
      )));
    }
    Ok(())
  }

  pub fn payment_reference(&self, transaction_id: &str) -> String {
    format!("{}/{}", self.payment_page_path.trim_end_matches('/'), transaction_id)
  }
}
