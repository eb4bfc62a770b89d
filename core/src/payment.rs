// orderflow/src/payment.rs

//! Locked-amount payment transactions and their signed settlement callbacks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::engine::OrderEngine;
use crate::error::{EngineError, EngineResult};
use crate::inventory::{self, StockChange};
use crate::model::{NewPaymentRecord, OrderId, PaymentRecord, PaymentTransaction, TransactionStatus};
use crate::signature::canonical_amount;
use crate::status::{resolve, InventoryAction, OrderStatus, StatusValue};
use crate::store::{Store, UnitOfWork};

/// `TXN_{yyyyMMddHHmmss}_{8 hex chars}`: sortable by creation time, with a
/// random suffix against collisions within the same second.
pub fn mint_transaction_id(at: DateTime<Utc>) -> String {
  let suffix = Uuid::new_v4().simple().to_string();
  format!("TXN_{}_{}", at.format("%Y%m%d%H%M%S"), suffix[..8].to_uppercase())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRef {
  pub transaction_id: String,
  pub order_id: OrderId,
  pub amount: Decimal,
  pub status: TransactionStatus,
  pub payment_url: String,
  /// `false` when an open transaction was returned instead of minting one.
  #[serde(skip)]
  pub newly_created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
  Success,
  Failed,
  Canceled,
}

impl CallbackResult {
  pub fn transaction_status(&self) -> TransactionStatus {
    match self {
      CallbackResult::Success => TransactionStatus::Success,
      CallbackResult::Failed => TransactionStatus::Failed,
      CallbackResult::Canceled => TransactionStatus::Canceled,
    }
  }
}

impl FromStr for CallbackResult {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "SUCCESS" => Ok(CallbackResult::Success),
      "FAILED" => Ok(CallbackResult::Failed),
      "CANCELED" | "CANCELLED" => Ok(CallbackResult::Canceled),
      other => Err(EngineError::InvalidInput(format!(
        "callback result must be SUCCESS, FAILED or CANCELED, got '{}'",
        other
      ))),
    }
  }
}

impl fmt::Display for CallbackResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.transaction_status().as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackOutcome {
  pub transaction_id: String,
  pub order_id: OrderId,
  pub amount: Decimal,
  pub transaction_status: TransactionStatus,
  pub order_status: Option<String>,
  pub action: InventoryAction,
  pub stock_changes: Vec<StockChange>,
  pub payment_record: Option<PaymentRecord>,
  pub message: String,
}

impl CallbackOutcome {
  pub fn succeeded(&self) -> bool {
    self.transaction_status == TransactionStatus::Success
  }

  /// Relative reference of the result page the payer should land on.
  pub fn redirect_reference(&self) -> String {
    if self.succeeded() {
      format!(
        "/payment/success?transactionId={}&orderId={}&amount={}",
        self.transaction_id,
        self.order_id,
        canonical_amount(self.amount)
      )
    } else {
      let error = match self.transaction_status {
        TransactionStatus::Canceled => "payment_canceled",
        _ => "payment_failed",
      };
      format!("/payment/failed?error={}&orderId={}", error, self.order_id)
    }
  }
}

impl<S: Store> OrderEngine<S> {
  /// Returns the open transaction of the order, or mints one whose amount is
  /// locked to the order total at this instant.
  #[instrument(name = "OrderEngine::create_transaction", skip(self), err(Display))]
  pub async fn create_transaction(&self, order_id: OrderId) -> EngineResult<TransactionRef> {
    let mut uow = self.store.begin().await?;
    let order = uow
      .lock_order(order_id)
      .await?
      .ok_or(EngineError::OrderNotFound(order_id))?;

    if let Some(status) = order.status_value().and_then(|s| s.known()) {
      if status.holds_stock() {
        return Err(EngineError::AlreadyPaid { order_id });
      }
      if matches!(status, OrderStatus::Cancelled | OrderStatus::Returned) {
        return Err(EngineError::InvalidInput(format!(
          "order #{} is {} and cannot be paid",
          order_id, status
        )));
      }
    }

    let history = uow.order_transactions(order_id).await?;
    if history.iter().any(|t| t.status == TransactionStatus::Success) {
      return Err(EngineError::AlreadyPaid { order_id });
    }

    if let Some(open) = history.into_iter().find(|t| t.status == TransactionStatus::Created) {
      info!(transaction_id = %open.id, "Returning open payment transaction.");
      uow.commit().await?;
      return Ok(self.transaction_ref(open, false));
    }

    let amount = order.total_amount;
    if amount <= Decimal::ZERO {
      return Err(EngineError::InvalidInput(format!(
        "order #{} has no payable amount ({})",
        order_id, amount
      )));
    }

    let now = Utc::now();
    let id = mint_transaction_id(now);
    let txn = PaymentTransaction {
      signature: self.signer.sign(&id, amount),
      id,
      order_id,
      amount,
      status: TransactionStatus::Created,
      created_at: now,
      updated_at: now,
    };

    match uow.insert_transaction(&txn).await {
      Ok(()) => {}
      Err(EngineError::Conflict(reason)) => {
        // Lost a race with a concurrent creation for the same order.
        warn!(%reason, "Open transaction appeared concurrently, re-reading.");
        drop(uow);
        let mut retry = self.store.begin().await?;
        let open = retry
          .open_transaction(order_id)
          .await?
          .ok_or(EngineError::Conflict(reason))?;
        retry.commit().await?;
        return Ok(self.transaction_ref(open, false));
      }
      Err(other) => return Err(other),
    }
    uow.commit().await?;

    info!(transaction_id = %txn.id, amount = %amount, "Payment transaction created.");
    Ok(self.transaction_ref(txn, true))
  }

  fn transaction_ref(&self, txn: PaymentTransaction, newly_created: bool) -> TransactionRef {
    TransactionRef {
      payment_url: self.config.payment_reference(&txn.id),
      transaction_id: txn.id,
      order_id: txn.order_id,
      amount: txn.amount,
      status: txn.status,
      newly_created,
    }
  }

  /// Snapshot including the signature; needs no caller identity.
  #[instrument(name = "OrderEngine::get_transaction", skip(self), err(Display))]
  pub async fn get_transaction(&self, transaction_id: &str) -> EngineResult<PaymentTransaction> {
    let mut uow = self.store.begin().await?;
    let txn = uow
      .transaction(transaction_id)
      .await?
      .ok_or_else(|| EngineError::TransactionNotFound(transaction_id.to_string()))?;
    uow.commit().await?;
    Ok(txn)
  }

  /// Settles a transaction exactly once.
  ///
  /// Checks run in this order: unknown id, already settled, bad signature. On
  /// success the transaction, the order status (with its stock action) and the
  /// ledger row are written in one unit of work. Failed and canceled results
  /// only close the transaction.
  #[instrument(name = "OrderEngine::handle_callback", skip(self, signature), err(Display))]
  pub async fn handle_callback(
    &self,
    transaction_id: &str,
    result: CallbackResult,
    signature: &str,
  ) -> EngineResult<CallbackOutcome> {
    let mut uow = self.store.begin().await?;
    let txn = uow
      .lock_transaction(transaction_id)
      .await?
      .ok_or_else(|| EngineError::TransactionNotFound(transaction_id.to_string()))?;

    if txn.status != TransactionStatus::Created {
      return Err(EngineError::AlreadyProcessed {
        transaction_id: txn.id,
        status: txn.status,
      });
    }

    if !self.signer.verify(&txn.id, txn.amount, signature) {
      warn!(transaction_id = %txn.id, "Callback signature mismatch, transaction left untouched.");
      return Err(EngineError::InvalidSignature { transaction_id: txn.id });
    }

    let order = uow
      .lock_order(txn.order_id)
      .await?
      .ok_or(EngineError::OrderNotFound(txn.order_id))?;

    let now = Utc::now();
    let target = result.transaction_status();
    let mut action = InventoryAction::None;
    let mut stock_changes = Vec::new();
    let mut payment_record = None;
    let mut order_status = order.status.clone();

    if result == CallbackResult::Success {
      let previous = order.status_value();
      // An order already past payment keeps its status.
      let already_settled = previous.as_ref().and_then(StatusValue::known).is_some_and(|s| s.holds_stock());
      if !already_settled {
        let next = StatusValue::Known(self.config.paid_status);
        action = resolve(previous.as_ref(), &next);
        stock_changes = inventory::apply(&mut uow, order.id, action).await?;
        uow.set_order_status(order.id, next.as_str()).await?;
        order_status = Some(next.to_string());
      }
    }

    if !uow.finalize_transaction(&txn.id, target, now).await? {
      return Err(EngineError::AlreadyProcessed {
        transaction_id: txn.id,
        status: target,
      });
    }

    if result == CallbackResult::Success {
      let record = uow
        .append_payment_record(&NewPaymentRecord {
          order_id: order.id,
          method: self.config.payment_method.clone(),
          paid_on: now,
          amount: txn.amount,
        })
        .await?;
      payment_record = Some(record);
    }

    uow.commit().await?;

    let message = match result {
      CallbackResult::Success => "Payment completed.".to_string(),
      CallbackResult::Failed => "Payment failed; the order is still awaiting payment.".to_string(),
      CallbackResult::Canceled => "Payment was canceled; the order is still awaiting payment.".to_string(),
    };
    info!(
      transaction_id = %txn.id,
      order_id = order.id,
      result = %result,
      order_status = ?order_status,
      action = %action,
      "Payment callback settled."
    );

    Ok(CallbackOutcome {
      transaction_id: txn.id,
      order_id: order.id,
      amount: txn.amount,
      transaction_status: target,
      order_status,
      action,
      stock_changes,
      payment_record,
      message,
    })
  }

  /// All transactions of an order, newest first.
  #[instrument(name = "OrderEngine::order_transactions", skip(self), err(Display))]
  pub async fn order_transactions(&self, order_id: OrderId) -> EngineResult<Vec<PaymentTransaction>> {
    let mut uow = self.store.begin().await?;
    uow.order(order_id).await?.ok_or(EngineError::OrderNotFound(order_id))?;
    let txns = uow.order_transactions(order_id).await?;
    uow.commit().await?;
    Ok(txns)
  }

  #[instrument(name = "OrderEngine::payment_history", skip(self), err(Display))]
  pub async fn payment_history(&self, order_id: OrderId) -> EngineResult<Vec<PaymentRecord>> {
    let mut uow = self.store.begin().await?;
    uow.order(order_id).await?.ok_or(EngineError::OrderNotFound(order_id))?;
    let records = uow.payment_records(order_id).await?;
    uow.commit().await?;
    Ok(records)
  }
}
