// orderflow/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::model::{OrderId, ProductId, Shortfall, TransactionStatus};

/// Coarse classification of an [`EngineError`], used by presentation layers to
/// pick a response status without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  InvalidInput,
  Conflict,
  Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("Order #{0} not found")]
  OrderNotFound(OrderId),

  #[error("Payment transaction '{0}' not found")]
  TransactionNotFound(String),

  #[error("Product #{0} not found")]
  ProductNotFound(ProductId),

  #[error("Order #{0} has no line items")]
  NoLineItems(OrderId),

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Unknown order status '{0}'")]
  UnknownStatus(String),

  #[error("Transition from '{from}' to '{to}' is not allowed")]
  TransitionNotAllowed { from: String, to: String },

  #[error("Insufficient stock for {} product(s)", shortfalls.len())]
  InsufficientStock {
    order_id: Option<OrderId>,
    shortfalls: Vec<Shortfall>,
  },

  #[error("Order #{order_id} has already been paid")]
  AlreadyPaid { order_id: OrderId },

  #[error("Payment transaction '{transaction_id}' was already processed (status {status})")]
  AlreadyProcessed {
    transaction_id: String,
    status: TransactionStatus,
  },

  #[error("Signature verification failed for payment transaction '{transaction_id}'")]
  InvalidSignature { transaction_id: String },

  #[error("Conflicting write: {0}")]
  Conflict(String),

  #[error("Storage failure: {source}")]
  Storage {
    #[source]
    source: AnyhowError,
  },
}

impl EngineError {
  /// Wraps an infrastructure failure. These are the only errors that abort a
  /// request as unrecoverable; everything else is a business-rule outcome.
  pub fn storage(err: impl Into<AnyhowError>) -> Self {
    EngineError::Storage { source: err.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      EngineError::OrderNotFound(_) | EngineError::TransactionNotFound(_) | EngineError::ProductNotFound(_) => {
        ErrorKind::NotFound
      }
      EngineError::NoLineItems(_)
      | EngineError::InvalidInput(_)
      | EngineError::UnknownStatus(_)
      | EngineError::TransitionNotAllowed { .. }
      | EngineError::InsufficientStock { .. }
      | EngineError::AlreadyPaid { .. }
      | EngineError::AlreadyProcessed { .. }
      | EngineError::InvalidSignature { .. } => ErrorKind::InvalidInput,
      EngineError::Conflict(_) => ErrorKind::Conflict,
      EngineError::Storage { .. } => ErrorKind::Internal,
    }
  }

  /// Short machine-readable code, stable across releases.
  pub fn code(&self) -> &'static str {
    match self {
      EngineError::OrderNotFound(_) => "ORDER_NOT_FOUND",
      EngineError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
      EngineError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
      EngineError::NoLineItems(_) => "NO_LINE_ITEMS",
      EngineError::InvalidInput(_) => "INVALID_INPUT",
      EngineError::UnknownStatus(_) => "UNKNOWN_STATUS",
      EngineError::TransitionNotAllowed { .. } => "TRANSITION_NOT_ALLOWED",
      EngineError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
      EngineError::AlreadyPaid { .. } => "ALREADY_PAID",
      EngineError::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
      EngineError::InvalidSignature { .. } => "INVALID_SIGNATURE",
      EngineError::Conflict(_) => "CONFLICT",
      EngineError::Storage { .. } => "STORAGE_FAILURE",
    }
  }
}

pub type EngineResult<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn business_failures_are_not_internal() {
    let err = EngineError::InsufficientStock {
      order_id: Some(3),
      shortfalls: vec![],
    };
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(EngineError::OrderNotFound(1).kind(), ErrorKind::NotFound);
    assert_eq!(
      EngineError::storage(anyhow::anyhow!("connection reset")).kind(),
      ErrorKind::Internal
    );
  }

  #[test]
  fn already_processed_and_forged_are_distinct() {
    let processed = EngineError::AlreadyProcessed {
      transaction_id: "TXN_1".into(),
      status: TransactionStatus::Success,
    };
    let forged = EngineError::InvalidSignature {
      transaction_id: "TXN_1".into(),
    };
    assert_ne!(processed.code(), forged.code());
    assert!(processed.to_string().contains("SUCCESS"));
  }
}
