// apps/order_service/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use orderflow::{EngineError, ErrorKind, WorkflowError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Engine(#[from] EngineError),

  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: WorkflowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),

  #[error("Pipeline execution was halted by a handler.")]
  PipelineHaltedByHandler,
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl AppError {
  /// Stable machine-readable code for the response body.
  pub fn code(&self) -> &'static str {
    match self {
      AppError::Engine(e) => e.code(),
      AppError::Validation(_) => "INVALID_INPUT",
      AppError::Auth(_) => "UNAUTHENTICATED",
      AppError::Forbidden(_) => "FORBIDDEN",
      AppError::PipelineHaltedByHandler => "HALTED",
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Migration(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        "INTERNAL"
      }
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Engine(e) => match e.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      },
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::PipelineHaltedByHandler => StatusCode::CONFLICT,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Migration(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Responding with error");
    }

    let mut body = json!({ "success": false, "code": self.code() });
    match self {
      // Infrastructure details stay in the logs.
      AppError::Sqlx(_) | AppError::Migration(_) => body["error"] = json!("Database operation failed"),
      AppError::Engine(EngineError::Storage { .. }) => body["error"] = json!("Storage operation failed"),
      AppError::Config(_) => body["error"] = json!("Configuration issue"),
      AppError::Workflow { .. } => body["error"] = json!("Workflow processing error"),
      AppError::Internal(m) => {
        body["error"] = json!("An internal error occurred");
        body["detail"] = json!(m);
      }
      AppError::PipelineHaltedByHandler => body["error"] = json!("Process halted as expected by business logic."),
      AppError::Engine(EngineError::InsufficientStock { order_id, shortfalls }) => {
        body["error"] = json!(self.to_string());
        body["orderId"] = json!(order_id);
        body["shortfalls"] = json!(shortfalls);
      }
      AppError::Engine(EngineError::AlreadyProcessed { transaction_id, status }) => {
        body["error"] = json!(self.to_string());
        body["transactionId"] = json!(transaction_id);
        body["transactionStatus"] = json!(status);
      }
      other => body["error"] = json!(other.to_string()),
    }
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;
  use orderflow::{Shortfall, TransactionStatus};

  async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
    let resp = err.error_response();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body()).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[actix_web::test]
  async fn engine_errors_map_to_statuses() {
    assert_eq!(AppError::from(EngineError::OrderNotFound(1)).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
      AppError::from(EngineError::UnknownStatus("x".into())).status_code(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      AppError::from(EngineError::AlreadyPaid { order_id: 1 }).status_code(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      AppError::from(EngineError::InvalidSignature {
        transaction_id: "t".into()
      })
      .status_code(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(AppError::Forbidden("no".into()).status_code(), StatusCode::FORBIDDEN);
    assert_eq!(
      AppError::from(EngineError::Conflict("open transaction".into())).status_code(),
      StatusCode::CONFLICT
    );
  }

  #[actix_web::test]
  async fn insufficient_stock_body_lists_shortfalls() {
    let (status, body) = body_of(AppError::from(EngineError::InsufficientStock {
      order_id: Some(5),
      shortfalls: vec![Shortfall {
        product_id: 2,
        name: "Quan jean".into(),
        available: 1,
        required: 3,
        shortfall: 2,
      }],
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["orderId"], 5);
    assert_eq!(body["shortfalls"][0]["productId"], 2);
    assert_eq!(body["shortfalls"][0]["shortfall"], 2);
  }

  #[actix_web::test]
  async fn already_processed_reports_current_status() {
    let (_, body) = body_of(AppError::from(EngineError::AlreadyProcessed {
      transaction_id: "TXN_1".into(),
      status: TransactionStatus::Success,
    }))
    .await;
    assert_eq!(body["transactionStatus"], "SUCCESS");
    assert_eq!(body["success"], false);
  }

  #[actix_web::test]
  async fn storage_details_are_not_leaked() {
    let (status, body) = body_of(AppError::from(EngineError::storage(anyhow::anyhow!("connection reset by peer")))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.to_string().contains("connection reset"));
  }
}
