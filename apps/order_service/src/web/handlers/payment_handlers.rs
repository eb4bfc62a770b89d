// apps/order_service/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use crate::auth::Caller;
use crate::errors::AppError;
use crate::pipelines::contexts::{CreatePaymentCtxData, PaymentCallbackCtxData};
use crate::state::AppState;
use crate::web::handlers::visible_order;
use orderflow::{ContextData, OrderId, PipelineResult, Store};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentPayload {
  pub order_id: OrderId,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
  pub transaction_id: String,
  pub result: String,
  pub signature: String,
}

#[instrument(
  name = "handler::create_payment_transaction",
  skip(app_state, payload, caller),
  fields(order_id = payload.order_id, user_id = caller.user_id)
)]
pub async fn create_transaction_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  payload: web::Json<CreatePaymentPayload>,
  caller: Caller,
) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(CreatePaymentCtxData {
    app_state: app_state.get_ref().clone(),
    caller,
    order_id: payload.order_id,
    transaction: None,
    payment_url: None,
  });

  match app_state.workflows.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let guard = ctx.read();
      let txn = guard
        .transaction
        .as_ref()
        .ok_or_else(|| AppError::Internal("Payment creation completed, but the transaction is unavailable.".to_string()))?;
      let body = json!({
        "success": true,
        "transactionId": txn.transaction_id,
        "orderId": txn.order_id,
        "amount": txn.amount,
        "status": txn.status,
        "paymentUrl": guard.payment_url,
        "newlyCreated": txn.newly_created,
      });
      if txn.newly_created {
        Ok(HttpResponse::Created().json(body))
      } else {
        Ok(HttpResponse::Ok().json(body))
      }
    }
    Ok(PipelineResult::Stopped) => Err(AppError::PipelineHaltedByHandler),
    Err(app_err) => Err(app_err),
  }
}

/// Public: the payment page needs the signature to build its callback.
#[instrument(name = "handler::get_payment_transaction", skip(app_state), fields(transaction_id = %path))]
pub async fn get_transaction_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let txn = app_state.engine.get_transaction(&path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "transactionId": txn.id,
    "orderId": txn.order_id,
    "amount": txn.amount,
    "status": txn.status,
    "signature": txn.signature,
    "createdAt": txn.created_at,
    "updatedAt": txn.updated_at,
  })))
}

#[instrument(
  name = "handler::payment_callback",
  skip(app_state, payload),
  fields(transaction_id = %payload.transaction_id, result = %payload.result)
)]
pub async fn payment_callback_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  payload: web::Json<CallbackPayload>,
) -> Result<HttpResponse, AppError> {
  let CallbackPayload {
    transaction_id,
    result,
    signature,
  } = payload.into_inner();
  let ctx = ContextData::new(PaymentCallbackCtxData {
    app_state: app_state.get_ref().clone(),
    transaction_id,
    result_label: result,
    signature,
    result: None,
    outcome: None,
    redirect_url: None,
  });

  match app_state.workflows.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let guard = ctx.read();
      let outcome = guard
        .outcome
        .as_ref()
        .ok_or_else(|| AppError::Internal("Callback completed, but its outcome is unavailable.".to_string()))?;
      Ok(HttpResponse::Ok().json(json!({
        "success": outcome.succeeded(),
        "message": outcome.message,
        "transactionId": outcome.transaction_id,
        "orderId": outcome.order_id,
        "orderStatus": outcome.order_status,
        "transactionStatus": outcome.transaction_status,
        "redirectUrl": guard.redirect_url,
      })))
    }
    Ok(PipelineResult::Stopped) => Err(AppError::PipelineHaltedByHandler),
    Err(app_err) => {
      warn!(error = %app_err, "Payment callback rejected.");
      Err(app_err)
    }
  }
}

#[instrument(name = "handler::order_transactions", skip(app_state, caller), fields(order_id = %path))]
pub async fn order_transactions_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  path: web::Path<OrderId>,
  caller: Caller,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  visible_order(&app_state.engine, &caller, order_id).await?;
  let txns = app_state.engine.order_transactions(order_id).await?;
  // Signatures are only exposed through the single-transaction lookup.
  let items: Vec<_> = txns
    .iter()
    .map(|t| {
      json!({
        "transactionId": t.id,
        "amount": t.amount,
        "status": t.status,
        "createdAt": t.created_at,
        "updatedAt": t.updated_at,
      })
    })
    .collect();
  Ok(HttpResponse::Ok().json(json!({ "orderId": order_id, "transactions": items })))
}

#[instrument(name = "handler::order_payments", skip(app_state, caller), fields(order_id = %path))]
pub async fn order_payments_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  path: web::Path<OrderId>,
  caller: Caller,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  visible_order(&app_state.engine, &caller, order_id).await?;
  let records = app_state.engine.payment_history(order_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "orderId": order_id, "payments": records })))
}
