// apps/order_service/src/pipelines/payment_pipeline.rs

use crate::auth::Role;
use crate::errors::AppError;
use crate::pipelines::contexts::CreatePaymentCtxData;
use crate::state::AppState;
use orderflow::{ContextData, EngineError, Pipeline, PipelineControl, Store, Workflows};
use tracing::{info, warn};

pub fn register_create_payment_pipeline<S: Store>(
  workflows: &Workflows<AppError>,
  _app_state: &AppState<S>,
) -> Result<(), AppError> {
  let mut p = Pipeline::<CreatePaymentCtxData<S>, AppError>::new(&[
    ("authorize_payer", false, None),
    ("create_transaction", false, None),
    ("build_payment_url", false, None),
  ]);

  // A customer may only pay for their own order; staff may open a payment for any.
  p.on_root("authorize_payer", |ctx_data: ContextData<CreatePaymentCtxData<S>>| {
    Box::pin(async move {
      let (engine, caller, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.engine.clone(), guard.caller.clone(), guard.order_id)
      };
      if caller.role != Role::Customer {
        return Ok(PipelineControl::Continue);
      }
      let snapshot = engine.order_snapshot(order_id).await?;
      if snapshot.order.customer_id != caller.user_id {
        warn!(order_id, user_id = caller.user_id, "Payment attempt on another customer's order.");
        // Same answer as a missing order, so ids cannot be probed.
        return Err(AppError::from(EngineError::OrderNotFound(order_id)));
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  p.on_root("create_transaction", |ctx_data: ContextData<CreatePaymentCtxData<S>>| {
    Box::pin(async move {
      let (engine, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.engine.clone(), guard.order_id)
      };
      let txn = engine.create_transaction(order_id).await?;
      info!(
        order_id,
        transaction_id = %txn.transaction_id,
        newly_created = txn.newly_created,
        "Payment transaction ready."
      );
      ctx_data.write().transaction = Some(txn);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  p.on_root("build_payment_url", |ctx_data: ContextData<CreatePaymentCtxData<S>>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let reference = guard
        .transaction
        .as_ref()
        .map(|t| t.payment_url.clone())
        .ok_or_else(|| AppError::Internal("payment transaction missing after creation step".to_string()))?;
      let absolute = guard.app_state.config.absolute_url(&reference);
      guard.payment_url = Some(absolute);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  workflows.register(p);
  Ok(())
}
