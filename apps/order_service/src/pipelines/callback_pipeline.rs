// apps/order_service/src/pipelines/callback_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::contexts::PaymentCallbackCtxData;
use crate::state::AppState;
use orderflow::{CallbackResult, ContextData, Pipeline, PipelineControl, Store, Workflows};
use tracing::info;

pub fn register_payment_callback_pipeline<S: Store>(
  workflows: &Workflows<AppError>,
  _app_state: &AppState<S>,
) -> Result<(), AppError> {
  let mut p = Pipeline::<PaymentCallbackCtxData<S>, AppError>::new(&[
    ("parse_callback", false, None),
    ("settle_transaction", false, None),
    ("build_redirect", false, None),
  ]);

  p.on_root("parse_callback", |ctx_data: ContextData<PaymentCallbackCtxData<S>>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      if guard.transaction_id.trim().is_empty() {
        return Err(AppError::Validation("transactionId is required".to_string()));
      }
      if guard.signature.trim().is_empty() {
        return Err(AppError::Validation("signature is required".to_string()));
      }
      let result: CallbackResult = guard.result_label.parse()?;
      guard.result = Some(result);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  p.on_root("settle_transaction", |ctx_data: ContextData<PaymentCallbackCtxData<S>>| {
    Box::pin(async move {
      let (engine, transaction_id, result, signature) = {
        let guard = ctx_data.read();
        (
          guard.app_state.engine.clone(),
          guard.transaction_id.clone(),
          guard.result,
          guard.signature.clone(),
        )
      };
      let result = result.ok_or_else(|| AppError::Internal("callback result was not parsed".to_string()))?;
      let outcome = engine.handle_callback(&transaction_id, result, &signature).await?;
      info!(
        transaction_id = %outcome.transaction_id,
        order_id = outcome.order_id,
        transaction_status = %outcome.transaction_status,
        "Payment callback processed."
      );
      ctx_data.write().outcome = Some(outcome);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  p.on_root("build_redirect", |ctx_data: ContextData<PaymentCallbackCtxData<S>>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let reference = guard
        .outcome
        .as_ref()
        .map(|o| o.redirect_reference())
        .ok_or_else(|| AppError::Internal("callback outcome missing after settlement step".to_string()))?;
      let absolute = guard.app_state.config.absolute_url(&reference);
      guard.redirect_url = Some(absolute);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  workflows.register(p);
  Ok(())
}
