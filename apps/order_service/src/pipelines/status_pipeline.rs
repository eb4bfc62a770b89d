// apps/order_service/src/pipelines/status_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::contexts::StatusChangeCtxData;
use crate::state::AppState;
use orderflow::{ContextData, EngineError, Pipeline, PipelineControl, StatusValue, Store, Workflows};
use tracing::{info, warn};

pub fn register_status_change_pipeline<S: Store>(
  workflows: &Workflows<AppError>,
  _app_state: &AppState<S>,
) -> Result<(), AppError> {
  let mut p = Pipeline::<StatusChangeCtxData<S>, AppError>::new(&[
    ("authorize_staff", false, None),
    ("normalize_status", false, None),
    ("apply_status_change", false, None),
  ]);

  p.on_root("authorize_staff", |ctx_data: ContextData<StatusChangeCtxData<S>>| {
    Box::pin(async move {
      let caller = ctx_data.read().caller.clone();
      caller.require_staff("change order status")?;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  // Rejects unknown labels before a database transaction is opened and
  // rewrites localized labels to their canonical name.
  p.on_root("normalize_status", |ctx_data: ContextData<StatusChangeCtxData<S>>| {
    Box::pin(async move {
      let requested = ctx_data.read().requested_status.clone();
      match StatusValue::parse(&requested) {
        StatusValue::Known(status) => {
          ctx_data.write().requested_status = status.as_str().to_string();
          Ok::<_, AppError>(PipelineControl::Continue)
        }
        StatusValue::Unrecognized(label) => {
          warn!(label = %label, "Status change rejected: unknown status label.");
          Err(EngineError::UnknownStatus(label).into())
        }
      }
    })
  })?;

  p.on_root("apply_status_change", |ctx_data: ContextData<StatusChangeCtxData<S>>| {
    Box::pin(async move {
      let (engine, order_id, requested, user_id) = {
        let guard = ctx_data.read();
        (
          guard.app_state.engine.clone(),
          guard.order_id,
          guard.requested_status.clone(),
          guard.caller.user_id,
        )
      };

      let change = engine.change_status(order_id, &requested).await?;
      info!(
        order_id,
        changed_by = user_id,
        old_status = ?change.old_status,
        new_status = %change.new_status,
        action = %change.action,
        "Status change applied."
      );
      ctx_data.write().change = Some(change);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  workflows.register(p);
  Ok(())
}
