// apps/order_service/src/pipelines/placement_pipeline.rs

use crate::auth::Role;
use crate::errors::AppError;
use crate::pipelines::contexts::PlaceOrderCtxData;
use crate::state::AppState;
use orderflow::{ContextData, Pipeline, PipelineControl, Store, Workflows};
use tracing::info;

pub fn register_place_order_pipeline<S: Store>(
  workflows: &Workflows<AppError>,
  _app_state: &AppState<S>,
) -> Result<(), AppError> {
  let mut p = Pipeline::<PlaceOrderCtxData<S>, AppError>::new(&[
    ("resolve_parties", false, None),
    ("place_order", false, None),
  ]);

  // Customers always order for themselves. Staff may order on behalf of a
  // customer and are recorded as the handling employee.
  p.on_root("resolve_parties", |ctx_data: ContextData<PlaceOrderCtxData<S>>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let caller = guard.caller.clone();
      if caller.role == Role::Customer {
        if guard.request.customer_id != 0 && guard.request.customer_id != caller.user_id {
          return Err(AppError::Forbidden("customers may only place their own orders".to_string()));
        }
        guard.request.customer_id = caller.user_id;
        if guard.request.initial_status.is_some() {
          return Err(AppError::Forbidden("customers may not choose the initial order status".to_string()));
        }
      } else {
        if guard.request.customer_id <= 0 {
          return Err(AppError::Validation("customerId is required when ordering on behalf of a customer".to_string()));
        }
        guard.request.staff_id.get_or_insert(caller.user_id);
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  p.on_root("place_order", |ctx_data: ContextData<PlaceOrderCtxData<S>>| {
    Box::pin(async move {
      let (engine, request) = {
        let guard = ctx_data.read();
        (guard.app_state.engine.clone(), guard.request.clone())
      };
      let placed = engine.place_order(request).await?;
      info!(order_id = placed.order.id, total = %placed.order.total_amount, "Order placed through API.");
      ctx_data.write().placed = Some(placed);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  })?;

  workflows.register(p);
  Ok(())
}
