// apps/order_service/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::auth::Caller;
use crate::errors::AppError;
use crate::pipelines::contexts::{PlaceOrderCtxData, StatusChangeCtxData};
use crate::state::AppState;
use crate::web::handlers::visible_order;
use orderflow::{ContextData, InventoryAction, NewOrder, OrderId, PipelineResult, StatusChange, Store};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusPayload {
  pub new_status: String,
}

fn status_message(change: &StatusChange) -> String {
  let old = change.old_status.as_deref().unwrap_or("(none)");
  match change.action {
    InventoryAction::None => format!("Order status changed from {} to {}.", old, change.new_status),
    action => format!(
      "Order status changed from {} to {}; inventory {} applied to {} product(s).",
      old,
      change.new_status,
      action,
      change.stock_changes.len()
    ),
  }
}

#[instrument(
  name = "handler::change_order_status",
  skip(app_state, payload, caller),
  fields(order_id = %path, user_id = caller.user_id, new_status = %payload.new_status)
)]
pub async fn change_status_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  path: web::Path<OrderId>,
  payload: web::Json<ChangeStatusPayload>,
  caller: Caller,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let ctx = ContextData::new(StatusChangeCtxData {
    app_state: app_state.get_ref().clone(),
    caller,
    order_id,
    requested_status: payload.into_inner().new_status,
    change: None,
  });

  match app_state.workflows.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let guard = ctx.read();
      let change = guard
        .change
        .as_ref()
        .ok_or_else(|| AppError::Internal("Status change completed, but its result is unavailable.".to_string()))?;
      Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "orderId": change.order_id,
        "oldStatus": change.old_status,
        "newStatus": change.new_status,
        "action": change.action,
        "inventoryUpdated": change.inventory_updated,
        "stockChanges": change.stock_changes,
        "message": status_message(change),
      })))
    }
    Ok(PipelineResult::Stopped) => {
      warn!(order_id, "Status change workflow was stopped by a handler.");
      Err(AppError::PipelineHaltedByHandler)
    }
    Err(app_err) => Err(app_err),
  }
}

#[instrument(name = "handler::place_order", skip(app_state, payload, caller), fields(user_id = caller.user_id))]
pub async fn place_order_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  payload: web::Json<NewOrder>,
  caller: Caller,
) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(PlaceOrderCtxData {
    app_state: app_state.get_ref().clone(),
    caller,
    request: payload.into_inner(),
    placed: None,
  });

  match app_state.workflows.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let guard = ctx.read();
      let placed = guard
        .placed
        .as_ref()
        .ok_or_else(|| AppError::Internal("Order placement completed, but the order is unavailable.".to_string()))?;
      info!(order_id = placed.order.id, "Order created.");
      Ok(HttpResponse::Created().json(json!({
        "success": true,
        "order": placed.order,
        "items": placed.items,
        "action": placed.action,
        "stockChanges": placed.stock_changes,
      })))
    }
    Ok(PipelineResult::Stopped) => Err(AppError::PipelineHaltedByHandler),
    Err(app_err) => Err(app_err),
  }
}

#[instrument(name = "handler::get_order", skip(app_state, caller), fields(order_id = %path))]
pub async fn get_order_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  path: web::Path<OrderId>,
  caller: Caller,
) -> Result<HttpResponse, AppError> {
  let snapshot = visible_order(&app_state.engine, &caller, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(snapshot))
}
