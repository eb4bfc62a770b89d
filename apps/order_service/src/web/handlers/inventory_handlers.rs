// apps/order_service/src/web/handlers/inventory_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::auth::{Caller, Role};
use crate::errors::AppError;
use crate::state::AppState;
use orderflow::{OrderId, Store};

#[derive(Deserialize, Debug)]
pub struct LowStockQuery {
  pub threshold: Option<i32>,
}

#[instrument(name = "handler::check_order_inventory", skip(app_state, caller), fields(order_id = %path))]
pub async fn check_order_inventory_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  path: web::Path<OrderId>,
  caller: Caller,
) -> Result<HttpResponse, AppError> {
  caller.require_staff("check order inventory")?;
  let order_id = path.into_inner();
  let availability = app_state.engine.check_order_inventory(order_id).await?;
  Ok(HttpResponse::Ok().json(json!({
    "orderId": order_id,
    "available": availability.available,
    "shortfalls": availability.shortfalls,
  })))
}

#[instrument(name = "handler::low_stock_products", skip(app_state, caller))]
pub async fn low_stock_handler<S: Store>(
  app_state: web::Data<AppState<S>>,
  query: web::Query<LowStockQuery>,
  caller: Caller,
) -> Result<HttpResponse, AppError> {
  caller.require(&[Role::Admin, Role::Manager], "view low-stock products")?;
  let threshold = query.threshold.unwrap_or(app_state.config.low_stock_threshold);
  let products = app_state.engine.low_stock_products(Some(threshold)).await?;
  Ok(HttpResponse::Ok().json(json!({
    "threshold": threshold,
    "count": products.len(),
    "products": products,
  })))
}
