// apps/order_service/src/web/handlers/mod.rs

pub mod inventory_handlers;
pub mod order_handlers;
pub mod payment_handlers;

use crate::auth::{Caller, Role};
use crate::errors::AppError;
use orderflow::{EngineError, OrderEngine, OrderId, OrderSnapshot, Store};

/// Loads the order if `caller` may see it. Customers get `OrderNotFound` for
/// orders that are not theirs.
pub(crate) async fn visible_order<S: Store>(
  engine: &OrderEngine<S>,
  caller: &Caller,
  order_id: OrderId,
) -> Result<OrderSnapshot, AppError> {
  let snapshot = engine.order_snapshot(order_id).await?;
  if caller.role == Role::Customer && snapshot.order.customer_id != caller.user_id {
    return Err(EngineError::OrderNotFound(order_id).into());
  }
  Ok(snapshot)
}
