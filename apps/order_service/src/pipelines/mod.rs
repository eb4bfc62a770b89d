// apps/order_service/src/pipelines/mod.rs

//! Defines and registers the workflows behind every write endpoint. Read-only
//! endpoints call the engine directly.

use crate::errors::AppError;
use crate::state::AppState;
use orderflow::{Store, Workflows};

pub mod contexts;

pub mod callback_pipeline;
pub mod payment_pipeline;
pub mod placement_pipeline;
pub mod status_pipeline;

/// Called once per `AppState`, at startup.
pub fn register_all_pipelines<S: Store>(workflows: &Workflows<AppError>, app_state: &AppState<S>) -> Result<(), AppError> {
  tracing::info!("Registering workflows...");

  status_pipeline::register_status_change_pipeline(workflows, app_state)?;
  placement_pipeline::register_place_order_pipeline(workflows, app_state)?;
  payment_pipeline::register_create_payment_pipeline(workflows, app_state)?;
  callback_pipeline::register_payment_callback_pipeline(workflows, app_state)?;

  tracing::info!("All application workflows registered.");
  Ok(())
}
