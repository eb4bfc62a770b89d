// apps/order_service/src/state.rs
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::errors::AppError;
use orderflow::{OrderEngine, Store, Workflows};
use std::sync::Arc;

/// Shared by every request. Generic over the store so the HTTP layer can be
/// exercised against the in-memory store; the server binary uses `PgStore`.
pub struct AppState<S: Store = PgStore> {
  pub engine: Arc<OrderEngine<S>>,
  pub workflows: Arc<Workflows<AppError>>,
  pub config: Arc<AppConfig>,
}

impl<S: Store> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      engine: self.engine.clone(),
      workflows: self.workflows.clone(),
      config: self.config.clone(),
    }
  }
}

impl<S: Store> AppState<S> {
  /// Builds the engine from `config` and registers every workflow.
  pub fn build(store: S, config: AppConfig) -> Result<Self, AppError> {
    let engine = OrderEngine::new(store, config.engine_config())?;
    let state = Self {
      engine: Arc::new(engine),
      workflows: Arc::new(Workflows::new()),
      config: Arc::new(config),
    };
    crate::pipelines::register_all_pipelines(&state.workflows, &state)?;
    Ok(state)
  }
}
