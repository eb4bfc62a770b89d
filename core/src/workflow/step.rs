// orderflow/src/workflow/step.rs
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::context_data::ContextData;
use super::control::PipelineControl;

pub type SkipCondition<T> = Arc<dyn Fn(ContextData<T>) -> bool + Send + Sync + 'static>;

pub type HandlerFuture<Err> = Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>;

/// Boxed async step handler. It receives a clone of the run's context.
pub type Handler<T, Err> = Box<dyn Fn(ContextData<T>) -> HandlerFuture<Err> + Send + Sync>;

#[derive(Clone)]
pub struct StepDef<T: Send + Sync + 'static> {
  pub name: String,
  /// Optional steps without handlers are skipped instead of failing the run.
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: Send + Sync + 'static> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("has_skip_condition", &self.skip_if.is_some())
      .finish()
  }
}
