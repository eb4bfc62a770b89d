// orderflow/src/workflow/registry.rs

//! `Workflows<E>`: one pipeline per context type, looked up by `TypeId` at run time.
//! Registry failures surface as `E` through `From<WorkflowError>`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

use super::context_data::ContextData;
use super::control::PipelineResult;
use super::error::WorkflowError;
use super::pipeline::Pipeline;

#[async_trait]
trait ErasedRunner<E>: Send + Sync
where
  E: std::error::Error + Send + Sync + 'static,
{
  /// `ctx` must box a `ContextData<T>` for the pipeline's own `T`.
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<PipelineResult, E>;
}

struct TypedRunner<T, HandlerErr, E>
where
  T: Send + Sync + 'static,
  HandlerErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pipeline: Pipeline<T, HandlerErr>,
  _marker: PhantomData<fn() -> E>,
}

#[async_trait]
impl<T, HandlerErr, E> ErasedRunner<E> for TypedRunner<T, HandlerErr, E>
where
  T: Send + Sync + 'static,
  HandlerErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
  E: std::error::Error + From<HandlerErr> + From<WorkflowError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<PipelineResult, E> {
    let ctx = match ctx.downcast::<ContextData<T>>() {
      Ok(ctx) => *ctx,
      Err(_) => {
        let expected_type = std::any::type_name::<ContextData<T>>();
        event!(Level::ERROR, expected_type, "Context type mismatch in registry dispatch.");
        return Err(E::from(WorkflowError::TypeMismatch { expected_type }));
      }
    };
    self.pipeline.run(ctx).await.map_err(E::from)
  }
}

pub struct Workflows<E = WorkflowError>
where
  E: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pipelines: RwLock<HashMap<TypeId, Arc<dyn ErasedRunner<E>>>>,
}

impl<E> Workflows<E>
where
  E: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      pipelines: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `pipeline` for context type `T`, replacing any earlier one.
  pub fn register<T, HandlerErr>(&self, pipeline: Pipeline<T, HandlerErr>)
  where
    T: Send + Sync + 'static,
    HandlerErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
    E: From<HandlerErr>,
  {
    event!(
      Level::DEBUG,
      context_type = %std::any::type_name::<T>(),
      steps = ?pipeline.step_names(),
      "Registering workflow."
    );
    let runner = TypedRunner::<T, HandlerErr, E> {
      pipeline,
      _marker: PhantomData,
    };
    self.pipelines.write().insert(TypeId::of::<T>(), Arc::new(runner));
  }

  pub fn is_registered<T: Send + Sync + 'static>(&self) -> bool {
    self.pipelines.read().contains_key(&TypeId::of::<T>())
  }

  /// Runs the pipeline registered for `T` against `ctx`.
  #[instrument(name = "Workflows::run", skip_all, fields(context_type = %std::any::type_name::<T>()))]
  pub async fn run<T>(&self, ctx: ContextData<T>) -> Result<PipelineResult, E>
  where
    T: Send + Sync + 'static,
  {
    // Clone the runner out so the registry lock is released before awaiting.
    let runner = self.pipelines.read().get(&TypeId::of::<T>()).cloned();
    let runner = runner.ok_or_else(|| {
      let type_name = std::any::type_name::<T>();
      event!(Level::ERROR, type_name, "No workflow registered.");
      E::from(WorkflowError::NotRegistered { type_name })
    })?;
    runner.run_erased(Box::new(ctx)).await
  }
}

impl<E> Default for Workflows<E>
where
  E: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
