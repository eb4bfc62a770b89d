// orderflow/src/workflow/pipeline.rs

//! `Pipeline<T, Err>`: an ordered list of named steps, each with optional
//! `before`, `on` and `after` handlers, executed against one shared context.

use std::collections::HashMap;
use std::future::Future;
use tracing::{event, instrument, span, Instrument, Level};

use super::context_data::ContextData;
use super::control::{PipelineControl, PipelineResult};
use super::error::{WorkflowError, WorkflowResult};
use super::step::{Handler, HandlerFuture, SkipCondition, StepDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Before,
  On,
  After,
}

impl Phase {
  fn label(&self) -> &'static str {
    match self {
      Phase::Before => "before",
      Phase::On => "on",
      Phase::After => "after",
    }
  }
}

pub struct Pipeline<T, Err>
where
  T: Send + Sync + 'static,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  steps: Vec<StepDef<T>>,
  before: HashMap<String, Vec<Handler<T, Err>>>,
  on: HashMap<String, Vec<Handler<T, Err>>>,
  after: HashMap<String, Vec<Handler<T, Err>>>,
}

impl<T, Err> Pipeline<T, Err>
where
  T: Send + Sync + 'static,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Each entry is `(name, optional, skip_if)`.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<T>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef {
        name: (*name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();
    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  fn position(&self, step_name: &str) -> WorkflowResult<usize> {
    self
      .steps
      .iter()
      .position(|s| s.name == step_name)
      .ok_or_else(|| WorkflowError::StepNotFound {
        step_name: step_name.to_string(),
      })
  }

  fn insert_at(&mut self, idx: usize, name: String, optional: bool, skip_if: Option<SkipCondition<T>>) -> WorkflowResult<()> {
    if self.steps.iter().any(|s| s.name == name) {
      return Err(WorkflowError::DuplicateStep { step_name: name });
    }
    self.steps.insert(idx, StepDef { name, optional, skip_if });
    Ok(())
  }

  pub fn insert_before_step(
    &mut self,
    existing: &str,
    name: impl Into<String>,
    optional: bool,
    skip_if: Option<SkipCondition<T>>,
  ) -> WorkflowResult<()> {
    let idx = self.position(existing)?;
    self.insert_at(idx, name.into(), optional, skip_if)
  }

  pub fn insert_after_step(
    &mut self,
    existing: &str,
    name: impl Into<String>,
    optional: bool,
    skip_if: Option<SkipCondition<T>>,
  ) -> WorkflowResult<()> {
    let idx = self.position(existing)?;
    self.insert_at(idx + 1, name.into(), optional, skip_if)
  }

  /// Removes the step and every handler attached to it.
  pub fn remove_step(&mut self, step_name: &str) -> WorkflowResult<()> {
    let idx = self.position(step_name)?;
    self.steps.remove(idx);
    self.before.remove(step_name);
    self.on.remove(step_name);
    self.after.remove(step_name);
    Ok(())
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) -> WorkflowResult<()> {
    let idx = self.position(step_name)?;
    self.steps[idx].optional = optional;
    Ok(())
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<T>>) -> WorkflowResult<()> {
    let idx = self.position(step_name)?;
    self.steps[idx].skip_if = skip_if;
    Ok(())
  }

  fn add_handler<F, HandlerErr>(
    &mut self,
    phase: Phase,
    step_name: &str,
    handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static,
  ) -> WorkflowResult<()>
  where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.position(step_name)?;
    let handler: Handler<T, Err> = Box::new(move |ctx| {
      let fut = handler_fn(ctx);
      Box::pin(async move { fut.await.map_err(Into::into) }) as HandlerFuture<Err>
    });
    let table = match phase {
      Phase::Before => &mut self.before,
      Phase::On => &mut self.on,
      Phase::After => &mut self.after,
    };
    table.entry(step_name.to_string()).or_default().push(handler);
    Ok(())
  }

  pub fn before_root<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static,
  ) -> WorkflowResult<()>
  where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.add_handler(Phase::Before, step_name, handler_fn)
  }

  pub fn on_root<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static,
  ) -> WorkflowResult<()>
  where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.add_handler(Phase::On, step_name, handler_fn)
  }

  pub fn after_root<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static,
  ) -> WorkflowResult<()>
  where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.add_handler(Phase::After, step_name, handler_fn)
  }

  fn handlers(&self, phase: Phase, step_name: &str) -> &[Handler<T, Err>] {
    let table = match phase {
      Phase::Before => &self.before,
      Phase::On => &self.on,
      Phase::After => &self.after,
    };
    table.get(step_name).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Runs the handlers of one phase in registration order.
  async fn run_phase(&self, phase: Phase, step_name: &str, ctx: &ContextData<T>) -> Result<PipelineControl, Err> {
    for (idx, handler) in self.handlers(phase, step_name).iter().enumerate() {
      let handler_span = span!(Level::DEBUG, "step_handler", phase = phase.label(), handler_index = idx);
      match handler(ctx.clone()).instrument(handler_span).await {
        Ok(PipelineControl::Continue) => {}
        Ok(PipelineControl::Stop) => {
          event!(Level::INFO, step_name, phase = phase.label(), "Workflow stopped by handler.");
          return Ok(PipelineControl::Stop);
        }
        Err(e) => {
          event!(Level::WARN, step_name, phase = phase.label(), error = %e, "Handler failed.");
          return Err(e);
        }
      }
    }
    Ok(PipelineControl::Continue)
  }

  /// Executes every step in order.
  ///
  /// A step whose `skip_if` returns true is skipped. A step without handlers
  /// is skipped when optional and fails the run with `HandlerMissing` otherwise.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(context_type = %std::any::type_name::<T>(), num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx: ContextData<T>) -> Result<PipelineResult, Err> {
    for (step_index, step) in self.steps.iter().enumerate() {
      let step_name = step.name.as_str();

      if let Some(skip) = &step.skip_if {
        if skip(ctx.clone()) {
          event!(Level::DEBUG, step_name, "Step skipped by condition.");
          continue;
        }
      }

      let has_handlers = [Phase::Before, Phase::On, Phase::After]
        .iter()
        .any(|phase| !self.handlers(*phase, step_name).is_empty());
      if !has_handlers {
        if step.optional {
          event!(Level::DEBUG, step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        return Err(Err::from(WorkflowError::HandlerMissing {
          step_name: step.name.clone(),
        }));
      }

      let step_span = span!(Level::INFO, "workflow_step", step_name, step_index, optional = step.optional);
      let outcome = async {
        for phase in [Phase::Before, Phase::On, Phase::After] {
          if self.run_phase(phase, step_name, &ctx).await? == PipelineControl::Stop {
            return Ok(PipelineControl::Stop);
          }
        }
        Ok::<_, Err>(PipelineControl::Continue)
      }
      .instrument(step_span)
      .await?;

      if outcome == PipelineControl::Stop {
        return Ok(PipelineResult::Stopped);
      }
    }
    Ok(PipelineResult::Completed)
  }
}
