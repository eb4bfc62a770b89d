// orderflow/src/workflow/control.rs

/// Returned by a handler: keep going, or end the run here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// Skips every remaining handler of this step and every later step.
  Stop,
}

/// How a run ended when no handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  Completed,
  Stopped,
}

impl PipelineResult {
  pub fn is_completed(&self) -> bool {
    matches!(self, PipelineResult::Completed)
  }
}
