// orderflow/src/workflow/error.rs
use thiserror::Error;

/// Failures raised by the workflow runtime itself, as opposed to the errors
/// returned by step handlers.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Step already defined: {step_name}")]
  DuplicateStep { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("No workflow registered for context type {type_name}")]
  NotRegistered { type_name: &'static str },

  #[error("Context type mismatch in registry dispatch (expected {expected_type})")]
  TypeMismatch { expected_type: &'static str },
}

pub type WorkflowResult<T, E = WorkflowError> = std::result::Result<T, E>;
