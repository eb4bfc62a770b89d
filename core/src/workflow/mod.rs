// orderflow/src/workflow/mod.rs

//! Small async workflow runtime used by the service layer: named steps with
//! `before`/`on`/`after` handlers over a shared [`ContextData`], plus a
//! registry that dispatches on the context type.

pub mod context_data;
pub mod control;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use error::{WorkflowError, WorkflowResult};
pub use pipeline::Pipeline;
pub use registry::Workflows;
pub use step::{Handler, HandlerFuture, SkipCondition, StepDef};
