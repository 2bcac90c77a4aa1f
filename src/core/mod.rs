//! Core domain model
//!
//! The context store, pipeline definitions, run outcomes, and the failure
//! taxonomy everything else builds on.

pub mod context;
pub mod definition;
pub mod error;
pub mod state;

pub use context::{display_value, value_as_bool, Context};
pub use definition::{
    PipelineDefinition, RetryDefinition, StepDefinition, StepEntry, WhileDefinition,
};
pub use error::{PipelineError, PipelineResult};
pub use state::{RunStatus, RunSummary, StepOutcome, StepStatus};
