//! pypeline - a declarative YAML pipeline runner
//!
//! Pipelines are authored as data: an ordered list of named steps run
//! against one shared, mutable context. Steps can be conditional, looped,
//! retried, and contained on failure, and one pipeline can invoke another
//! as a sub-routine with a shared or isolated context.

pub mod cli;
pub mod core;
pub mod execution;
pub mod loader;
pub mod parsers;
pub mod steps;

// Re-export commonly used types
pub use self::core::{
    display_value, value_as_bool, Context, PipelineDefinition, PipelineError, PipelineResult,
    RetryDefinition, RunStatus, RunSummary, StepDefinition, StepEntry, StepOutcome, StepStatus,
    WhileDefinition,
};
pub use self::execution::{
    DecoratedStep, PipelineRunner, FOREACH_ITEM_KEY, RETRY_COUNTER_KEY, RETRY_MAX_KEY,
    WHILE_COUNTER_KEY,
};
pub use self::loader::{DefinitionLoader, FileLoader, MemoryLoader};
pub use self::parsers::{ContextParser, JsonObject, KeyValuePairs, ParserRegistry};
pub use self::steps::{Echo, Pype, PypeArguments, Stop, StepLogic, StepRegistry};
pub use serde_yaml::Value;
