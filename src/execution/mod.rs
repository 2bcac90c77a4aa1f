//! Pipeline execution engine

pub mod executor;
pub mod runner;

pub use executor::{
    DecoratedStep, FOREACH_ITEM_KEY, RETRY_COUNTER_KEY, RETRY_MAX_KEY, WHILE_COUNTER_KEY,
};
pub use runner::PipelineRunner;
