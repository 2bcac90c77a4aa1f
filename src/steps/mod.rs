//! Step logic units and the registry that resolves them by name
//!
//! A step logic unit is the pluggable "what" of a step: the engine wraps it
//! in decorators and sequences it, but the unit alone decides what to do
//! with the context. Units get a handle to the runner so composition steps
//! can start nested runs.

pub mod echo;
pub mod pype;
pub mod stop;

pub use echo::Echo;
pub use pype::{Pype, PypeArguments};
pub use stop::Stop;

use crate::core::{Context, PipelineError, PipelineResult};
use crate::execution::PipelineRunner;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// One unit of step logic.
#[async_trait]
pub trait StepLogic: Send + Sync {
    /// Execute against the live context, mutating it in place.
    ///
    /// `runner` is the invoking engine, for steps that start nested
    /// pipeline runs. Any error other than [`PipelineError::Stop`] is a
    /// failure; `Stop` asks the current run to end early and successfully.
    async fn run_step(&self, context: &mut Context, runner: &PipelineRunner)
        -> PipelineResult<()>;
}

impl std::fmt::Debug for dyn StepLogic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StepLogic")
    }
}

/// Maps step type names to their logic units.
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn StepLogic>>,
}

impl StepRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in steps: `echo`, `pype`, `stop`.
    pub fn with_builtin_steps() -> Self {
        let mut registry = Self::new();
        registry.register("echo", Arc::new(Echo));
        registry.register("pype", Arc::new(Pype));
        registry.register("stop", Arc::new(Stop));
        registry
    }

    /// Register (or replace) a step logic unit under `name`.
    pub fn register(&mut self, name: impl Into<String>, logic: Arc<dyn StepLogic>) {
        self.steps.insert(name.into(), logic);
    }

    /// Resolve a step by name.
    pub fn get(&self, name: &str) -> PipelineResult<Arc<dyn StepLogic>> {
        self.steps
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::StepNotRegistered {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }
}
