//! Step decorator machinery
//!
//! Each step entry runs through an ordered chain of wrappers around the
//! step's own logic: run-condition, then error-swallow, then the while and
//! foreach loops, then retry. Each wrapper invokes the next zero, one, or
//! many times. The stop signal is never retried and never swallowed; it
//! passes straight through to the runner.

use crate::core::{Context, PipelineError, PipelineResult, StepDefinition, StepStatus,
    WhileDefinition};
use crate::execution::PipelineRunner;
use crate::steps::StepLogic;
use serde_yaml::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Context key holding the current foreach element.
pub const FOREACH_ITEM_KEY: &str = "i";

/// Context key holding the 1-based while iteration count.
pub const WHILE_COUNTER_KEY: &str = "whileCounter";

/// Context key holding the current retry attempt number.
pub const RETRY_COUNTER_KEY: &str = "retryCounter";

/// Context key holding the configured retry attempt bound.
pub const RETRY_MAX_KEY: &str = "retryMax";

/// One step entry wrapped in its decorators, ready to run.
pub struct DecoratedStep<'a> {
    definition: &'a StepDefinition,
    logic: Arc<dyn StepLogic>,
    runner: &'a PipelineRunner,
}

impl<'a> DecoratedStep<'a> {
    pub fn new(
        definition: &'a StepDefinition,
        logic: Arc<dyn StepLogic>,
        runner: &'a PipelineRunner,
    ) -> Self {
        Self {
            definition,
            logic,
            runner,
        }
    }

    fn name(&self) -> &str {
        &self.definition.name
    }

    /// Run the full decorator chain for this step.
    pub async fn run(&self, context: &mut Context) -> PipelineResult<StepStatus> {
        if !self.should_run(context)? {
            debug!("{}: skipping step, run condition is false", self.name());
            return Ok(StepStatus::Skipped);
        }

        match self.run_loops(context).await {
            Ok(()) => Ok(StepStatus::Completed),
            Err(PipelineError::Stop) => Err(PipelineError::Stop),
            Err(err) if self.definition.swallow => {
                error!(
                    "{}: ignoring error because swallow is set for this step. {}: {}",
                    self.name(),
                    err.kind(),
                    err
                );
                Ok(StepStatus::Swallowed {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// The run condition, evaluated once before anything else.
    fn should_run(&self, context: &Context) -> PipelineResult<bool> {
        match &self.definition.run {
            None => Ok(true),
            Some(condition) => context.format_as_bool(condition),
        }
    }

    /// The loop layer: while encloses foreach when both are declared.
    async fn run_loops(&self, context: &mut Context) -> PipelineResult<()> {
        match &self.definition.while_loop {
            None => self.run_foreach(context).await,
            Some(while_loop) => self.run_while(while_loop, context).await,
        }
    }

    async fn run_while(
        &self,
        while_loop: &WhileDefinition,
        context: &mut Context,
    ) -> PipelineResult<()> {
        let mut iteration = 0u32;
        while iteration < while_loop.max {
            if !context.format_as_bool(&while_loop.condition)? {
                break;
            }
            iteration += 1;
            context.set(WHILE_COUNTER_KEY, u64::from(iteration));
            debug!(
                "{}: while iteration {} of at most {}",
                self.name(),
                iteration,
                while_loop.max
            );
            self.run_foreach(context).await?;
        }
        if iteration == while_loop.max {
            debug!(
                "{}: while loop reached its bound of {}",
                self.name(),
                while_loop.max
            );
        }
        Ok(())
    }

    async fn run_foreach(&self, context: &mut Context) -> PipelineResult<()> {
        let Some(expression) = &self.definition.foreach else {
            return self.run_with_retry(context).await;
        };

        let items = match context.format_value(expression)? {
            Value::Sequence(items) => items,
            _ => {
                return Err(PipelineError::InvalidDefinition {
                    name: self.name().to_string(),
                    message: "foreach must format to a list".to_string(),
                })
            }
        };

        debug!("{}: foreach over {} item(s)", self.name(), items.len());
        for item in items {
            context.set(FOREACH_ITEM_KEY, item);
            self.run_with_retry(context).await?;
        }
        Ok(())
    }

    async fn run_with_retry(&self, context: &mut Context) -> PipelineResult<()> {
        let Some(retry) = &self.definition.retry else {
            return self.invoke(context).await;
        };

        context.set(RETRY_MAX_KEY, u64::from(retry.max));
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            context.set(RETRY_COUNTER_KEY, u64::from(attempt));
            match self.invoke(context).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!("{}: attempt {} succeeded", self.name(), attempt);
                    }
                    return Ok(());
                }
                Err(PipelineError::Stop) => return Err(PipelineError::Stop),
                Err(err) if attempt < retry.max => {
                    debug!(
                        "{}: attempt {} of {} failed. {}: {}",
                        self.name(),
                        attempt,
                        retry.max,
                        err.kind(),
                        err
                    );
                    if retry.sleep > 0.0 {
                        tokio::time::sleep(Duration::from_secs_f64(retry.sleep)).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// The innermost capability: the step's own logic.
    async fn invoke(&self, context: &mut Context) -> PipelineResult<()> {
        debug!("{}: running", self.name());
        self.logic.run_step(context, self.runner).await?;
        debug!("{}: done", self.name());
        Ok(())
    }
}
