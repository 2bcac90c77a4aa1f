//! Pipeline runner - sequences a pipeline's steps against one context
//!
//! Execution is strictly sequential and depth-first: one step at a time,
//! and a nested invocation suspends the parent run for the whole of the
//! child run. There is never more than one live writer to a context, so
//! sharing one across a parent/child pair needs no locking.

use crate::core::{
    Context, PipelineDefinition, PipelineError, PipelineResult, RunStatus, RunSummary,
    StepOutcome, StepStatus,
};
use crate::execution::executor::DecoratedStep;
use crate::loader::DefinitionLoader;
use crate::parsers::ParserRegistry;
use crate::steps::StepRegistry;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Runs pipelines resolved through a definition loader, using registered
/// step logic units and context parsers.
pub struct PipelineRunner {
    loader: Arc<dyn DefinitionLoader>,
    steps: StepRegistry,
    parsers: ParserRegistry,
}

impl PipelineRunner {
    /// A runner with the built-in steps and parsers.
    pub fn new(loader: Arc<dyn DefinitionLoader>) -> Self {
        Self::with_registries(
            loader,
            StepRegistry::with_builtin_steps(),
            ParserRegistry::with_builtin_parsers(),
        )
    }

    /// A runner with caller-supplied registries.
    pub fn with_registries(
        loader: Arc<dyn DefinitionLoader>,
        steps: StepRegistry,
        parsers: ParserRegistry,
    ) -> Self {
        Self {
            loader,
            steps,
            parsers,
        }
    }

    pub fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut StepRegistry {
        &mut self.steps
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Run the named pipeline against `context`.
    ///
    /// `input` is free-form text for the pipeline's declared context
    /// parser; it is only consulted when `parse_input` is true. The
    /// context's current-pipeline name is swapped for the duration of the
    /// run and restored before returning, so a caller mid-run sees its own
    /// name again afterwards. Any unswallowed failure aborts the run
    /// immediately and propagates unchanged; the stop signal ends the run
    /// successfully instead.
    pub async fn run_pipeline(
        &self,
        name: &str,
        context: &mut Context,
        input: Option<&str>,
        parse_input: bool,
    ) -> PipelineResult<RunSummary> {
        let definition = self.loader.load(name, context.working_dir())?;
        debug!(
            "loaded pipeline '{}' with {} step(s)",
            name,
            definition.steps.len()
        );

        let previous = context.set_current_pipeline(name);
        let result = self
            .run_definition(&definition, context, input, parse_input)
            .await;
        context.set_current_pipeline(previous);
        result
    }

    async fn run_definition(
        &self,
        definition: &PipelineDefinition,
        context: &mut Context,
        input: Option<&str>,
        parse_input: bool,
    ) -> PipelineResult<RunSummary> {
        if parse_input {
            self.parse_context_input(definition, context, input)?;
        } else if definition.context_parser.is_some() {
            debug!(
                "pipeline '{}': context parse bypassed by the caller",
                definition.name
            );
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        debug!("pipeline '{}': starting run {}", definition.name, run_id);

        let mut outcomes = Vec::with_capacity(definition.steps.len());
        let mut stopped = false;
        for step in definition.step_definitions() {
            let logic = self.steps.get(&step.name)?;
            let decorated = DecoratedStep::new(&step, logic, self);
            let step_started = Utc::now();
            match decorated.run(context).await {
                Ok(status) => outcomes.push(StepOutcome {
                    name: step.name.clone(),
                    status,
                    started_at: step_started,
                    finished_at: Utc::now(),
                }),
                Err(PipelineError::Stop) => {
                    debug!(
                        "pipeline '{}': step '{}' requested stop, skipping the rest",
                        definition.name, step.name
                    );
                    outcomes.push(StepOutcome {
                        name: step.name.clone(),
                        status: StepStatus::Stopped,
                        started_at: step_started,
                        finished_at: Utc::now(),
                    });
                    stopped = true;
                    break;
                }
                Err(err) => {
                    debug!(
                        "pipeline '{}': step '{}' failed, aborting run. {}: {}",
                        definition.name,
                        step.name,
                        err.kind(),
                        err
                    );
                    return Err(err);
                }
            }
        }

        let status = if stopped {
            RunStatus::Stopped
        } else {
            RunStatus::Completed
        };
        debug!(
            "pipeline '{}': run {} finished, {} step record(s)",
            definition.name,
            run_id,
            outcomes.len()
        );
        Ok(RunSummary {
            run_id,
            pipeline_name: definition.name.clone(),
            status,
            started_at,
            completed_at: Utc::now(),
            outcomes,
        })
    }

    fn parse_context_input(
        &self,
        definition: &PipelineDefinition,
        context: &mut Context,
        input: Option<&str>,
    ) -> PipelineResult<()> {
        match (&definition.context_parser, input) {
            (Some(parser_name), Some(input)) => {
                let parser = self.parsers.get(parser_name)?;
                debug!(
                    "pipeline '{}': parsing context input with '{}'",
                    definition.name, parser_name
                );
                parser.parse(input, context)
            }
            (Some(_), None) => {
                debug!(
                    "pipeline '{}': no context input given, nothing to parse",
                    definition.name
                );
                Ok(())
            }
            (None, _) => {
                debug!(
                    "pipeline '{}': no context parser declared",
                    definition.name
                );
                Ok(())
            }
        }
    }
}
