//! Nested pipeline invocation: run another pipeline as a sub-routine
//!
//! The step reads its arguments from the reserved `pype` context key,
//! chooses a context-sharing policy, and hands control to the runner for
//! the whole of the child run. Shared mode lends the parent's own context
//! to the child, so every mutation is mutually visible; isolated mode
//! builds a fresh context that only inherits the parent's working
//! directory, and throws it away when the child finishes.

use crate::core::context::value_as_bool;
use crate::core::{display_value, Context, PipelineError, PipelineResult};
use crate::execution::PipelineRunner;
use crate::steps::StepLogic;
use async_trait::async_trait;
use serde_yaml::Value;
use tracing::{debug, error, info};

/// Reserved context key holding the invocation arguments.
pub const PYPE_KEY: &str = "pype";

/// The step's identity in failure messages.
const STEP_NAME: &str = "pype";

/// Arguments read from the `pype` block.
#[derive(Debug, Clone, PartialEq)]
pub struct PypeArguments {
    /// Child pipeline name; required, non-empty
    pub name: String,

    /// Free-form input text handed to the child's context parser
    pub arg: Option<String>,

    /// Lend the parent's context to the child (default true)
    pub share_context: bool,

    /// Skip the child's own declared context parser (default true)
    pub bypass_parse: bool,

    /// Re-raise child failures to the parent (default true)
    pub propagate_failure: bool,
}

impl PypeArguments {
    /// Read and validate the invocation arguments from the context.
    ///
    /// Validation failures always propagate: a malformed `pype` block is a
    /// defect in the pipeline definition, not a runtime condition.
    pub fn from_context(context: &Context) -> PipelineResult<Self> {
        context.assert_key_exists(PYPE_KEY, STEP_NAME)?;
        let block = context.get_formatted(PYPE_KEY)?;
        let Value::Mapping(block) = block else {
            return Err(PipelineError::InvalidDefinition {
                name: context.current_pipeline().to_string(),
                message: "'pype' must be a mapping of invocation arguments".to_string(),
            });
        };

        let name = match block.get(&Value::String("name".to_string())) {
            None => {
                return Err(PipelineError::KeyNotInContext {
                    key: "pype.name".to_string(),
                    caller: STEP_NAME.to_string(),
                })
            }
            Some(Value::Null) => return Err(empty_name()),
            Some(Value::String(name)) if name.is_empty() => return Err(empty_name()),
            Some(Value::String(name)) => name.clone(),
            Some(_) => {
                return Err(PipelineError::InvalidDefinition {
                    name: context.current_pipeline().to_string(),
                    message: "'pype' name must be a string".to_string(),
                })
            }
        };

        let arg = match block.get(&Value::String("arg".to_string())) {
            None | Some(Value::Null) => None,
            Some(value) => Some(display_value(value)),
        };

        Ok(Self {
            name,
            arg,
            share_context: flag(&block, "shareContext"),
            bypass_parse: flag(&block, "bypassParse"),
            propagate_failure: flag(&block, "propagateFailure"),
        })
    }
}

/// Optional boolean argument, defaulting to true when absent or null.
fn flag(block: &serde_yaml::Mapping, key: &str) -> bool {
    match block.get(&Value::String(key.to_string())) {
        None | Some(Value::Null) => true,
        Some(value) => value_as_bool(value),
    }
}

fn empty_name() -> PipelineError {
    PipelineError::KeyInContextHasNoValue {
        key: "pype.name".to_string(),
        caller: STEP_NAME.to_string(),
    }
}

/// Invokes another pipeline as a sub-routine of the current run.
pub struct Pype;

#[async_trait]
impl StepLogic for Pype {
    async fn run_step(&self, context: &mut Context, runner: &PipelineRunner)
        -> PipelineResult<()> {
        let args = PypeArguments::from_context(context)?;
        let parse_input = !args.bypass_parse;

        let result = if args.share_context {
            info!("pyping {}, using parent context.", args.name);
            runner
                .run_pipeline(&args.name, context, args.arg.as_deref(), parse_input)
                .await
        } else {
            info!("pyping {}, without parent context.", args.name);
            let mut child_context = Context::with_working_dir(context.working_dir());
            runner
                .run_pipeline(&args.name, &mut child_context, args.arg.as_deref(), parse_input)
                .await
        };

        match result {
            Ok(summary) => {
                info!("pyped {}.", args.name);
                debug!(
                    "child run {} of '{}' finished: {} step(s)",
                    summary.run_id,
                    args.name,
                    summary.outcomes.len()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "Something went wrong pyping {}. {}: {}",
                    args.name,
                    err.kind(),
                    err
                );
                if args.propagate_failure {
                    Err(err)
                } else {
                    Ok(())
                }
            }
        }
    }
}
