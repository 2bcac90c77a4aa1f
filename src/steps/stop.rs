//! Step that ends the current pipeline run early

use crate::core::{Context, PipelineError, PipelineResult};
use crate::execution::PipelineRunner;
use crate::steps::StepLogic;
use async_trait::async_trait;
use tracing::debug;

/// Raises the stop signal: the run ends now, successfully, and any
/// remaining steps are skipped.
pub struct Stop;

#[async_trait]
impl StepLogic for Stop {
    async fn run_step(
        &self,
        context: &mut Context,
        _runner: &PipelineRunner,
    ) -> PipelineResult<()> {
        debug!("stop: requested for pipeline '{}'", context.current_pipeline());
        Err(PipelineError::Stop)
    }
}
