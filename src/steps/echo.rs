//! Step that echoes a context value to the log

use crate::core::context::display_value;
use crate::core::{Context, PipelineResult};
use crate::execution::PipelineRunner;
use crate::steps::StepLogic;
use async_trait::async_trait;
use tracing::{debug, info};

/// Context key holding the value to echo.
pub const ECHO_KEY: &str = "echoMe";

/// Logs the formatted value of `echoMe` at info severity.
pub struct Echo;

#[async_trait]
impl StepLogic for Echo {
    async fn run_step(
        &self,
        context: &mut Context,
        _runner: &PipelineRunner,
    ) -> PipelineResult<()> {
        debug!("echo: started");
        context.assert_key_exists(ECHO_KEY, "echo")?;
        let value = context.get_formatted(ECHO_KEY)?;
        info!("{}", display_value(&value));
        debug!("echo: done");
        Ok(())
    }
}
