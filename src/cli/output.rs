//! CLI output formatting

use crate::core::{PipelineError, RunStatus, RunSummary, StepStatus};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Completed => style("completed").green().to_string(),
        RunStatus::Stopped => style("stopped early").yellow().to_string(),
    }
}

/// Format one step record for display
pub fn format_step_status(status: &StepStatus) -> String {
    match status {
        StepStatus::Completed => format!("{}{}", CHECK, style("completed").green()),
        StepStatus::Skipped => format!("{}{}", SKIP, style("skipped").dim()),
        StepStatus::Swallowed { kind, message } => format!(
            "{}{} ({}: {})",
            WARN,
            style("failure swallowed").yellow(),
            style(kind).bold(),
            style(message).dim()
        ),
        StepStatus::Stopped => format!("{}{}", INFO, style("requested stop").yellow()),
    }
}

/// Format a whole run summary for display
pub fn format_summary(summary: &RunSummary) -> String {
    let mut lines = Vec::with_capacity(summary.outcomes.len() + 1);
    for outcome in &summary.outcomes {
        lines.push(format!(
            "  {} {}",
            style(&outcome.name).cyan(),
            format_step_status(&outcome.status)
        ));
    }
    lines.push(format!(
        "{} {} {} - {} step(s) run, {} skipped, {} swallowed ({}ms)",
        CHECK,
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.completed_steps(),
        summary.skipped_steps(),
        summary.swallowed_steps(),
        summary.duration().num_milliseconds()
    ));
    lines.join("\n")
}

/// Format an aborting failure for display
pub fn format_failure(pipeline_name: &str, err: &PipelineError) -> String {
    format!(
        "{} {} {} - {}: {}",
        CROSS,
        style(pipeline_name).bold(),
        style("failed").red(),
        style(err.kind()).bold(),
        err
    )
}
