//! Run outcome models

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// How one pipeline run ended.
///
/// A failed run has no status: failure propagates to the caller as an error
/// instead of producing a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Every step was given its turn
    Completed,
    /// A step raised the stop signal; the rest were skipped
    Stopped,
}

/// How a single step ended within a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    /// Ran to completion (including any loop and retry turns)
    Completed,
    /// Run condition evaluated false; the step never ran
    Skipped,
    /// The step failed, but swallow was set, so the run carried on
    Swallowed { kind: String, message: String },
    /// The step raised the stop signal
    Stopped,
}

/// Record of one step entry's execution.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Step type name from the definition
    pub name: String,

    /// How the step ended
    pub status: StepStatus,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Summary of one pipeline run, top-level or nested.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique id for this run
    pub run_id: Uuid,

    /// Name of the pipeline that ran
    pub pipeline_name: String,

    /// How the run ended
    pub status: RunStatus,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Per-step records, in execution order
    pub outcomes: Vec<StepOutcome>,
}

impl RunSummary {
    pub fn completed_steps(&self) -> usize {
        self.count(|status| matches!(status, StepStatus::Completed))
    }

    pub fn skipped_steps(&self) -> usize {
        self.count(|status| matches!(status, StepStatus::Skipped))
    }

    pub fn swallowed_steps(&self) -> usize {
        self.count(|status| matches!(status, StepStatus::Swallowed { .. }))
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    fn count(&self, predicate: impl Fn(&StepStatus) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| predicate(&outcome.status))
            .count()
    }
}
