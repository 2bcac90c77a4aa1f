//! Failure taxonomy for pipeline runs

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the engine.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Structured failures raised by the engine and by step logic.
///
/// Every variant carries a kind (see [`PipelineError::kind`]) and a message,
/// both of which survive re-raising unchanged across nested pipeline frames.
/// `Stop` is the one non-failure variant: it is the sentinel a step raises to
/// end the current run early and successfully.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required key, or a segment of a required dot-path, is absent.
    #[error("context['{key}'] doesn't exist. It must exist for {caller}.")]
    KeyNotInContext { key: String, caller: String },

    /// A required key is present but holds null or an empty string.
    #[error("context['{key}'] exists but is empty. It must have a value for {caller}.")]
    KeyInContextHasNoValue { key: String, caller: String },

    /// Formatting a key ran into itself again, directly or through other keys.
    #[error("formatting '{key}' references itself, either directly or through another key's template.")]
    CircularFormat { key: String },

    /// The definition loader found no pipeline with this name.
    #[error("pipeline '{name}' not found in {}", .working_dir.display())]
    PipelineNotFound { name: String, working_dir: PathBuf },

    /// The pipeline definition could not be parsed or failed validation.
    #[error("pipeline '{name}' is invalid: {message}")]
    InvalidDefinition { name: String, message: String },

    /// A step entry names a step type no logic unit is registered for.
    #[error("no step named '{name}' is registered")]
    StepNotRegistered { name: String },

    /// A pipeline declares a context parser that is not registered.
    #[error("no context parser named '{name}' is registered")]
    ParserNotRegistered { name: String },

    /// Context input text the declared parser could not make sense of.
    #[error("context input could not be parsed by '{parser}': {message}")]
    InvalidContextInput { parser: String, message: String },

    /// A failure raised by step logic, carrying its own kind tag.
    #[error("{message}")]
    StepFailed { kind: String, message: String },

    /// Not a failure: a step requested that the current run end now,
    /// successfully.
    #[error("stop requested")]
    Stop,
}

impl PipelineError {
    /// The failure kind, as surfaced to operators next to the message.
    pub fn kind(&self) -> &str {
        match self {
            PipelineError::KeyNotInContext { .. } => "KeyNotInContext",
            PipelineError::KeyInContextHasNoValue { .. } => "KeyInContextHasNoValue",
            PipelineError::CircularFormat { .. } => "CircularFormat",
            PipelineError::PipelineNotFound { .. } => "PipelineNotFound",
            PipelineError::InvalidDefinition { .. } => "InvalidDefinition",
            PipelineError::StepNotRegistered { .. } => "StepNotRegistered",
            PipelineError::ParserNotRegistered { .. } => "ParserNotRegistered",
            PipelineError::InvalidContextInput { .. } => "InvalidContextInput",
            PipelineError::StepFailed { kind, .. } => kind,
            PipelineError::Stop => "Stop",
        }
    }

    /// Build a step-defined failure with an arbitrary kind tag.
    pub fn step_failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::StepFailed {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// True for the Stop sentinel only.
    pub fn is_stop(&self) -> bool {
        matches!(self, PipelineError::Stop)
    }
}
