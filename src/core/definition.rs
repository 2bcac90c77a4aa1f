//! Pipeline definitions from YAML

use crate::core::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// A pipeline definition: an ordered step list plus the name of the context
/// parser (if any) that turns free-form input text into context keys.
///
/// The pipeline's own name comes from the loader (it is the lookup key, not
/// part of the document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name, filled in by the loader
    #[serde(skip_deserializing, default)]
    pub name: String,

    /// Name of the registered parser for this pipeline's input text
    #[serde(default)]
    pub context_parser: Option<String>,

    /// Ordered step entries
    pub steps: Vec<StepEntry>,
}

/// One entry in a pipeline's step list.
///
/// A bare string is shorthand for a step with no decorators; a mapping
/// spells the decorators out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepEntry {
    /// Just the step type name
    Name(String),
    /// Full step specification
    Detailed(StepDefinition),
}

impl StepEntry {
    /// The step type name this entry invokes.
    pub fn name(&self) -> &str {
        match self {
            StepEntry::Name(name) => name,
            StepEntry::Detailed(step) => &step.name,
        }
    }

    /// Normalize into a full [`StepDefinition`].
    pub fn to_definition(&self) -> StepDefinition {
        match self {
            StepEntry::Name(name) => StepDefinition::named(name.clone()),
            StepEntry::Detailed(step) => step.clone(),
        }
    }
}

/// A single step entry with its decorators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step type identifier, resolved against the step registry
    pub name: String,

    /// Free-form description; carried but never interpreted
    #[serde(default)]
    pub description: Option<String>,

    /// Run condition; the step is skipped entirely when it formats to false
    #[serde(default)]
    pub run: Option<Value>,

    /// Value formatting to a sequence; one invocation per element
    #[serde(default)]
    pub foreach: Option<Value>,

    /// Bounded while loop around the step
    #[serde(default, rename = "while")]
    pub while_loop: Option<WhileDefinition>,

    /// Retry the step on failure
    #[serde(default)]
    pub retry: Option<RetryDefinition>,

    /// Contain failures: log them and carry on as if the step succeeded
    #[serde(default)]
    pub swallow: bool,
}

impl StepDefinition {
    /// A step with no decorators.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            run: None,
            foreach: None,
            while_loop: None,
            retry: None,
            swallow: false,
        }
    }
}

/// Loop while a condition formats to true, never past `max` iterations.
///
/// The bound is mandatory so a while loop always terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileDefinition {
    /// Condition evaluated against the context before each iteration
    pub condition: Value,

    /// Hard cap on iterations
    pub max: u32,
}

/// Bounded retry of a failing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDefinition {
    /// Total number of attempts, including the first
    pub max: u32,

    /// Seconds to wait between attempts
    #[serde(default)]
    pub sleep: f64,
}

impl PipelineDefinition {
    /// Parse a pipeline definition from YAML text.
    ///
    /// `name` is the lookup name the loader resolved; it lands on the
    /// returned definition and in any error raised here.
    pub fn from_yaml(name: &str, yaml: &str) -> PipelineResult<Self> {
        let mut definition: PipelineDefinition =
            serde_yaml::from_str(yaml).map_err(|err| PipelineError::InvalidDefinition {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        definition.name = name.to_string();
        definition.validate()?;
        Ok(definition)
    }

    /// Validate the shape of the definition beyond what serde enforces.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.steps.is_empty() {
            return Err(self.invalid("pipeline must declare at least one step"));
        }
        for entry in &self.steps {
            if entry.name().is_empty() {
                return Err(self.invalid("step name must not be empty"));
            }
            if let StepEntry::Detailed(step) = entry {
                if let Some(retry) = &step.retry {
                    if retry.max == 0 {
                        return Err(self.invalid(format!(
                            "step '{}' retry max must be at least 1",
                            step.name
                        )));
                    }
                    if retry.sleep < 0.0 {
                        return Err(self.invalid(format!(
                            "step '{}' retry sleep must not be negative",
                            step.name
                        )));
                    }
                }
                if let Some(while_loop) = &step.while_loop {
                    if while_loop.max == 0 {
                        return Err(self.invalid(format!(
                            "step '{}' while max must be at least 1",
                            step.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// The step list normalized to full definitions.
    pub fn step_definitions(&self) -> Vec<StepDefinition> {
        self.steps.iter().map(StepEntry::to_definition).collect()
    }

    fn invalid(&self, message: impl Into<String>) -> PipelineError {
        PipelineError::InvalidDefinition {
            name: self.name.clone(),
            message: message.into(),
        }
    }
}
