//! Context parsers - turn a pipeline's free-form input text into context keys

use crate::core::{Context, PipelineError, PipelineResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Parses input text into top-level context keys.
///
/// A pipeline names its parser in `context_parser`; the runner invokes it
/// at the start of the run unless the caller bypasses parsing.
pub trait ContextParser: Send + Sync {
    fn parse(&self, input: &str, context: &mut Context) -> PipelineResult<()>;
}

impl std::fmt::Debug for dyn ContextParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContextParser")
    }
}

/// Maps parser names to implementations.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn ContextParser>>,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in parsers: `keyvaluepairs`, `json`.
    pub fn with_builtin_parsers() -> Self {
        let mut registry = Self::new();
        registry.register("keyvaluepairs", Arc::new(KeyValuePairs));
        registry.register("json", Arc::new(JsonObject));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, parser: Arc<dyn ContextParser>) {
        self.parsers.insert(name.into(), parser);
    }

    pub fn get(&self, name: &str) -> PipelineResult<Arc<dyn ContextParser>> {
        self.parsers
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::ParserNotRegistered {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }
}

/// Parses `key=value` pairs separated by whitespace or commas.
///
/// Values are always strings; `key=` yields an empty string.
pub struct KeyValuePairs;

impl ContextParser for KeyValuePairs {
    fn parse(&self, input: &str, context: &mut Context) -> PipelineResult<()> {
        for pair in input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|pair| !pair.is_empty())
        {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let Some(value) = parts.next() else {
                return Err(PipelineError::InvalidContextInput {
                    parser: "keyvaluepairs".to_string(),
                    message: format!("'{pair}' is not a key=value pair"),
                });
            };
            if key.is_empty() {
                return Err(PipelineError::InvalidContextInput {
                    parser: "keyvaluepairs".to_string(),
                    message: format!("'{pair}' has no key"),
                });
            }
            context.set(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Parses a JSON object; each top-level member becomes a context key.
pub struct JsonObject;

impl ContextParser for JsonObject {
    fn parse(&self, input: &str, context: &mut Context) -> PipelineResult<()> {
        let parsed: serde_json::Value =
            serde_json::from_str(input).map_err(|err| PipelineError::InvalidContextInput {
                parser: "json".to_string(),
                message: err.to_string(),
            })?;
        let serde_json::Value::Object(members) = parsed else {
            return Err(PipelineError::InvalidContextInput {
                parser: "json".to_string(),
                message: "input must be a JSON object".to_string(),
            });
        };
        for (key, member) in members {
            let value = serde_yaml::to_value(&member).map_err(|err| {
                PipelineError::InvalidContextInput {
                    parser: "json".to_string(),
                    message: err.to_string(),
                }
            })?;
            context.set(key, value);
        }
        Ok(())
    }
}
