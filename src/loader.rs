//! Definition loaders - resolve a pipeline name to its definition

use crate::core::{PipelineDefinition, PipelineError, PipelineResult};
use std::collections::HashMap;
use std::path::Path;

/// Resolves pipeline definitions by name.
///
/// The working directory comes from the context of the run asking for the
/// pipeline, so nested invocations resolve siblings of their parent.
pub trait DefinitionLoader: Send + Sync {
    fn load(&self, name: &str, working_dir: &Path) -> PipelineResult<PipelineDefinition>;
}

/// Loads `<working_dir>/<name>.yaml`, falling back to `.yml`.
pub struct FileLoader;

impl DefinitionLoader for FileLoader {
    fn load(&self, name: &str, working_dir: &Path) -> PipelineResult<PipelineDefinition> {
        let candidates = [
            working_dir.join(format!("{name}.yaml")),
            working_dir.join(format!("{name}.yml")),
        ];
        let Some(path) = candidates.iter().find(|path| path.is_file()) else {
            return Err(PipelineError::PipelineNotFound {
                name: name.to_string(),
                working_dir: working_dir.to_path_buf(),
            });
        };
        let text =
            std::fs::read_to_string(path).map_err(|err| PipelineError::InvalidDefinition {
                name: name.to_string(),
                message: format!("could not read {}: {}", path.display(), err),
            })?;
        PipelineDefinition::from_yaml(name, &text)
    }
}

/// In-memory loader for embedding the engine and for tests.
#[derive(Default)]
pub struct MemoryLoader {
    pipelines: HashMap<String, PipelineDefinition>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition under its own name.
    pub fn insert(&mut self, definition: PipelineDefinition) {
        self.pipelines.insert(definition.name.clone(), definition);
    }

    /// Parse YAML text and store it under `name`.
    pub fn insert_yaml(&mut self, name: &str, yaml: &str) -> PipelineResult<()> {
        self.insert(PipelineDefinition::from_yaml(name, yaml)?);
        Ok(())
    }
}

impl DefinitionLoader for MemoryLoader {
    fn load(&self, name: &str, working_dir: &Path) -> PipelineResult<PipelineDefinition> {
        self.pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::PipelineNotFound {
                name: name.to_string(),
                working_dir: working_dir.to_path_buf(),
            })
    }
}
