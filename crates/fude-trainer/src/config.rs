use std::path::PathBuf;

use fude_core::ModelConfig;

/// Default root directory for stores.
pub const DEFAULT_ROOT: &str = "models/basic";

/// Settings for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the `features/` and `hmms/` stores.
    pub root: PathBuf,
    pub model: ModelConfig,
    /// Worker threads for per-character processing; `None` uses all cores.
    pub workers: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            model: ModelConfig::default(),
            workers: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }
}
