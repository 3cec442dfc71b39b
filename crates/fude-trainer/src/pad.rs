//! # Writing Pad
//!
//! Live single-character recognition. Trained models are loaded once and
//! each completed character is ranked as it is submitted.

use fude_core::{
    CharacterModel, FeatureExtractor, FudeError, GaussianHmm, HmmEngine, ModelConfig, ModelStore,
    RankedResult, Ranker, Stage, Writing, render_code,
};
use tracing::debug;

use crate::config::PipelineConfig;

/// Recognizes single writings against a fixed set of trained models.
pub struct WritingPad<E: HmmEngine = GaussianHmm> {
    extractor: FeatureExtractor,
    engine: E,
    models: Vec<CharacterModel>,
    top_k: usize,
}

impl WritingPad<GaussianHmm> {
    /// Opens a pad on the trained models of a pipeline root.
    pub fn open(config: &PipelineConfig) -> fude_core::Result<Self> {
        config.model.validate()?;
        let models = ModelStore::new(&config.root).load_all(Stage::Trained)?;
        Self::new(GaussianHmm::from_config(&config.model), models, &config.model)
    }
}

impl<E: HmmEngine> WritingPad<E> {
    /// # Errors
    ///
    /// Returns [`FudeError::InvalidConfig`] for out-of-range settings and
    /// [`FudeError::NoTrainedModels`] if `models` is empty.
    pub fn new(engine: E, models: Vec<CharacterModel>, config: &ModelConfig) -> fude_core::Result<Self> {
        config.validate()?;
        if models.is_empty() {
            return Err(FudeError::NoTrainedModels);
        }
        Ok(Self {
            extractor: FeatureExtractor::new(config),
            engine,
            models,
            top_k: config.top_k,
        })
    }

    pub fn n_models(&self) -> usize {
        self.models.len()
    }

    /// Ranks one writing against every model.
    pub fn rank(&self, writing: &Writing) -> fude_core::Result<RankedResult> {
        let features = self.extractor.extract(writing);
        debug!(points = writing.n_points(), vectors = features.len(), "ranking writing");
        Ranker::new(&self.engine, &self.models, self.top_k)?.rank_sequence(&features)
    }

    /// Top-K candidate characters for one writing, best first.
    pub fn recognize(&self, writing: &Writing) -> fude_core::Result<Vec<String>> {
        Ok(self
            .rank(writing)?
            .codes()
            .into_iter()
            .map(render_code)
            .collect())
    }

    /// Feeds completed writings through the pad, calling `on_result` once per
    /// writing. Returns the number of writings processed.
    pub fn run<I, F>(&self, writings: I, mut on_result: F) -> usize
    where
        I: IntoIterator<Item = Writing>,
        F: FnMut(&Writing, fude_core::Result<Vec<String>>),
    {
        let mut count = 0;
        for writing in writings {
            let result = self.recognize(&writing);
            on_result(&writing, result);
            count += 1;
        }
        count
    }
}
