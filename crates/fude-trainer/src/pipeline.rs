//! # Batch Pipeline
//!
//! Runs the four build phases over every character class:
//! feature extraction, initial model estimation, Baum-Welch training, and
//! evaluation. Characters are independent, so each phase fans out over a
//! rayon pool. A character that fails is logged and reported; the others
//! carry on.

use std::fmt;

use anyhow::{Context, bail};
use fude_core::{
    CharCode, CharacterModel, EvaluationReport, FeatureExtractor, FudeError, GaussianHmm, HmmEngine,
    HmmParameters, InitialModelBuilder, ModelStore, Partition, Ranker, Refinement, SequenceStore, Stage,
};
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::source::StrokeSource;

/// Per-character outcome of one pipeline phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub succeeded: Vec<CharCode>,
    pub failed: Vec<(CharCode, String)>,
}

impl BatchReport {
    fn record<T>(&mut self, stage: &str, code: CharCode, result: fude_core::Result<T>) {
        match result {
            Ok(_) => self.succeeded.push(code),
            Err(e) => {
                error!(stage, code, error = %e, "character failed");
                self.failed.push((code, e.to_string()));
            }
        }
    }

    fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} succeeded, {} failed", self.succeeded.len(), self.failed.len())?;
        for (code, reason) in &self.failed {
            write!(f, "\n  {code}: {reason}")?;
        }
        Ok(())
    }
}

/// Evaluation results plus any characters that could not be evaluated.
#[derive(Debug, Clone, Default)]
pub struct EvaluationRun {
    pub report: EvaluationReport,
    pub batch: BatchReport,
}

/// Orchestrates the modeling pipeline over the on-disk stores.
pub struct Pipeline<E: HmmEngine = GaussianHmm> {
    config: PipelineConfig,
    sequences: SequenceStore,
    models: ModelStore,
    extractor: FeatureExtractor,
    builder: InitialModelBuilder,
    engine: E,
    pool: ThreadPool,
}

impl Pipeline<GaussianHmm> {
    /// Pipeline using the built-in Gaussian HMM engine.
    pub fn new(config: PipelineConfig) -> anyhow::Result<Self> {
        let engine = GaussianHmm::from_config(&config.model);
        Self::with_engine(config, engine)
    }
}

impl<E: HmmEngine> Pipeline<E> {
    pub fn with_engine(config: PipelineConfig, engine: E) -> anyhow::Result<Self> {
        config.model.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.unwrap_or(0))
            .build()
            .context("failed to start worker pool")?;

        Ok(Self {
            sequences: SequenceStore::new(&config.root),
            models: ModelStore::new(&config.root),
            extractor: FeatureExtractor::new(&config.model),
            builder: InitialModelBuilder::new(config.model.clone()),
            engine,
            pool,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sequence_store(&self) -> &SequenceStore {
        &self.sequences
    }

    pub fn model_store(&self) -> &ModelStore {
        &self.models
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Extracts and stores feature sequences for both partitions.
    pub fn extract_features(&self, source: &dyn StrokeSource) -> anyhow::Result<BatchReport> {
        let mut report = BatchReport::default();

        for &partition in Partition::all() {
            let writings = source
                .writings(partition)
                .with_context(|| format!("failed to load {partition} strokes"))?;
            info!(%partition, characters = writings.len(), "extracting features");

            let results: Vec<(CharCode, fude_core::Result<()>)> = self.pool.install(|| {
                writings
                    .par_iter()
                    .map(|(&code, samples)| {
                        let collection = self.extractor.extract_collection(code, samples);
                        let empty = collection.sequences.iter().filter(|s| s.is_empty()).count();
                        if empty > 0 {
                            warn!(%partition, code, empty, "samples too short to yield features");
                        }
                        (code, self.sequences.write(partition, &collection))
                    })
                    .collect()
            });

            let mut phase = BatchReport::default();
            for (code, result) in results {
                phase.record("fextract", code, result);
            }
            report.merge(phase);
        }

        Ok(report)
    }

    /// Estimates and stores the initial model of one character.
    pub fn init_character(&self, code: CharCode) -> fude_core::Result<HmmParameters> {
        let collection = self
            .sequences
            .load(Partition::Train, code)?
            .ok_or(FudeError::NoTrainingData { code })?;
        let params = self.builder.build(&collection)?;
        self.models
            .write(Stage::Initial, &CharacterModel::new(code, params.clone()))?;
        debug!(code, n_states = params.n_states(), "initial model written");
        Ok(params)
    }

    /// Builds initial models for every character with training features.
    pub fn build_initial_models(&self) -> anyhow::Result<BatchReport> {
        let codes = self.sequences.codes(Partition::Train)?;
        if codes.is_empty() {
            bail!(
                "no training feature sets found in {}",
                self.sequences.partition_dir(Partition::Train).display()
            );
        }
        info!(characters = codes.len(), "building initial models");

        Ok(self.for_each_code("init", &codes, |code| self.init_character(code)))
    }

    /// Refines one character's initial model and stores it as trained.
    pub fn train_character(&self, code: CharCode) -> fude_core::Result<Refinement> {
        let initial = self
            .models
            .load(Stage::Initial, code)?
            .ok_or(FudeError::NoInitialModel { code })?;
        let collection = self
            .sequences
            .load(Partition::Train, code)?
            .ok_or(FudeError::NoTrainingData { code })?;
        if collection.non_empty().next().is_none() {
            return Err(FudeError::NoTrainingData { code });
        }

        let refinement = self.engine.refine(&initial, &collection.sequences)?;
        self.models.write(
            Stage::Trained,
            &CharacterModel::new(code, refinement.params.clone()),
        )?;
        info!(
            code,
            iterations = refinement.iterations,
            log_likelihood = refinement.log_likelihood,
            converged = refinement.converged,
            path = %self.models.path(Stage::Trained, code).display(),
            "trained model written"
        );
        Ok(refinement)
    }

    /// Trains every character that has an initial model.
    pub fn train(&self) -> anyhow::Result<BatchReport> {
        let codes = self.models.codes(Stage::Initial)?;
        if codes.is_empty() {
            bail!(
                "no initial models found in {}",
                self.models.stage_dir(Stage::Initial).display()
            );
        }
        info!(characters = codes.len(), "training models");

        Ok(self.for_each_code("train", &codes, |code| self.train_character(code)))
    }

    /// Loads every trained model, reporting the ones that fail to load.
    pub fn load_trained_models(&self) -> anyhow::Result<(Vec<CharacterModel>, BatchReport)> {
        let mut models = Vec::new();
        let mut report = BatchReport::default();

        for code in self.models.codes(Stage::Trained)? {
            let loaded = self
                .models
                .load(Stage::Trained, code)
                .and_then(|p| p.ok_or(FudeError::NoTrainedModels));
            if let Ok(params) = &loaded {
                models.push(CharacterModel::new(code, params.clone()));
            }
            report.record("load", code, loaded);
        }

        if models.is_empty() {
            return Err(FudeError::NoTrainedModels.into());
        }
        Ok((models, report))
    }

    /// Ranks every evaluation sequence against all trained models.
    pub fn evaluate(&self) -> anyhow::Result<EvaluationRun> {
        let (models, loaded) = self.load_trained_models()?;
        // Only load failures carry over.
        let mut batch = BatchReport {
            succeeded: Vec::new(),
            failed: loaded.failed,
        };
        let codes = self.sequences.codes(Partition::Eval)?;
        if codes.is_empty() {
            bail!(
                "no evaluation feature sets found in {}",
                self.sequences.partition_dir(Partition::Eval).display()
            );
        }
        let ranker = Ranker::new(&self.engine, &models, self.config.model.top_k)?;
        info!(models = models.len(), characters = codes.len(), "evaluating");

        let results: Vec<(CharCode, fude_core::Result<EvaluationReport>)> = self.pool.install(|| {
            codes
                .par_iter()
                .map(|&code| {
                    let result = self
                        .sequences
                        .load(Partition::Eval, code)
                        .and_then(|c| c.ok_or(FudeError::EmptyCollection { code }))
                        .and_then(|c| EvaluationReport::evaluate_collection(&ranker, &c));
                    (code, result)
                })
                .collect()
        });

        let mut report = EvaluationReport::new();
        for (code, result) in results {
            match result {
                Ok(partial) => {
                    report.merge(partial);
                    batch.succeeded.push(code);
                }
                Err(e) => batch.record::<()>("eval", code, Err(e)),
            }
        }

        info!(
            samples = report.counts.total,
            unranked = report.unranked,
            match1 = report.counts.match1(),
            match5 = report.counts.match5(),
            match10 = report.counts.match10(),
            "evaluation finished"
        );
        Ok(EvaluationRun { report, batch })
    }

    fn for_each_code<T, F>(&self, stage: &str, codes: &[CharCode], work: F) -> BatchReport
    where
        T: Send,
        F: Fn(CharCode) -> fude_core::Result<T> + Sync,
    {
        let results: Vec<(CharCode, fude_core::Result<T>)> = self
            .pool
            .install(|| codes.par_iter().map(|&code| (code, work(code))).collect());

        let mut report = BatchReport::default();
        for (code, result) in results {
            report.record(stage, code, result);
        }
        report
    }
}
