//! # Fude Core
//!
//! Per-character Hidden Markov Models for handwritten character recognition.
//! Pen strokes become displacement feature sequences, each character gets a
//! left-to-right Gaussian HMM initialized by equal-split estimation and
//! refined by Baum-Welch, and recognition ranks characters by Viterbi score.
//!
//! ## Quick Start
//!
//! ```rust
//! use fude_core::{
//!     FeatureExtractor, GaussianHmm, HmmEngine, InitialModelBuilder, ModelConfig, Ranker,
//!     CharacterModel, Stroke, Writing,
//! };
//!
//! let config = ModelConfig::new().with_sampling_rate(1.0).with_states_per_stroke(2);
//! let extractor = FeatureExtractor::new(&config);
//!
//! let down = |x: i32| Writing::new(vec![Stroke::from_coords(&[(x, 0), (x, 3), (x, 6), (x + 1, 9), (x + 1, 12)])]);
//! let across = |y: i32| Writing::new(vec![Stroke::from_coords(&[(0, y), (3, y), (6, y), (9, y + 1), (12, y + 1)])]);
//!
//! let engine = GaussianHmm::from_config(&config);
//! let builder = InitialModelBuilder::new(config.clone());
//! let mut models = Vec::new();
//! for (code, writings) in [(0x4E28, vec![down(0), down(5)]), (0x4E00, vec![across(0), across(5)])] {
//!     let collection = extractor.extract_collection(code, &writings);
//!     let initial = builder.build(&collection).unwrap();
//!     let trained = engine.refine(&initial, &collection.sequences).unwrap();
//!     models.push(CharacterModel::new(code, trained.params));
//! }
//!
//! let ranker = Ranker::new(&engine, &models, config.top_k).unwrap();
//! let result = ranker.rank_sequence(&extractor.extract(&down(2))).unwrap();
//! assert_eq!(result.best().unwrap().code, 0x4E28);
//! ```
pub mod config;
pub mod error;
pub mod features;
pub mod hmm;
pub mod init;
pub mod ranking;
pub mod store;
pub mod types;

// Re-export primary API
pub use config::ModelConfig;
pub use error::{FudeError, Result};
pub use features::{FeatureExtractor, extract};
pub use hmm::{GaussianHmm, HmmEngine, Refinement};
pub use init::{InitialModelBuilder, build_initial};
pub use ranking::{Candidate, EvaluationReport, MatchCounts, Query, RankedResult, Ranker, SampleOutcome};
pub use store::{ModelStore, SequenceStore};
pub use types::{
    CharCode, CharacterModel, DiagonalGaussian, FeatureSequence, FeatureVector, HmmParameters,
    Partition, Point, SequenceCollection, Stage, Stroke, Writing, render_code,
};
