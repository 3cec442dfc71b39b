//! # Fude Trainer
//!
//! Batch workflows around `fude-core`: stroke input, feature extraction,
//! initial model estimation, Baum-Welch training, evaluation, and the live
//! writing pad.

pub mod cli;
pub mod config;
pub mod pad;
pub mod pipeline;
pub mod source;

pub use config::PipelineConfig;
pub use pad::WritingPad;
pub use pipeline::{BatchReport, EvaluationRun, Pipeline};
pub use source::{JsonlStrokeSource, LabeledWriting, StrokeSource, WritingSet};
