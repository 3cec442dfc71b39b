//! # Displacement Feature Extraction
//!
//! Turns a character's pen strokes into a sequence of `(|dx|, |dy|)`
//! vectors between consecutively sampled points.

use crate::config::{ModelConfig, sampling_step};
use crate::types::{FeatureSequence, FeatureVector, Point, SequenceCollection, Writing, CharCode};

/// Extracts displacement features from a writing.
///
/// Strokes are concatenated into one point stream indexed from 0 and every
/// `round(1 / sampling_rate)`-th point is kept. Sampling does not restart at
/// stroke boundaries. The first kept point only seeds the reference.
pub fn extract(writing: &Writing, sampling_rate: f64) -> FeatureSequence {
    let step = sampling_step(sampling_rate);
    let mut vectors = Vec::with_capacity(writing.n_points() / step);
    let mut last: Option<Point> = None;

    for point in writing.points().step_by(step) {
        if let Some(prev) = last {
            vectors.push(FeatureVector::new(
                f64::from(point.x.abs_diff(prev.x)),
                f64::from(point.y.abs_diff(prev.y)),
            ));
        }
        last = Some(*point);
    }

    FeatureSequence::new(vectors)
}

/// Feature extractor bound to a model configuration.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    sampling_rate: f64,
}

impl FeatureExtractor {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            sampling_rate: config.sampling_rate,
        }
    }

    pub fn extract(&self, writing: &Writing) -> FeatureSequence {
        extract(writing, self.sampling_rate)
    }

    /// Extracts every writing of one character into a collection.
    ///
    /// The first writing's stroke count becomes the collection's reference.
    pub fn extract_collection(&self, code: CharCode, writings: &[Writing]) -> SequenceCollection {
        let sequences = writings.iter().map(|w| self.extract(w)).collect();
        SequenceCollection::new(code, writings.first().map(Writing::n_strokes), sequences)
    }
}
