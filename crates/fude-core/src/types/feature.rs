use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FudeError, Result};
use crate::types::stroke::CharCode;

/// Number of components in a feature vector.
pub const FEATURE_DIMENSIONS: usize = 2;

/// Absolute displacement between two consecutively sampled pen points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub dx: f64,
    pub dy: f64,
}

impl FeatureVector {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn as_array(&self) -> [f64; FEATURE_DIMENSIONS] {
        [self.dx, self.dy]
    }
}

/// The ordered feature vectors of one written character.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSequence(Vec<FeatureVector>);

impl FeatureSequence {
    pub fn new(vectors: Vec<FeatureVector>) -> Self {
        Self(vectors)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureVector> {
        self.0.iter()
    }

    /// Flattens into `[dx1, dy1, dx2, dy2, ...]`.
    pub fn flatten(&self) -> Vec<f64> {
        self.0.iter().flat_map(|v| v.as_array()).collect()
    }

    /// Rebuilds a sequence from its flattened form.
    pub fn from_flat(values: &[f64]) -> Result<Self> {
        if values.len() % FEATURE_DIMENSIONS != 0 {
            return Err(FudeError::MalformedSequence {
                reason: format!(
                    "flattened length {} is not a multiple of {}",
                    values.len(),
                    FEATURE_DIMENSIONS
                ),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(FudeError::MalformedSequence {
                reason: format!("non-finite component {bad}"),
            });
        }

        Ok(Self(
            values
                .chunks_exact(FEATURE_DIMENSIONS)
                .map(|c| FeatureVector::new(c[0], c[1]))
                .collect(),
        ))
    }
}

impl From<Vec<FeatureVector>> for FeatureSequence {
    fn from(vectors: Vec<FeatureVector>) -> Self {
        Self(vectors)
    }
}

impl<'a> IntoIterator for &'a FeatureSequence {
    type Item = &'a FeatureVector;
    type IntoIter = std::slice::Iter<'a, FeatureVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Dataset partition a sequence collection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Eval,
}

impl Partition {
    pub fn all() -> &'static [Partition] {
        &[Partition::Train, Partition::Eval]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Eval => "eval",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All feature sequences of one character class within one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceCollection {
    /// Character the sequences were written as.
    pub code: CharCode,
    /// Stroke count of the first sample; fixes the character's state count.
    pub reference_strokes: Option<usize>,
    /// The sequences, one per written sample.
    pub sequences: Vec<FeatureSequence>,
}

impl SequenceCollection {
    pub fn new(code: CharCode, reference_strokes: Option<usize>, sequences: Vec<FeatureSequence>) -> Self {
        Self {
            code,
            reference_strokes,
            sequences,
        }
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Total number of feature vectors over all sequences.
    pub fn n_vectors(&self) -> usize {
        self.sequences.iter().map(FeatureSequence::len).sum()
    }

    /// Sequences that hold at least one feature vector.
    pub fn non_empty(&self) -> impl Iterator<Item = &FeatureSequence> + '_ {
        self.sequences.iter().filter(|s| !s.is_empty())
    }
}
