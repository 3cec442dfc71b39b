//! # Probabilistic Engine Interface
//!
//! The pipeline only needs two capabilities from an HMM implementation:
//! EM refinement of a model against observed sequences, and optimal-path
//! scoring of a sequence. Construction from explicit matrices is
//! [`HmmParameters::new`]; serialization lives in [`crate::store`].

use crate::error::Result;
use crate::types::{FeatureSequence, HmmParameters};

/// Outcome of refining a model.
#[derive(Debug, Clone)]
pub struct Refinement {
    /// The refined parameters. Topology is that of the input model.
    pub params: HmmParameters,
    /// Number of re-estimation passes applied.
    pub iterations: usize,
    /// Total log-likelihood of the training sequences under `params`.
    pub log_likelihood: f64,
    /// Whether the likelihood gain dropped below the tolerance.
    pub converged: bool,
}

/// A Gaussian-emission HMM implementation.
pub trait HmmEngine: Send + Sync {
    /// Refines `initial` by expectation-maximization over `sequences`.
    ///
    /// Transitions that are zero in `initial` must stay zero.
    fn refine(&self, initial: &HmmParameters, sequences: &[FeatureSequence]) -> Result<Refinement>;

    /// Log-likelihood of the most probable state path for `sequence`.
    fn score(&self, model: &HmmParameters, sequence: &FeatureSequence) -> Result<f64>;
}
