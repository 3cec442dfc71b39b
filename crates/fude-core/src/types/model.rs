use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FudeError, Result};
use crate::types::feature::{FEATURE_DIMENSIONS, FeatureVector};
use crate::types::stroke::CharCode;

/// Tolerance for probability rows summing to one.
const STOCHASTIC_TOLERANCE: f64 = 1e-6;

/// Lifecycle stage of a stored model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Structurally derived and statistically estimated, not yet refined.
    Initial,
    /// Refined by Baum-Welch re-estimation.
    Trained,
}

impl Stage {
    /// Directory name used by the model store.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Initial => "init",
            Stage::Trained => "train",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Initial => f.write_str("initial"),
            Stage::Trained => f.write_str("trained"),
        }
    }
}

/// A 2-D Gaussian with diagonal covariance (dx and dy independent).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagonalGaussian {
    mean: [f64; FEATURE_DIMENSIONS],
    variance: [f64; FEATURE_DIMENSIONS],
}

impl DiagonalGaussian {
    /// Builds a Gaussian, rejecting non-finite means and non-positive variances.
    pub fn new(mean: [f64; FEATURE_DIMENSIONS], variance: [f64; FEATURE_DIMENSIONS]) -> Result<Self> {
        if mean.iter().any(|m| !m.is_finite()) {
            return Err(FudeError::InvalidModel(format!("non-finite mean {mean:?}")));
        }
        if variance.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(FudeError::InvalidModel(format!(
                "variance must be positive and finite, got {variance:?}"
            )));
        }
        Ok(Self { mean, variance })
    }

    pub fn mean(&self) -> [f64; FEATURE_DIMENSIONS] {
        self.mean
    }

    pub fn variance(&self) -> [f64; FEATURE_DIMENSIONS] {
        self.variance
    }

    /// Row-major 2x2 covariance matrix `[var(dx), 0, 0, var(dy)]`.
    pub fn covariance(&self) -> [f64; 4] {
        [self.variance[0], 0.0, 0.0, self.variance[1]]
    }

    /// Log probability density at `v`.
    pub fn log_density(&self, v: &FeatureVector) -> f64 {
        v.as_array()
            .iter()
            .zip(self.mean.iter().zip(self.variance.iter()))
            .map(|(x, (m, var))| -0.5 * ((2.0 * PI * var).ln() + (x - m).powi(2) / var))
            .sum()
    }
}

/// Parameters of a left-to-right HMM with diagonal Gaussian emissions.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmParameters {
    initial: Vec<f64>,
    transitions: Vec<Vec<f64>>,
    emissions: Vec<DiagonalGaussian>,
}

impl HmmParameters {
    /// Builds a model from explicit (π, A, B) matrices.
    ///
    /// # Errors
    ///
    /// Returns [`FudeError::InvalidModel`] if the model has no states, the
    /// shapes disagree, or π or any row of A is not a probability vector.
    pub fn new(
        initial: Vec<f64>,
        transitions: Vec<Vec<f64>>,
        emissions: Vec<DiagonalGaussian>,
    ) -> Result<Self> {
        let n = initial.len();
        if n == 0 {
            return Err(FudeError::InvalidModel("model must have at least one state".into()));
        }
        if transitions.len() != n || emissions.len() != n {
            return Err(FudeError::InvalidModel(format!(
                "shape mismatch: {} initial, {} transition rows, {} emissions",
                n,
                transitions.len(),
                emissions.len()
            )));
        }

        check_distribution("initial distribution", &initial)?;
        for (i, row) in transitions.iter().enumerate() {
            if row.len() != n {
                return Err(FudeError::InvalidModel(format!(
                    "transition row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            check_distribution(&format!("transition row {i}"), row)?;
        }

        Ok(Self {
            initial,
            transitions,
            emissions,
        })
    }

    pub fn n_states(&self) -> usize {
        self.initial.len()
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    pub fn transitions(&self) -> &[Vec<f64>] {
        &self.transitions
    }

    pub fn emissions(&self) -> &[DiagonalGaussian] {
        &self.emissions
    }

    /// True when every state only moves to itself or its successor.
    pub fn is_left_to_right(&self) -> bool {
        self.transitions.iter().enumerate().all(|(i, row)| {
            row.iter()
                .enumerate()
                .all(|(j, &p)| p == 0.0 || j == i || j == i + 1)
        })
    }
}

fn check_distribution(what: &str, probs: &[f64]) -> Result<()> {
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(FudeError::InvalidModel(format!(
            "{what} has negative or non-finite entries"
        )));
    }
    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > STOCHASTIC_TOLERANCE {
        return Err(FudeError::InvalidModel(format!("{what} sums to {sum}, not 1")));
    }
    Ok(())
}

/// A model tagged with the character it recognizes.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterModel {
    pub code: CharCode,
    pub params: HmmParameters,
}

impl CharacterModel {
    pub fn new(code: CharCode, params: HmmParameters) -> Self {
        Self { code, params }
    }
}
