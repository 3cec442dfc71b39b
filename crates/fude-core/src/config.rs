//! # Model Configuration
//!
//! Immutable settings shared by feature extraction, model building,
//! refinement, and ranking.

use serde::{Deserialize, Serialize};

use crate::error::{FudeError, Result};

/// Default fraction of pen points kept during feature extraction.
pub const DEFAULT_SAMPLING_RATE: f64 = 0.5;
/// Default number of HMM states per stroke of the reference sample.
pub const DEFAULT_STATES_PER_STROKE: usize = 3;
/// Default lower bound for emission variances.
pub const DEFAULT_VARIANCE_FLOOR: f64 = 1e-2;
/// Default cap on Baum-Welch iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 500;
/// Default log-likelihood gain below which Baum-Welch stops.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
/// Default number of ranked candidates reported.
pub const DEFAULT_TOP_K: usize = 10;

/// Configuration for the modeling pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Fraction of points kept, in `(0, 1]`. `1.0` keeps every point.
    pub sampling_rate: f64,
    /// States allotted to each stroke of a character's reference sample.
    pub states_per_stroke: usize,
    /// Minimum variance of any emission component.
    pub variance_floor: f64,
    /// Maximum number of re-estimation passes.
    pub max_iterations: usize,
    /// Convergence threshold on total log-likelihood gain.
    pub tolerance: f64,
    /// How many ranked candidates to keep per query.
    pub top_k: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
            states_per_stroke: DEFAULT_STATES_PER_STROKE,
            variance_floor: DEFAULT_VARIANCE_FLOOR,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ModelConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampling rate.
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Set the number of states per stroke.
    pub fn with_states_per_stroke(mut self, n: usize) -> Self {
        self.states_per_stroke = n;
        self
    }

    /// Set the variance floor.
    pub fn with_variance_floor(mut self, floor: f64) -> Self {
        self.variance_floor = floor;
        self
    }

    /// Set the Baum-Welch iteration cap.
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.max(0.0);
        self
    }

    /// Set the number of ranked candidates kept.
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Keep every `sampling_step()`-th point.
    pub fn sampling_step(&self) -> usize {
        sampling_step(self.sampling_rate)
    }

    /// State count for a character whose reference sample has `n_strokes` strokes.
    pub fn n_states_for(&self, n_strokes: usize) -> usize {
        n_strokes * self.states_per_stroke
    }

    /// Checks that every setting is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.sampling_rate > 0.0 && self.sampling_rate <= 1.0) {
            return Err(FudeError::InvalidConfig(format!(
                "sampling rate must be in (0, 1], got {}",
                self.sampling_rate
            )));
        }
        if self.states_per_stroke == 0 {
            return Err(FudeError::InvalidConfig("states per stroke must be positive".into()));
        }
        if !(self.variance_floor > 0.0 && self.variance_floor.is_finite()) {
            return Err(FudeError::InvalidConfig(format!(
                "variance floor must be positive, got {}",
                self.variance_floor
            )));
        }
        if self.top_k == 0 {
            return Err(FudeError::InvalidConfig("top_k must be positive".into()));
        }
        Ok(())
    }
}

/// Point stride for a sampling rate: `round(1 / rate)`, at least 1.
pub fn sampling_step(rate: f64) -> usize {
    ((1.0 / rate).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sampling_step(), 2);
        assert_eq!(config.n_states_for(2), 6);
    }

    #[test]
    fn test_sampling_step() {
        assert_eq!(sampling_step(1.0), 1);
        assert_eq!(sampling_step(0.5), 2);
        assert_eq!(sampling_step(0.3), 3);
        assert_eq!(sampling_step(0.26), 4);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(ModelConfig::new().with_sampling_rate(0.0).validate().is_err());
        assert!(ModelConfig::new().with_sampling_rate(1.5).validate().is_err());
        assert!(ModelConfig::new().with_states_per_stroke(0).validate().is_err());
        assert!(ModelConfig::new().with_variance_floor(0.0).validate().is_err());
        assert!(ModelConfig::new().with_top_k(0).validate().is_err());
    }

    #[test]
    fn test_builder_chain() {
        let config = ModelConfig::new()
            .with_sampling_rate(1.0)
            .with_states_per_stroke(4)
            .with_tolerance(-1.0);

        assert_eq!(config.sampling_step(), 1);
        assert_eq!(config.states_per_stroke, 4);
        assert_eq!(config.tolerance, 0.0);
    }
}
