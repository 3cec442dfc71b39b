//! # Initial Model Estimation
//!
//! Structurally derived starting points for Baum-Welch: a left-to-right
//! topology plus per-state Gaussians estimated from an equal split of
//! every training sequence.

pub mod builder;
pub mod split;
pub mod stats;

pub use builder::{InitialModelBuilder, build_initial, initial_distribution, transition_matrix};
pub use split::{split_evenly, split_sizes};
pub use stats::{mean, population_variance};
