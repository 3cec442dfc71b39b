//! # Gaussian HMM
//!
//! Continuous-emission HMM with diagonal 2-D Gaussians. All recursions run in
//! log-space so long pen traces do not underflow.

use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::{FudeError, Result};
use crate::hmm::engine::{HmmEngine, Refinement};
use crate::types::{DiagonalGaussian, FeatureSequence, HmmParameters};

/// Weights below this are treated as "state never visited".
const MIN_OCCUPANCY: f64 = 1e-300;

/// Numerically stable `log(exp(a) + exp(b))`.
fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// Log-sum-exp over a slice.
fn log_sum_exp_slice(xs: &[f64]) -> f64 {
    xs.iter().fold(f64::NEG_INFINITY, |acc, &x| log_sum_exp(acc, x))
}

/// Log-space view of a model's π and A.
struct LogModel<'a> {
    params: &'a HmmParameters,
    log_initial: Vec<f64>,
    log_transitions: Vec<Vec<f64>>,
}

impl<'a> LogModel<'a> {
    fn new(params: &'a HmmParameters) -> Self {
        Self {
            params,
            log_initial: params.initial().iter().map(|p| p.ln()).collect(),
            log_transitions: params
                .transitions()
                .iter()
                .map(|row| row.iter().map(|p| p.ln()).collect())
                .collect(),
        }
    }

    fn n_states(&self) -> usize {
        self.log_initial.len()
    }

    /// `b[t][j]`: log density of observation `t` under state `j`.
    fn emission_table(&self, seq: &FeatureSequence) -> Vec<Vec<f64>> {
        seq.iter()
            .map(|v| self.params.emissions().iter().map(|g| g.log_density(v)).collect())
            .collect()
    }

    /// Forward pass. Returns `(alpha, log_likelihood)`.
    fn forward(&self, b: &[Vec<f64>]) -> (Vec<Vec<f64>>, f64) {
        let n = self.n_states();
        let t_len = b.len();
        let mut alpha = vec![vec![f64::NEG_INFINITY; n]; t_len];

        for i in 0..n {
            alpha[0][i] = self.log_initial[i] + b[0][i];
        }
        for t in 1..t_len {
            for j in 0..n {
                let mut acc = f64::NEG_INFINITY;
                for i in 0..n {
                    acc = log_sum_exp(acc, alpha[t - 1][i] + self.log_transitions[i][j]);
                }
                alpha[t][j] = acc + b[t][j];
            }
        }

        let ll = log_sum_exp_slice(&alpha[t_len - 1]);
        (alpha, ll)
    }

    /// Backward pass.
    fn backward(&self, b: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n = self.n_states();
        let t_len = b.len();
        let mut beta = vec![vec![f64::NEG_INFINITY; n]; t_len];

        beta[t_len - 1].fill(0.0);
        for t in (0..t_len - 1).rev() {
            for i in 0..n {
                let mut acc = f64::NEG_INFINITY;
                for j in 0..n {
                    acc = log_sum_exp(acc, self.log_transitions[i][j] + b[t + 1][j] + beta[t + 1][j]);
                }
                beta[t][i] = acc;
            }
        }

        beta
    }
}

/// Expected sufficient statistics accumulated over one E-step.
struct Accumulator {
    initial: Vec<f64>,
    transitions: Vec<Vec<f64>>,
    /// Occupancy over `t < T - 1`, the denominator for transitions.
    departures: Vec<f64>,
    /// Occupancy over all `t`, the denominator for emissions.
    occupancy: Vec<f64>,
    sum: Vec<[f64; 2]>,
    sum_sq: Vec<[f64; 2]>,
    sequences: usize,
    log_likelihood: f64,
}

impl Accumulator {
    fn new(n: usize) -> Self {
        Self {
            initial: vec![0.0; n],
            transitions: vec![vec![0.0; n]; n],
            departures: vec![0.0; n],
            occupancy: vec![0.0; n],
            sum: vec![[0.0; 2]; n],
            sum_sq: vec![[0.0; 2]; n],
            sequences: 0,
            log_likelihood: 0.0,
        }
    }

    fn add(&mut self, model: &LogModel<'_>, seq: &FeatureSequence) -> bool {
        let n = model.n_states();
        let b = model.emission_table(seq);
        let (alpha, ll) = model.forward(&b);
        if !ll.is_finite() {
            return false;
        }
        let beta = model.backward(&b);
        let t_len = b.len();

        for (t, v) in seq.iter().enumerate() {
            let x = v.as_array();
            for i in 0..n {
                let gamma = (alpha[t][i] + beta[t][i] - ll).exp();
                if t == 0 {
                    self.initial[i] += gamma;
                }
                if t + 1 < t_len {
                    self.departures[i] += gamma;
                }
                self.occupancy[i] += gamma;
                for d in 0..2 {
                    self.sum[i][d] += gamma * x[d];
                    self.sum_sq[i][d] += gamma * x[d] * x[d];
                }
            }
        }

        for t in 0..t_len.saturating_sub(1) {
            for i in 0..n {
                for j in 0..n {
                    let log_a = model.log_transitions[i][j];
                    if log_a == f64::NEG_INFINITY {
                        continue;
                    }
                    self.transitions[i][j] +=
                        (alpha[t][i] + log_a + b[t + 1][j] + beta[t + 1][j] - ll).exp();
                }
            }
        }

        self.sequences += 1;
        self.log_likelihood += ll;
        true
    }

    /// M-step. States with no expected occupancy keep their previous values.
    fn estimate(&self, previous: &HmmParameters, variance_floor: f64) -> Result<HmmParameters> {
        let n = previous.n_states();

        let initial = normalize(
            self.initial.iter().map(|p| p / self.sequences as f64).collect(),
            previous.initial(),
        );

        let transitions = (0..n)
            .map(|i| {
                if self.departures[i] <= MIN_OCCUPANCY {
                    return previous.transitions()[i].clone();
                }
                normalize(
                    self.transitions[i].iter().map(|x| x / self.departures[i]).collect(),
                    &previous.transitions()[i],
                )
            })
            .collect();

        let emissions = (0..n)
            .map(|i| {
                let g = self.occupancy[i];
                if g <= MIN_OCCUPANCY {
                    return Ok(previous.emissions()[i]);
                }
                let mean = [self.sum[i][0] / g, self.sum[i][1] / g];
                let variance = [
                    (self.sum_sq[i][0] / g - mean[0] * mean[0]).max(variance_floor),
                    (self.sum_sq[i][1] / g - mean[1] * mean[1]).max(variance_floor),
                ];
                DiagonalGaussian::new(mean, variance)
            })
            .collect::<Result<Vec<_>>>()?;

        HmmParameters::new(initial, transitions, emissions)
    }
}

/// Rescales `probs` to sum to one, falling back to `previous` if it cannot.
fn normalize(probs: Vec<f64>, previous: &[f64]) -> Vec<f64> {
    let sum: f64 = probs.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        probs.into_iter().map(|p| p / sum).collect()
    } else {
        previous.to_vec()
    }
}

/// Built-in Gaussian HMM engine (Baum-Welch + Viterbi).
#[derive(Debug, Clone)]
pub struct GaussianHmm {
    max_iterations: usize,
    tolerance: f64,
    variance_floor: f64,
}

impl GaussianHmm {
    pub fn new(max_iterations: usize, tolerance: f64, variance_floor: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
            variance_floor,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.max_iterations, config.tolerance, config.variance_floor)
    }

    /// Total forward log-likelihood of `sequences` (empty ones are skipped).
    pub fn log_likelihood(&self, model: &HmmParameters, sequences: &[FeatureSequence]) -> f64 {
        let log_model = LogModel::new(model);
        sequences
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| log_model.forward(&log_model.emission_table(s)).1)
            .sum()
    }

    /// Most probable state path and its log-likelihood.
    ///
    /// # Errors
    ///
    /// Returns [`FudeError::EmptySequence`] for an empty sequence.
    pub fn viterbi(&self, model: &HmmParameters, seq: &FeatureSequence) -> Result<(Vec<usize>, f64)> {
        if seq.is_empty() {
            return Err(FudeError::EmptySequence);
        }

        let log_model = LogModel::new(model);
        let b = log_model.emission_table(seq);
        let n = log_model.n_states();
        let t_len = b.len();

        let mut delta = vec![vec![f64::NEG_INFINITY; n]; t_len];
        let mut psi = vec![vec![0usize; n]; t_len];

        for i in 0..n {
            delta[0][i] = log_model.log_initial[i] + b[0][i];
        }
        for t in 1..t_len {
            for j in 0..n {
                let mut best_val = f64::NEG_INFINITY;
                let mut best_state = 0;
                for i in 0..n {
                    let v = delta[t - 1][i] + log_model.log_transitions[i][j];
                    if v > best_val {
                        best_val = v;
                        best_state = i;
                    }
                }
                delta[t][j] = best_val + b[t][j];
                psi[t][j] = best_state;
            }
        }

        let mut best_final = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for (i, &score) in delta[t_len - 1].iter().enumerate() {
            if score > best_score {
                best_score = score;
                best_final = i;
            }
        }

        let mut path = vec![0usize; t_len];
        path[t_len - 1] = best_final;
        for t in (0..t_len - 1).rev() {
            path[t] = psi[t + 1][path[t + 1]];
        }

        Ok((path, best_score))
    }

    /// Baum-Welch re-estimation over several sequences.
    ///
    /// Stops when the total log-likelihood gain is below the tolerance or
    /// after `max_iterations` passes. Sequences with zero likelihood under
    /// the current model are left out of that pass.
    pub fn baum_welch(&self, initial: &HmmParameters, sequences: &[FeatureSequence]) -> Result<Refinement> {
        let usable: Vec<&FeatureSequence> = sequences.iter().filter(|s| !s.is_empty()).collect();
        if usable.is_empty() {
            return Err(FudeError::EmptySequence);
        }

        let mut current = initial.clone();
        let mut prev_ll = f64::NEG_INFINITY;
        let mut iterations = 0;

        for _ in 0..self.max_iterations {
            let log_model = LogModel::new(&current);
            let mut acc = Accumulator::new(current.n_states());
            let mut skipped = 0usize;
            for seq in &usable {
                if !acc.add(&log_model, seq) {
                    skipped += 1;
                }
            }
            if skipped > 0 {
                warn!(skipped, "sequences with zero likelihood left out of re-estimation");
            }
            if acc.sequences == 0 {
                return Err(FudeError::InvalidModel(
                    "no training sequence has non-zero likelihood".into(),
                ));
            }

            let ll = acc.log_likelihood;
            if prev_ll.is_finite() && (ll - prev_ll).abs() < self.tolerance {
                debug!(iterations, ll, "baum-welch converged");
                return Ok(Refinement {
                    params: current,
                    iterations,
                    log_likelihood: ll,
                    converged: true,
                });
            }
            prev_ll = ll;

            current = acc.estimate(&current, self.variance_floor)?;
            iterations += 1;
        }

        let log_likelihood = self.log_likelihood(&current, sequences);
        debug!(iterations, log_likelihood, "baum-welch hit iteration cap");
        Ok(Refinement {
            params: current,
            iterations,
            log_likelihood,
            converged: false,
        })
    }
}

impl HmmEngine for GaussianHmm {
    fn refine(&self, initial: &HmmParameters, sequences: &[FeatureSequence]) -> Result<Refinement> {
        self.baum_welch(initial, sequences)
    }

    fn score(&self, model: &HmmParameters, sequence: &FeatureSequence) -> Result<f64> {
        self.viterbi(model, sequence).map(|(_, score)| score)
    }
}
