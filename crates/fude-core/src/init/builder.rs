use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{FudeError, Result};
use crate::init::split::split_evenly;
use crate::init::stats::{mean, population_variance};
use crate::types::{DiagonalGaussian, HmmParameters, SequenceCollection};

/// Self-loop probability of every non-final state before refinement.
pub const INITIAL_SELF_LOOP: f64 = 0.5;

/// Start distribution: all mass on the first state.
pub fn initial_distribution(n_states: usize) -> Vec<f64> {
    let mut pi = vec![0.0; n_states];
    if let Some(first) = pi.first_mut() {
        *first = 1.0;
    }
    pi
}

/// Left-to-right transition matrix.
///
/// State `i` stays with probability 0.5 and advances with 0.5; the last
/// state loops on itself with probability 1.
pub fn transition_matrix(n_states: usize) -> Vec<Vec<f64>> {
    (0..n_states)
        .map(|i| {
            let mut row = vec![0.0; n_states];
            if i + 1 == n_states {
                row[i] = 1.0;
            } else {
                row[i] = INITIAL_SELF_LOOP;
                row[i + 1] = 1.0 - INITIAL_SELF_LOOP;
            }
            row
        })
        .collect()
}

/// Per-state pools of dx and dy values.
#[derive(Debug, Default, Clone)]
struct StatePool {
    dx: Vec<f64>,
    dy: Vec<f64>,
}

/// Builds the initial model for a collection with a fixed state count.
///
/// Every sequence is split into `n_states` contiguous near-equal chunks and
/// chunk `k` of every sequence is pooled into state `k`. Each state's
/// Gaussian takes the pooled means and population variances, floored at
/// `variance_floor`.
///
/// # Errors
///
/// * [`FudeError::EmptyCollection`] if the collection has no sequences.
/// * [`FudeError::DegenerateState`] if any state's pool ends up empty.
pub fn build_initial(
    n_states: usize,
    collection: &SequenceCollection,
    variance_floor: f64,
) -> Result<HmmParameters> {
    if collection.is_empty() {
        return Err(FudeError::EmptyCollection {
            code: collection.code,
        });
    }
    if n_states == 0 {
        return Err(FudeError::InvalidModel(format!(
            "character {} has zero states",
            collection.code
        )));
    }

    let mut pools = vec![StatePool::default(); n_states];
    for seq in &collection.sequences {
        for (pool, chunk) in pools.iter_mut().zip(split_evenly(seq.vectors(), n_states)) {
            pool.dx.extend(chunk.iter().map(|v| v.dx));
            pool.dy.extend(chunk.iter().map(|v| v.dy));
        }
    }

    let emissions = pools
        .iter()
        .enumerate()
        .map(|(state, pool)| {
            let degenerate = || FudeError::DegenerateState {
                code: collection.code,
                state,
            };
            let mean_dx = mean(&pool.dx).ok_or_else(degenerate)?;
            let mean_dy = mean(&pool.dy).ok_or_else(degenerate)?;
            let var_dx = population_variance(&pool.dx).ok_or_else(degenerate)?;
            let var_dy = population_variance(&pool.dy).ok_or_else(degenerate)?;

            debug!(
                code = collection.code,
                state,
                samples = pool.dx.len(),
                mean_dx,
                mean_dy,
                var_dx,
                var_dy,
                "estimated state emission"
            );

            DiagonalGaussian::new(
                [mean_dx, mean_dy],
                [var_dx.max(variance_floor), var_dy.max(variance_floor)],
            )
        })
        .collect::<Result<Vec<_>>>()?;

    HmmParameters::new(
        initial_distribution(n_states),
        transition_matrix(n_states),
        emissions,
    )
}

/// Builds initial models using the configured states-per-stroke.
#[derive(Debug, Clone)]
pub struct InitialModelBuilder {
    config: ModelConfig,
}

impl InitialModelBuilder {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// State count fixed by the collection's reference sample.
    pub fn n_states(&self, collection: &SequenceCollection) -> Result<usize> {
        let strokes = collection.reference_strokes.ok_or(FudeError::EmptyCollection {
            code: collection.code,
        })?;
        Ok(self.config.n_states_for(strokes))
    }

    pub fn build(&self, collection: &SequenceCollection) -> Result<HmmParameters> {
        if collection.is_empty() {
            return Err(FudeError::EmptyCollection {
                code: collection.code,
            });
        }
        let n_states = self.n_states(collection)?;
        build_initial(n_states, collection, self.config.variance_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureSequence, FeatureVector};

    fn seq(pairs: &[(f64, f64)]) -> FeatureSequence {
        FeatureSequence::new(pairs.iter().map(|&(dx, dy)| FeatureVector::new(dx, dy)).collect())
    }

    #[test]
    fn test_initial_distribution() {
        assert_eq!(initial_distribution(3), vec![1.0, 0.0, 0.0]);
        assert_eq!(initial_distribution(1), vec![1.0]);
    }

    #[test]
    fn test_transition_rows_are_stochastic_left_to_right() {
        for n in 1..10 {
            let matrix = transition_matrix(n);
            for (i, row) in matrix.iter().enumerate() {
                assert_eq!(row.iter().sum::<f64>(), 1.0);
                for (j, &p) in row.iter().enumerate() {
                    if j != i && j != i + 1 {
                        assert_eq!(p, 0.0);
                    }
                }
            }
            assert_eq!(matrix[n - 1][n - 1], 1.0);
        }
    }

    #[test]
    fn test_three_states_three_vectors_each() {
        // One ten-point stroke at full sampling: nine vectors, three per state.
        let collection = SequenceCollection::new(
            97,
            Some(1),
            vec![seq(&[
                (1.0, 0.0),
                (1.0, 0.0),
                (1.0, 0.0),
                (0.0, 2.0),
                (0.0, 4.0),
                (0.0, 6.0),
                (5.0, 5.0),
                (5.0, 5.0),
                (5.0, 5.0),
            ])],
        );
        let builder = InitialModelBuilder::new(ModelConfig::new().with_states_per_stroke(3));
        assert_eq!(builder.n_states(&collection).unwrap(), 3);

        let params = builder.build(&collection).unwrap();
        assert_eq!(params.n_states(), 3);
        assert!(params.is_left_to_right());

        let e = params.emissions();
        assert_eq!(e[0].mean(), [1.0, 0.0]);
        assert_eq!(e[1].mean(), [0.0, 4.0]);
        assert!((e[1].variance()[1] - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(e[2].mean(), [5.0, 5.0]);
        // Constant pools are floored rather than left at zero.
        assert_eq!(e[2].variance(), [1e-2, 1e-2]);
    }

    #[test]
    fn test_pools_across_sequences() {
        let collection = SequenceCollection::new(
            98,
            Some(1),
            vec![seq(&[(0.0, 0.0), (10.0, 10.0)]), seq(&[(2.0, 2.0), (12.0, 14.0)])],
        );
        let params = build_initial(2, &collection, 1e-3).unwrap();

        assert_eq!(params.emissions()[0].mean(), [1.0, 1.0]);
        assert_eq!(params.emissions()[0].variance(), [1.0, 1.0]);
        assert_eq!(params.emissions()[1].mean(), [11.0, 12.0]);
        assert_eq!(params.emissions()[1].variance(), [1.0, 4.0]);
    }

    #[test]
    fn test_empty_collection_is_rejected() {
        let collection = SequenceCollection::new(99, None, vec![]);
        let err = build_initial(3, &collection, 1e-2).unwrap_err();
        assert!(matches!(err, FudeError::EmptyCollection { code: 99 }));

        let builder = InitialModelBuilder::new(ModelConfig::default());
        assert!(matches!(
            builder.build(&collection),
            Err(FudeError::EmptyCollection { code: 99 })
        ));
    }

    #[test]
    fn test_too_many_states_is_degenerate() {
        let collection = SequenceCollection::new(100, Some(2), vec![seq(&[(1.0, 1.0), (2.0, 2.0)])]);
        let err = build_initial(6, &collection, 1e-2).unwrap_err();
        assert!(matches!(err, FudeError::DegenerateState { code: 100, state: 2 }));
    }

    #[test]
    fn test_short_sequences_can_be_covered_by_longer_ones() {
        let collection = SequenceCollection::new(
            101,
            Some(1),
            vec![seq(&[(1.0, 1.0)]), seq(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)])],
        );
        let params = build_initial(3, &collection, 1e-2).unwrap();
        assert_eq!(params.emissions()[0].mean(), [1.0, 1.0]);
        assert_eq!(params.emissions()[2].mean(), [3.0, 3.0]);
    }
}
