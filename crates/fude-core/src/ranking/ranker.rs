//! # Likelihood Ranking
//!
//! Scores a query against every candidate character model and orders the
//! candidates by optimal-path log-likelihood.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FudeError, Result};
use crate::hmm::HmmEngine;
use crate::types::{CharCode, CharacterModel, FeatureSequence, HmmParameters};

/// What to score against the candidate models.
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    /// One character instance; the score is its log-likelihood.
    Single(&'a FeatureSequence),
    /// Several instances of one character; the score is the mean log-likelihood.
    Batch(&'a [FeatureSequence]),
}

impl Query<'_> {
    fn validate(&self) -> Result<()> {
        match self {
            Query::Single(seq) if seq.is_empty() => Err(FudeError::EmptySequence),
            Query::Batch(seqs) if seqs.is_empty() || seqs.iter().any(FeatureSequence::is_empty) => {
                Err(FudeError::EmptySequence)
            }
            _ => Ok(()),
        }
    }
}

/// One ranked character and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub code: CharCode,
    pub score: f64,
}

/// Candidates ordered by non-increasing score, without duplicate codes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RankedResult {
    candidates: Vec<Candidate>,
}

impl RankedResult {
    /// Orders scored candidates.
    ///
    /// The sort is stable, so ties keep the order the models were supplied
    /// in. NaN scores rank last. When a code appears more than once only its
    /// best-ranked entry is kept.
    pub fn from_scores(scores: Vec<Candidate>) -> Self {
        let mut candidates: Vec<Candidate> = scores
            .into_iter()
            .map(|c| Candidate {
                score: if c.score.is_nan() { f64::NEG_INFINITY } else { c.score },
                ..c
            })
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.code));

        Self { candidates }
    }

    /// Keeps only the first `k` candidates.
    pub fn truncate(mut self, k: usize) -> Self {
        self.candidates.truncate(k);
        self
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Ranked codes, best first.
    pub fn codes(&self) -> Vec<CharCode> {
        self.candidates.iter().map(|c| c.code).collect()
    }

    /// Zero-based rank of `code`, if present.
    pub fn position(&self, code: CharCode) -> Option<usize> {
        self.candidates.iter().position(|c| c.code == code)
    }

    /// Whether `code` is among the first `k` candidates.
    pub fn contains_within(&self, code: CharCode, k: usize) -> bool {
        self.position(code).is_some_and(|p| p < k)
    }
}

/// Ranks queries against a fixed set of character models.
pub struct Ranker<'a, E: HmmEngine> {
    engine: &'a E,
    models: &'a [CharacterModel],
    top_k: usize,
}

impl<'a, E: HmmEngine> Ranker<'a, E> {
    /// # Errors
    ///
    /// Returns [`FudeError::NoTrainedModels`] if `models` is empty.
    pub fn new(engine: &'a E, models: &'a [CharacterModel], top_k: usize) -> Result<Self> {
        if models.is_empty() {
            return Err(FudeError::NoTrainedModels);
        }
        Ok(Self {
            engine,
            models,
            top_k,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn n_models(&self) -> usize {
        self.models.len()
    }

    fn score(&self, params: &HmmParameters, query: Query<'_>) -> Result<f64> {
        match query {
            Query::Single(seq) => self.engine.score(params, seq),
            Query::Batch(seqs) => {
                let total = seqs
                    .iter()
                    .map(|s| self.engine.score(params, s))
                    .sum::<Result<f64>>()?;
                Ok(total / seqs.len() as f64)
            }
        }
    }

    /// Scores `query` under every model and returns the top-K candidates.
    ///
    /// # Errors
    ///
    /// Returns [`FudeError::EmptySequence`] for an empty query, or the first
    /// scoring error reported by the engine.
    pub fn rank(&self, query: Query<'_>) -> Result<RankedResult> {
        query.validate()?;

        let scores = self
            .models
            .par_iter()
            .map(|m| -> Result<Candidate> {
                Ok(Candidate {
                    code: m.code,
                    score: self.score(&m.params, query)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RankedResult::from_scores(scores).truncate(self.top_k))
    }

    /// Ranks a single sequence.
    pub fn rank_sequence(&self, seq: &FeatureSequence) -> Result<RankedResult> {
        self.rank(Query::Single(seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::{GaussianHmm, Refinement};
    use crate::init::{initial_distribution, transition_matrix};
    use crate::types::{DiagonalGaussian, FeatureVector};

    /// Engine whose score is the negated distance between the first emission
    /// mean and the first feature vector.
    struct NearestMean;

    impl HmmEngine for NearestMean {
        fn refine(&self, initial: &HmmParameters, _: &[FeatureSequence]) -> Result<Refinement> {
            Ok(Refinement {
                params: initial.clone(),
                iterations: 0,
                log_likelihood: 0.0,
                converged: true,
            })
        }

        fn score(&self, model: &HmmParameters, seq: &FeatureSequence) -> Result<f64> {
            let m = model.emissions()[0].mean();
            let v = seq.vectors()[0];
            Ok(-((v.dx - m[0]).abs() + (v.dy - m[1]).abs()))
        }
    }

    fn params(mean: (f64, f64)) -> HmmParameters {
        HmmParameters::new(
            initial_distribution(1),
            transition_matrix(1),
            vec![DiagonalGaussian::new([mean.0, mean.1], [1.0, 1.0]).unwrap()],
        )
        .unwrap()
    }

    fn models() -> Vec<CharacterModel> {
        vec![
            CharacterModel::new(97, params((0.0, 0.0))),
            CharacterModel::new(98, params((5.0, 5.0))),
            CharacterModel::new(99, params((10.0, 10.0))),
            CharacterModel::new(100, params((5.0, 5.0))),
        ]
    }

    fn single(dx: f64, dy: f64) -> FeatureSequence {
        FeatureSequence::new(vec![FeatureVector::new(dx, dy)])
    }

    #[test]
    fn test_rank_orders_by_score() {
        let models = models();
        let ranker = Ranker::new(&NearestMean, &models, 10).unwrap();
        let result = ranker.rank_sequence(&single(9.0, 9.0)).unwrap();

        assert_eq!(result.codes(), vec![99, 98, 100, 97]);
        assert!(result.candidates().windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_model_order() {
        let models = models();
        let ranker = Ranker::new(&NearestMean, &models, 10).unwrap();
        let result = ranker.rank_sequence(&single(5.0, 5.0)).unwrap();
        assert_eq!(&result.codes()[..2], &[98, 100]);
    }

    #[test]
    fn test_top_k_truncation() {
        let models = models();
        let ranker = Ranker::new(&NearestMean, &models, 2).unwrap();
        let result = ranker.rank_sequence(&single(0.0, 0.0)).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.best().unwrap().code, 97);
        assert!(result.contains_within(97, 1));
        assert!(!result.contains_within(99, 2));
    }

    #[test]
    fn test_batch_query_uses_mean_score() {
        let models = models();
        let ranker = Ranker::new(&NearestMean, &models, 10).unwrap();
        let batch = vec![single(0.0, 0.0), single(10.0, 10.0)];
        let result = ranker.rank(Query::Batch(&batch)).unwrap();

        let a = result.candidates().iter().find(|c| c.code == 97).unwrap();
        assert_eq!(a.score, -10.0);
        let b = result.candidates().iter().find(|c| c.code == 98).unwrap();
        assert_eq!(b.score, -10.0);
    }

    #[test]
    fn test_empty_queries_are_rejected() {
        let models = models();
        let ranker = Ranker::new(&NearestMean, &models, 10).unwrap();
        assert!(matches!(
            ranker.rank_sequence(&FeatureSequence::default()),
            Err(FudeError::EmptySequence)
        ));
        assert!(ranker.rank(Query::Batch(&[])).is_err());
    }

    #[test]
    fn test_no_models() {
        let err = Ranker::new(&NearestMean, &[], 10).err().unwrap();
        assert!(matches!(err, FudeError::NoTrainedModels));
    }

    #[test]
    fn test_from_scores_dedups_and_sinks_nan() {
        let result = RankedResult::from_scores(vec![
            Candidate { code: 1, score: f64::NAN },
            Candidate { code: 2, score: -3.0 },
            Candidate { code: 2, score: -1.0 },
            Candidate { code: 3, score: -2.0 },
        ]);
        assert_eq!(result.codes(), vec![2, 3, 1]);
        assert_eq!(result.candidates()[0].score, -1.0);
        assert_eq!(result.position(1), Some(2));
    }

    #[test]
    fn test_gaussian_engine_ranks_true_character_first() {
        let e = GaussianHmm::new(10, 1e-4, 1e-2);
        let models = models();
        let ranker = Ranker::new(&e, &models, 10).unwrap();
        let query = FeatureSequence::new(vec![FeatureVector::new(10.2, 9.7); 4]);
        assert_eq!(ranker.rank_sequence(&query).unwrap().best().unwrap().code, 99);
    }
}
