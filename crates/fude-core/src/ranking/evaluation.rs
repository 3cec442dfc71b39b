//! # Batch Evaluation
//!
//! Ranks every evaluation sequence on its own and tallies how often the
//! true character lands within the top 1, 5, and 10 candidates.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::hmm::HmmEngine;
use crate::ranking::ranker::{RankedResult, Ranker};
use crate::types::{CharCode, SequenceCollection, render_code};

/// Rank cut-offs reported by an evaluation.
pub const MATCH_LEVELS: [usize; 3] = [1, 5, 10];

/// Running match@K tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCounts {
    pub total: usize,
    /// Hits per entry of [`MATCH_LEVELS`].
    pub hits: [usize; 3],
}

impl MatchCounts {
    /// Records one sample whose true label sits at zero-based `position`.
    pub fn record(&mut self, position: Option<usize>) {
        self.total += 1;
        if let Some(p) = position {
            for (hits, &k) in self.hits.iter_mut().zip(MATCH_LEVELS.iter()) {
                if p < k {
                    *hits += 1;
                }
            }
        }
    }

    pub fn merge(&mut self, other: &MatchCounts) {
        self.total += other.total;
        for (a, b) in self.hits.iter_mut().zip(other.hits.iter()) {
            *a += b;
        }
    }

    /// Percentage of samples matched within `MATCH_LEVELS[level]`.
    pub fn percentage(&self, level: usize) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.hits[level] as f64 / self.total as f64 * 100.0
    }

    pub fn match1(&self) -> f64 {
        self.percentage(0)
    }

    pub fn match5(&self) -> f64 {
        self.percentage(1)
    }

    pub fn match10(&self) -> f64 {
        self.percentage(2)
    }
}

/// The ranking obtained for one evaluation sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleOutcome {
    /// True character of the sample.
    pub code: CharCode,
    /// Ranked candidate codes, best first.
    pub ranked: Vec<CharCode>,
    /// Zero-based position of the true character, if ranked.
    pub position: Option<usize>,
}

impl SampleOutcome {
    pub fn from_ranking(code: CharCode, ranking: &RankedResult) -> Self {
        Self {
            code,
            ranked: ranking.codes(),
            position: ranking.position(code),
        }
    }

    /// A sample that produced no ranking at all.
    pub fn unranked(code: CharCode) -> Self {
        Self {
            code,
            ranked: Vec::new(),
            position: None,
        }
    }

    /// `"<char>: <m1>, <m2>, ..."`, or `"<char>: X"` when the true
    /// character is not among the ranked candidates.
    pub fn report_line(&self) -> String {
        let matches = if self.position.is_some() {
            self.ranked
                .iter()
                .map(|&c| render_code(c))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            "X".to_string()
        };
        format!("{}: {}", render_code(self.code), matches)
    }
}

/// Aggregate result of an evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub counts: MatchCounts,
    pub samples: Vec<SampleOutcome>,
    /// Empty sequences that could not be ranked; each counts as a miss.
    pub unranked: usize,
}

impl EvaluationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: SampleOutcome) {
        self.counts.record(outcome.position);
        self.samples.push(outcome);
    }

    pub fn merge(&mut self, other: EvaluationReport) {
        self.counts.merge(&other.counts);
        self.samples.extend(other.samples);
        self.unranked += other.unranked;
    }

    /// Ranks every sequence of one character's evaluation collection.
    ///
    /// Empty sequences cannot be scored and are recorded as misses.
    pub fn evaluate_collection<E: HmmEngine>(
        ranker: &Ranker<'_, E>,
        collection: &SequenceCollection,
    ) -> Result<Self> {
        let mut report = Self::new();
        for seq in &collection.sequences {
            if seq.is_empty() {
                warn!(code = collection.code, "empty evaluation sequence counted as a miss");
                report.unranked += 1;
                report.record(SampleOutcome::unranked(collection.code));
                continue;
            }
            let ranking = ranker.rank_sequence(seq)?;
            report.record(SampleOutcome::from_ranking(collection.code, &ranking));
        }
        Ok(report)
    }

    /// The three accuracy percentages, one per line.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (level, k) in MATCH_LEVELS.iter().enumerate() {
            let _ = writeln!(out, "match{}: {:.2}%", k, self.counts.percentage(level));
        }
        out
    }

    /// One [`SampleOutcome::report_line`] per sample.
    pub fn verbose_report(&self) -> String {
        self.samples
            .iter()
            .map(|s| s.report_line() + "\n")
            .collect()
    }
}
