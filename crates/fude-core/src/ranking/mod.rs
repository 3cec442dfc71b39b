pub mod evaluation;
pub mod ranker;

pub use evaluation::{EvaluationReport, MATCH_LEVELS, MatchCounts, SampleOutcome};
pub use ranker::{Candidate, Query, RankedResult, Ranker};
