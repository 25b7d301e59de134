//! Least-utilized resource selection.
//!
//! Candidates carry a throughput metric and a capacity usage. Both are
//! normalized against the largest value seen in the candidate set and
//! combined with caller supplied weights; the lowest combined score wins.

mod candidate;
mod select;

pub use candidate::{Candidate, ScoredCandidate, Weights};
pub use select::{score_candidates, select_least_utilized};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectError {
    #[error("no eligible candidates (all skipped or none provided)")]
    NoEligibleCandidates,

    #[error("invalid weights: throughput={throughput}, capacity={capacity}")]
    InvalidWeights { throughput: f64, capacity: f64 },
}
