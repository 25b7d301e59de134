use log::{debug, info};

use crate::{Candidate, ScoredCandidate, SelectError, Weights};

/// Normalization denominator: the largest value, or 1 when nothing positive
/// was observed.
fn normalization_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max <= 0.0 { 1.0 } else { max }
}

/// Score every eligible candidate, preserving input order. Candidates with
/// zero total capacity are skipped.
pub fn score_candidates(candidates: &[Candidate], weights: Weights) -> Vec<ScoredCandidate> {
    let eligible: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| {
            if !c.is_eligible() {
                info!("Skipping {}: total capacity is 0", c.id);
            }
            c.is_eligible()
        })
        .collect();

    for c in eligible.iter().filter(|c| c.has_degraded_metrics()) {
        info!(
            "Degraded metrics for {} (throughput: {:?}, consumed: {:?}), treating missing values as 0",
            c.id, c.throughput_metric, c.consumed_capacity
        );
    }

    let max_throughput = normalization_max(eligible.iter().map(|c| c.throughput()));
    let max_capacity_ratio = normalization_max(eligible.iter().map(|c| c.capacity_used_ratio()));

    eligible
        .into_iter()
        .map(|c| {
            let normalized_throughput = c.throughput() / max_throughput;
            let normalized_capacity = c.capacity_used_ratio() / max_capacity_ratio;
            let score = weights.throughput() * normalized_throughput
                + weights.capacity() * normalized_capacity;
            debug!(
                "{}: throughput={:.2} capacity={:.2}% score={:.4}",
                c.id,
                c.throughput(),
                c.capacity_used_ratio(),
                score
            );
            ScoredCandidate {
                candidate: c.clone(),
                normalized_throughput,
                normalized_capacity,
                score,
            }
        })
        .collect()
}

/// Pick the least utilized candidate. On equal scores the earlier candidate
/// is kept.
pub fn select_least_utilized(
    candidates: &[Candidate],
    weights: Weights,
) -> Result<ScoredCandidate, SelectError> {
    score_candidates(candidates, weights)
        .into_iter()
        .reduce(|best, next| if next.score < best.score { next } else { best })
        .ok_or(SelectError::NoEligibleCandidates)
}
