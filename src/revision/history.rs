//! Score history over commits

use crate::revision::git::Commit;

/// Total sweep score at one commit
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub commit: Commit,
    pub score: f64,
    /// Score relative to the best commit, in `[0, 1]` for non-negative scores
    pub intensity: f64,
}

/// Relative intensity `(exp(s / max) - 1) / (e - 1)` of every score.
///
/// `max` is the highest score; when it is 0 or -1 it is taken as 1.
pub fn intensities(scores: &[f64]) -> Vec<f64> {
    let mut max = scores.iter().copied().fold(-1.0_f64, f64::max);
    if max == 0.0 || max == -1.0 {
        max = 1.0;
    }
    let denominator = std::f64::consts::E - 1.0;
    scores
        .iter()
        .map(|score| ((score / max).exp() - 1.0) / denominator)
        .collect()
}
