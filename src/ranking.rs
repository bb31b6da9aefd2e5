//! Model ranking by validation score

use crate::preprocessing::round_to;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedModel {
    pub name: String,
    /// Score rounded to 4 decimals
    pub score: f64,
}

impl fmt::Display for RankedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.4}", self.name, self.score)
    }
}

/// Sort `(name, score)` pairs by score descending.
///
/// Scores are compared after rounding to 4 decimals and the sort is stable,
/// so models that tie keep their input order.
pub fn rank_models<S: Into<String>>(scores: impl IntoIterator<Item = (S, f64)>) -> Vec<RankedModel> {
    let mut ranked: Vec<RankedModel> = scores
        .into_iter()
        .map(|(name, score)| RankedModel {
            name: name.into(),
            score: round_to(score, 4),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}
