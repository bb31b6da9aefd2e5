//! Classification metrics

use crate::error::{Result, TransfusionError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Metric used to score models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Area under the ROC curve
    RocAuc,
    /// Fraction of correct labels at the 0.5 threshold
    Accuracy,
}

impl Default for Scoring {
    fn default() -> Self {
        Scoring::RocAuc
    }
}

impl Scoring {
    /// Score positive-class probabilities against 0/1 labels
    pub fn score(&self, y_true: &Array1<f64>, y_proba: &Array1<f64>) -> Result<f64> {
        match self {
            Scoring::RocAuc => roc_auc_score(y_true, y_proba),
            Scoring::Accuracy => {
                let y_pred = y_proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
                accuracy_score(y_true, &y_pred)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scoring::RocAuc => "roc_auc",
            Scoring::Accuracy => "accuracy",
        }
    }
}

/// Area under the ROC curve from positive-class scores.
///
/// Computed as the normalised Mann-Whitney U statistic; tied scores receive
/// their average rank, so a constant scorer yields exactly 0.5.
pub fn roc_auc_score(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
    let n = y_true.len();
    if n != y_score.len() {
        return Err(TransfusionError::ShapeError {
            expected: format!("{} scores", n),
            actual: format!("{} scores", y_score.len()),
        });
    }
    if y_score.iter().any(|s| s.is_nan()) {
        return Err(TransfusionError::ValidationError(
            "ROC AUC received NaN scores".to_string(),
        ));
    }

    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(TransfusionError::ValidationError(
            "ROC AUC is undefined when only one class is present in y_true".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| y_score[a].partial_cmp(&y_score[b]).unwrap_or(Ordering::Equal));

    // Average ranks over runs of tied scores (1-based)
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && y_score[order[j + 1]] == y_score[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&t, _)| t > 0.5)
        .map(|(_, &r)| r)
        .sum();

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;

    Ok(u / (n_pos * n_neg))
}

/// Fraction of matching labels
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(TransfusionError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(TransfusionError::ValidationError(
            "Accuracy of an empty prediction set".to_string(),
        ));
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();

    Ok(correct as f64 / y_true.len() as f64)
}
