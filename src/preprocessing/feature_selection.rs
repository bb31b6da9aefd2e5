//! Feature selection algorithms
//!
//! Provides:
//! - Variance threshold selection
//! - Percentile selection on ANOVA F scores

use crate::error::{Result, TransfusionError};
use crate::training::check_n_features;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Feature selection method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectionMethod {
    /// Remove features with variance not above threshold
    VarianceThreshold { threshold: f64 },
    /// Keep the top `percentile` % of features by ANOVA F score
    Percentile { percentile: u32 },
}

/// Feature selector for dimensionality reduction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    method: SelectionMethod,
    selected_features: Option<Vec<usize>>,
    feature_scores: Option<Vec<f64>>,
    n_features_in: Option<usize>,
}

impl FeatureSelector {
    /// Create a new feature selector with the given method
    pub fn new(method: SelectionMethod) -> Self {
        Self {
            method,
            selected_features: None,
            feature_scores: None,
            n_features_in: None,
        }
    }

    /// Create variance threshold selector
    pub fn variance_threshold(threshold: f64) -> Self {
        Self::new(SelectionMethod::VarianceThreshold { threshold })
    }

    /// Create percentile selector
    pub fn percentile(percentile: u32) -> Self {
        Self::new(SelectionMethod::Percentile {
            percentile: percentile.min(100),
        })
    }

    pub fn method(&self) -> &SelectionMethod {
        &self.method
    }

    /// Fit the selector to data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.n_features_in = Some(x.ncols());

        match self.method {
            SelectionMethod::VarianceThreshold { threshold } => {
                self.fit_variance_threshold(x, threshold);
            }
            SelectionMethod::Percentile { percentile } => {
                self.fit_percentile(x, y, percentile)?;
            }
        }

        if self.selected_features.as_ref().map_or(true, |s| s.is_empty()) {
            return Err(TransfusionError::ValidationError(
                "No features selected".to_string(),
            ));
        }
        Ok(())
    }

    /// Transform data by selecting features
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (selected, n_in) = match (&self.selected_features, self.n_features_in) {
            (Some(s), Some(n)) => (s, n),
            _ => return Err(TransfusionError::ModelNotFitted),
        };
        check_n_features(n_in, x)?;

        Ok(x.select(Axis(1), selected))
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Array2<f64>> {
        self.fit(x, y)?;
        self.transform(x)
    }

    /// Get selected feature indices
    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected_features.as_deref()
    }

    /// Get feature scores
    pub fn scores(&self) -> Option<&[f64]> {
        self.feature_scores.as_deref()
    }

    // Fit variance threshold
    fn fit_variance_threshold(&mut self, x: &Array2<f64>, threshold: f64) {
        let variances: Vec<f64> = x.axis_iter(Axis(1)).map(|col| col.var(0.0)).collect();
        let selected = variances
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > threshold)
            .map(|(i, _)| i)
            .collect();

        self.feature_scores = Some(variances);
        self.selected_features = Some(selected);
    }

    // Fit percentile selection
    fn fit_percentile(&mut self, x: &Array2<f64>, y: &Array1<f64>, percentile: u32) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TransfusionError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        let n_features = x.ncols();
        let scores: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|col| Self::anova_f(col, y.view()))
            .collect();

        let selected: Vec<usize> = if percentile >= 100 {
            (0..n_features).collect()
        } else if percentile == 0 {
            Vec::new()
        } else {
            let mut sorted_scores = scores.clone();
            sorted_scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            // Linear-interpolated score at the (100 - percentile)th percentile
            let pos = (100 - percentile) as f64 / 100.0 * (n_features - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let threshold = if sorted_scores[hi] == sorted_scores[lo] {
                sorted_scores[lo]
            } else {
                sorted_scores[lo] + (sorted_scores[hi] - sorted_scores[lo]) * (pos - lo as f64)
            };

            let mut mask: Vec<bool> = scores.iter().map(|&s| s > threshold).collect();
            // Ties at the threshold fill the remaining budget in column order
            let max_feats = n_features * percentile as usize / 100;
            let mut room = max_feats.saturating_sub(mask.iter().filter(|&&m| m).count());
            for (i, &s) in scores.iter().enumerate() {
                if room == 0 {
                    break;
                }
                if s == threshold {
                    mask[i] = true;
                    room -= 1;
                }
            }
            mask.iter()
                .enumerate()
                .filter(|(_, &m)| m)
                .map(|(i, _)| i)
                .collect()
        };

        self.feature_scores = Some(scores);
        self.selected_features = Some(selected);
        Ok(())
    }

    /// One-way ANOVA F statistic of a feature across the label groups.
    /// Constant features score 0.
    fn anova_f(col: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        let mut sums = [0.0f64; 2];
        let mut counts = [0usize; 2];
        for (&v, &label) in col.iter().zip(y.iter()) {
            let g = (label == 1.0) as usize;
            sums[g] += v;
            counts[g] += 1;
        }
        let n = col.len();
        let groups = counts.iter().filter(|&&c| c > 0).count();
        if groups < 2 || n <= groups {
            return 0.0;
        }

        let grand_mean = col.sum() / n as f64;
        let means = [
            sums[0] / counts[0] as f64,
            sums[1] / counts[1] as f64,
        ];
        let ss_between: f64 = (0..2)
            .map(|g| counts[g] as f64 * (means[g] - grand_mean).powi(2))
            .sum();
        let ss_within: f64 = col
            .iter()
            .zip(y.iter())
            .map(|(&v, &label)| (v - means[(label == 1.0) as usize]).powi(2))
            .sum();

        let df_between = (groups - 1) as f64;
        let df_within = (n - groups) as f64;
        if ss_within <= 0.0 {
            return if ss_between > 0.0 { f64::INFINITY } else { 0.0 };
        }
        (ss_between / df_between) / (ss_within / df_within)
    }
}
