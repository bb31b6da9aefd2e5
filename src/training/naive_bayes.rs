//! Naive Bayes classifiers
//!
//! Gaussian, Bernoulli and multinomial variants for 0/1 targets. Class
//! statistics are stored per class index, so `means[1]` belongs to the
//! positive class.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::models::{check_binary_targets, check_n_features, Classifier};
use crate::error::{Result, TransfusionError};

/// Row indices of each class, `[negatives, positives]`
fn class_rows(y: &Array1<f64>) -> [Vec<usize>; 2] {
    let mut rows = [Vec::new(), Vec::new()];
    for (i, &label) in y.iter().enumerate() {
        rows[(label == 1.0) as usize].push(i);
    }
    rows
}

fn log_priors(rows: &[Vec<usize>; 2], fit_prior: bool) -> [f64; 2] {
    if !fit_prior {
        return [0.5f64.ln(), 0.5f64.ln()];
    }
    let n = (rows[0].len() + rows[1].len()) as f64;
    [
        (rows[0].len() as f64 / n).ln(),
        (rows[1].len() as f64 / n).ln(),
    ]
}

/// Positive-class probability from the joint log-likelihoods of each class
fn positive_proba(joint: [f64; 2]) -> f64 {
    // Log-sum-exp normalisation
    let max_val = joint[0].max(joint[1]);
    let e0 = (joint[0] - max_val).exp();
    let e1 = (joint[1] - max_val).exp();
    e1 / (e0 + e1)
}

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Mean of each feature for each class
    means: Vec<Vec<f64>>,
    /// Variance of each feature for each class
    variances: Vec<Vec<f64>>,
    /// Log prior of each class
    log_priors: [f64; 2],
    /// Fraction of the largest feature variance added to every variance
    var_smoothing: f64,
    is_fitted: bool,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            means: Vec::new(),
            variances: Vec::new(),
            log_priors: [0.0; 2],
            var_smoothing: 1e-9,
            is_fitted: false,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Fit the classifier
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_targets(x, y)?;
        let n_features = x.ncols();

        let max_var = x
            .columns()
            .into_iter()
            .map(|col| col.var(0.0))
            .fold(0.0f64, f64::max);
        let epsilon = self.var_smoothing * max_var;

        let rows = class_rows(y);
        self.means.clear();
        self.variances.clear();

        for class_indices in rows.iter() {
            // Single-pass Welford's algorithm for mean and variance
            let mut feature_means = vec![0.0; n_features];
            let mut feature_m2 = vec![0.0; n_features];
            let mut count = 0usize;
            for &idx in class_indices {
                count += 1;
                let row = x.row(idx);
                for (j, &val) in row.iter().enumerate() {
                    let delta = val - feature_means[j];
                    feature_means[j] += delta / count as f64;
                    let delta2 = val - feature_means[j];
                    feature_m2[j] += delta * delta2;
                }
            }
            let mut feature_vars: Vec<f64> = feature_m2
                .iter()
                .map(|&m2| m2 / count as f64 + epsilon)
                .collect();
            // All-constant input leaves epsilon at zero
            for v in feature_vars.iter_mut() {
                if *v <= 0.0 {
                    *v = f64::MIN_POSITIVE.sqrt();
                }
            }

            self.means.push(feature_means);
            self.variances.push(feature_vars);
        }

        self.log_priors = log_priors(&rows, true);
        self.is_fitted = true;
        Ok(())
    }

    fn log_likelihood(&self, row: ndarray::ArrayView1<f64>, class: usize) -> f64 {
        row.iter()
            .zip(self.means[class].iter())
            .zip(self.variances[class].iter())
            .map(|((&xi, &mean), &var)| {
                // Log of Gaussian PDF
                -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln())
            })
            .sum()
    }

    /// Predict positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TransfusionError::ModelNotFitted);
        }
        check_n_features(self.means[0].len(), x)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                positive_proba([
                    self.log_priors[0] + self.log_likelihood(row, 0),
                    self.log_priors[1] + self.log_likelihood(row, 1),
                ])
            })
            .collect())
    }

    /// Get feature means for each class
    pub fn feature_means(&self) -> &[Vec<f64>] {
        &self.means
    }
}

/// Bernoulli Naive Bayes over binarized features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BernoulliNaiveBayes {
    /// Log probability that each feature is on, per class
    feature_log_probs: Vec<Vec<f64>>,
    /// Log probability that each feature is off, per class
    feature_log_neg_probs: Vec<Vec<f64>>,
    log_priors: [f64; 2],
    /// Additive (Laplace/Lidstone) smoothing
    pub alpha: f64,
    /// Learn class priors; otherwise uniform
    pub fit_prior: bool,
    /// Values strictly above this threshold count as 1
    pub binarize: f64,
    is_fitted: bool,
}

impl Default for BernoulliNaiveBayes {
    fn default() -> Self {
        Self::new(1.0, true)
    }
}

impl BernoulliNaiveBayes {
    pub fn new(alpha: f64, fit_prior: bool) -> Self {
        Self {
            feature_log_probs: Vec::new(),
            feature_log_neg_probs: Vec::new(),
            log_priors: [0.0; 2],
            alpha,
            fit_prior,
            binarize: 0.0,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_targets(x, y)?;
        if self.alpha < 0.0 {
            return Err(TransfusionError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        // Keep probabilities strictly inside (0, 1)
        let alpha = self.alpha.max(1e-10);
        let rows = class_rows(y);

        self.feature_log_probs.clear();
        self.feature_log_neg_probs.clear();
        for class_indices in rows.iter() {
            let n_class = class_indices.len() as f64;
            let mut on_counts = vec![0.0; x.ncols()];
            for &idx in class_indices {
                for (j, &val) in x.row(idx).iter().enumerate() {
                    if val > self.binarize {
                        on_counts[j] += 1.0;
                    }
                }
            }
            let probs: Vec<f64> = on_counts
                .iter()
                .map(|&c| (c + alpha) / (n_class + 2.0 * alpha))
                .collect();
            self.feature_log_probs.push(probs.iter().map(|p| p.ln()).collect());
            self.feature_log_neg_probs
                .push(probs.iter().map(|p| (1.0 - p).ln()).collect());
        }

        self.log_priors = log_priors(&rows, self.fit_prior);
        self.is_fitted = true;
        Ok(())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TransfusionError::ModelNotFitted);
        }
        check_n_features(self.feature_log_probs[0].len(), x)?;

        let joint = |row: ndarray::ArrayView1<f64>, class: usize| -> f64 {
            self.log_priors[class]
                + row
                    .iter()
                    .enumerate()
                    .map(|(j, &val)| {
                        if val > self.binarize {
                            self.feature_log_probs[class][j]
                        } else {
                            self.feature_log_neg_probs[class][j]
                        }
                    })
                    .sum::<f64>()
        };

        Ok(x.rows()
            .into_iter()
            .map(|row| positive_proba([joint(row, 0), joint(row, 1)]))
            .collect())
    }
}

/// Multinomial Naive Bayes (for count data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultinomialNaiveBayes {
    /// Log probability of each feature for each class
    feature_log_probs: Vec<Vec<f64>>,
    /// Log prior probability of each class
    class_log_priors: [f64; 2],
    /// Smoothing parameter (Laplace smoothing)
    pub alpha: f64,
    pub fit_prior: bool,
    is_fitted: bool,
}

impl Default for MultinomialNaiveBayes {
    fn default() -> Self {
        Self::new(1.0, true)
    }
}

impl MultinomialNaiveBayes {
    pub fn new(alpha: f64, fit_prior: bool) -> Self {
        Self {
            feature_log_probs: Vec::new(),
            class_log_priors: [0.0; 2],
            alpha,
            fit_prior,
            is_fitted: false,
        }
    }

    fn check_non_negative(x: &Array2<f64>) -> Result<()> {
        if let Some(v) = x.iter().find(|&&v| v < 0.0 || v.is_nan()) {
            return Err(TransfusionError::ValidationError(format!(
                "Multinomial naive Bayes requires non-negative input, found {}",
                v
            )));
        }
        Ok(())
    }

    /// Fit the classifier
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_targets(x, y)?;
        Self::check_non_negative(x)?;
        let n_features = x.ncols();
        let alpha = self.alpha.max(1e-10);
        let rows = class_rows(y);

        self.feature_log_probs.clear();
        for class_indices in rows.iter() {
            // Laplace smoothing
            let mut feature_counts = vec![alpha; n_features];
            let mut total_count = alpha * n_features as f64;

            for &idx in class_indices {
                for (j, &val) in x.row(idx).iter().enumerate() {
                    feature_counts[j] += val;
                    total_count += val;
                }
            }

            self.feature_log_probs.push(
                feature_counts
                    .iter()
                    .map(|&count| (count / total_count).ln())
                    .collect(),
            );
        }

        self.class_log_priors = log_priors(&rows, self.fit_prior);
        self.is_fitted = true;
        Ok(())
    }

    /// Predict positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TransfusionError::ModelNotFitted);
        }
        check_n_features(self.feature_log_probs[0].len(), x)?;
        Self::check_non_negative(x)?;

        let joint = |row: ndarray::ArrayView1<f64>, class: usize| -> f64 {
            self.class_log_priors[class]
                + row
                    .iter()
                    .zip(self.feature_log_probs[class].iter())
                    .map(|(&xi, &log_p)| xi * log_p)
                    .sum::<f64>()
        };

        Ok(x.rows()
            .into_iter()
            .map(|row| positive_proba([joint(row, 0), joint(row, 1)]))
            .collect())
    }
}

impl Classifier for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GaussianNaiveBayes::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GaussianNaiveBayes::predict_proba(self, x)
    }
}

impl Classifier for BernoulliNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        BernoulliNaiveBayes::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        BernoulliNaiveBayes::predict_proba(self, x)
    }
}

impl Classifier for MultinomialNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        MultinomialNaiveBayes::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        MultinomialNaiveBayes::predict_proba(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::accuracy_score;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        // Two well-separated Gaussian clusters
        let x = Array2::from_shape_vec((20, 2), vec![
            // Class 0 (centered around 0, 0)
            -1.0, -1.0, -0.5, -0.5, 0.0, 0.0, 0.5, 0.5, -1.0, 0.0,
            -0.5, 0.5, 0.0, -0.5, 0.5, -1.0, -0.2, -0.8, -0.8, -0.2,
            // Class 1 (centered around 5, 5)
            4.0, 4.0, 4.5, 4.5, 5.0, 5.0, 5.5, 5.5, 4.0, 5.0,
            4.5, 5.5, 5.0, 4.5, 5.5, 4.0, 4.2, 4.8, 4.8, 4.2,
        ]).unwrap();

        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
        ]);

        (x, y)
    }

    fn count_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((10, 4), vec![
            // Class 0 (high counts in first two features)
            5.0, 3.0, 1.0, 0.0,
            4.0, 4.0, 0.0, 1.0,
            6.0, 2.0, 1.0, 0.0,
            5.0, 5.0, 0.0, 0.0,
            4.0, 3.0, 1.0, 1.0,
            // Class 1 (high counts in last two features)
            0.0, 1.0, 5.0, 4.0,
            1.0, 0.0, 4.0, 5.0,
            0.0, 0.0, 6.0, 3.0,
            1.0, 1.0, 5.0, 5.0,
            0.0, 1.0, 4.0, 4.0,
        ]).unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        (x, y)
    }

    #[test]
    fn test_gaussian_naive_bayes() {
        let (x, y) = create_classification_data();

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        let predictions = Classifier::predict(&nb, &x).unwrap();
        let accuracy = accuracy_score(&y, &predictions).unwrap();
        assert!(accuracy > 0.9, "Accuracy ({}) should be above 90%", accuracy);
    }

    #[test]
    fn test_gaussian_proba_in_unit_interval() {
        let (x, y) = create_classification_data();

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        let proba = nb.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[0] < 0.5 && proba[19] > 0.5);
        assert_eq!(nb.feature_means().len(), 2);
    }

    #[test]
    fn test_bernoulli_naive_bayes() {
        let (x, y) = count_data();
        // Shift so that only the dominant features are "on"
        let shifted = x.mapv(|v| v - 2.5);

        let mut bnb = BernoulliNaiveBayes::new(1.0, true);
        bnb.fit(&shifted, &y).unwrap();

        let predictions = Classifier::predict(&bnb, &shifted).unwrap();
        let accuracy = accuracy_score(&y, &predictions).unwrap();
        assert!(accuracy > 0.8, "Accuracy ({}) should be above 80%", accuracy);
    }

    #[test]
    fn test_multinomial_naive_bayes() {
        let (x, y) = count_data();

        let mut mnb = MultinomialNaiveBayes::new(1.0, true);
        mnb.fit(&x, &y).unwrap();

        let predictions = Classifier::predict(&mnb, &x).unwrap();
        let accuracy = accuracy_score(&y, &predictions).unwrap();
        assert!(accuracy > 0.8, "Accuracy ({}) should be above 80%", accuracy);
    }

    #[test]
    fn test_multinomial_rejects_negative_input() {
        let (x, y) = create_classification_data();
        let mut mnb = MultinomialNaiveBayes::new(1.0, false);
        assert!(matches!(
            mnb.fit(&x, &y),
            Err(TransfusionError::ValidationError(_))
        ));
    }
}
