//! Log-normalized logistic regression baseline

use crate::config::BaselineConfig;
use crate::data::{frame_to_array2, SplitResult};
use crate::error::{Result, TransfusionError};
use crate::preprocessing::{column_variances, round_to, LogNormalizer};
use crate::training::{roc_auc_score, LogisticRegression};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Log normalizer plus logistic regression, fitted together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineModel {
    normalizer: LogNormalizer,
    model: LogisticRegression,
    /// Column order seen at fit time, after normalization
    feature_names: Vec<String>,
}

impl BaselineModel {
    pub fn new(config: &BaselineConfig) -> Self {
        let mut model = LogisticRegression::new()
            .with_c(config.c)
            .with_solver(config.solver.clone());
        if let Some(seed) = config.random_state {
            model = model.with_random_state(seed);
        }
        Self {
            normalizer: LogNormalizer::new(config.output_column.as_str()),
            model,
            feature_names: Vec::new(),
        }
    }

    pub fn normalizer(&self) -> &LogNormalizer {
        &self.normalizer
    }

    pub fn model(&self) -> &LogisticRegression {
        &self.model
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_fitted
    }

    /// Choose the log column on `x_train`, then fit the classifier on the
    /// normalized frame
    pub fn fit(&mut self, x_train: &DataFrame, y_train: &Array1<f64>) -> Result<&mut Self> {
        let normalized = self.normalizer.fit_transform(x_train)?;
        self.feature_names = normalized
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();

        let x = frame_to_array2(&normalized)?;
        self.model.fit(&x, y_train)?;
        Ok(self)
    }

    /// Apply the fitted log normalization
    pub fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        if self.feature_names.is_empty() {
            return Err(TransfusionError::ModelNotFitted);
        }
        let normalized = self.normalizer.transform(x)?;
        Ok(normalized.select(self.feature_names.iter().map(|s| s.as_str()))?)
    }

    /// Positive-class probabilities for raw (un-normalized) features
    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array1<f64>> {
        let normalized = self.transform(x)?;
        self.model.predict_proba(&frame_to_array2(&normalized)?)
    }

    /// ROC AUC on a labelled frame
    pub fn score(&self, x: &DataFrame, y: &Array1<f64>) -> Result<f64> {
        roc_auc_score(y, &self.predict_proba(x)?)
    }
}

/// Diagnostics of one baseline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineReport {
    /// Training-partition variances before normalization, 3 decimals
    pub variances_before: Vec<(String, f64)>,
    /// Same after the log column replaced its source
    pub variances_after: Vec<(String, f64)>,
    pub source_column: String,
    pub output_column: String,
    /// ROC AUC on the normalized test partition
    pub test_auc: f64,
}

fn rounded(variances: Vec<(String, f64)>) -> Vec<(String, f64)> {
    variances
        .into_iter()
        .map(|(name, v)| (name, round_to(v, 3)))
        .collect()
}

/// Fit the baseline on the training partition and score it on the test one
pub fn run_baseline(
    config: &BaselineConfig,
    split: &SplitResult,
) -> Result<(BaselineModel, BaselineReport)> {
    let variances_before = rounded(column_variances(&split.x_train)?);

    let mut baseline = BaselineModel::new(config);
    baseline.fit(&split.x_train, &split.y_train)?;

    let variances_after = rounded(column_variances(&baseline.transform(&split.x_train)?)?);
    let test_auc = baseline.score(&split.x_test, &split.y_test)?;

    let source_column = baseline
        .normalizer()
        .source_column()
        .unwrap_or_default()
        .to_string();

    info!(
        source = %source_column,
        output = %config.output_column,
        test_auc,
        "Baseline logistic regression scored"
    );

    let report = BaselineReport {
        variances_before,
        variances_after,
        source_column,
        output_column: config.output_column.clone(),
        test_auc,
    };
    Ok((baseline, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn frames() -> (DataFrame, Array1<f64>, DataFrame, Array1<f64>) {
        let x_train = df!(
            "Recency (months)" => [2.0, 14.0, 1.0, 23.0, 4.0, 21.0, 3.0, 16.0],
            "Monetary (c.c. blood)" => [12500.0, 500.0, 4000.0, 250.0, 6000.0, 750.0, 9000.0, 1000.0],
            "Time (months)" => [98.0, 14.0, 35.0, 23.0, 77.0, 30.0, 60.0, 40.0],
        )
        .unwrap();
        let y_train = array![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let x_test = df!(
            "Recency (months)" => [3.0, 18.0, 2.0, 20.0],
            "Monetary (c.c. blood)" => [8000.0, 500.0, 7000.0, 250.0],
            "Time (months)" => [70.0, 20.0, 50.0, 25.0],
        )
        .unwrap();
        let y_test = array![1.0, 0.0, 1.0, 0.0];
        (x_train, y_train, x_test, y_test)
    }

    #[test]
    fn test_fit_replaces_highest_variance_column() {
        let (x_train, y_train, _, _) = frames();
        let mut baseline = BaselineModel::new(&BaselineConfig::default());
        baseline.fit(&x_train, &y_train).unwrap();

        assert_eq!(baseline.normalizer().source_column(), Some("Monetary (c.c. blood)"));
        assert_eq!(
            baseline.feature_names(),
            &["Recency (months)", "Time (months)", "monetary_log"]
        );
    }

    #[test]
    fn test_run_baseline_reports() {
        let (x_train, y_train, x_test, y_test) = frames();
        let split = SplitResult {
            x_train,
            x_test,
            y_train,
            y_test,
            train_indices: (0..8).collect(),
            test_indices: (8..12).collect(),
        };

        let (model, report) = run_baseline(&BaselineConfig::default(), &split).unwrap();
        assert!(model.is_fitted());
        assert!(report.test_auc > 0.5 && report.test_auc <= 1.0);
        assert_eq!(report.variances_before.len(), 3);
        assert_eq!(report.variances_after[2].0, "monetary_log");
        assert!(report.variances_after[2].1 < report.variances_before[1].1);
    }

    #[test]
    fn test_non_positive_test_value_is_fatal() {
        let (x_train, y_train, _, _) = frames();
        let mut baseline = BaselineModel::new(&BaselineConfig::default());
        baseline.fit(&x_train, &y_train).unwrap();

        let bad = df!(
            "Recency (months)" => [3.0],
            "Monetary (c.c. blood)" => [0.0],
            "Time (months)" => [70.0],
        )
        .unwrap();
        assert!(matches!(
            baseline.predict_proba(&bad),
            Err(TransfusionError::LogDomain { row: 0, .. })
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let (_, _, x_test, _) = frames();
        let baseline = BaselineModel::new(&BaselineConfig::default());
        assert!(matches!(
            baseline.predict_proba(&x_test),
            Err(TransfusionError::ModelNotFitted)
        ));
    }
}
