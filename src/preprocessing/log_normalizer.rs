//! Log normalization of the highest-variance feature

use crate::error::{Result, TransfusionError};
use super::column_variances;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Replaces the training partition's highest-variance column with its
/// natural log.
///
/// `fit` only looks at the training frame; `transform` applies the same
/// column choice to any frame, so train and test stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogNormalizer {
    output_name: String,
    source_column: Option<String>,
    source_variance: Option<f64>,
}

impl Default for LogNormalizer {
    fn default() -> Self {
        Self::new("monetary_log")
    }
}

impl LogNormalizer {
    pub fn new(output_name: impl Into<String>) -> Self {
        Self {
            output_name: output_name.into(),
            source_column: None,
            source_variance: None,
        }
    }

    /// Name of the appended log column
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Column chosen during `fit`
    pub fn source_column(&self) -> Option<&str> {
        self.source_column.as_deref()
    }

    /// Sample variance of the chosen column at fit time
    pub fn source_variance(&self) -> Option<f64> {
        self.source_variance
    }

    /// Pick the column with the largest sample variance (ddof = 1).
    /// The first column wins a tie.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let variances = column_variances(df)?;

        let mut best: Option<(String, f64)> = None;
        for (name, var) in variances {
            if !var.is_finite() {
                continue;
            }
            if best.as_ref().map_or(true, |(_, v)| var > *v) {
                best = Some((name, var));
            }
        }

        let (name, var) = best.ok_or_else(|| {
            TransfusionError::ValidationError(
                "No column with a defined variance to log-normalize".to_string(),
            )
        })?;

        debug!(column = %name, variance = var, "Selected column for log normalization");
        self.source_column = Some(name);
        self.source_variance = Some(var);
        Ok(self)
    }

    /// Append `ln(source)` under the output name and drop the source column
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let source = self
            .source_column
            .as_deref()
            .ok_or(TransfusionError::ModelNotFitted)?;

        let column = df
            .column(source)
            .map_err(|_| TransfusionError::FeatureNotFound(source.to_string()))?
            .cast(&DataType::Float64)?;
        let ca = column.f64()?;

        let mut logged = Vec::with_capacity(ca.len());
        for (row, value) in ca.into_iter().enumerate() {
            match value {
                Some(v) if v > 0.0 => logged.push(v.ln()),
                other => {
                    return Err(TransfusionError::LogDomain {
                        column: source.to_string(),
                        row,
                        value: other.unwrap_or(f64::NAN),
                    })
                }
            }
        }

        let mut result = df.drop(source)?;
        result.with_column(Series::new(self.output_name.as_str().into(), logged))?;
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train_frame() -> DataFrame {
        df!(
            "Recency (months)" => [2.0, 0.0, 1.0, 2.0, 1.0],
            "Monetary (c.c. blood)" => [12500.0, 3250.0, 4000.0, 5000.0, 6000.0],
            "Time (months)" => [98.0, 28.0, 35.0, 45.0, 77.0],
        )
        .unwrap()
    }

    #[test]
    fn test_selects_highest_variance_column() {
        let mut normalizer = LogNormalizer::default();
        normalizer.fit(&train_frame()).unwrap();
        assert_eq!(normalizer.source_column(), Some("Monetary (c.c. blood)"));
    }

    #[test]
    fn test_transform_replaces_source() {
        let mut normalizer = LogNormalizer::default();
        let out = normalizer.fit_transform(&train_frame()).unwrap();

        let names: Vec<String> = out.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["Recency (months)", "Time (months)", "monetary_log"]);

        let logged = out.column("monetary_log").unwrap().f64().unwrap();
        assert!((logged.get(0).unwrap() - 12500.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_applies_train_choice_to_other_frame() {
        let mut normalizer = LogNormalizer::default();
        normalizer.fit(&train_frame()).unwrap();

        // In this frame another column has the larger variance
        let test = df!(
            "Recency (months)" => [1.0, 900.0],
            "Monetary (c.c. blood)" => [250.0, 500.0],
            "Time (months)" => [2.0, 4.0],
        )
        .unwrap();
        let out = normalizer.transform(&test).unwrap();
        assert!(out.column("Recency (months)").is_ok());
        assert!(out.column("Monetary (c.c. blood)").is_err());
    }

    #[test]
    fn test_non_positive_value_is_fatal() {
        let mut normalizer = LogNormalizer::default();
        normalizer.fit(&train_frame()).unwrap();

        let bad = df!(
            "Recency (months)" => [1.0, 2.0],
            "Monetary (c.c. blood)" => [250.0, 0.0],
            "Time (months)" => [2.0, 4.0],
        )
        .unwrap();
        match normalizer.transform(&bad) {
            Err(TransfusionError::LogDomain { column, row, value }) => {
                assert_eq!(column, "Monetary (c.c. blood)");
                assert_eq!(row, 1);
                assert_eq!(value, 0.0);
            }
            other => panic!("expected LogDomain, got {:?}", other),
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let normalizer = LogNormalizer::default();
        assert!(matches!(
            normalizer.transform(&train_frame()),
            Err(TransfusionError::ModelNotFitted)
        ));
    }
}
