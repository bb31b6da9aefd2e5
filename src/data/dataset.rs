//! Labelled dataset, target preparation and frame/array conversion

use crate::error::{Result, TransfusionError};
use crate::preprocessing::round_to;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Name given to the label column after preparation
pub const TARGET_COLUMN: &str = "target";

/// Label column of the blood transfusion dataset
pub const DEFAULT_SOURCE_LABEL: &str = "whether he/she donated blood in March 2007";

/// Share of one label value in the target column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassFrequency {
    pub label: i64,
    pub count: usize,
    /// Normalized frequency rounded to 3 decimals
    pub frequency: f64,
}

/// Feature frame plus a binary label column named `target`
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    /// Wrap a frame that already has a 0/1 `target` column
    pub fn new(frame: DataFrame) -> Result<Self> {
        let target = frame
            .column(TARGET_COLUMN)
            .map_err(|_| TransfusionError::FeatureNotFound(TARGET_COLUMN.to_string()))?;
        check_binary(target)?;
        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    /// Feature columns in file order
    pub fn feature_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .filter(|n| n.as_str() != TARGET_COLUMN)
            .map(|n| n.to_string())
            .collect()
    }

    /// Frame without the target column
    pub fn features(&self) -> Result<DataFrame> {
        Ok(self.frame.drop(TARGET_COLUMN)?)
    }

    /// Target column as `0.0` / `1.0`
    pub fn labels(&self) -> Result<Array1<f64>> {
        column_to_array1(&self.frame, TARGET_COLUMN)
    }

    /// Label frequencies, most frequent first (ties by label)
    pub fn class_incidence(&self) -> Result<Vec<ClassFrequency>> {
        class_incidence(&self.labels()?)
    }

    /// First `n` rows for display
    pub fn head(&self, n: usize) -> DataFrame {
        self.frame.head(Some(n))
    }
}

/// Renames the source label column to `target`
#[derive(Debug, Clone)]
pub struct TargetPreparer {
    source_column: String,
}

impl Default for TargetPreparer {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_LABEL)
    }
}

impl TargetPreparer {
    pub fn new(source_column: impl Into<String>) -> Self {
        Self {
            source_column: source_column.into(),
        }
    }

    pub fn prepare(&self, mut df: DataFrame) -> Result<Dataset> {
        if df.column(&self.source_column).is_err() {
            return Err(TransfusionError::FeatureNotFound(self.source_column.clone()));
        }
        if self.source_column != TARGET_COLUMN {
            df.rename(&self.source_column, TARGET_COLUMN.into())?;
        }
        info!(source = %self.source_column, "Renamed label column to '{}'", TARGET_COLUMN);
        Dataset::new(df)
    }
}

fn check_binary(column: &Column) -> Result<()> {
    let casted = column.cast(&DataType::Float64)?;
    for value in casted.f64()?.into_iter() {
        match value {
            Some(v) if v == 0.0 || v == 1.0 => {}
            Some(v) => {
                return Err(TransfusionError::ValidationError(format!(
                    "Target must be binary 0/1, found {}",
                    v
                )))
            }
            None => {
                return Err(TransfusionError::ValidationError(
                    "Target contains missing values".to_string(),
                ))
            }
        }
    }
    Ok(())
}

/// Normalized label frequencies sorted by count descending, ties by label
pub fn class_incidence(y: &Array1<f64>) -> Result<Vec<ClassFrequency>> {
    if y.is_empty() {
        return Err(TransfusionError::ValidationError(
            "Cannot compute class incidence of an empty target".to_string(),
        ));
    }
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &v in y.iter() {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }

    let n = y.len() as f64;
    let mut freqs: Vec<ClassFrequency> = counts
        .into_iter()
        .map(|(label, count)| ClassFrequency {
            label,
            count,
            frequency: round_to(count as f64 / n, 3),
        })
        .collect();
    // Stable sort keeps ascending label order among equal counts
    freqs.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(freqs)
}

/// Extract one column as `f64` values
pub fn column_to_array1(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let column = df
        .column(name)
        .map_err(|_| TransfusionError::FeatureNotFound(name.to_string()))?
        .cast(&DataType::Float64)?;
    column
        .f64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                TransfusionError::DataError(format!("Column '{}' contains missing values", name))
            })
        })
        .collect()
}

/// All columns of a frame as a row-major `Array2<f64>`.
/// Uses `Array2::from_shape_fn` to transpose polars' column-major data.
pub fn frame_to_array2(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = df
        .get_column_names()
        .into_iter()
        .map(|name| column_to_array1(df, name.as_str()).map(|a| a.to_vec()))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, col_refs.len()), |(r, c)| col_refs[c][r]))
}
