//! Data preprocessing module
//!
//! Provides:
//! - Feature scaling (Standard, MinMax, Robust, MaxAbs)
//! - Binarization, row normalization and polynomial expansion
//! - Feature selection (variance threshold, ANOVA F percentile)
//! - Log normalization of the highest-variance column
//! - Column variance reports

mod log_normalizer;
mod scaler;
pub mod feature_selection;
pub mod transforms;

pub use feature_selection::{FeatureSelector, SelectionMethod};
pub use log_normalizer::LogNormalizer;
pub use scaler::{Scaler, ScalerType};
pub use transforms::{Norm, TransformType, Transformer};

use crate::error::Result;
use polars::prelude::*;

/// Sample variance (ddof = 1) of every column, in frame order.
///
/// Columns with fewer than two non-null values report `NaN`.
pub fn column_variances(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    df.get_columns()
        .iter()
        .map(|column| {
            let casted = column.cast(&DataType::Float64)?;
            let var = casted.f64()?.var(1).unwrap_or(f64::NAN);
            Ok((column.name().to_string(), var))
        })
        .collect()
}

/// Round to `decimals` places for display
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_variances() {
        let df = df!(
            "a" => [1.0, 2.0, 3.0, 4.0],
            "b" => [10, 10, 10, 10],
        )
        .unwrap();

        let vars = column_variances(&df).unwrap();
        assert_eq!(vars[0].0, "a");
        assert!((vars[0].1 - 1.6666666666666667).abs() < 1e-12);
        assert_eq!(vars[1].1, 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.76214, 3), 0.762);
        assert_eq!(round_to(0.23786, 4), 0.2379);
    }
}
