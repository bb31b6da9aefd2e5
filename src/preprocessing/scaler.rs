//! Feature scaling implementations

use crate::error::{Result, TransfusionError};
use crate::training::check_n_features;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
}

impl ScalerType {
    /// Operator name as shown in pipeline descriptions
    pub fn name(&self) -> &'static str {
        match self {
            ScalerType::Standard => "StandardScaler",
            ScalerType::MinMax => "MinMaxScaler",
            ScalerType::Robust => "RobustScaler",
            ScalerType::MaxAbs => "MaxAbsScaler",
        }
    }
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,    // mean, min, median or 0
    scale: f64,     // std, range, IQR or max |x|
}

/// Column-wise feature scaler over dense matrices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

/// Linear-interpolated quantile of already sorted values
fn sorted_quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(TransfusionError::ValidationError(
                "Cannot fit a scaler on zero rows".to_string(),
            ));
        }
        self.params = x
            .axis_iter(Axis(1))
            .map(|col| self.compute_params(col))
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TransfusionError::ModelNotFitted);
        }
        check_n_features(self.params.len(), x)?;

        let mut result = x.to_owned();
        for (mut col, params) in result.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            col.mapv_inplace(|v| (v - params.center) / params.scale);
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TransfusionError::ModelNotFitted);
        }
        check_n_features(self.params.len(), x)?;

        let mut result = x.to_owned();
        for (mut col, params) in result.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            col.mapv_inplace(|v| v * params.scale + params.center);
        }
        Ok(result)
    }

    fn compute_params(&self, col: ArrayView1<f64>) -> ScalerParams {
        // Constant columns keep a unit scale
        let nonzero = |s: f64| if s == 0.0 || !s.is_finite() { 1.0 } else { s };

        match self.scaler_type {
            ScalerType::Standard => {
                let mean = col.mean().unwrap_or(0.0);
                ScalerParams {
                    center: mean,
                    scale: nonzero(col.std(0.0)),
                }
            }
            ScalerType::MinMax => {
                let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                ScalerParams {
                    center: min,
                    scale: nonzero(max - min),
                }
            }
            ScalerType::Robust => {
                let mut sorted = col.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let median = sorted_quantile(&sorted, 0.5);
                let iqr = sorted_quantile(&sorted, 0.75) - sorted_quantile(&sorted, 0.25);
                ScalerParams {
                    center: median,
                    scale: nonzero(iqr),
                }
            }
            ScalerType::MaxAbs => {
                let max_abs = col.iter().map(|v| v.abs()).fold(0.0f64, f64::max);
                ScalerParams {
                    center: 0.0,
                    scale: nonzero(max_abs),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn column() -> Array2<f64> {
        array![[1.0], [2.0], [3.0], [4.0], [5.0]]
    }

    #[test]
    fn test_standard_scaler() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        let result = scaler.fit_transform(&column()).unwrap();

        let mean = result.column(0).mean().unwrap();
        assert!(mean.abs() < 1e-10); // Mean should be ~0
        assert!((result.column(0).std(0.0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_minmax_scaler() {
        let mut scaler = Scaler::new(ScalerType::MinMax);
        let result = scaler.fit_transform(&column()).unwrap();

        assert!((result[[0, 0]] - 0.0).abs() < 1e-10);
        assert!((result[[4, 0]] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_robust_and_maxabs() {
        let mut robust = Scaler::new(ScalerType::Robust);
        let r = robust.fit_transform(&column()).unwrap();
        // median 3, IQR 4 - 2
        assert!((r[[4, 0]] - 1.0).abs() < 1e-10);

        let mut maxabs = Scaler::new(ScalerType::MaxAbs);
        let m = maxabs.fit_transform(&array![[-10.0], [5.0]]).unwrap();
        assert_eq!(m, array![[-1.0], [0.5]]);
    }

    #[test]
    fn test_constant_column_is_finite() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        let result = scaler.fit_transform(&array![[2.0], [2.0], [2.0]]).unwrap();
        assert!(result.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_inverse_transform() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        let scaled = scaler.fit_transform(&column()).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();

        for (o, r) in column().iter().zip(restored.iter()) {
            assert!((o - r).abs() < 1e-10);
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = Scaler::new(ScalerType::MinMax);
        assert!(matches!(
            scaler.transform(&column()),
            Err(TransfusionError::ModelNotFitted)
        ));
    }
}
