//! Stateless and shape-changing feature transforms
//!
//! Binarization, per-row normalization and degree-2 polynomial expansion.

use crate::error::{Result, TransfusionError};
use crate::training::check_n_features;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Row norm used by [`TransformType::Normalizer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    L1,
    L2,
    Max,
}

impl Norm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Norm::L1 => "l1",
            Norm::L2 => "l2",
            Norm::Max => "max",
        }
    }
}

/// Type of transformation to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformType {
    /// 1.0 where the value exceeds the threshold, else 0.0
    Binarizer { threshold: f64 },
    /// Scale every row to unit norm
    Normalizer { norm: Norm },
    /// All monomials of degree 1 and 2, without the bias column
    PolynomialFeatures { degree: usize },
}

/// Feature transformer for applying mathematical transforms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformer {
    transform_type: TransformType,
    n_features_in: Option<usize>,
}

impl Transformer {
    /// Create a new transformer
    pub fn new(transform_type: TransformType) -> Self {
        Self {
            transform_type,
            n_features_in: None,
        }
    }

    pub fn transform_type(&self) -> &TransformType {
        &self.transform_type
    }

    /// Record the input width; these transforms learn nothing else
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if let TransformType::PolynomialFeatures { degree } = self.transform_type {
            if degree != 2 {
                return Err(TransfusionError::InvalidParameter {
                    name: "degree".to_string(),
                    value: degree.to_string(),
                    reason: "only degree 2 expansion is supported".to_string(),
                });
            }
        }
        self.n_features_in = Some(x.ncols());
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n_features = self.n_features_in.ok_or(TransfusionError::ModelNotFitted)?;
        check_n_features(n_features, x)?;

        match &self.transform_type {
            TransformType::Binarizer { threshold } => {
                Ok(x.mapv(|v| if v > *threshold { 1.0 } else { 0.0 }))
            }
            TransformType::Normalizer { norm } => Ok(normalize_rows(x, *norm)),
            TransformType::PolynomialFeatures { .. } => Ok(polynomial_degree2(x)),
        }
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

fn normalize_rows(x: &Array2<f64>, norm: Norm) -> Array2<f64> {
    let mut result = x.to_owned();
    for mut row in result.axis_iter_mut(Axis(0)) {
        let n = match norm {
            Norm::L1 => row.iter().map(|v| v.abs()).sum::<f64>(),
            Norm::L2 => row.iter().map(|v| v * v).sum::<f64>().sqrt(),
            Norm::Max => row.iter().map(|v| v.abs()).fold(0.0, f64::max),
        };
        // All-zero rows stay zero
        if n > 0.0 {
            row.mapv_inplace(|v| v / n);
        }
    }
    result
}

/// `[x_1..x_n, x_i * x_j for i <= j]`
fn polynomial_degree2(x: &Array2<f64>) -> Array2<f64> {
    let n = x.ncols();
    let n_out = n + n * (n + 1) / 2;
    let mut out = Array2::zeros((x.nrows(), n_out));

    for (r, row) in x.axis_iter(Axis(0)).enumerate() {
        let mut c = 0;
        for &v in row.iter() {
            out[[r, c]] = v;
            c += 1;
        }
        for i in 0..n {
            for j in i..n {
                out[[r, c]] = row[i] * row[j];
                c += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binarizer() {
        let x = array![[0.0, 0.5], [0.2, -1.0]];
        let mut t = Transformer::new(TransformType::Binarizer { threshold: 0.1 });
        assert_eq!(t.fit_transform(&x).unwrap(), array![[0.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_normalizer_norms() {
        let x = array![[3.0, 4.0], [0.0, 0.0]];

        let mut l2 = Transformer::new(TransformType::Normalizer { norm: Norm::L2 });
        assert_eq!(l2.fit_transform(&x).unwrap(), array![[0.6, 0.8], [0.0, 0.0]]);

        let mut l1 = Transformer::new(TransformType::Normalizer { norm: Norm::L1 });
        let r = l1.fit_transform(&x).unwrap();
        assert!((r[[0, 0]] - 3.0 / 7.0).abs() < 1e-12);

        let mut max = Transformer::new(TransformType::Normalizer { norm: Norm::Max });
        assert_eq!(max.fit_transform(&x).unwrap(), array![[0.75, 1.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_polynomial_features() {
        let x = array![[2.0, 3.0]];
        let mut t = Transformer::new(TransformType::PolynomialFeatures { degree: 2 });
        assert_eq!(
            t.fit_transform(&x).unwrap(),
            array![[2.0, 3.0, 4.0, 6.0, 9.0]]
        );
    }

    #[test]
    fn test_unfitted_and_width_checks() {
        let t = Transformer::new(TransformType::Binarizer { threshold: 0.0 });
        assert!(t.transform(&array![[1.0]]).is_err());

        let mut t = Transformer::new(TransformType::Binarizer { threshold: 0.0 });
        t.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(t.transform(&array![[1.0]]).is_err());
    }
}
