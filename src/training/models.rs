//! Classifier trait shared by the baseline and the pipeline search

use crate::error::{Result, TransfusionError};
use ndarray::{Array1, Array2};

/// Binary probabilistic classifier over dense `f64` features.
///
/// Labels are `0.0` / `1.0`; `predict_proba` returns the probability of the
/// positive class for each row.
pub trait Classifier {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Positive-class probability per row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard labels at the 0.5 threshold
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}

/// Check that `x` and `y` agree on row count and that `y` is a 0/1 vector
/// containing both classes.
pub(crate) fn check_binary_targets(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(TransfusionError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(TransfusionError::ValidationError(
            "Cannot fit on an empty dataset".to_string(),
        ));
    }

    let mut n_pos = 0usize;
    for &label in y.iter() {
        if label == 1.0 {
            n_pos += 1;
        } else if label != 0.0 {
            return Err(TransfusionError::ValidationError(format!(
                "Labels must be 0 or 1, found {}",
                label
            )));
        }
    }

    if n_pos == 0 || n_pos == y.len() {
        return Err(TransfusionError::ValidationError(
            "Training labels contain a single class".to_string(),
        ));
    }

    Ok(())
}

/// Check that a fitted model receives the feature count it was trained on.
pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(TransfusionError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_check_binary_targets() {
        let x = array![[1.0], [2.0], [3.0]];
        assert!(check_binary_targets(&x, &array![0.0, 1.0, 0.0]).is_ok());
        assert!(check_binary_targets(&x, &array![0.0, 0.0, 0.0]).is_err());
        assert!(check_binary_targets(&x, &array![0.0, 2.0, 1.0]).is_err());
        assert!(check_binary_targets(&x, &array![0.0, 1.0]).is_err());
    }
}
