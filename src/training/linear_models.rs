//! Logistic regression

use crate::error::{Result, TransfusionError};
use super::models::{check_binary_targets, check_n_features, Classifier};
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Retries once with a small ridge if the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    match cholesky_solve_inner(a, b) {
        Some(x) => Some(x),
        None => {
            let mut a_reg = a.clone();
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
            for k in 0..n {
                a_reg[[k, k]] += ridge;
            }
            cholesky_solve_inner(&a_reg, b)
        }
    }
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Numerically stable `ln(1 + e^z)`
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Optimisation routine for [`LogisticRegression`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogisticSolver {
    /// L2-penalised Newton iterations on the primal problem, penalising the
    /// intercept like a regular weight (liblinear's convention).
    Liblinear,
    /// Full-batch gradient descent on the mean log-loss
    GradientDescent { learning_rate: f64 },
}

impl Default for LogisticSolver {
    fn default() -> Self {
        LogisticSolver::Liblinear
    }
}

/// Logistic regression for binary classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Synthetic feature value appended for the intercept (liblinear)
    pub intercept_scaling: f64,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance (relative gradient norm)
    pub tol: f64,
    pub solver: LogisticSolver,
    /// Seed recorded with the model; both solvers are deterministic
    pub random_state: Option<u64>,
    /// Iterations used by the last fit
    pub n_iter: usize,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            intercept_scaling: 1.0,
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
            solver: LogisticSolver::Liblinear,
            random_state: None,
            n_iter: 0,
            is_fitted: false,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_solver(mut self, solver: LogisticSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_binary_targets(x, y)?;

        if self.c <= 0.0 || !self.c.is_finite() {
            return Err(TransfusionError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(TransfusionError::ValidationError(
                "Logistic regression input contains NaN or infinite values".to_string(),
            ));
        }

        match self.solver.clone() {
            LogisticSolver::Liblinear => self.fit_newton(x, y)?,
            LogisticSolver::GradientDescent { learning_rate } => {
                self.fit_gradient_descent(x, y, learning_rate)?
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    fn design_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.fit_intercept {
            let bias = Array2::from_elem((x.nrows(), 1), self.intercept_scaling);
            Ok(concatenate(Axis(1), &[x.view(), bias.view()])?)
        } else {
            Ok(x.to_owned())
        }
    }

    /// Objective: 0.5 * ||w||^2 + C * sum(log-loss)
    fn objective(&self, xa: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>) -> f64 {
        let z = xa.dot(w);
        let loss: f64 = z
            .iter()
            .zip(y.iter())
            .map(|(&zi, &yi)| softplus(zi) - yi * zi)
            .sum();
        0.5 * w.dot(w) + self.c * loss
    }

    fn fit_newton(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let xa = self.design_matrix(x)?;
        let n_params = xa.ncols();
        let mut w = Array1::<f64>::zeros(n_params);
        let mut initial_grad_norm = None;
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let p = xa.dot(&w).mapv(sigmoid);
            let grad = &w + &(xa.t().dot(&(&p - y)) * self.c);
            let grad_norm = grad.dot(&grad).sqrt();

            let g0 = *initial_grad_norm.get_or_insert(grad_norm);
            if grad_norm <= self.tol * g0 || grad_norm < 1e-12 {
                break;
            }

            // Hessian: I + C * X^T diag(p(1-p)) X
            let d = p.mapv(|pi| pi * (1.0 - pi));
            let xd = &xa * &d.view().insert_axis(Axis(1));
            let mut hessian = xa.t().dot(&xd) * self.c;
            for k in 0..n_params {
                hessian[[k, k]] += 1.0;
            }

            let step = cholesky_solve(&hessian, &grad.mapv(|g| -g)).ok_or_else(|| {
                TransfusionError::ComputationError(
                    "Newton system is not positive definite".to_string(),
                )
            })?;

            // Backtracking (Armijo) line search
            let f0 = self.objective(&xa, y, &w);
            let slope = grad.dot(&step);
            let mut t = 1.0;
            let mut w_next = &w + &(&step * t);
            for _ in 0..30 {
                if self.objective(&xa, y, &w_next) <= f0 + 1e-4 * t * slope {
                    break;
                }
                t *= 0.5;
                w_next = &w + &(&step * t);
            }
            w = w_next;
        }

        self.n_iter = n_iter;
        self.store_weights(&w, x.ncols());
        Ok(())
    }

    fn fit_gradient_descent(&mut self, x: &Array2<f64>, y: &Array1<f64>, lr: f64) -> Result<()> {
        let n_samples = x.nrows();
        let xa = self.design_matrix(x)?;
        let mut w = Array1::<f64>::zeros(xa.ncols());
        // Mean-loss form of the same objective
        let alpha = 1.0 / (self.c * n_samples as f64);
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let predictions = xa.dot(&w).mapv(sigmoid);
            let errors = &predictions - y;
            let grad = (xa.t().dot(&errors) / n_samples as f64) + (&w * alpha);

            let grad_norm = grad.dot(&grad).sqrt();
            if grad_norm < self.tol {
                break;
            }

            w = w - grad * lr;
        }

        if w.iter().any(|v| !v.is_finite()) {
            return Err(TransfusionError::ComputationError(format!(
                "Gradient descent diverged after {} iterations",
                n_iter
            )));
        }

        self.n_iter = n_iter;
        self.store_weights(&w, x.ncols());
        Ok(())
    }

    fn store_weights(&mut self, w: &Array1<f64>, n_features: usize) {
        self.coefficients = Some(w.slice(ndarray::s![..n_features]).to_owned());
        self.intercept = Some(if self.fit_intercept {
            w[n_features] * self.intercept_scaling
        } else {
            0.0
        });
    }

    /// Raw decision values `x . w + b`
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(TransfusionError::ModelNotFitted),
        };
        check_n_features(coefficients.len(), x)?;
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    /// Predict probabilities of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict_proba(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::{accuracy_score, roc_auc_score};
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 1.0],
            [1.5, 1.5],
            [2.0, 2.0],
            [5.0, 5.0],
            [5.5, 5.5],
            [6.0, 6.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_liblinear_separable() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new().with_random_state(42);
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted);

        let acc = accuracy_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(acc >= 0.8, "Accuracy should be >= 0.8, got {}", acc);
        assert!((roc_auc_score(&y, &model.predict_proba(&x).unwrap()).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_descent_separable() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new()
            .with_solver(LogisticSolver::GradientDescent { learning_rate: 0.1 })
            .with_max_iter(2000);
        model.fit(&x, &y).unwrap();

        let acc = accuracy_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(acc >= 0.8, "Accuracy should be >= 0.8, got {}", acc);
    }

    #[test]
    fn test_stronger_penalty_shrinks_weights() {
        let (x, y) = separable();
        let mut loose = LogisticRegression::new().with_c(10.0);
        let mut tight = LogisticRegression::new().with_c(0.01);
        loose.fit(&x, &y).unwrap();
        tight.fit(&x, &y).unwrap();

        let norm = |m: &LogisticRegression| {
            let c = m.coefficients.as_ref().unwrap();
            c.dot(c).sqrt()
        };
        assert!(norm(&tight) < norm(&loose));
    }

    #[test]
    fn test_large_unscaled_feature() {
        // Mimics a volume column in the hundreds-to-thousands range
        let x = array![
            [250.0, 2.0],
            [500.0, 14.0],
            [750.0, 4.0],
            [4000.0, 2.0],
            [6000.0, 1.0],
            [1000.0, 21.0],
            [3500.0, 3.0],
            [250.0, 16.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| p.is_finite() && (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LogisticRegression::new();
        assert!(matches!(
            model.predict_proba(&array![[1.0]]),
            Err(TransfusionError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_wrong_feature_count() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(model.predict_proba(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_invalid_c() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new().with_c(0.0);
        assert!(matches!(
            model.fit(&x, &y),
            Err(TransfusionError::InvalidParameter { .. })
        ));
    }
}
