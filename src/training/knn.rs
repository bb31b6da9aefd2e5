//! K-Nearest Neighbors classifier with Minkowski distances.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::models::{check_binary_targets, check_n_features, Classifier};
use crate::error::{Result, TransfusionError};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Euclidean
    }
}

impl DistanceMetric {
    /// Metric for a Minkowski power; 1 and 2 map to their closed forms
    pub fn from_p(p: u32) -> Self {
        match p {
            1 => Self::Manhattan,
            2 => Self::Euclidean,
            other => Self::Minkowski(other as f64),
        }
    }

    /// Minkowski power of this metric
    pub fn p(&self) -> f64 {
        match self {
            Self::Manhattan => 1.0,
            Self::Euclidean => 2.0,
            Self::Minkowski(p) => *p,
        }
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

impl Default for WeightScheme {
    fn default() -> Self {
        Self::Uniform
    }
}

impl WeightScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Distance => "distance",
        }
    }
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_targets(x, y)?;
        let k = self.config.n_neighbors;
        if k == 0 || k > x.nrows() {
            return Err(TransfusionError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: k.to_string(),
                reason: format!("must be between 1 and the {} training rows", x.nrows()),
            });
        }
        if self.config.metric.p() < 1.0 {
            return Err(TransfusionError::InvalidParameter {
                name: "p".to_string(),
                value: self.config.metric.p().to_string(),
                reason: "Minkowski power must be at least 1".to_string(),
            });
        }

        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Positive-class probability: the (weighted) share of positive neighbors
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(TransfusionError::ModelNotFitted),
        };
        check_n_features(x_train.ncols(), x)?;

        let k = self.config.n_neighbors;
        let metric = self.config.metric;
        let weights = self.config.weights;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let neighbors = find_k_nearest(row, x_train, y_train, k, metric);
                positive_share(&neighbors, weights)
            })
            .collect())
    }
}

impl Classifier for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KNNClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KNNClassifier::predict_proba(self, x)
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances).
/// Ties on distance resolve to the lower training index.
#[derive(PartialEq)]
struct Neighbor {
    dist: f64,
    index: usize,
    label: f64,
}

impl Eq for Neighbor {}
impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(Ordering::Equal)
            .then(self.index.cmp(&other.index))
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let dist = compute_distance(point, row, metric);
        if heap.len() < k {
            heap.push(Neighbor { dist, index: i, label: y_train[i] });
        } else if let Some(top) = heap.peek() {
            if dist < top.dist {
                heap.pop();
                heap.push(Neighbor { dist, index: i, label: y_train[i] });
            }
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|n| (n.dist, n.label))
        .collect()
}

/// Compute distance between two points using the specified metric
fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| {
                let d = ai - bi;
                d * d
            })
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
        DistanceMetric::Minkowski(p) => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
    }
}

/// Weighted share of positive labels among the neighbors.
///
/// With inverse-distance weights, exact matches (distance 0) take all the
/// weight among themselves.
fn positive_share(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let exact: Vec<f64> = neighbors
        .iter()
        .filter(|(d, _)| *d == 0.0)
        .map(|&(_, label)| label)
        .collect();

    match weights {
        WeightScheme::Distance if !exact.is_empty() => {
            exact.iter().sum::<f64>() / exact.len() as f64
        }
        WeightScheme::Distance => {
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for &(dist, label) in neighbors {
                let w = 1.0 / dist;
                weighted_sum += w * label;
                weight_total += w;
            }
            weighted_sum / weight_total
        }
        WeightScheme::Uniform => {
            neighbors.iter().map(|(_, label)| label).sum::<f64>() / neighbors.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        // Create linearly separable data
        let x = Array2::from_shape_vec((20, 2), vec![
            // Class 0 (low values)
            1.0, 1.0, 1.5, 1.5, 2.0, 2.0, 2.5, 2.5, 1.0, 2.0,
            1.5, 2.5, 2.0, 1.5, 2.5, 1.0, 1.2, 1.8, 1.8, 1.2,
            // Class 1 (high values)
            8.0, 8.0, 8.5, 8.5, 9.0, 9.0, 9.5, 9.5, 8.0, 9.0,
            8.5, 9.5, 9.0, 8.5, 9.5, 8.0, 8.2, 8.8, 8.8, 8.2,
        ]).unwrap();

        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
        ]);

        (x, y)
    }

    #[test]
    fn test_knn_classifier() {
        let (x, y) = create_classification_data();

        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();

        let predictions = Classifier::predict(&knn, &x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_distance_metrics() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];

        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Euclidean) - 5.0).abs() < 1e-12);
        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Manhattan) - 7.0).abs() < 1e-12);
        assert!(
            (compute_distance(a.view(), b.view(), DistanceMetric::Minkowski(2.0)) - 5.0).abs() < 1e-9
        );
        assert_eq!(DistanceMetric::from_p(1), DistanceMetric::Manhattan);
    }

    #[test]
    fn test_weighted_knn_exact_match_dominates() {
        let (x, y) = create_classification_data();

        let mut knn = KNNClassifier::new(KNNConfig {
            n_neighbors: 20,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();

        // Every training point is its own zero-distance neighbor
        let proba = knn.predict_proba(&x).unwrap();
        assert_eq!(proba, y);
    }

    #[test]
    fn test_uniform_share_with_all_neighbors() {
        let (x, y) = create_classification_data();
        let mut knn = KNNClassifier::with_k(20);
        knn.fit(&x, &y).unwrap();

        let proba = knn.predict_proba(&array![[5.0, 5.0]]).unwrap();
        assert!((proba[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let (x, y) = create_classification_data();
        let mut knn = KNNClassifier::with_k(21);
        assert!(matches!(
            knn.fit(&x, &y),
            Err(TransfusionError::InvalidParameter { .. })
        ));
    }
}
