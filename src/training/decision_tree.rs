//! Decision tree classifier

use crate::error::{Result, TransfusionError};
use super::models::{check_binary_targets, check_n_features, Classifier};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the share of positive training rows
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Shannon entropy
    Entropy,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
        }
    }

    /// Impurity of a node holding `n_pos` positives out of `n`
    fn impurity(&self, n_pos: usize, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let p = n_pos as f64 / n as f64;
        let q = 1.0 - p;
        match self {
            Criterion::Gini => 1.0 - p * p - q * q,
            Criterion::Entropy => {
                let h = |v: f64| if v > 0.0 { -v * v.log2() } else { 0.0 };
                h(p) + h(q)
            }
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::Gini,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_binary_targets(x, y)?;
        if self.min_samples_split < 2 || self.min_samples_leaf < 1 {
            return Err(TransfusionError::InvalidParameter {
                name: "min_samples_split / min_samples_leaf".to_string(),
                value: format!("{} / {}", self.min_samples_split, self.min_samples_leaf),
                reason: "need min_samples_split >= 2 and min_samples_leaf >= 1".to_string(),
            });
        }
        if x.iter().any(|v| v.is_nan()) {
            return Err(TransfusionError::ValidationError(
                "Decision tree input contains NaN".to_string(),
            ));
        }

        let n_features = x.ncols();
        self.n_features = n_features;

        // Initialize feature importances
        let mut importances = vec![0.0; n_features];

        // Build tree recursively
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let n_pos = indices.iter().filter(|&&i| y[i] == 1.0).count();
        let leaf = TreeNode::Leaf {
            value: n_pos as f64 / n_samples as f64,
            n_samples,
        };

        // Check stopping conditions
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || n_pos == 0
            || n_pos == n_samples;

        if should_stop {
            return leaf;
        }

        let Some((best_feature, best_threshold, best_gain)) = self.find_best_split(x, y, indices)
        else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best_feature]] <= best_threshold);

        importances[best_feature] += n_samples as f64 * best_gain;

        // Build children recursively
        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances));

        TreeNode::Split {
            feature_idx: best_feature,
            threshold: best_threshold,
            left,
            right,
            n_samples,
            impurity: self.criterion.impurity(n_pos, n_samples),
        }
    }

    /// Best `(feature, threshold, gain)` over all features, scanning each
    /// feature's sorted values once with running class counts.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len();
        let total_pos = indices.iter().filter(|&&i| y[i] == 1.0).count();
        let parent_impurity = self.criterion.impurity(total_pos, n);

        let mut best: Option<(usize, f64, f64)> = None;

        for feature_idx in 0..x.ncols() {
            let mut sorted: Vec<(f64, bool)> = indices
                .iter()
                .map(|&i| (x[[i, feature_idx]], y[i] == 1.0))
                .collect();
            sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

            let mut left_pos = 0usize;
            for split in 1..n {
                if sorted[split - 1].1 {
                    left_pos += 1;
                }
                // Only cut between distinct values
                if sorted[split - 1].0 == sorted[split].0 {
                    continue;
                }
                let left_count = split;
                let right_count = n - split;
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }

                let weighted_impurity = (left_count as f64
                    * self.criterion.impurity(left_pos, left_count)
                    + right_count as f64 * self.criterion.impurity(total_pos - left_pos, right_count))
                    / n as f64;
                let gain = parent_impurity - weighted_impurity;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    let threshold = (sorted[split - 1].0 + sorted[split].0) / 2.0;
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best
    }

    /// Positive-class probability for each row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(TransfusionError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;

        Ok(x.rows()
            .into_iter()
            .map(|sample| Self::predict_sample(root, sample))
            .collect())
    }

    fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Depth of the fitted tree; a single leaf has depth 0
    pub fn get_depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn count_leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
            }
        }
        self.root.as_ref().map_or(0, count_leaves)
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTree::fit(self, x, y).map(|_| ())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTree::predict_proba(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = Classifier::predict(&tree, &x).unwrap();
        assert_eq!(predictions, y);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_leaf_holds_positive_share() {
        // Identical rows cannot be split
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = array![1.0, 0.0, 0.0, 0.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&array![[1.0]]).unwrap();
        assert!((proba[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth() {
        let x = array![
            [1.0, 4.0],
            [2.0, 1.0],
            [3.0, 3.0],
            [4.0, 2.0],
            [5.0, 5.0],
            [6.0, 0.0],
        ];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier()
            .with_criterion(Criterion::Entropy)
            .with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 1);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 1.0, 1.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_min_samples_leaf(2);
        tree.fit(&x, &y).unwrap();

        // The lone negative cannot be isolated
        let proba = tree.predict_proba(&array![[1.0]]).unwrap();
        assert!(proba[0] > 0.0 && proba[0] < 1.0);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 0.0],
            [4.0, 0.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();

        // First feature should be more important (second is constant)
        assert!(importances[0] > importances[1]);
    }
}
