//! Seeded stratified train/test split

use crate::data::dataset::Dataset;
use crate::error::{Result, TransfusionError};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// The four partitions plus the original row indices behind them
#[derive(Debug, Clone)]
pub struct SplitResult {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    /// Row positions in the source table, in partition order
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl SplitResult {
    pub fn train_positive_rate(&self) -> f64 {
        positive_rate(&self.y_train)
    }

    pub fn test_positive_rate(&self) -> f64 {
        positive_rate(&self.y_test)
    }
}

fn positive_rate(y: &Array1<f64>) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().filter(|&&v| v == 1.0).count() as f64 / y.len() as f64
}

/// Stratified shuffle split driven by a `ChaCha8Rng`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedSplitter {
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for StratifiedSplitter {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            random_state: 42,
        }
    }
}

impl StratifiedSplitter {
    pub fn new(test_size: f64, random_state: u64) -> Self {
        Self {
            test_size,
            random_state,
        }
    }

    /// Split a dataset's features and labels
    pub fn split(&self, dataset: &Dataset) -> Result<SplitResult> {
        let features = dataset.features()?;
        let labels = dataset.labels()?;
        let (train_indices, test_indices) = self.split_indices(&labels)?;

        let split = SplitResult {
            x_train: take_rows(&features, &train_indices)?,
            x_test: take_rows(&features, &test_indices)?,
            y_train: labels.select(Axis(0), &train_indices),
            y_test: labels.select(Axis(0), &test_indices),
            train_indices,
            test_indices,
        };

        info!(
            train = split.train_indices.len(),
            test = split.test_indices.len(),
            test_positive_rate = split.test_positive_rate(),
            "Stratified split"
        );
        Ok(split)
    }

    /// Train and test row indices for the given labels.
    ///
    /// The test partition holds `ceil(test_size * n)` rows. Each class gets
    /// `floor(n_test * class_share)` of them; leftover rows go to the classes
    /// with the largest fractional remainder (larger class first, then lower
    /// label), skipping any class that would be left without a training row.
    pub fn split_indices(&self, y: &Array1<f64>) -> Result<(Vec<usize>, Vec<usize>)> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TransfusionError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }

        let n = y.len();
        let n_test = (self.test_size * n as f64).ceil() as usize;
        let n_train = n.saturating_sub(n_test);

        let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &v) in y.iter().enumerate() {
            classes.entry(v.round() as i64).or_default().push(i);
        }

        if let Some((label, members)) = classes.iter().find(|(_, m)| m.len() < 2) {
            return Err(TransfusionError::ValidationError(format!(
                "Class {} has {} member(s); stratification needs at least 2",
                label,
                members.len()
            )));
        }
        if n_test < classes.len() || n_train < classes.len() {
            return Err(TransfusionError::ValidationError(format!(
                "A split of {} rows into {} train / {} test cannot hold all {} classes",
                n,
                n_train,
                n_test,
                classes.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        for members in classes.values_mut() {
            members.shuffle(&mut rng);
        }

        let allocation = allocate_test_rows(&classes, n, n_test)?;

        let mut train = Vec::with_capacity(n_train);
        let mut test = Vec::with_capacity(n_test);
        for (label, members) in &classes {
            let k = allocation[label];
            test.extend_from_slice(&members[..k]);
            train.extend_from_slice(&members[k..]);
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);
        Ok((train, test))
    }
}

fn allocate_test_rows(
    classes: &BTreeMap<i64, Vec<usize>>,
    n: usize,
    n_test: usize,
) -> Result<BTreeMap<i64, usize>> {
    let mut allocation = BTreeMap::new();
    let mut remainders: Vec<(i64, usize, f64)> = Vec::with_capacity(classes.len());

    for (&label, members) in classes {
        let exact = n_test as f64 * members.len() as f64 / n as f64;
        let base = exact.floor() as usize;
        allocation.insert(label, base);
        remainders.push((label, members.len(), exact - base as f64));
    }

    remainders.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.cmp(&a.1))
            .then(a.0.cmp(&b.0))
    });

    let mut assigned: usize = allocation.values().sum();
    while assigned < n_test {
        let before = assigned;
        for (label, count, _) in &remainders {
            if assigned == n_test {
                break;
            }
            if let Some(k) = allocation.get_mut(label) {
                // Leave at least one member for training
                if *k + 1 < *count {
                    *k += 1;
                    assigned += 1;
                }
            }
        }
        if assigned == before {
            return Err(TransfusionError::ValidationError(format!(
                "Cannot place {} test rows while keeping every class in training",
                n_test
            )));
        }
    }
    Ok(allocation)
}

fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    Ok(df.take(&IdxCa::from_vec("idx".into(), idx))?)
}
