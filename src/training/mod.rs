//! Model training module
//!
//! Binary classifiers used by the pipeline search and the baseline:
//! - Logistic regression (liblinear-style Newton or gradient descent)
//! - Naive Bayes (Gaussian, Bernoulli, multinomial)
//! - K-Nearest Neighbors
//! - Decision trees
//!
//! plus ROC AUC scoring and (stratified) k-fold cross-validation.

mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod knn;
pub mod linear_models;
pub mod metrics;
pub mod naive_bayes;

pub use cross_validation::{cross_val_score, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use linear_models::{LogisticRegression, LogisticSolver};
pub use metrics::{accuracy_score, roc_auc_score, Scoring};
pub use models::Classifier;
pub(crate) use models::check_n_features;
pub use naive_bayes::{BernoulliNaiveBayes, GaussianNaiveBayes, MultinomialNaiveBayes};
