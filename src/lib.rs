//! Transfusion AutoML - blood donation prediction
//!
//! Loads the blood transfusion service center data, splits it with
//! stratification, searches for a classification pipeline with an
//! evolutionary algorithm, and compares the winner against a log-normalized
//! logistic regression baseline by ROC AUC.
//!
//! # Modules
//!
//! - [`data`] - CSV loading, target preparation, stratified split
//! - [`preprocessing`] - Scalers, transforms, feature selection, log normalization
//! - [`training`] - Classifiers, ROC AUC, cross-validation
//! - [`search`] - Pipeline search space and evolutionary search
//! - [`baseline`] - Log-normalized logistic regression
//! - [`ranking`] - Leaderboard by validation score
//! - [`export`] - JSON model artifacts
//! - [`experiment`] - Stage orchestration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data and models
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod search;

// Experiment stages
pub mod baseline;
pub mod ranking;
pub mod export;
pub mod experiment;

// Services
pub mod cli;

pub use error::{Result, TransfusionError};

/// Prelude for common imports
pub mod prelude {
    pub use crate::baseline::{run_baseline, BaselineModel, BaselineReport};
    pub use crate::config::{ArtifactConfig, BaselineConfig, ExperimentConfig, SplitConfig};
    pub use crate::data::{
        class_incidence, frame_to_array2, DataLoader, Dataset, SplitResult, StratifiedSplitter,
        TargetPreparer, TARGET_COLUMN,
    };
    pub use crate::error::{Result, TransfusionError};
    pub use crate::experiment::{Experiment, ExperimentReport};
    pub use crate::export::{ModelArtifact, PayloadKind};
    pub use crate::preprocessing::LogNormalizer;
    pub use crate::ranking::{rank_models, RankedModel};
    pub use crate::search::{
        EvolutionarySearch, PipelineSearch, PipelineSpec, ScoredPipeline, SearchConfig,
        SearchSpaceKind,
    };
    pub use crate::training::{roc_auc_score, Classifier, LogisticRegression, Scoring};
}
