//! Automated pipeline search
//!
//! Provides:
//! - Linear pipelines of preprocessing operators ending in a classifier
//! - The "light" and "classifiers" search spaces
//! - An evolutionary search scored by stratified cross-validation

pub mod config;
pub mod genetic;
pub mod pipeline;
pub mod space;

pub use config::SearchConfig;
pub use genetic::EvolutionarySearch;
pub use pipeline::{ClassifierStep, Model, Pipeline, PipelineSpec, Preprocessor, PreprocessorStep};
pub use space::{ClassifierKind, PreprocessorKind, SearchSpace, SearchSpaceKind};

use crate::error::Result;
use crate::training::Classifier;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Summary of one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// 0 is the initial population
    pub generation: usize,
    pub best_score: f64,
    /// Mean over pipelines that could be scored
    pub mean_score: f64,
    /// Distinct pipelines evaluated so far
    pub n_evaluated: usize,
}

/// Best pipeline found, refit on the full training data
#[derive(Debug, Clone)]
pub struct ScoredPipeline {
    pub pipeline: Pipeline,
    /// Internal cross-validation score
    pub cv_score: f64,
    pub n_evaluated: usize,
    pub history: Vec<GenerationStats>,
}

impl ScoredPipeline {
    pub fn spec(&self) -> &PipelineSpec {
        self.pipeline.spec()
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.pipeline.predict_proba(x)
    }
}

/// Strategy that searches for a classification pipeline
pub trait PipelineSearch {
    /// Search on the training data and return the refit winner
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ScoredPipeline>;

    fn name(&self) -> &str;
}
