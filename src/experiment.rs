//! End-to-end blood donation experiment
//!
//! Stages run in order: load, prepare target, split, pipeline search,
//! baseline, ranking, artifact persistence. Each stage is a method so
//! callers can stop early or print between stages.

use crate::baseline::{run_baseline, BaselineModel, BaselineReport};
use crate::config::ExperimentConfig;
use crate::data::{
    frame_to_array2, preview_lines, ClassFrequency, DataLoader, Dataset, DatasetInfo,
    SplitResult, StratifiedSplitter, TargetPreparer,
};
use crate::error::{Result, TransfusionError};
use crate::export::{ModelArtifact, PayloadKind};
use crate::ranking::{rank_models, RankedModel};
use crate::search::{EvolutionarySearch, GenerationStats, PipelineSearch, ScoredPipeline};
use crate::training::roc_auc_score;
use polars::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Name of the baseline in rankings and artifacts
pub const BASELINE_NAME: &str = "logreg";

/// Result of the search stage
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub scored: ScoredPipeline,
    /// ROC AUC of the refit pipeline on the test partition
    pub test_auc: f64,
}

/// Where the artifact went and whether it survived a reload
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub kind: PayloadKind,
    pub name: String,
    /// Test AUC of the reloaded estimator; `None` for placeholders
    pub reload_auc: Option<f64>,
}

impl ArtifactSummary {
    /// A reloaded estimator must reproduce the in-memory test AUC
    pub fn check_reload(&self, expected_auc: f64) -> Result<()> {
        match self.reload_auc {
            Some(reload) if (reload - expected_auc).abs() > 1e-9 => {
                Err(TransfusionError::SerializationError(format!(
                    "Reloaded model scores {:.6}, expected {:.6}",
                    reload, expected_auc
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Serializable summary of the search stage
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub strategy: String,
    pub pipeline: String,
    pub steps: Vec<String>,
    pub cv_score: f64,
    pub test_auc: f64,
    pub n_evaluated: usize,
    pub history: Vec<GenerationStats>,
}

/// Everything a full run reports
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub n_rows: usize,
    pub feature_names: Vec<String>,
    pub incidence: Vec<ClassFrequency>,
    pub n_train: usize,
    pub n_test: usize,
    pub train_positive_rate: f64,
    pub test_positive_rate: f64,
    pub search: SearchSummary,
    pub baseline: BaselineReport,
    pub ranking: Vec<RankedModel>,
    pub artifact: ArtifactSummary,
}

/// Orchestrates the experiment with an injected search strategy
pub struct Experiment {
    config: ExperimentConfig,
    search: Box<dyn PipelineSearch>,
}

impl Experiment {
    /// Experiment using the evolutionary search from the config
    pub fn new(config: ExperimentConfig) -> Self {
        let search = Box::new(EvolutionarySearch::new(config.search.clone()));
        Self { config, search }
    }

    /// Replace the search strategy
    pub fn with_search(mut self, search: Box<dyn PipelineSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn search_name(&self) -> &str {
        self.search.name()
    }

    /// First `n` raw lines of the data file
    pub fn preview(&self, n: usize) -> Result<Vec<String>> {
        preview_lines(&self.config.data_path, n)
    }

    pub fn load(&self) -> Result<DataFrame> {
        DataLoader::new()
            .with_delimiter(self.config.delimiter_byte()?)
            .load_csv(&self.config.data_path)
    }

    pub fn prepare(&self, df: DataFrame) -> Result<Dataset> {
        TargetPreparer::new(self.config.label_column.as_str()).prepare(df)
    }

    pub fn info(&self, df: &DataFrame) -> DatasetInfo {
        DatasetInfo::from_frame(df)
    }

    pub fn split(&self, dataset: &Dataset) -> Result<SplitResult> {
        StratifiedSplitter::new(self.config.split.test_size, self.config.split.random_state)
            .split(dataset)
    }

    /// Run the pipeline search on the training partition and score the
    /// winner on the test partition
    pub fn search(&mut self, split: &SplitResult) -> Result<SearchOutcome> {
        let x_train = frame_to_array2(&split.x_train)?;
        let x_test = frame_to_array2(&split.x_test)?;

        let scored = self.search.fit(&x_train, &split.y_train)?;
        let test_auc = roc_auc_score(&split.y_test, &scored.predict_proba(&x_test)?)?;

        info!(
            strategy = self.search.name(),
            pipeline = %scored.spec(),
            cv_score = scored.cv_score,
            test_auc,
            "Pipeline search scored"
        );
        Ok(SearchOutcome { scored, test_auc })
    }

    pub fn baseline(&self, split: &SplitResult) -> Result<(BaselineModel, BaselineReport)> {
        run_baseline(&self.config.baseline, split)
    }

    pub fn rank(&self, search_auc: f64, baseline_auc: f64) -> Vec<RankedModel> {
        rank_models(vec![
            (self.search.name().to_string(), search_auc),
            (BASELINE_NAME.to_string(), baseline_auc),
        ])
    }

    /// Save the configured payload, reload it, and re-score an estimator
    /// payload on the test partition
    pub fn persist(&self, model: BaselineModel, split: &SplitResult) -> Result<ArtifactSummary> {
        let settings = &self.config.artifact;
        let artifact = match settings.payload {
            PayloadKind::Placeholder => ModelArtifact::placeholder(settings.name.as_str()),
            PayloadKind::Estimator => ModelArtifact::estimator(settings.name.as_str(), model)?,
        };
        artifact.save(&settings.path)?;

        let loaded = ModelArtifact::load(&settings.path)?;
        if loaded.name != artifact.name || loaded.kind() != artifact.kind() {
            return Err(TransfusionError::SerializationError(format!(
                "Reloaded artifact '{}' does not match the saved one",
                settings.path.display()
            )));
        }

        let reload_auc = loaded
            .estimator_model()
            .map(|m| m.score(&split.x_test, &split.y_test))
            .transpose()?;

        Ok(ArtifactSummary {
            path: settings.path.clone(),
            kind: loaded.kind(),
            name: loaded.name,
            reload_auc,
        })
    }

    /// Run every stage
    pub fn run(&mut self) -> Result<ExperimentReport> {
        self.config.validate()?;

        let dataset = self.prepare(self.load()?)?;
        let incidence = dataset.class_incidence()?;
        let split = self.split(&dataset)?;

        let outcome = self.search(&split)?;
        let (model, baseline) = self.baseline(&split)?;
        let ranking = self.rank(outcome.test_auc, baseline.test_auc);
        let artifact = self.persist(model, &split)?;

        artifact.check_reload(baseline.test_auc)?;

        let search = SearchSummary {
            strategy: self.search.name().to_string(),
            pipeline: outcome.scored.spec().to_string(),
            steps: outcome.scored.spec().step_lines(),
            cv_score: outcome.scored.cv_score,
            test_auc: outcome.test_auc,
            n_evaluated: outcome.scored.n_evaluated,
            history: outcome.scored.history.clone(),
        };

        Ok(ExperimentReport {
            n_rows: dataset.n_rows(),
            feature_names: dataset.feature_names(),
            incidence,
            n_train: split.train_indices.len(),
            n_test: split.test_indices.len(),
            train_positive_rate: split.train_positive_rate(),
            test_positive_rate: split.test_positive_rate(),
            search,
            baseline,
            ranking,
            artifact,
        })
    }
}
