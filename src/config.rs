//! Experiment configuration
//!
//! Every section has defaults matching the reference blood-donation run and
//! can be overridden from a JSON file or builder methods.

use crate::data::DEFAULT_SOURCE_LABEL;
use crate::error::{Result, TransfusionError};
use crate::export::PayloadKind;
use crate::search::SearchConfig;
use crate::training::LogisticSolver;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Train/test partitioning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            random_state: 42,
        }
    }
}

/// Log-normalized logistic regression baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Name of the appended log column
    pub output_column: String,
    pub solver: LogisticSolver,
    /// Inverse regularization strength
    pub c: f64,
    pub random_state: Option<u64>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            output_column: "monetary_log".to_string(),
            solver: LogisticSolver::Liblinear,
            c: 1.0,
            random_state: Some(42),
        }
    }
}

/// Where and what to persist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub path: PathBuf,
    pub payload: PayloadKind,
    /// Name recorded in the artifact
    pub name: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model.json"),
            payload: PayloadKind::Estimator,
            name: "logreg".to_string(),
        }
    }
}

/// Full experiment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data_path: PathBuf,
    /// Field separator of the data file
    pub delimiter: char,
    /// Column renamed to `target`
    pub label_column: String,
    pub split: SplitConfig,
    pub search: SearchConfig,
    pub baseline: BaselineConfig,
    pub artifact: ArtifactConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("datasets/transfusion.data"),
            delimiter: ',',
            label_column: DEFAULT_SOURCE_LABEL.to_string(),
            split: SplitConfig::default(),
            search: SearchConfig::default(),
            baseline: BaselineConfig::default(),
            artifact: ArtifactConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a (possibly partial) JSON config; missing fields keep defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TransfusionError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            TransfusionError::ConfigError(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = column.into();
        self
    }

    /// Seed the split, the search and the baseline at once
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.random_state = seed;
        self.search.random_state = Some(seed);
        self.baseline.random_state = Some(seed);
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact.path = path.into();
        self
    }

    pub fn with_payload(mut self, payload: PayloadKind) -> Self {
        self.artifact.payload = payload;
        self
    }

    /// Delimiter as the single byte polars expects
    pub fn delimiter_byte(&self) -> Result<u8> {
        if !self.delimiter.is_ascii() {
            return Err(TransfusionError::ConfigError(format!(
                "Delimiter '{}' is not an ASCII character",
                self.delimiter
            )));
        }
        Ok(self.delimiter as u8)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.split.test_size > 0.0 && self.split.test_size < 1.0) {
            return Err(TransfusionError::ConfigError(format!(
                "split.test_size must lie in (0, 1), got {}",
                self.split.test_size
            )));
        }
        if self.baseline.output_column.is_empty() {
            return Err(TransfusionError::ConfigError(
                "baseline.output_column must not be empty".to_string(),
            ));
        }
        self.delimiter_byte()?;
        self.search.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchSpaceKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ExperimentConfig::default();
        assert_eq!(config.split.test_size, 0.25);
        assert_eq!(config.split.random_state, 42);
        assert_eq!(config.search.generations, 5);
        assert_eq!(config.baseline.output_column, "monetary_log");
        assert_eq!(config.artifact.path, PathBuf::from("model.json"));
        assert_eq!(config.artifact.payload, PayloadKind::Estimator);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_seed() {
        let config = ExperimentConfig::default().with_seed(7);
        assert_eq!(config.split.random_state, 7);
        assert_eq!(config.search.random_state, Some(7));
        assert_eq!(config.baseline.random_state, Some(7));
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"split": {{"test_size": 0.3}}, "search": {{"search_space": "classifiers"}}, "artifact": {{"payload": "placeholder"}}}}"#
        )
        .unwrap();

        let config = ExperimentConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.split.test_size, 0.3);
        assert_eq!(config.split.random_state, 42);
        assert_eq!(config.search.search_space, SearchSpaceKind::Classifiers);
        assert_eq!(config.search.population_size, 20);
        assert_eq!(config.artifact.payload, PayloadKind::Placeholder);
    }

    #[test]
    fn test_bad_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ExperimentConfig::from_json_file(file.path()),
            Err(TransfusionError::ConfigError(_))
        ));
        assert!(ExperimentConfig::from_json_file("/nonexistent/config.json").is_err());
    }

    #[test]
    fn test_invalid_delimiter() {
        let mut config = ExperimentConfig::default();
        config.delimiter = '€';
        assert!(config.validate().is_err());
    }
}
