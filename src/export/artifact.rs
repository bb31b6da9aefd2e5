//! JSON model artifact

use crate::baseline::BaselineModel;
use crate::error::{Result, TransfusionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// What an artifact carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Only the model name
    Placeholder,
    /// The fitted baseline
    Estimator,
}

impl Default for PayloadKind {
    fn default() -> Self {
        PayloadKind::Estimator
    }
}

impl std::str::FromStr for PayloadKind {
    type Err = TransfusionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "placeholder" => Ok(Self::Placeholder),
            "estimator" => Ok(Self::Estimator),
            other => Err(TransfusionError::ConfigError(format!(
                "Unknown payload '{}', expected 'placeholder' or 'estimator'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArtifactPayload {
    Placeholder(String),
    Estimator(Box<BaselineModel>),
}

impl ArtifactPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Placeholder(_) => PayloadKind::Placeholder,
            Self::Estimator(_) => PayloadKind::Estimator,
        }
    }
}

/// Persisted model with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub format_version: u32,
    pub payload: ArtifactPayload,
}

impl ModelArtifact {
    pub const FORMAT_VERSION: u32 = 1;

    /// Artifact holding only the model name
    pub fn placeholder(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            payload: ArtifactPayload::Placeholder(name.clone()),
            name,
            created_at: Utc::now(),
            format_version: Self::FORMAT_VERSION,
        }
    }

    /// Artifact holding a fitted baseline
    pub fn estimator(name: impl Into<String>, model: BaselineModel) -> Result<Self> {
        if !model.is_fitted() {
            return Err(TransfusionError::ModelNotFitted);
        }
        Ok(Self {
            name: name.into(),
            created_at: Utc::now(),
            format_version: Self::FORMAT_VERSION,
            payload: ArtifactPayload::Estimator(Box::new(model)),
        })
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    pub fn estimator_model(&self) -> Option<&BaselineModel> {
        match &self.payload {
            ArtifactPayload::Estimator(model) => Some(model.as_ref()),
            ArtifactPayload::Placeholder(_) => None,
        }
    }

    /// Write as pretty JSON, replacing any existing file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!(path = %path.display(), kind = ?self.kind(), "Saved model artifact");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let artifact: Self = serde_json::from_reader(BufReader::new(file))?;
        if artifact.format_version > Self::FORMAT_VERSION {
            return Err(TransfusionError::SerializationError(format!(
                "Artifact format {} is newer than supported {}",
                artifact.format_version,
                Self::FORMAT_VERSION
            )));
        }
        info!(path = %path.display(), name = %artifact.name, "Loaded model artifact");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaselineConfig;
    use ndarray::array;
    use polars::prelude::*;
    use tempfile::tempdir;

    fn fitted() -> (BaselineModel, DataFrame) {
        let x = df!(
            "Recency (months)" => [2.0, 14.0, 1.0, 23.0, 4.0, 21.0],
            "Monetary (c.c. blood)" => [12500.0, 500.0, 4000.0, 250.0, 6000.0, 750.0],
        )
        .unwrap();
        let y = array![1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let mut model = BaselineModel::new(&BaselineConfig::default());
        model.fit(&x, &y).unwrap();
        (model, x)
    }

    #[test]
    fn test_placeholder_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");

        ModelArtifact::placeholder("logreg").save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded.name, "logreg");
        assert_eq!(loaded.kind(), PayloadKind::Placeholder);
        assert!(loaded.estimator_model().is_none());
    }

    #[test]
    fn test_estimator_reproduces_predictions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let (model, x) = fitted();
        let expected = model.predict_proba(&x).unwrap();

        ModelArtifact::estimator("logreg", model).unwrap().save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();
        let restored = loaded.estimator_model().unwrap();

        let actual = restored.predict_proba(&x).unwrap();
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unfitted_estimator_rejected() {
        let model = BaselineModel::new(&BaselineConfig::default());
        assert!(ModelArtifact::estimator("logreg", model).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ModelArtifact::load("/nonexistent/model.json"),
            Err(TransfusionError::IoError(_))
        ));
    }

    #[test]
    fn test_parse_payload_kind() {
        assert_eq!("estimator".parse::<PayloadKind>().unwrap(), PayloadKind::Estimator);
        assert!("pickle".parse::<PayloadKind>().is_err());
    }
}
