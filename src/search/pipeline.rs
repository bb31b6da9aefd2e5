//! Linear pipelines: preprocessing steps followed by one classifier

use crate::error::{Result, TransfusionError};
use crate::preprocessing::{FeatureSelector, Norm, Scaler, ScalerType, TransformType, Transformer};
use crate::training::{
    BernoulliNaiveBayes, Classifier, Criterion, DecisionTree, DistanceMetric, GaussianNaiveBayes,
    KNNClassifier, KNNConfig, LogisticRegression, MultinomialNaiveBayes, WeightScheme,
};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

fn py_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// Preprocessing operator with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreprocessorStep {
    Binarizer { threshold: f64 },
    MaxAbsScaler,
    MinMaxScaler,
    Normalizer { norm: Norm },
    RobustScaler,
    StandardScaler,
    PolynomialFeatures,
    VarianceThreshold { threshold: f64 },
    SelectPercentile { percentile: u32 },
}

impl fmt::Display for PreprocessorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binarizer { threshold } => write!(f, "Binarizer(threshold={:?})", threshold),
            Self::MaxAbsScaler => write!(f, "MaxAbsScaler()"),
            Self::MinMaxScaler => write!(f, "MinMaxScaler()"),
            Self::Normalizer { norm } => write!(f, "Normalizer(norm='{}')", norm.as_str()),
            Self::RobustScaler => write!(f, "RobustScaler()"),
            Self::StandardScaler => write!(f, "StandardScaler()"),
            Self::PolynomialFeatures => write!(
                f,
                "PolynomialFeatures(degree=2, include_bias=False, interaction_only=False)"
            ),
            Self::VarianceThreshold { threshold } => {
                write!(f, "VarianceThreshold(threshold={:?})", threshold)
            }
            Self::SelectPercentile { percentile } => write!(
                f,
                "SelectPercentile(percentile={}, score_func=f_classif)",
                percentile
            ),
        }
    }
}

impl PreprocessorStep {
    /// Unfitted operator for this step
    pub fn build(&self) -> Preprocessor {
        match self {
            Self::Binarizer { threshold } => Preprocessor::Transform(Transformer::new(
                TransformType::Binarizer { threshold: *threshold },
            )),
            Self::MaxAbsScaler => Preprocessor::Scale(Scaler::new(ScalerType::MaxAbs)),
            Self::MinMaxScaler => Preprocessor::Scale(Scaler::new(ScalerType::MinMax)),
            Self::Normalizer { norm } => {
                Preprocessor::Transform(Transformer::new(TransformType::Normalizer { norm: *norm }))
            }
            Self::RobustScaler => Preprocessor::Scale(Scaler::new(ScalerType::Robust)),
            Self::StandardScaler => Preprocessor::Scale(Scaler::new(ScalerType::Standard)),
            Self::PolynomialFeatures => Preprocessor::Transform(Transformer::new(
                TransformType::PolynomialFeatures { degree: 2 },
            )),
            Self::VarianceThreshold { threshold } => {
                Preprocessor::Select(FeatureSelector::variance_threshold(*threshold))
            }
            Self::SelectPercentile { percentile } => {
                Preprocessor::Select(FeatureSelector::percentile(*percentile))
            }
        }
    }
}

/// Fitted or unfitted preprocessing operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Preprocessor {
    Scale(Scaler),
    Transform(Transformer),
    Select(FeatureSelector),
}

impl Preprocessor {
    pub fn fit_transform(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Array2<f64>> {
        match self {
            Self::Scale(s) => s.fit_transform(x),
            Self::Transform(t) => t.fit_transform(x),
            Self::Select(s) => s.fit_transform(x, y),
        }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Self::Scale(s) => s.transform(x),
            Self::Transform(t) => t.transform(x),
            Self::Select(s) => s.transform(x),
        }
    }
}

/// Final estimator of a pipeline with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassifierStep {
    GaussianNB,
    BernoulliNB { alpha: f64, fit_prior: bool },
    MultinomialNB { alpha: f64, fit_prior: bool },
    DecisionTree {
        criterion: Criterion,
        max_depth: usize,
        min_samples_split: usize,
        min_samples_leaf: usize,
    },
    KNeighbors {
        n_neighbors: usize,
        weights: WeightScheme,
        p: u32,
    },
    LogisticRegression { c: f64 },
}

impl fmt::Display for ClassifierStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GaussianNB => write!(f, "GaussianNB()"),
            Self::BernoulliNB { alpha, fit_prior } => write!(
                f,
                "BernoulliNB(alpha={:?}, fit_prior={})",
                alpha,
                py_bool(*fit_prior)
            ),
            Self::MultinomialNB { alpha, fit_prior } => write!(
                f,
                "MultinomialNB(alpha={:?}, fit_prior={})",
                alpha,
                py_bool(*fit_prior)
            ),
            Self::DecisionTree {
                criterion,
                max_depth,
                min_samples_split,
                min_samples_leaf,
            } => write!(
                f,
                "DecisionTreeClassifier(criterion='{}', max_depth={}, min_samples_leaf={}, min_samples_split={})",
                criterion.as_str(),
                max_depth,
                min_samples_leaf,
                min_samples_split
            ),
            Self::KNeighbors {
                n_neighbors,
                weights,
                p,
            } => write!(
                f,
                "KNeighborsClassifier(n_neighbors={}, p={}, weights='{}')",
                n_neighbors,
                p,
                weights.as_str()
            ),
            Self::LogisticRegression { c } => {
                write!(f, "LogisticRegression(C={:?}, dual=False, penalty='l2')", c)
            }
        }
    }
}

impl ClassifierStep {
    /// Same operator family, ignoring hyperparameters
    pub fn same_kind(&self, other: &ClassifierStep) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Unfitted model for this step
    pub fn build(&self, random_state: Option<u64>) -> Model {
        match self {
            Self::GaussianNB => Model::GaussianNB(GaussianNaiveBayes::new()),
            Self::BernoulliNB { alpha, fit_prior } => {
                Model::BernoulliNB(BernoulliNaiveBayes::new(*alpha, *fit_prior))
            }
            Self::MultinomialNB { alpha, fit_prior } => {
                Model::MultinomialNB(MultinomialNaiveBayes::new(*alpha, *fit_prior))
            }
            Self::DecisionTree {
                criterion,
                max_depth,
                min_samples_split,
                min_samples_leaf,
            } => Model::DecisionTree(
                DecisionTree::new_classifier()
                    .with_criterion(*criterion)
                    .with_max_depth(*max_depth)
                    .with_min_samples_split(*min_samples_split)
                    .with_min_samples_leaf(*min_samples_leaf),
            ),
            Self::KNeighbors {
                n_neighbors,
                weights,
                p,
            } => Model::KNeighbors(KNNClassifier::new(KNNConfig {
                n_neighbors: *n_neighbors,
                metric: DistanceMetric::from_p(*p),
                weights: *weights,
            })),
            Self::LogisticRegression { c } => {
                let mut model = LogisticRegression::new().with_c(*c);
                if let Some(seed) = random_state {
                    model = model.with_random_state(seed);
                }
                Model::LogisticRegression(model)
            }
        }
    }
}

/// Any classifier a pipeline can end in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Model {
    GaussianNB(GaussianNaiveBayes),
    BernoulliNB(BernoulliNaiveBayes),
    MultinomialNB(MultinomialNaiveBayes),
    DecisionTree(DecisionTree),
    KNeighbors(KNNClassifier),
    LogisticRegression(LogisticRegression),
}

impl Classifier for Model {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Self::GaussianNB(m) => m.fit(x, y),
            Self::BernoulliNB(m) => m.fit(x, y),
            Self::MultinomialNB(m) => m.fit(x, y),
            Self::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            Self::KNeighbors(m) => m.fit(x, y),
            Self::LogisticRegression(m) => m.fit(x, y).map(|_| ()),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Self::GaussianNB(m) => m.predict_proba(x),
            Self::BernoulliNB(m) => m.predict_proba(x),
            Self::MultinomialNB(m) => m.predict_proba(x),
            Self::DecisionTree(m) => m.predict_proba(x),
            Self::KNeighbors(m) => m.predict_proba(x),
            Self::LogisticRegression(m) => m.predict_proba(x),
        }
    }
}

/// Blueprint of a linear pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub preprocessors: Vec<PreprocessorStep>,
    pub classifier: ClassifierStep,
}

impl PipelineSpec {
    pub fn new(preprocessors: Vec<PreprocessorStep>, classifier: ClassifierStep) -> Self {
        Self {
            preprocessors,
            classifier,
        }
    }

    /// Number of operators, classifier included
    pub fn n_steps(&self) -> usize {
        self.preprocessors.len() + 1
    }

    /// Numbered step lines, `1. StandardScaler()` first
    pub fn step_lines(&self) -> Vec<String> {
        self.preprocessors
            .iter()
            .map(|p| p.to_string())
            .chain(std::iter::once(self.classifier.to_string()))
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect()
    }
}

impl fmt::Display for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipeline(")?;
        for p in &self.preprocessors {
            write!(f, "{}, ", p)?;
        }
        write!(f, "{})", self.classifier)
    }
}

/// Executable pipeline built from a [`PipelineSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    spec: PipelineSpec,
    preprocessors: Vec<Preprocessor>,
    model: Model,
    is_fitted: bool,
}

impl Pipeline {
    pub fn new(spec: PipelineSpec, random_state: Option<u64>) -> Self {
        let preprocessors = spec.preprocessors.iter().map(|p| p.build()).collect();
        let model = spec.classifier.build(random_state);
        Self {
            spec,
            preprocessors,
            model,
            is_fitted: false,
        }
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn transform_features(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut current = x.to_owned();
        for step in &self.preprocessors {
            current = step.transform(&current)?;
        }
        Ok(current)
    }
}

impl Classifier for Pipeline {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut current = x.to_owned();
        for step in self.preprocessors.iter_mut() {
            current = step.fit_transform(&current, y)?;
        }
        if current.iter().any(|v| !v.is_finite()) {
            return Err(TransfusionError::ComputationError(
                "Preprocessing produced non-finite values".to_string(),
            ));
        }
        self.model.fit(&current, y)?;
        self.is_fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TransfusionError::ModelNotFitted);
        }
        let transformed = self.transform_features(x)?;
        self.model.predict_proba(&transformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::roc_auc_score;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 200.0],
            [2.0, 180.0],
            [3.0, 260.0],
            [4.0, 220.0],
            [7.0, 210.0],
            [8.0, 190.0],
            [9.0, 250.0],
            [10.0, 230.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_display() {
        let spec = PipelineSpec::new(
            vec![PreprocessorStep::StandardScaler],
            ClassifierStep::LogisticRegression { c: 5.0 },
        );
        assert_eq!(
            spec.to_string(),
            "Pipeline(StandardScaler(), LogisticRegression(C=5.0, dual=False, penalty='l2'))"
        );
        assert_eq!(
            spec.step_lines(),
            vec![
                "1. StandardScaler()".to_string(),
                "2. LogisticRegression(C=5.0, dual=False, penalty='l2')".to_string(),
            ]
        );

        let knn = ClassifierStep::KNeighbors {
            n_neighbors: 32,
            weights: WeightScheme::Distance,
            p: 1,
        };
        assert_eq!(
            knn.to_string(),
            "KNeighborsClassifier(n_neighbors=32, p=1, weights='distance')"
        );
        assert_eq!(
            PreprocessorStep::Binarizer { threshold: 0.15 }.to_string(),
            "Binarizer(threshold=0.15)"
        );
    }

    #[test]
    fn test_pipeline_fit_predict() {
        let (x, y) = data();
        let spec = PipelineSpec::new(
            vec![PreprocessorStep::MinMaxScaler, PreprocessorStep::PolynomialFeatures],
            ClassifierStep::LogisticRegression { c: 10.0 },
        );
        let mut pipeline = Pipeline::new(spec, Some(42));
        pipeline.fit(&x, &y).unwrap();

        let proba = pipeline.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 8);
        assert!(roc_auc_score(&y, &proba).unwrap() > 0.9);
    }

    #[test]
    fn test_every_classifier_builds_and_fits() {
        let (x, y) = data();
        let steps = vec![
            ClassifierStep::GaussianNB,
            ClassifierStep::BernoulliNB { alpha: 1.0, fit_prior: true },
            ClassifierStep::MultinomialNB { alpha: 0.1, fit_prior: false },
            ClassifierStep::DecisionTree {
                criterion: Criterion::Entropy,
                max_depth: 3,
                min_samples_split: 2,
                min_samples_leaf: 1,
            },
            ClassifierStep::KNeighbors { n_neighbors: 3, weights: WeightScheme::Uniform, p: 2 },
            ClassifierStep::LogisticRegression { c: 1.0 },
        ];
        for step in steps {
            let mut pipeline = Pipeline::new(PipelineSpec::new(vec![], step.clone()), None);
            pipeline.fit(&x, &y).unwrap_or_else(|e| panic!("{} failed: {}", step, e));
            let proba = pipeline.predict_proba(&x).unwrap();
            assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)), "{}", step);
        }
    }

    #[test]
    fn test_failing_step_surfaces_error() {
        // MultinomialNB rejects the negative values produced by StandardScaler
        let (x, y) = data();
        let spec = PipelineSpec::new(
            vec![PreprocessorStep::StandardScaler],
            ClassifierStep::MultinomialNB { alpha: 1.0, fit_prior: true },
        );
        let mut pipeline = Pipeline::new(spec, None);
        assert!(pipeline.fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let (x, _) = data();
        let pipeline = Pipeline::new(
            PipelineSpec::new(vec![], ClassifierStep::GaussianNB),
            None,
        );
        assert!(matches!(
            pipeline.predict_proba(&x),
            Err(TransfusionError::ModelNotFitted)
        ));
    }
}
