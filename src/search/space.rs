//! Pipeline search space
//!
//! Defines the operators a pipeline may contain and how random pipelines
//! are sampled, mutated and recombined.

use crate::error::TransfusionError;
use crate::preprocessing::Norm;
use crate::search::pipeline::{ClassifierStep, PipelineSpec, PreprocessorStep};
use crate::training::{Criterion, WeightScheme};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const ALPHAS: [f64; 6] = [1e-3, 1e-2, 1e-1, 1.0, 10.0, 100.0];
const LOGISTIC_CS: [f64; 11] = [1e-4, 1e-3, 1e-2, 1e-1, 0.5, 1.0, 5.0, 10.0, 15.0, 20.0, 25.0];
const VARIANCE_THRESHOLDS: [f64; 8] = [0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.2];

/// Named operator sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSpaceKind {
    /// Fast preprocessors plus simple classifiers
    Light,
    /// Classifiers only, no preprocessing
    Classifiers,
}

impl SearchSpaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Classifiers => "classifiers",
        }
    }
}

impl Default for SearchSpaceKind {
    fn default() -> Self {
        Self::Light
    }
}

impl FromStr for SearchSpaceKind {
    type Err = TransfusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "classifiers" => Ok(Self::Classifiers),
            other => Err(TransfusionError::ConfigError(format!(
                "Unknown search space '{}', expected 'light' or 'classifiers'",
                other
            ))),
        }
    }
}

/// Preprocessing operator families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreprocessorKind {
    Binarizer,
    MaxAbsScaler,
    MinMaxScaler,
    Normalizer,
    RobustScaler,
    StandardScaler,
    PolynomialFeatures,
    VarianceThreshold,
    SelectPercentile,
}

impl PreprocessorKind {
    pub fn light_ops() -> Vec<Self> {
        vec![
            Self::Binarizer,
            Self::MaxAbsScaler,
            Self::MinMaxScaler,
            Self::Normalizer,
            Self::RobustScaler,
            Self::StandardScaler,
            Self::PolynomialFeatures,
            Self::VarianceThreshold,
            Self::SelectPercentile,
        ]
    }

    /// Draw hyperparameters for this operator
    pub fn sample(&self, rng: &mut impl rand::Rng) -> PreprocessorStep {
        match self {
            Self::Binarizer => PreprocessorStep::Binarizer {
                // 0.0, 0.05, ..., 1.0
                threshold: rng.gen_range(0..=20) as f64 / 20.0,
            },
            Self::MaxAbsScaler => PreprocessorStep::MaxAbsScaler,
            Self::MinMaxScaler => PreprocessorStep::MinMaxScaler,
            Self::Normalizer => PreprocessorStep::Normalizer {
                norm: [Norm::L1, Norm::L2, Norm::Max][rng.gen_range(0..3)],
            },
            Self::RobustScaler => PreprocessorStep::RobustScaler,
            Self::StandardScaler => PreprocessorStep::StandardScaler,
            Self::PolynomialFeatures => PreprocessorStep::PolynomialFeatures,
            Self::VarianceThreshold => PreprocessorStep::VarianceThreshold {
                threshold: VARIANCE_THRESHOLDS[rng.gen_range(0..VARIANCE_THRESHOLDS.len())],
            },
            Self::SelectPercentile => PreprocessorStep::SelectPercentile {
                percentile: rng.gen_range(1..100),
            },
        }
    }
}

/// Classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassifierKind {
    GaussianNB,
    BernoulliNB,
    MultinomialNB,
    DecisionTree,
    KNeighbors,
    LogisticRegression,
}

impl ClassifierKind {
    pub fn all() -> Vec<Self> {
        vec![
            Self::GaussianNB,
            Self::BernoulliNB,
            Self::MultinomialNB,
            Self::DecisionTree,
            Self::KNeighbors,
            Self::LogisticRegression,
        ]
    }

    pub fn of(step: &ClassifierStep) -> Self {
        match step {
            ClassifierStep::GaussianNB => Self::GaussianNB,
            ClassifierStep::BernoulliNB { .. } => Self::BernoulliNB,
            ClassifierStep::MultinomialNB { .. } => Self::MultinomialNB,
            ClassifierStep::DecisionTree { .. } => Self::DecisionTree,
            ClassifierStep::KNeighbors { .. } => Self::KNeighbors,
            ClassifierStep::LogisticRegression { .. } => Self::LogisticRegression,
        }
    }

    /// Draw hyperparameters for this classifier
    pub fn sample(&self, rng: &mut impl rand::Rng) -> ClassifierStep {
        match self {
            Self::GaussianNB => ClassifierStep::GaussianNB,
            Self::BernoulliNB => ClassifierStep::BernoulliNB {
                alpha: ALPHAS[rng.gen_range(0..ALPHAS.len())],
                fit_prior: rng.gen_bool(0.5),
            },
            Self::MultinomialNB => ClassifierStep::MultinomialNB {
                alpha: ALPHAS[rng.gen_range(0..ALPHAS.len())],
                fit_prior: rng.gen_bool(0.5),
            },
            Self::DecisionTree => ClassifierStep::DecisionTree {
                criterion: if rng.gen_bool(0.5) {
                    Criterion::Gini
                } else {
                    Criterion::Entropy
                },
                max_depth: rng.gen_range(1..=10),
                min_samples_split: rng.gen_range(2..=20),
                min_samples_leaf: rng.gen_range(1..=20),
            },
            Self::KNeighbors => ClassifierStep::KNeighbors {
                n_neighbors: rng.gen_range(1..=100),
                weights: if rng.gen_bool(0.5) {
                    WeightScheme::Uniform
                } else {
                    WeightScheme::Distance
                },
                p: rng.gen_range(1..=2),
            },
            Self::LogisticRegression => ClassifierStep::LogisticRegression {
                c: LOGISTIC_CS[rng.gen_range(0..LOGISTIC_CS.len())],
            },
        }
    }
}

/// Operators available to the search and the shape of sampled pipelines
#[derive(Debug, Clone)]
pub struct SearchSpace {
    kind: SearchSpaceKind,
    preprocessors: Vec<PreprocessorKind>,
    classifiers: Vec<ClassifierKind>,
    /// Upper bound on preprocessing steps per pipeline
    max_preprocessors: usize,
}

impl SearchSpace {
    pub fn new(kind: SearchSpaceKind, max_preprocessors: usize) -> Self {
        let (preprocessors, max_preprocessors) = match kind {
            SearchSpaceKind::Light => (PreprocessorKind::light_ops(), max_preprocessors),
            SearchSpaceKind::Classifiers => (Vec::new(), 0),
        };
        Self {
            kind,
            preprocessors,
            classifiers: ClassifierKind::all(),
            max_preprocessors,
        }
    }

    pub fn light() -> Self {
        Self::new(SearchSpaceKind::Light, 3)
    }

    pub fn kind(&self) -> SearchSpaceKind {
        self.kind
    }

    pub fn max_preprocessors(&self) -> usize {
        self.max_preprocessors
    }

    fn can_grow(&self, spec: &PipelineSpec) -> bool {
        !self.preprocessors.is_empty() && spec.preprocessors.len() < self.max_preprocessors
    }

    fn random_preprocessor(&self, rng: &mut impl rand::Rng) -> Option<PreprocessorStep> {
        let kind = *self.preprocessors.choose(&mut *rng)?;
        Some(kind.sample(rng))
    }

    fn random_classifier(&self, rng: &mut impl rand::Rng) -> ClassifierStep {
        let kind = self.classifiers[rng.gen_range(0..self.classifiers.len())];
        kind.sample(rng)
    }

    /// Random pipeline with up to two preprocessing steps
    pub fn sample_random(&self, rng: &mut impl rand::Rng) -> PipelineSpec {
        let n_pre = if self.preprocessors.is_empty() {
            0
        } else {
            rng.gen_range(0..=self.max_preprocessors.min(2))
        };
        let preprocessors = (0..n_pre)
            .filter_map(|_| self.random_preprocessor(rng))
            .collect();
        PipelineSpec::new(preprocessors, self.random_classifier(rng))
    }

    /// Mutate a pipeline.
    ///
    /// One of: resample the classifier's hyperparameters, insert a
    /// preprocessing step, remove one, or replace a step with a new operator.
    /// Inapplicable mutations fall back to resampling the classifier.
    pub fn mutate(&self, spec: &PipelineSpec, rng: &mut impl rand::Rng) -> PipelineSpec {
        let mut child = spec.clone();

        let mutation_type = rng.gen_range(0..4);

        match mutation_type {
            1 if self.can_grow(&child) => {
                if let Some(step) = self.random_preprocessor(rng) {
                    let at = rng.gen_range(0..=child.preprocessors.len());
                    child.preprocessors.insert(at, step);
                }
            }
            2 if !child.preprocessors.is_empty() => {
                let at = rng.gen_range(0..child.preprocessors.len());
                child.preprocessors.remove(at);
            }
            3 => {
                // Replace one operator, the classifier counting as the last slot
                let slot = rng.gen_range(0..child.n_steps());
                if slot < child.preprocessors.len() {
                    if let Some(step) = self.random_preprocessor(rng) {
                        child.preprocessors[slot] = step;
                    }
                } else {
                    child.classifier = self.random_classifier(rng);
                }
            }
            _ => {
                child.classifier = ClassifierKind::of(&child.classifier).sample(rng);
            }
        }

        child
    }

    /// One-point crossover: the head of one parent's preprocessing chain
    /// joined to the other parent's tail and classifier
    pub fn crossover(
        &self,
        parent1: &PipelineSpec,
        parent2: &PipelineSpec,
        rng: &mut impl rand::Rng,
    ) -> PipelineSpec {
        let (head, tail) = if rng.gen_bool(0.5) {
            (parent1, parent2)
        } else {
            (parent2, parent1)
        };

        let cut_head = rng.gen_range(0..=head.preprocessors.len());
        let cut_tail = rng.gen_range(0..=tail.preprocessors.len());

        let mut preprocessors: Vec<PreprocessorStep> = head.preprocessors[..cut_head]
            .iter()
            .chain(tail.preprocessors[cut_tail..].iter())
            .cloned()
            .collect();
        preprocessors.truncate(self.max_preprocessors);

        PipelineSpec::new(preprocessors, tail.classifier.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_sample_respects_bounds() {
        let space = SearchSpace::light();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..200 {
            let spec = space.sample_random(&mut rng);
            assert!(spec.preprocessors.len() <= 2);
        }
    }

    #[test]
    fn test_classifier_space_has_no_preprocessors() {
        let space = SearchSpace::new(SearchSpaceKind::Classifiers, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut spec = space.sample_random(&mut rng);
        for _ in 0..100 {
            assert!(spec.preprocessors.is_empty());
            spec = space.mutate(&spec, &mut rng);
        }
    }

    #[test]
    fn test_mutation_stays_within_max_steps() {
        let space = SearchSpace::new(SearchSpaceKind::Light, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut spec = space.sample_random(&mut rng);
        for _ in 0..500 {
            spec = space.mutate(&spec, &mut rng);
            assert!(spec.preprocessors.len() <= 2);
        }
    }

    #[test]
    fn test_crossover_keeps_a_parent_classifier() {
        let space = SearchSpace::light();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let p1 = PipelineSpec::new(
            vec![PreprocessorStep::StandardScaler, PreprocessorStep::PolynomialFeatures],
            ClassifierStep::GaussianNB,
        );
        let p2 = PipelineSpec::new(
            vec![PreprocessorStep::MinMaxScaler],
            ClassifierStep::LogisticRegression { c: 0.5 },
        );

        for _ in 0..50 {
            let child = space.crossover(&p1, &p2, &mut rng);
            assert!(child.classifier == p1.classifier || child.classifier == p2.classifier);
            assert!(child.preprocessors.len() <= 3);
        }
    }

    #[test]
    fn test_sampling_is_seeded() {
        let space = SearchSpace::light();
        let a: Vec<String> = {
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            (0..10).map(|_| space.sample_random(&mut rng).to_string()).collect()
        };
        let b: Vec<String> = {
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            (0..10).map(|_| space.sample_random(&mut rng).to_string()).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("light".parse::<SearchSpaceKind>().unwrap(), SearchSpaceKind::Light);
        assert_eq!(
            "Classifiers".parse::<SearchSpaceKind>().unwrap(),
            SearchSpaceKind::Classifiers
        );
        assert!("heavy".parse::<SearchSpaceKind>().is_err());
    }

    #[test]
    fn test_binarizer_thresholds_are_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            if let PreprocessorStep::Binarizer { threshold } =
                PreprocessorKind::Binarizer.sample(&mut rng)
            {
                assert_eq!((threshold * 20.0).round() / 20.0, threshold);
            }
        }
    }
}
