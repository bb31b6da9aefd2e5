//! Evolutionary search configuration

use crate::error::{Result, TransfusionError};
use crate::search::space::SearchSpaceKind;
use crate::training::{CVStrategy, Scoring};
use serde::{Deserialize, Serialize};

/// Settings of the evolutionary pipeline search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Generations evolved after the initial population
    pub generations: usize,
    /// Pipelines kept between generations
    pub population_size: usize,
    /// Children per generation (defaults to `population_size`)
    pub offspring_size: Option<usize>,
    /// 0 silent, 1 start/end, 2 per generation, 3 per pipeline
    pub verbosity: u8,
    pub scoring: Scoring,
    pub random_state: Option<u64>,
    pub search_space: SearchSpaceKind,
    /// Folds for internal scoring
    pub cv_folds: usize,
    /// Keep class proportions in every fold
    pub stratified_cv: bool,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub max_preprocessors: usize,
    /// Contestants per tournament when picking parents
    pub tournament_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            generations: 5,
            population_size: 20,
            offspring_size: None,
            verbosity: 2,
            scoring: Scoring::RocAuc,
            random_state: Some(42),
            search_space: SearchSpaceKind::Light,
            cv_folds: 5,
            stratified_cv: true,
            mutation_rate: 0.9,
            crossover_rate: 0.1,
            max_preprocessors: 3,
            tournament_size: 2,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_search_space(mut self, kind: SearchSpaceKind) -> Self {
        self.search_space = kind;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_stratified_cv(mut self, stratified: bool) -> Self {
        self.stratified_cv = stratified;
        self
    }

    /// Fold strategy used to score candidate pipelines
    pub fn cv_strategy(&self) -> CVStrategy {
        if self.stratified_cv {
            CVStrategy::StratifiedKFold { n_splits: self.cv_folds, shuffle: true }
        } else {
            CVStrategy::KFold { n_splits: self.cv_folds, shuffle: true }
        }
    }

    pub fn offspring(&self) -> usize {
        self.offspring_size.unwrap_or(self.population_size)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| TransfusionError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.population_size == 0 {
            return Err(invalid("population_size", "0".into(), "must be at least 1"));
        }
        if self.offspring() == 0 {
            return Err(invalid("offspring_size", "0".into(), "must be at least 1"));
        }
        if self.cv_folds < 2 {
            return Err(invalid(
                "cv_folds",
                self.cv_folds.to_string(),
                "must be at least 2",
            ));
        }
        for (name, rate) in [
            ("mutation_rate", self.mutation_rate),
            ("crossover_rate", self.crossover_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid(name, rate.to_string(), "must lie in [0, 1]"));
            }
        }
        if self.mutation_rate + self.crossover_rate > 1.0 + 1e-9 {
            return Err(invalid(
                "mutation_rate + crossover_rate",
                (self.mutation_rate + self.crossover_rate).to_string(),
                "must not exceed 1",
            ));
        }
        if self.tournament_size == 0 {
            return Err(invalid("tournament_size", "0".into(), "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.generations, 5);
        assert_eq!(config.population_size, 20);
        assert_eq!(config.verbosity, 2);
        assert_eq!(config.scoring, Scoring::RocAuc);
        assert_eq!(config.random_state, Some(42));
        assert_eq!(config.search_space, SearchSpaceKind::Light);
        assert_eq!(config.offspring(), 20);
        assert!(matches!(
            config.cv_strategy(),
            CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true }
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_rates() {
        let mut config = SearchConfig::default();
        config.crossover_rate = 0.5;
        assert!(config.validate().is_err());

        let config = SearchConfig::default().with_cv_folds(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_plain_kfold_strategy() {
        let config = SearchConfig::default().with_cv_folds(3).with_stratified_cv(false);
        assert!(matches!(
            config.cv_strategy(),
            CVStrategy::KFold { n_splits: 3, shuffle: true }
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"generations": 2, "search_space": "classifiers"}"#).unwrap();
        assert_eq!(config.generations, 2);
        assert_eq!(config.population_size, 20);
        assert_eq!(config.search_space, SearchSpaceKind::Classifiers);
    }
}
