//! Evolutionary pipeline search
//!
//! Elitist (μ+λ) genetic programming over linear pipelines. Fitness is the
//! mean cross-validation score on the training data (stratified folds by
//! default).

use crate::error::{Result, TransfusionError};
use crate::search::config::SearchConfig;
use crate::search::pipeline::{Pipeline, PipelineSpec};
use crate::search::space::SearchSpace;
use crate::search::{GenerationStats, PipelineSearch, ScoredPipeline};
use crate::training::{cross_val_score, Classifier, CrossValidator};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Individual {
    spec: PipelineSpec,
    score: f64,
}

/// Genetic search over the configured [`SearchSpace`]
#[derive(Debug, Clone)]
pub struct EvolutionarySearch {
    config: SearchConfig,
    space: SearchSpace,
    /// CV score per pipeline text
    cache: HashMap<String, f64>,
    history: Vec<GenerationStats>,
}

impl EvolutionarySearch {
    pub fn new(config: SearchConfig) -> Self {
        let space = SearchSpace::new(config.search_space, config.max_preprocessors);
        Self {
            config,
            space,
            cache: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Per-generation summaries of the last run
    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    /// Distinct pipelines scored by the last run
    pub fn n_evaluated(&self) -> usize {
        self.cache.len()
    }

    fn evaluate(
        &mut self,
        spec: PipelineSpec,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cv: &CrossValidator,
    ) -> Individual {
        let key = spec.to_string();
        if let Some(&score) = self.cache.get(&key) {
            return Individual { spec, score };
        }

        let seed = self.config.random_state;
        let score = match cross_val_score(
            || Pipeline::new(spec.clone(), seed),
            x,
            y,
            cv,
            self.config.scoring,
        ) {
            Ok(results) => results.mean_score,
            Err(e) => {
                debug!(pipeline = %key, error = %e, "Pipeline failed, scoring -inf");
                f64::NEG_INFINITY
            }
        };

        if self.config.verbosity >= 3 {
            info!(pipeline = %key, score, "Evaluated pipeline");
        }
        self.cache.insert(key, score);
        Individual { spec, score }
    }

    /// Best first; equal scores prefer the shorter pipeline
    fn rank(population: &mut [Individual]) {
        population.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.spec.n_steps().cmp(&b.spec.n_steps()))
        });
    }

    /// Index of the tournament winner in a ranked population
    fn tournament(&self, population_len: usize, rng: &mut impl Rng) -> usize {
        (0..self.config.tournament_size)
            .map(|_| rng.gen_range(0..population_len))
            .min()
            .unwrap_or(0)
    }

    fn breed(&self, population: &[Individual], rng: &mut impl Rng) -> PipelineSpec {
        let r: f64 = rng.gen();
        let parent = &population[self.tournament(population.len(), rng)].spec;

        if r < self.config.crossover_rate && population.len() > 1 {
            let other = &population[self.tournament(population.len(), rng)].spec;
            self.space.crossover(parent, other, rng)
        } else if r < self.config.crossover_rate + self.config.mutation_rate {
            self.space.mutate(parent, rng)
        } else {
            parent.clone()
        }
    }

    fn record_generation(&mut self, generation: usize, population: &[Individual]) {
        let finite: Vec<f64> = population
            .iter()
            .map(|i| i.score)
            .filter(|s| s.is_finite())
            .collect();
        let best_score = population.first().map(|i| i.score).unwrap_or(f64::NEG_INFINITY);
        let mean_score = if finite.is_empty() {
            f64::NEG_INFINITY
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };

        if generation > 0 && self.config.verbosity >= 2 {
            info!(
                "Generation {} - Current best internal CV score: {:.4}",
                generation, best_score
            );
        }

        self.history.push(GenerationStats {
            generation,
            best_score,
            mean_score,
            n_evaluated: self.cache.len(),
        });
    }
}

impl PipelineSearch for EvolutionarySearch {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ScoredPipeline> {
        self.config.validate()?;
        if x.nrows() != y.len() {
            return Err(TransfusionError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let start = Instant::now();
        self.history.clear();
        self.cache.clear();

        let mut rng = match self.config.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut cv = CrossValidator::new(self.config.cv_strategy());
        if let Some(seed) = self.config.random_state {
            cv = cv.with_random_state(seed);
        }

        if self.config.verbosity >= 1 {
            info!(
                generations = self.config.generations,
                population = self.config.population_size,
                space = self.space.kind().as_str(),
                scoring = self.config.scoring.name(),
                "Starting pipeline search"
            );
        }

        let mut population = Vec::with_capacity(self.config.population_size);
        for _ in 0..self.config.population_size {
            let spec = self.space.sample_random(&mut rng);
            population.push(self.evaluate(spec, x, y, &cv));
        }
        Self::rank(&mut population);
        self.record_generation(0, &population);

        for generation in 1..=self.config.generations {
            let mut offspring = Vec::with_capacity(self.config.offspring());
            for _ in 0..self.config.offspring() {
                let child = self.breed(&population, &mut rng);
                offspring.push(self.evaluate(child, x, y, &cv));
            }

            population.extend(offspring);
            Self::rank(&mut population);

            let mut seen = HashSet::new();
            population.retain(|ind| seen.insert(ind.spec.to_string()));
            population.truncate(self.config.population_size);

            self.record_generation(generation, &population);
        }

        let best = population
            .into_iter()
            .next()
            .filter(|ind| ind.score.is_finite())
            .ok_or_else(|| {
                TransfusionError::SearchError("No pipeline could be fitted".to_string())
            })?;

        let mut pipeline = Pipeline::new(best.spec, self.config.random_state);
        pipeline.fit(x, y)?;

        if self.config.verbosity >= 1 {
            info!(
                pipeline = %pipeline.spec(),
                cv_score = best.score,
                evaluated = self.cache.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Pipeline search finished"
            );
        }

        Ok(ScoredPipeline {
            pipeline,
            cv_score: best.score,
            n_evaluated: self.cache.len(),
            history: self.history.clone(),
        })
    }

    fn name(&self) -> &str {
        "evolutionary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::pipeline::{ClassifierStep, PreprocessorStep};
    use crate::search::space::SearchSpaceKind;

    fn data(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut x = Array2::zeros((n, 3));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let label = if i % 4 == 0 { 1.0 } else { 0.0 };
            y[i] = label;
            x[[i, 0]] = rng.gen_range(1.0..10.0) + 3.0 * label;
            x[[i, 1]] = rng.gen_range(1.0..50.0);
            x[[i, 2]] = rng.gen_range(0.0..1.0);
        }
        (x, y)
    }

    fn small_config() -> SearchConfig {
        SearchConfig::default()
            .with_generations(2)
            .with_population_size(6)
            .with_cv_folds(3)
            .with_verbosity(0)
    }

    #[test]
    fn test_search_finds_informative_pipeline() {
        let (x, y) = data(120, 1);
        let mut search = EvolutionarySearch::new(small_config());
        let result = search.fit(&x, &y).unwrap();

        assert!(result.cv_score > 0.6, "cv score {}", result.cv_score);
        assert!(result.pipeline.is_fitted());
        assert_eq!(result.history.len(), 3);
        assert!(result.n_evaluated <= 6 + 2 * 6);

        let proba = result.pipeline.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 120);
    }

    #[test]
    fn test_best_score_never_decreases() {
        let (x, y) = data(100, 2);
        let mut search = EvolutionarySearch::new(small_config().with_generations(3));
        let result = search.fit(&x, &y).unwrap();

        for pair in result.history.windows(2) {
            assert!(pair[1].best_score >= pair[0].best_score);
        }
    }

    #[test]
    fn test_seeded_search_is_reproducible() {
        let (x, y) = data(100, 3);
        let a = EvolutionarySearch::new(small_config()).fit(&x, &y).unwrap();
        let b = EvolutionarySearch::new(small_config()).fit(&x, &y).unwrap();

        assert_eq!(a.pipeline.spec(), b.pipeline.spec());
        assert_eq!(a.cv_score, b.cv_score);
    }

    #[test]
    fn test_refit_on_new_data_matches_fresh_search() {
        let (x1, y) = data(100, 3);
        let (_, y2) = data(100, 9);
        // Same labels, features drawn without any signal
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let x2 = Array2::from_shape_fn((100, 3), |_| rng.gen_range(0.0..1.0));
        assert_eq!(y, y2);

        let mut reused = EvolutionarySearch::new(small_config());
        reused.fit(&x1, &y).unwrap();
        let second = reused.fit(&x2, &y).unwrap();
        let fresh = EvolutionarySearch::new(small_config()).fit(&x2, &y).unwrap();

        assert_eq!(second.cv_score, fresh.cv_score);
        assert_eq!(second.n_evaluated, fresh.n_evaluated);
        assert_eq!(second.pipeline.spec(), fresh.pipeline.spec());
        assert_eq!(reused.n_evaluated(), fresh.n_evaluated);
    }

    #[test]
    fn test_plain_kfold_search() {
        let (x, y) = data(120, 6);
        let config = small_config().with_stratified_cv(false);
        let result = EvolutionarySearch::new(config).fit(&x, &y).unwrap();
        assert!(result.cv_score > 0.6, "cv score {}", result.cv_score);
    }

    #[test]
    fn test_classifier_space() {
        let (x, y) = data(80, 4);
        let config = small_config().with_search_space(SearchSpaceKind::Classifiers);
        let result = EvolutionarySearch::new(config).fit(&x, &y).unwrap();
        assert!(result.pipeline.spec().preprocessors.is_empty());
    }

    #[test]
    fn test_rank_prefers_shorter_pipeline_on_ties() {
        let short = PipelineSpec::new(vec![], ClassifierStep::GaussianNB);
        let long = PipelineSpec::new(
            vec![PreprocessorStep::StandardScaler],
            ClassifierStep::GaussianNB,
        );
        let mut population = vec![
            Individual { spec: long, score: 0.8 },
            Individual { spec: short.clone(), score: 0.8 },
            Individual { spec: short.clone(), score: f64::NEG_INFINITY },
        ];
        EvolutionarySearch::rank(&mut population);
        assert_eq!(population[0].spec, short);
        assert_eq!(population[2].score, f64::NEG_INFINITY);
    }

    #[test]
    fn test_mismatched_shapes() {
        let (x, _) = data(20, 5);
        let y = Array1::zeros(10);
        assert!(EvolutionarySearch::new(small_config()).fit(&x, &y).is_err());
    }
}
