//! Population of candidate rendering configurations.
//!
//! Evaluation is the dominant cost of the search, so
//! [`Population::evaluate_all`] fans un-scored members out over a worker
//! pool. It is a synchronization barrier: it does not return until every
//! member carries either a real fitness or the failure sentinel.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::eval::{
    BenchmarkTask, EvalFailure, EvaluationCache, EvaluationResult, Evaluator, Renderer,
    workload_id,
};
use crate::schema::{ConfigSpace, RenderingConfig, evaluation_fingerprint};

use super::fitness::{FAILURE_FITNESS, FitnessScorer};
use super::rng::SearchRng;

/// A candidate configuration with its evaluation state.
///
/// Owned exclusively by the population that created it. `fitness` is
/// `None` until evaluated and is never silently recomputed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    /// Unique identifier within the run.
    pub id: u64,
    /// The rendering configuration.
    pub config: RenderingConfig,
    /// Scalar fitness; `None` until evaluated, negative infinity for a
    /// failed evaluation.
    pub fitness: Option<f64>,
    /// Generation this individual was created in.
    pub generation: usize,
    /// Parent IDs, empty for sampled individuals.
    pub parents: Vec<u64>,
    /// Raw evaluation output, absent for failed evaluations.
    pub result: Option<EvaluationResult>,
}

impl Individual {
    /// Tie-break cost: lower wins. Failed individuals sort last.
    fn tie_cost(&self) -> f64 {
        self.result
            .as_ref()
            .map(EvaluationResult::normalized_cost)
            .unwrap_or(f64::INFINITY)
    }
}

/// Report from one evaluation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationReport {
    /// Real evaluator calls made (cache hits excluded).
    pub evaluations: u64,
    /// Individuals whose evaluation failed in this pass.
    pub failures: usize,
}

/// An ordered sequence of individuals for one generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Population {
    members: Vec<Individual>,
}

impl Population {
    /// Draw `size` random individuals for the given generation.
    pub fn initialize(
        size: usize,
        space: &ConfigSpace,
        rng: &mut SearchRng,
        generation: usize,
        next_id: &mut u64,
    ) -> Self {
        let members = (0..size)
            .map(|_| {
                let id = *next_id;
                *next_id += 1;
                Individual {
                    id,
                    config: space.sample(rng),
                    fitness: None,
                    generation,
                    parents: Vec::new(),
                    result: None,
                }
            })
            .collect();
        Self { members }
    }

    /// Build from pre-existing members (breeding, resume).
    pub fn from_members(members: Vec<Individual>) -> Self {
        Self { members }
    }

    /// Members in order.
    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    /// Population size.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the population has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members still lacking a fitness value.
    pub fn unevaluated_count(&self) -> usize {
        self.members.iter().filter(|m| m.fitness.is_none()).count()
    }

    /// Members carrying the failure sentinel.
    pub fn failure_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.fitness == Some(FAILURE_FITNESS))
            .count()
    }

    /// Render and score every member lacking a fitness value.
    ///
    /// Already-scored members (elites carried over) are not touched, so
    /// each individual is evaluated at most once. Workers run in
    /// parallel on `pool`, each writing only its own member's fitness
    /// slot; by the time this returns, every member has `Some` fitness.
    /// A failed evaluation becomes the negative-infinity sentinel plus a
    /// diagnostic, never a run-level fault.
    pub fn evaluate_all(
        &mut self,
        renderer: &dyn Renderer,
        evaluator: &dyn Evaluator,
        scorer: &FitnessScorer,
        tasks: &[BenchmarkTask],
        cache: &EvaluationCache,
        pool: &rayon::ThreadPool,
    ) -> EvaluationReport {
        let suite = workload_id(tasks);
        let evaluations = AtomicU64::new(0);
        let failures = AtomicUsize::new(0);

        pool.install(|| {
            self.members
                .par_iter_mut()
                .filter(|m| m.fitness.is_none())
                .for_each(|member| {
                    let fingerprint = evaluation_fingerprint(&member.config, &suite);

                    if let Some(cached) = cache.get(fingerprint) {
                        member.fitness = Some(scorer.score(&cached));
                        member.result = Some(cached);
                        return;
                    }

                    evaluations.fetch_add(1, Ordering::Relaxed);
                    match evaluate_config(renderer, evaluator, &member.config, tasks) {
                        Ok(result) => {
                            // Idempotent write: a racing duplicate keeps
                            // the first stored result.
                            let stored = cache.insert_if_absent(fingerprint, result);
                            member.fitness = Some(scorer.score(&stored));
                            member.result = Some(stored);
                        }
                        Err(failure) => {
                            warn!(
                                "evaluation failed for individual {} (gen {}): {}",
                                member.id, member.generation, failure
                            );
                            failures.fetch_add(1, Ordering::Relaxed);
                            member.fitness = Some(FAILURE_FITNESS);
                            member.result = None;
                        }
                    }
                });
        });

        debug_assert_eq!(self.unevaluated_count(), 0);
        EvaluationReport {
            evaluations: evaluations.load(Ordering::Relaxed),
            failures: failures.load(Ordering::Relaxed),
        }
    }

    /// Highest-fitness member. Ties break by lowest
    /// compression-normalized cost, then by earliest generation of
    /// origin (older configs have survived more selection).
    pub fn best(&self) -> Option<&Individual> {
        self.members
            .iter()
            .filter(|m| m.fitness.is_some())
            .min_by(|a, b| compare_individuals(a, b))
    }

    /// Fitness statistics over the generation: best over all scored
    /// members, mean and variance over the non-failed ones.
    pub fn fitness_stats(&self) -> (f64, f64, f64) {
        let best = self
            .members
            .iter()
            .filter_map(|m| m.fitness)
            .fold(f64::NEG_INFINITY, f64::max);

        let finite: Vec<f64> = self
            .members
            .iter()
            .filter_map(|m| m.fitness)
            .filter(|f| f.is_finite())
            .collect();

        if finite.is_empty() {
            return (best, 0.0, 0.0);
        }

        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let variance = finite.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n;
        (best, mean, variance)
    }
}

/// Total order for "better individual first": higher fitness, then lower
/// normalized cost, then earlier generation.
pub fn compare_individuals(a: &Individual, b: &Individual) -> std::cmp::Ordering {
    let fa = a.fitness.unwrap_or(FAILURE_FITNESS);
    let fb = b.fitness.unwrap_or(FAILURE_FITNESS);
    fb.total_cmp(&fa)
        .then_with(|| a.tie_cost().total_cmp(&b.tie_cost()))
        .then_with(|| a.generation.cmp(&b.generation))
}

/// Render a config for every task and merge the per-task results.
fn evaluate_config(
    renderer: &dyn Renderer,
    evaluator: &dyn Evaluator,
    config: &RenderingConfig,
    tasks: &[BenchmarkTask],
) -> Result<EvaluationResult, EvalFailure> {
    let mut per_task = Vec::with_capacity(tasks.len());
    for task in tasks {
        let pages = renderer.render(&task.document, config)?;
        per_task.push(evaluator.evaluate(&pages, task)?);
    }
    EvaluationResult::merge(&per_task)
        .ok_or_else(|| EvalFailure::MalformedInput("empty task suite".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Document, PageImage};
    use crate::schema::FitnessWeights;

    struct FixedRenderer;

    impl Renderer for FixedRenderer {
        fn render(
            &self,
            _document: &Document,
            _config: &RenderingConfig,
        ) -> Result<Vec<PageImage>, EvalFailure> {
            Ok(vec![PageImage {
                width: 100,
                height: 100,
                data: vec![0; 16],
            }])
        }
    }

    struct FixedEvaluator {
        calls: AtomicU64,
    }

    impl Evaluator for FixedEvaluator {
        fn evaluate(
            &self,
            _pages: &[PageImage],
            _task: &BenchmarkTask,
        ) -> Result<EvaluationResult, EvalFailure> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(EvaluationResult {
                accuracy: 0.9,
                compression_ratio: 0.8,
                latency_ms: 5.0,
                pages: 1,
            })
        }
    }

    struct FailingEvaluator;

    impl Evaluator for FailingEvaluator {
        fn evaluate(
            &self,
            _pages: &[PageImage],
            _task: &BenchmarkTask,
        ) -> Result<EvaluationResult, EvalFailure> {
            Err(EvalFailure::Timeout { elapsed_ms: 100 })
        }
    }

    fn tasks() -> Vec<BenchmarkTask> {
        vec![BenchmarkTask {
            id: "t0".to_string(),
            document: Document {
                id: "d0".to_string(),
                text: "text".to_string(),
            },
            question: "q".to_string(),
        }]
    }

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap()
    }

    fn scorer() -> FitnessScorer {
        FitnessScorer::new(FitnessWeights::default())
    }

    #[test]
    fn test_evaluate_all_is_a_barrier() {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(1);
        let mut next_id = 0;
        let mut population = Population::initialize(8, &space, &mut rng, 0, &mut next_id);
        assert_eq!(population.unevaluated_count(), 8);

        let cache = EvaluationCache::new();
        let evaluator = FixedEvaluator {
            calls: AtomicU64::new(0),
        };
        population.evaluate_all(
            &FixedRenderer,
            &evaluator,
            &scorer(),
            &tasks(),
            &cache,
            &pool(),
        );
        assert_eq!(population.unevaluated_count(), 0);
    }

    #[test]
    fn test_elites_are_not_reevaluated() {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(2);
        let mut next_id = 0;
        let mut population = Population::initialize(4, &space, &mut rng, 0, &mut next_id);

        let cache = EvaluationCache::new();
        let evaluator = FixedEvaluator {
            calls: AtomicU64::new(0),
        };
        let report = population.evaluate_all(
            &FixedRenderer,
            &evaluator,
            &scorer(),
            &tasks(),
            &cache,
            &pool(),
        );
        assert_eq!(report.evaluations, 4);

        // A second pass over the same population touches nothing.
        let report = population.evaluate_all(
            &FixedRenderer,
            &evaluator,
            &scorer(),
            &tasks(),
            &cache,
            &pool(),
        );
        assert_eq!(report.evaluations, 0);
        assert_eq!(evaluator.calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_cache_prevents_duplicate_evaluator_calls() {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(3);
        let config = space.sample(&mut rng);

        // Two members sharing one config fingerprint.
        let members = (0..2)
            .map(|id| Individual {
                id,
                config: config.clone(),
                fitness: None,
                generation: 0,
                parents: Vec::new(),
                result: None,
            })
            .collect();
        let mut population = Population::from_members(members);

        let cache = EvaluationCache::new();
        let evaluator = FixedEvaluator {
            calls: AtomicU64::new(0),
        };
        // Single worker forces sequential execution so the second member
        // sees the first one's cache entry.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        population.evaluate_all(&FixedRenderer, &evaluator, &scorer(), &tasks(), &cache, &pool);

        assert_eq!(evaluator.calls.load(Ordering::Relaxed), 1);
        let results: Vec<_> = population
            .members()
            .iter()
            .map(|m| m.result.clone().unwrap())
            .collect();
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_failures_become_sentinels() {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(4);
        let mut next_id = 0;
        let mut population = Population::initialize(5, &space, &mut rng, 0, &mut next_id);

        let cache = EvaluationCache::new();
        let report = population.evaluate_all(
            &FixedRenderer,
            &FailingEvaluator,
            &scorer(),
            &tasks(),
            &cache,
            &pool(),
        );
        assert_eq!(report.failures, 5);
        assert_eq!(population.failure_count(), 5);
        assert_eq!(population.unevaluated_count(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_best_tie_breaks_by_cost_then_generation() {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(5);
        let result = |latency: f64| EvaluationResult {
            accuracy: 0.9,
            compression_ratio: 0.8,
            latency_ms: latency,
            pages: 1,
        };
        let mut member = |id, generation, latency| Individual {
            id,
            config: space.sample(&mut rng),
            fitness: Some(0.5),
            generation,
            parents: Vec::new(),
            result: Some(result(latency)),
        };

        let population = Population::from_members(vec![
            member(0, 2, 100.0),
            member(1, 1, 50.0),
            member(2, 0, 50.0),
        ]);
        // Same fitness everywhere: lowest cost wins, then earliest
        // generation.
        assert_eq!(population.best().unwrap().id, 2);
    }

    #[test]
    fn test_fitness_stats_ignore_failures_for_moments() {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(6);
        let mut member = |id, fitness| Individual {
            id,
            config: space.sample(&mut rng),
            fitness: Some(fitness),
            generation: 0,
            parents: Vec::new(),
            result: None,
        };

        let population = Population::from_members(vec![
            member(0, 0.4),
            member(1, 0.6),
            member(2, FAILURE_FITNESS),
        ]);
        let (best, mean, variance) = population.fitness_stats();
        assert_eq!(best, 0.6);
        assert!((mean - 0.5).abs() < 1e-12);
        assert!((variance - 0.01).abs() < 1e-12);
    }
}
