//! The genetic search engine: the generation loop over rendering
//! configurations.
//!
//! One engine drives one run through the phases `Initializing ->
//! Evaluating -> Selecting -> Breeding`, looping until it lands in
//! `Converged` or `BudgetExhausted`. All mutable run state lives in one
//! [`SearchState`] owned by the engine; nothing is process-global, so
//! independent runs never interfere.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::eval::{BenchmarkTask, EvaluationCache, EvaluationResult, Evaluator, Renderer};
use crate::schema::{
    GenerationSummary, SearchConfig, SearchConfigError, SearchHistory, SearchPhase, StopReason,
};

use super::checkpoint::{self, CheckpointError};
use super::fitness::FitnessScorer;
use super::population::{Individual, Population, compare_individuals};
use super::proposal::{GeneticProposal, ProposalStrategy};
use super::rng::SearchRng;

/// Run-level fatal errors. Per-individual evaluation failures are not
/// here; they are absorbed into fitness sentinels and diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search configuration: {0}")]
    Config(#[from] SearchConfigError),
    #[error("checkpoint failure: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("benchmark task suite is empty")]
    EmptyTaskSuite,
    #[error(
        "evaluator kept failing: generation {generation} discarded {attempts} times \
         over the failure threshold"
    )]
    EvaluatorFailing { generation: usize, attempts: usize },
    #[error("no configuration was ever successfully evaluated")]
    NoViableConfiguration,
    #[error("worker pool: {0}")]
    Pool(String),
}

/// Complete mutable state of one search run.
///
/// Created at search start, mutated only by the engine, checkpointed at
/// generation boundaries, and discarded or archived at termination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchState {
    /// Index of the generation currently being processed.
    pub generation: usize,
    /// The current population (possibly partially evaluated when
    /// checkpointed at a boundary).
    pub population: Population,
    /// Best successfully evaluated individual across all generations.
    /// Tracked separately from the population because discard-and-
    /// resample can regress a single generation's best.
    pub best: Option<Individual>,
    /// Seed that reproduces the RNG stream from this point on.
    pub rng_seed: u64,
    /// Per-generation summary statistics.
    pub history: SearchHistory,
    /// Cumulative real evaluator calls.
    pub total_evaluations: u64,
    /// Next individual ID to hand out.
    pub next_id: u64,
    /// Consecutive generations without epsilon-improvement.
    pub stagnation: usize,
    /// Evaluation cache contents, so resumed runs never repeat
    /// completed evaluations.
    pub cache_entries: Vec<(u64, EvaluationResult)>,
}

/// Final output of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// The best configuration found, with its fitness and raw
    /// evaluation result.
    pub best: Individual,
    /// Full per-generation statistic history.
    pub history: SearchHistory,
    /// Why the run stopped.
    pub stop_reason: StopReason,
    /// Generations completed.
    pub generations: usize,
    /// Cumulative real evaluator calls.
    pub total_evaluations: u64,
    /// Wall-clock runtime in seconds.
    pub elapsed_seconds: f64,
}

/// Genetic search engine over rendering configurations.
pub struct GeneticSearchEngine<'a> {
    config: SearchConfig,
    renderer: &'a dyn Renderer,
    evaluator: &'a dyn Evaluator,
    tasks: &'a [BenchmarkTask],
    scorer: FitnessScorer,
    proposal: Box<dyn ProposalStrategy>,
    rng: SearchRng,
    state: SearchState,
    cache: EvaluationCache,
    pool: rayon::ThreadPool,
    cancelled: Arc<AtomicBool>,
    phase: SearchPhase,
}

impl<'a> GeneticSearchEngine<'a> {
    /// Create an engine for a fresh run.
    pub fn new(
        config: SearchConfig,
        renderer: &'a dyn Renderer,
        evaluator: &'a dyn Evaluator,
        tasks: &'a [BenchmarkTask],
    ) -> Result<Self, SearchError> {
        let seed = config.random_seed.unwrap_or_else(rand::random);
        let state = SearchState {
            rng_seed: seed,
            ..SearchState::default()
        };
        Self::with_state(config, state, renderer, evaluator, tasks)
    }

    /// Create an engine continuing from checkpointed state.
    pub fn with_state(
        config: SearchConfig,
        state: SearchState,
        renderer: &'a dyn Renderer,
        evaluator: &'a dyn Evaluator,
        tasks: &'a [BenchmarkTask],
    ) -> Result<Self, SearchError> {
        config.validate()?;
        if tasks.is_empty() {
            return Err(SearchError::EmptyTaskSuite);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.evaluation.concurrency)
            .build()
            .map_err(|e| SearchError::Pool(e.to_string()))?;

        let rng = SearchRng::new(state.rng_seed);
        let cache = EvaluationCache::from_entries(state.cache_entries.clone());
        let scorer = FitnessScorer::new(config.weights.clone());

        Ok(Self {
            config,
            renderer,
            evaluator,
            tasks,
            scorer,
            proposal: Box::new(GeneticProposal),
            rng,
            state,
            cache,
            pool,
            cancelled: Arc::new(AtomicBool::new(false)),
            phase: SearchPhase::Initializing,
        })
    }

    /// Swap the offspring proposal strategy.
    pub fn with_proposal(mut self, proposal: Box<dyn ProposalStrategy>) -> Self {
        self.proposal = proposal;
        self
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Handle for requesting cancellation. Honored at generation
    /// boundaries only, never mid-evaluation.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Current run state (for inspection or manual checkpointing).
    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// Drive the state machine to a terminal state.
    pub fn run(&mut self) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();

        if self.state.population.is_empty() {
            self.phase = SearchPhase::Initializing;
            info!(
                "initializing population: size={} space={} params",
                self.config.population.size,
                self.config.space.len()
            );
            self.state.population = Population::initialize(
                self.config.population.size,
                &self.config.space,
                &mut self.rng,
                self.state.generation,
                &mut self.state.next_id,
            );
        } else {
            info!(
                "resuming at generation {} ({} of {} members already scored)",
                self.state.generation,
                self.state.population.len() - self.state.population.unevaluated_count(),
                self.state.population.len()
            );
        }

        let stop_reason = loop {
            // A checkpoint taken at termination holds a fully scored,
            // already recorded generation; don't score or record it twice.
            let summary = match self.recorded_summary() {
                Some(summary) => summary,
                None => {
                    let summary = self.evaluate_generation()?;
                    self.record_generation(&summary);
                    summary
                }
            };

            if let Some(reason) = self.should_stop(&summary) {
                self.phase = match reason {
                    StopReason::Converged => SearchPhase::Converged,
                    StopReason::BudgetExhausted | StopReason::Cancelled => {
                        SearchPhase::BudgetExhausted
                    }
                };
                break reason;
            }

            self.phase = SearchPhase::Selecting;
            let next = self.breed_next_generation();
            self.phase = SearchPhase::Breeding;
            self.state.generation += 1;
            self.state.population = next;

            self.checkpoint_boundary()?;
        };

        // Terminal checkpoint: a resumed run with a larger budget picks
        // up from the evaluated state instead of redoing the last
        // generation.
        self.checkpoint_boundary()?;

        info!(
            "search stopped after {} generations ({} evaluations): {:?}",
            self.state.history.len(),
            self.state.total_evaluations,
            stop_reason
        );

        let best = self
            .state
            .best
            .clone()
            .ok_or(SearchError::NoViableConfiguration)?;

        Ok(SearchOutcome {
            best,
            history: self.state.history.clone(),
            stop_reason,
            generations: self.state.history.len(),
            total_evaluations: self.state.total_evaluations,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Summary for the current generation if it is already fully scored
    /// and recorded (resume from a terminal checkpoint).
    fn recorded_summary(&self) -> Option<GenerationSummary> {
        if self.state.population.unevaluated_count() != 0 {
            return None;
        }
        self.state
            .history
            .generations
            .last()
            .filter(|s| s.generation == self.state.generation)
            .cloned()
    }

    /// Evaluate the current generation, discarding and resampling it
    /// when the failure rate is over the configured threshold.
    fn evaluate_generation(&mut self) -> Result<GenerationSummary, SearchError> {
        self.phase = SearchPhase::Evaluating;
        let mut attempts = 0;

        loop {
            let report = self.state.population.evaluate_all(
                self.renderer,
                self.evaluator,
                &self.scorer,
                self.tasks,
                &self.cache,
                &self.pool,
            );
            self.state.total_evaluations += report.evaluations;

            let failures = self.state.population.failure_count();
            let rate = failures as f64 / self.state.population.len().max(1) as f64;
            if rate <= self.config.evaluation.failure_discard_threshold {
                let (best, mean, variance) = self.state.population.fitness_stats();
                return Ok(GenerationSummary {
                    generation: self.state.generation,
                    best_fitness: best,
                    mean_fitness: mean,
                    variance,
                    failures,
                    evaluations: report.evaluations,
                });
            }

            attempts += 1;
            warn!(
                "generation {}: failure rate {:.0}% over threshold {:.0}%, \
                 discarding and resampling (attempt {}/{})",
                self.state.generation,
                rate * 100.0,
                self.config.evaluation.failure_discard_threshold * 100.0,
                attempts,
                self.config.evaluation.max_resample_attempts
            );
            if attempts > self.config.evaluation.max_resample_attempts {
                return Err(SearchError::EvaluatorFailing {
                    generation: self.state.generation,
                    attempts,
                });
            }

            // A mostly-failed generation carries no signal worth
            // optimizing on.
            self.state.population = Population::initialize(
                self.config.population.size,
                &self.config.space,
                &mut self.rng,
                self.state.generation,
                &mut self.state.next_id,
            );
        }
    }

    /// Push the summary and fold the generation's best into the global
    /// best-so-far.
    fn record_generation(&mut self, summary: &GenerationSummary) {
        info!(
            "generation {}: best={:.4} mean={:.4} var={:.2e} failures={} evals={}",
            summary.generation,
            summary.best_fitness,
            summary.mean_fitness,
            summary.variance,
            summary.failures,
            summary.evaluations
        );

        let prev_best = self.state.best.as_ref().and_then(|b| b.fitness);

        if let Some(candidate) = self.state.population.best()
            && candidate.fitness.is_some_and(f64::is_finite)
        {
            let replace = match &self.state.best {
                None => true,
                Some(best) => compare_individuals(candidate, best) == std::cmp::Ordering::Less,
            };
            if replace {
                debug!(
                    "new best: individual {} fitness {:?}",
                    candidate.id, candidate.fitness
                );
                self.state.best = Some(candidate.clone());
            }
        }

        let new_best = self.state.best.as_ref().and_then(|b| b.fitness);
        let improved = match (prev_best, new_best) {
            (Some(prev), Some(new)) => new > prev + self.config.convergence.epsilon,
            (None, Some(_)) => true,
            _ => false,
        };
        if improved {
            self.state.stagnation = 0;
        } else {
            self.state.stagnation += 1;
        }

        self.state.history.push(summary.clone());
    }

    /// Check the terminal conditions in priority order.
    fn should_stop(&self, summary: &GenerationSummary) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        let generations_done = self.state.history.len();
        if generations_done >= self.config.budget.max_generations
            || self.state.total_evaluations >= self.config.budget.max_evaluations
        {
            return Some(StopReason::BudgetExhausted);
        }

        if self.state.stagnation >= self.config.convergence.window {
            return Some(StopReason::Converged);
        }
        // Variance collapse only counts once something has been scored.
        if summary.best_fitness.is_finite()
            && summary.variance < self.config.convergence.variance_floor
            && generations_done > 1
        {
            return Some(StopReason::Converged);
        }

        None
    }

    /// Tournament selection plus elitism, then breed offspring through
    /// the proposal strategy for every non-elite slot.
    fn breed_next_generation(&mut self) -> Population {
        let size = self.config.population.size;
        let elite_count = self.config.genetic.elite_count.min(size);

        let mut ranked: Vec<usize> = (0..self.state.population.len()).collect();
        let members = self.state.population.members();
        ranked.sort_by(|&a, &b| compare_individuals(&members[a], &members[b]));

        // Elites carry over unchanged, fitness and generation of origin
        // preserved: they are not re-evaluated.
        let mut next: Vec<Individual> = ranked
            .iter()
            .take(elite_count)
            .map(|&i| members[i].clone())
            .collect();

        let k = self.config.genetic.tournament_size;
        while next.len() < size {
            let parent_a = tournament(members, &mut self.rng, k);
            let parent_b = tournament(members, &mut self.rng, k);

            let mut child = self.proposal.propose(
                &self.config.space,
                &mut self.rng,
                &self.config.genetic,
                &members[parent_a].config,
                &members[parent_b].config,
            );
            // Local recovery for a misbehaving proposal strategy; never
            // surfaced to the caller.
            if !self.config.space.is_valid(&child) {
                child = sanitize(&self.config.space, &child, &mut self.rng);
            }

            let id = self.state.next_id;
            self.state.next_id += 1;
            next.push(Individual {
                id,
                config: child,
                fitness: None,
                generation: self.state.generation + 1,
                parents: vec![members[parent_a].id, members[parent_b].id],
                result: None,
            });
        }

        Population::from_members(next)
    }

    /// Persist state at the generation boundary, reseeding the RNG so a
    /// resumed run reproduces the same continuation.
    fn checkpoint_boundary(&mut self) -> Result<(), SearchError> {
        let Some(path) = self.config.checkpoint_path.clone() else {
            return Ok(());
        };

        self.state.rng_seed = self.rng.next_seed();
        self.rng = SearchRng::new(self.state.rng_seed);
        self.state.cache_entries = self.cache.entries();

        checkpoint::write_checkpoint(&path, &self.state)?;
        debug!(
            "checkpoint written at generation {} ({} cached results)",
            self.state.generation,
            self.state.cache_entries.len()
        );
        Ok(())
    }
}

/// Tournament selection: sample `k` members without replacement and
/// keep the fittest.
fn tournament(members: &[Individual], rng: &mut SearchRng, k: usize) -> usize {
    rng.distinct_indices(members.len(), k)
        .into_iter()
        .min_by(|&a, &b| compare_individuals(&members[a], &members[b]))
        .unwrap_or(0)
}

/// Clamp every declared parameter and fill in any missing one, yielding
/// a valid config from an arbitrary one.
fn sanitize(
    space: &crate::schema::ConfigSpace,
    config: &crate::schema::RenderingConfig,
    rng: &mut SearchRng,
) -> crate::schema::RenderingConfig {
    let params = space
        .iter()
        .map(|(name, spec)| {
            let value = match config.get(name) {
                Some(v) => spec.clamp(v),
                None => rng.sample_value(spec),
            };
            (name.clone(), value)
        })
        .collect();
    crate::schema::RenderingConfig::from_params(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Document, EvalFailure, PageImage};
    use crate::schema::{
        BudgetConfig, ConfigSpace, ConvergenceConfig, EvaluationConfig, ParamSpec,
        PopulationConfig,
    };

    struct UnitRenderer;

    impl Renderer for UnitRenderer {
        fn render(
            &self,
            _document: &Document,
            _config: &crate::schema::RenderingConfig,
        ) -> Result<Vec<PageImage>, EvalFailure> {
            Ok(vec![PageImage {
                width: 10,
                height: 10,
                data: vec![0; 4],
            }])
        }
    }

    struct ConstEvaluator;

    impl Evaluator for ConstEvaluator {
        fn evaluate(
            &self,
            _pages: &[PageImage],
            _task: &BenchmarkTask,
        ) -> Result<EvaluationResult, EvalFailure> {
            Ok(EvaluationResult {
                accuracy: 0.5,
                compression_ratio: 0.5,
                latency_ms: 1.0,
                pages: 1,
            })
        }
    }

    fn tasks() -> Vec<BenchmarkTask> {
        vec![BenchmarkTask {
            id: "t0".to_string(),
            document: Document {
                id: "d0".to_string(),
                text: "body".to_string(),
            },
            question: "q".to_string(),
        }]
    }

    fn small_config() -> SearchConfig {
        SearchConfig {
            space: ConfigSpace::new()
                .with_param("font_size", ParamSpec::Continuous { min: 8.0, max: 24.0 })
                .with_param("dpi", ParamSpec::Discrete { min: 72, max: 300 }),
            population: PopulationConfig { size: 8 },
            budget: BudgetConfig {
                max_generations: 5,
                max_evaluations: 10_000,
            },
            convergence: ConvergenceConfig {
                epsilon: 1e-6,
                window: 50,
                variance_floor: 0.0,
            },
            evaluation: EvaluationConfig {
                concurrency: 2,
                ..Default::default()
            },
            random_seed: Some(99),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_reaches_generation_budget() {
        let config = small_config();
        let tasks = tasks();
        let mut engine =
            GeneticSearchEngine::new(config, &UnitRenderer, &ConstEvaluator, &tasks).unwrap();
        let outcome = engine.run().unwrap();

        assert_eq!(outcome.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(outcome.generations, 5);
        assert!(outcome.best.fitness.unwrap().is_finite());
        assert!(outcome.best.result.is_some());
    }

    #[test]
    fn test_evaluation_budget_stops_run() {
        let mut config = small_config();
        config.budget.max_evaluations = 8; // one generation's worth
        let tasks = tasks();
        let mut engine =
            GeneticSearchEngine::new(config, &UnitRenderer, &ConstEvaluator, &tasks).unwrap();
        let outcome = engine.run().unwrap();

        assert_eq!(outcome.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(outcome.generations, 1);
    }

    #[test]
    fn test_cancellation_at_boundary() {
        let config = small_config();
        let tasks = tasks();
        let mut engine =
            GeneticSearchEngine::new(config, &UnitRenderer, &ConstEvaluator, &tasks).unwrap();
        engine.cancel_handle().store(true, Ordering::Relaxed);

        let outcome = engine.run().unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        // The in-flight generation was still fully scored.
        assert_eq!(outcome.generations, 1);
    }

    #[test]
    fn test_all_failures_is_explicit_error() {
        struct AlwaysFails;
        impl Evaluator for AlwaysFails {
            fn evaluate(
                &self,
                _pages: &[PageImage],
                _task: &BenchmarkTask,
            ) -> Result<EvaluationResult, EvalFailure> {
                Err(EvalFailure::Model("down".to_string()))
            }
        }

        let config = small_config();
        let tasks = tasks();
        let mut engine =
            GeneticSearchEngine::new(config, &UnitRenderer, &AlwaysFails, &tasks).unwrap();
        assert!(matches!(
            engine.run(),
            Err(SearchError::EvaluatorFailing { .. })
        ));
    }

    #[test]
    fn test_empty_task_suite_rejected() {
        let config = small_config();
        let tasks: Vec<BenchmarkTask> = Vec::new();
        assert!(matches!(
            GeneticSearchEngine::new(config, &UnitRenderer, &ConstEvaluator, &tasks),
            Err(SearchError::EmptyTaskSuite)
        ));
    }

    #[test]
    fn test_best_so_far_is_monotone() {
        let config = small_config();
        let tasks = tasks();
        let mut engine =
            GeneticSearchEngine::new(config, &UnitRenderer, &ConstEvaluator, &tasks).unwrap();
        let outcome = engine.run().unwrap();

        let mut prev = f64::NEG_INFINITY;
        for summary in &outcome.history.generations {
            // Per-generation best may regress; the recorded global best
            // may not.
            let global_best_here = prev.max(summary.best_fitness);
            assert!(global_best_here >= prev);
            prev = global_best_here;
        }
        assert!(outcome.best.fitness.unwrap() >= prev - 1e-12 || prev == f64::NEG_INFINITY);
    }
}
