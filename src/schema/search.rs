//! Search configuration types for rendering-configuration discovery.
//!
//! This module provides the types that configure the genetic search:
//! population sizing, genetic operators, fitness weighting, evaluation
//! budget, convergence detection and the per-generation reporting surface.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigSpace;

/// Top-level configuration for a rendering-configuration search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// The parameter space being searched.
    pub space: ConfigSpace,
    /// Population sizing.
    pub population: PopulationConfig,
    /// Genetic operator settings.
    #[serde(default)]
    pub genetic: GeneticConfig,
    /// Fitness trade-off weighting.
    #[serde(default)]
    pub weights: FitnessWeights,
    /// Hard ceilings on search cost.
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Convergence detection settings.
    #[serde(default)]
    pub convergence: ConvergenceConfig,
    /// Evaluation scheduling and failure handling.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Where to write per-generation checkpoints. None disables
    /// checkpointing.
    #[serde(default)]
    pub checkpoint_path: Option<PathBuf>,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            space: ConfigSpace::default(),
            population: PopulationConfig::default(),
            genetic: GeneticConfig::default(),
            weights: FitnessWeights::default(),
            budget: BudgetConfig::default(),
            convergence: ConvergenceConfig::default(),
            evaluation: EvaluationConfig::default(),
            checkpoint_path: None,
            random_seed: None,
        }
    }
}

/// Population sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of individuals per generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
        }
    }
}

fn default_population_size() -> usize {
    24
}

/// Genetic operator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Tournament size for parent selection.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Number of best individuals carried unchanged into the next
    /// generation, fitness preserved.
    #[serde(default = "default_elite_count")]
    pub elite_count: usize,
    /// Probability of applying crossover to a breeding pair.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Per-parameter mutation probability.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Gaussian mutation strength, as a fraction of each parameter's
    /// range.
    #[serde(default = "default_mutation_strength")]
    pub mutation_strength: f64,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            tournament_size: default_tournament_size(),
            elite_count: default_elite_count(),
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            mutation_strength: default_mutation_strength(),
        }
    }
}

fn default_tournament_size() -> usize {
    3
}
fn default_elite_count() -> usize {
    2
}
fn default_crossover_rate() -> f64 {
    0.8
}
fn default_mutation_rate() -> f64 {
    0.15
}
fn default_mutation_strength() -> f64 {
    0.1
}

/// Fitness trade-off weighting between task accuracy, token compression
/// and evaluation latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessWeights {
    /// Weight on task accuracy (0-1 scale input).
    #[serde(default = "default_accuracy_weight")]
    pub accuracy_weight: f64,
    /// Weight on the normalized compression ratio.
    #[serde(default = "default_compression_weight")]
    pub compression_weight: f64,
    /// Penalty slope applied per unit of latency over budget.
    #[serde(default = "default_latency_penalty_slope")]
    pub latency_penalty_slope: f64,
    /// Latency budget in milliseconds; no penalty below this.
    #[serde(default = "default_latency_budget_ms")]
    pub latency_budget_ms: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            accuracy_weight: default_accuracy_weight(),
            compression_weight: default_compression_weight(),
            latency_penalty_slope: default_latency_penalty_slope(),
            latency_budget_ms: default_latency_budget_ms(),
        }
    }
}

fn default_accuracy_weight() -> f64 {
    0.7
}
fn default_compression_weight() -> f64 {
    0.3
}
fn default_latency_penalty_slope() -> f64 {
    0.05
}
fn default_latency_budget_ms() -> f64 {
    60_000.0
}

/// Hard ceilings on search cost. Hitting either one is a normal terminal
/// state, not a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Maximum cumulative evaluator calls across the whole run.
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
            max_evaluations: default_max_evaluations(),
        }
    }
}

fn default_max_generations() -> usize {
    40
}
fn default_max_evaluations() -> u64 {
    2_000
}

/// Convergence detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Minimum best-fitness improvement that counts as progress.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Number of consecutive generations without progress before the
    /// run is declared converged.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Population fitness variance below which diversity is considered
    /// collapsed.
    #[serde(default = "default_variance_floor")]
    pub variance_floor: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            window: default_window(),
            variance_floor: default_variance_floor(),
        }
    }
}

fn default_epsilon() -> f64 {
    1e-4
}
fn default_window() -> usize {
    6
}
fn default_variance_floor() -> f64 {
    1e-8
}

/// Evaluation scheduling and failure handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Concurrent evaluation limit (0 = one worker per logical CPU).
    /// Bounds pressure on shared model-serving capacity.
    #[serde(default)]
    pub concurrency: usize,
    /// Fraction of failed evaluations in one generation above which the
    /// whole generation is discarded and resampled.
    #[serde(default = "default_failure_discard_threshold")]
    pub failure_discard_threshold: f64,
    /// How many times a generation may be discarded and resampled before
    /// the run fails with an evaluator error.
    #[serde(default = "default_max_resample_attempts")]
    pub max_resample_attempts: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            failure_discard_threshold: default_failure_discard_threshold(),
            max_resample_attempts: default_max_resample_attempts(),
        }
    }
}

fn default_failure_discard_threshold() -> f64 {
    0.3
}
fn default_max_resample_attempts() -> usize {
    3
}

/// Search configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchConfigError {
    #[error("population size must be at least 2")]
    PopulationTooSmall,
    #[error("elite count {elite} must be smaller than population size {size}")]
    TooManyElites { elite: usize, size: usize },
    #[error("tournament size must be at least 1")]
    TournamentTooSmall,
    #[error("rate {name} = {value} must lie in [0, 1]")]
    RateOutOfRange { name: &'static str, value: f64 },
    #[error("fitness weights must be non-negative, got {name} = {value}")]
    NegativeWeight { name: &'static str, value: f64 },
    #[error("budget must allow at least one generation and one evaluation")]
    EmptyBudget,
    #[error("convergence window must be at least 1")]
    EmptyWindow,
    #[error("parameter space error: {0}")]
    Space(#[from] super::ConfigError),
}

impl SearchConfig {
    /// Validate the whole search configuration.
    pub fn validate(&self) -> Result<(), SearchConfigError> {
        self.space.validate_schema()?;

        if self.population.size < 2 {
            return Err(SearchConfigError::PopulationTooSmall);
        }
        if self.genetic.elite_count >= self.population.size {
            return Err(SearchConfigError::TooManyElites {
                elite: self.genetic.elite_count,
                size: self.population.size,
            });
        }
        if self.genetic.tournament_size == 0 {
            return Err(SearchConfigError::TournamentTooSmall);
        }

        let rates = [
            ("crossover_rate", self.genetic.crossover_rate),
            ("mutation_rate", self.genetic.mutation_rate),
            (
                "failure_discard_threshold",
                self.evaluation.failure_discard_threshold,
            ),
        ];
        for (name, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(SearchConfigError::RateOutOfRange { name, value });
            }
        }

        let weights = [
            ("accuracy_weight", self.weights.accuracy_weight),
            ("compression_weight", self.weights.compression_weight),
            ("latency_penalty_slope", self.weights.latency_penalty_slope),
        ];
        for (name, value) in weights {
            if value < 0.0 || !value.is_finite() {
                return Err(SearchConfigError::NegativeWeight { name, value });
            }
        }

        if self.budget.max_generations == 0 || self.budget.max_evaluations == 0 {
            return Err(SearchConfigError::EmptyBudget);
        }
        if self.convergence.window == 0 {
            return Err(SearchConfigError::EmptyWindow);
        }

        Ok(())
    }
}

// ============================================================================
// Reporting surface
// ============================================================================

/// Per-generation summary statistics, suitable for logging/telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Generation index.
    pub generation: usize,
    /// Best fitness within this generation.
    pub best_fitness: f64,
    /// Mean fitness over the scoreable (non-failed) members.
    pub mean_fitness: f64,
    /// Fitness variance over the scoreable members.
    pub variance: f64,
    /// Number of failed evaluations in this generation.
    pub failures: usize,
    /// Real evaluator calls spent on this generation (cache hits excluded).
    pub evaluations: u64,
}

/// Full per-generation statistic history for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHistory {
    /// One summary per completed generation, in order.
    pub generations: Vec<GenerationSummary>,
}

impl SearchHistory {
    /// Append a generation summary.
    pub fn push(&mut self, summary: GenerationSummary) {
        self.generations.push(summary);
    }

    /// Number of recorded generations.
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    /// Whether no generation has completed yet.
    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Best fitness recorded over all generations so far.
    pub fn best_fitness(&self) -> Option<f64> {
        self.generations
            .iter()
            .map(|g| g.best_fitness)
            .fold(None, |acc, v| match acc {
                Some(best) if best >= v => Some(best),
                _ => Some(v),
            })
    }
}

/// Phase of the search state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SearchPhase {
    /// Building generation 0.
    #[default]
    Initializing,
    /// Scoring un-scored individuals.
    Evaluating,
    /// Choosing survivors.
    Selecting,
    /// Producing offspring.
    Breeding,
    /// Terminal: best fitness stopped improving or diversity collapsed.
    Converged,
    /// Terminal: generation or evaluation ceiling reached.
    BudgetExhausted,
}

impl SearchPhase {
    /// Whether this phase ends the run.
    pub fn is_terminal(self) -> bool {
        matches!(self, SearchPhase::Converged | SearchPhase::BudgetExhausted)
    }
}

/// Why a run reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Best fitness stopped improving, or population variance fell below
    /// the configured floor.
    Converged,
    /// Generation or evaluation ceiling reached.
    BudgetExhausted,
    /// Cancellation honored at a generation boundary.
    Cancelled,
}
