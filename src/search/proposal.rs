//! Pluggable offspring proposal strategies for the breeding step.
//!
//! The genetic contract (selection, elitism, termination) holds
//! regardless of where offspring come from; only the proposal source is
//! swappable. The default is classic crossover + mutation. An
//! LLM-driven proposer that critiques or suggests configurations plugs
//! in behind the same trait.

use crate::schema::{ConfigSpace, GeneticConfig, RenderingConfig};

use super::rng::SearchRng;

/// Produces one offspring configuration from two selected parents.
///
/// Implementations must return a configuration that validates against
/// the space; clamping through [`ConfigSpace`] is the standard way to
/// guarantee that.
pub trait ProposalStrategy: Send {
    /// Propose an offspring for one non-elite slot.
    fn propose(
        &mut self,
        space: &ConfigSpace,
        rng: &mut SearchRng,
        genetic: &GeneticConfig,
        parent_a: &RenderingConfig,
        parent_b: &RenderingConfig,
    ) -> RenderingConfig;
}

/// Default proposal strategy: per-parameter crossover followed by
/// per-parameter mutation, both bound-preserving.
#[derive(Debug, Default)]
pub struct GeneticProposal;

impl ProposalStrategy for GeneticProposal {
    fn propose(
        &mut self,
        space: &ConfigSpace,
        rng: &mut SearchRng,
        genetic: &GeneticConfig,
        parent_a: &RenderingConfig,
        parent_b: &RenderingConfig,
    ) -> RenderingConfig {
        let child = if rng.chance(genetic.crossover_rate) {
            rng.crossover(space, parent_a, parent_b)
        } else {
            parent_a.clone()
        };
        rng.mutate(
            space,
            &child,
            genetic.mutation_rate,
            genetic.mutation_strength,
        )
    }
}
