//! Genetic search over rendering configurations.

mod checkpoint;
mod driver;
mod engine;
mod fitness;
mod population;
mod proposal;
mod rng;

pub use checkpoint::{CheckpointError, load_checkpoint, write_checkpoint};
pub use driver::SearchDriver;
pub use engine::{GeneticSearchEngine, SearchError, SearchOutcome, SearchState};
pub use fitness::{FAILURE_FITNESS, FitnessScorer};
pub use population::{EvaluationReport, Individual, Population, compare_individuals};
pub use proposal::{GeneticProposal, ProposalStrategy};
pub use rng::SearchRng;
