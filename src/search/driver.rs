//! High-level driver tying configuration, engine and checkpoints
//! together.
//!
//! The driver is the intended entry point for callers: it validates the
//! configuration up front, wires the collaborators into an engine, and
//! handles the resume path from a checkpoint file.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use log::info;

use crate::eval::{BenchmarkTask, Evaluator, Renderer};
use crate::schema::SearchConfig;

use super::checkpoint;
use super::engine::{GeneticSearchEngine, SearchError, SearchOutcome, SearchState};
use super::proposal::ProposalStrategy;

/// Drives complete search runs from a validated configuration.
pub struct SearchDriver {
    config: SearchConfig,
    proposal: Option<Box<dyn ProposalStrategy>>,
    cancelled: Arc<AtomicBool>,
}

impl SearchDriver {
    /// Create a driver. The configuration is validated here so a broken
    /// one fails before any evaluation is spent.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            config,
            proposal: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the default offspring proposal strategy.
    pub fn with_proposal(mut self, proposal: Box<dyn ProposalStrategy>) -> Self {
        self.proposal = Some(proposal);
        self
    }

    /// Handle for requesting cancellation. Honored at generation
    /// boundaries; the in-flight generation is always fully evaluated
    /// first.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Run a fresh search to a terminal state.
    pub fn run(
        self,
        renderer: &dyn Renderer,
        evaluator: &dyn Evaluator,
        tasks: &[BenchmarkTask],
    ) -> Result<SearchOutcome, SearchError> {
        let Self {
            config,
            proposal,
            cancelled,
        } = self;
        let engine = GeneticSearchEngine::new(config, renderer, evaluator, tasks)?;
        Self::drive(proposal, cancelled, engine)
    }

    /// Resume from in-memory state.
    pub fn resume(
        self,
        state: SearchState,
        renderer: &dyn Renderer,
        evaluator: &dyn Evaluator,
        tasks: &[BenchmarkTask],
    ) -> Result<SearchOutcome, SearchError> {
        let Self {
            config,
            proposal,
            cancelled,
        } = self;
        let engine =
            GeneticSearchEngine::with_state(config, state, renderer, evaluator, tasks)?;
        Self::drive(proposal, cancelled, engine)
    }

    /// Resume from a checkpoint file. A missing or corrupt checkpoint is
    /// an explicit error, never a silent fresh start.
    pub fn resume_from(
        self,
        path: &Path,
        renderer: &dyn Renderer,
        evaluator: &dyn Evaluator,
        tasks: &[BenchmarkTask],
    ) -> Result<SearchOutcome, SearchError> {
        let state = checkpoint::load_checkpoint(path)?;
        info!(
            "loaded checkpoint from {}: generation {}, {} evaluations so far",
            path.display(),
            state.generation,
            state.total_evaluations
        );
        self.resume(state, renderer, evaluator, tasks)
    }

    fn drive(
        proposal: Option<Box<dyn ProposalStrategy>>,
        cancelled: Arc<AtomicBool>,
        engine: GeneticSearchEngine<'_>,
    ) -> Result<SearchOutcome, SearchError> {
        // The engine shares the driver's flag, so handles taken before
        // run() consumed the driver stay live.
        let mut engine = engine.with_cancel_flag(cancelled);
        if let Some(proposal) = proposal {
            engine = engine.with_proposal(proposal);
        }
        engine.run()
    }
}
