//! Evaluation outcomes and the classified failure taxonomy.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one rendering configuration against a benchmark
/// workload. Immutable once produced; cached by configuration fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Task accuracy in `[0, 1]`.
    pub accuracy: f64,
    /// Fraction of tokens saved relative to the text baseline, in `[0, 1]`.
    pub compression_ratio: f64,
    /// Wall-clock evaluation latency in milliseconds.
    pub latency_ms: f64,
    /// Number of rendered pages consumed by the model.
    pub pages: usize,
}

impl EvaluationResult {
    /// Aggregate per-task results into one result for the whole workload:
    /// equal-weight mean accuracy and compression, summed latency and
    /// page counts.
    pub fn merge(results: &[EvaluationResult]) -> Option<EvaluationResult> {
        if results.is_empty() {
            return None;
        }
        let n = results.len() as f64;
        Some(EvaluationResult {
            accuracy: results.iter().map(|r| r.accuracy).sum::<f64>() / n,
            compression_ratio: results.iter().map(|r| r.compression_ratio).sum::<f64>() / n,
            latency_ms: results.iter().map(|r| r.latency_ms).sum(),
            pages: results.iter().map(|r| r.pages).sum(),
        })
    }

    /// Latency normalized by achieved compression; lower is better. Used
    /// as the fitness tie-breaker so cheaper configs win draws.
    pub fn normalized_cost(&self) -> f64 {
        self.latency_ms / self.compression_ratio.max(1e-6)
    }
}

/// Classified evaluation failures.
///
/// The search engine relies on every renderer/evaluator fault being one
/// of these variants so it can distinguish "failed evaluation" from "low
/// score".
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum EvalFailure {
    #[error("evaluation timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
    #[error("model error: {0}")]
    Model(String),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("render error: {0}")]
    Render(String),
}
