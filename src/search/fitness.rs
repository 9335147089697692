//! Scalar fitness from raw evaluation outputs.

use crate::eval::EvaluationResult;
use crate::schema::FitnessWeights;

/// Sentinel fitness for failed or degenerate evaluations. Such
/// individuals are never selected but stay visible in reporting.
pub const FAILURE_FITNESS: f64 = f64::NEG_INFINITY;

/// Reduces an [`EvaluationResult`] to one scalar under a configured
/// accuracy/compression/latency trade-off.
#[derive(Debug, Clone)]
pub struct FitnessScorer {
    weights: FitnessWeights,
}

impl FitnessScorer {
    /// Create a scorer with the given weights.
    pub fn new(weights: FitnessWeights) -> Self {
        Self { weights }
    }

    /// The configured weights.
    pub fn weights(&self) -> &FitnessWeights {
        &self.weights
    }

    /// Score one result.
    ///
    /// Returns a finite value, or exactly negative infinity for
    /// degenerate inputs (NaN or out-of-range accuracy). Never NaN: an
    /// evaluator fault must be classified, not propagated as an
    /// undefined number.
    pub fn score(&self, result: &EvaluationResult) -> f64 {
        if !result.accuracy.is_finite() || !(0.0..=1.0).contains(&result.accuracy) {
            return FAILURE_FITNESS;
        }

        let compression = if result.compression_ratio.is_finite() {
            result.compression_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let latency = if result.latency_ms.is_finite() {
            result.latency_ms.max(0.0)
        } else {
            return FAILURE_FITNESS;
        };

        let over_budget =
            (latency - self.weights.latency_budget_ms).max(0.0) / self.weights.latency_budget_ms.max(1.0);

        let fitness = self.weights.accuracy_weight * result.accuracy
            + self.weights.compression_weight * compression
            - self.weights.latency_penalty_slope * over_budget;

        if fitness.is_finite() {
            fitness
        } else {
            FAILURE_FITNESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> FitnessWeights {
        FitnessWeights {
            accuracy_weight: 0.7,
            compression_weight: 0.3,
            latency_penalty_slope: 0.1,
            latency_budget_ms: 1000.0,
        }
    }

    fn result(accuracy: f64, compression: f64, latency: f64) -> EvaluationResult {
        EvaluationResult {
            accuracy,
            compression_ratio: compression,
            latency_ms: latency,
            pages: 1,
        }
    }

    #[test]
    fn test_weighted_combination() {
        let scorer = FitnessScorer::new(weights());
        let fitness = scorer.score(&result(1.0, 0.5, 100.0));
        assert!((fitness - (0.7 + 0.3 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_latency_penalty_applies_over_budget_only() {
        let scorer = FitnessScorer::new(weights());
        let under = scorer.score(&result(0.8, 0.5, 900.0));
        let at = scorer.score(&result(0.8, 0.5, 1000.0));
        let over = scorer.score(&result(0.8, 0.5, 2000.0));
        assert_eq!(under, at);
        assert!(over < at);
        assert!((at - over - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_accuracy_is_neg_infinity() {
        let scorer = FitnessScorer::new(weights());
        assert_eq!(scorer.score(&result(f64::NAN, 0.5, 10.0)), FAILURE_FITNESS);
        assert_eq!(scorer.score(&result(1.5, 0.5, 10.0)), FAILURE_FITNESS);
        assert_eq!(scorer.score(&result(-0.1, 0.5, 10.0)), FAILURE_FITNESS);
        assert_eq!(
            scorer.score(&result(0.9, 0.5, f64::INFINITY)),
            FAILURE_FITNESS
        );
    }

    #[test]
    fn test_score_is_never_nan() {
        let scorer = FitnessScorer::new(weights());
        let cases = [
            result(f64::NAN, f64::NAN, f64::NAN),
            result(0.5, f64::NEG_INFINITY, 0.0),
            result(0.0, 0.0, 0.0),
            result(1.0, 1.0, f64::MAX),
        ];
        for case in cases {
            let fitness = scorer.score(&case);
            assert!(!fitness.is_nan());
            assert!(fitness.is_finite() || fitness == FAILURE_FITNESS);
        }
    }
}
