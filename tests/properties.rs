//! Property tests for the pure layers: parameter clamping, config
//! fingerprints, fitness scoring and the breeding operators.

use proptest::prelude::*;

use glyph_search::{
    eval::EvaluationResult,
    schema::{ConfigSpace, FitnessWeights, ParamSpec, ParamValue},
    search::{FAILURE_FITNESS, FitnessScorer, SearchRng},
};

proptest! {
    #[test]
    fn clamp_always_lands_in_bounds(value in proptest::num::f64::ANY) {
        let spec = ParamSpec::Continuous { min: 6.0, max: 28.0 };
        let clamped = spec.clamp(&ParamValue::Float(value));
        prop_assert!(spec.contains(&clamped));
    }

    #[test]
    fn discrete_clamp_always_lands_in_bounds(value in any::<i64>()) {
        let spec = ParamSpec::Discrete { min: 72, max: 300 };
        let clamped = spec.clamp(&ParamValue::Int(value));
        prop_assert!(spec.contains(&clamped));
    }

    #[test]
    fn fingerprint_survives_serialization(seed in any::<u64>()) {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(seed);
        let config = space.sample(&mut rng);

        let json = serde_json::to_string(&config).unwrap();
        let parsed: glyph_search::RenderingConfig = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(config.fingerprint(), parsed.fingerprint());
    }

    #[test]
    fn sampled_configs_are_valid(seed in any::<u64>()) {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(seed);
        prop_assert!(space.is_valid(&space.sample(&mut rng)));
    }

    #[test]
    fn breeding_preserves_validity(seed in any::<u64>()) {
        let space = ConfigSpace::default();
        let mut rng = SearchRng::new(seed);
        let a = space.sample(&mut rng);
        let b = space.sample(&mut rng);

        let child = rng.crossover(&space, &a, &b);
        prop_assert!(space.is_valid(&child));

        let mutated = rng.mutate(&space, &child, 0.5, 0.3);
        prop_assert!(space.is_valid(&mutated));
    }

    #[test]
    fn fitness_is_never_nan(
        accuracy in proptest::num::f64::ANY,
        compression in proptest::num::f64::ANY,
        latency in proptest::num::f64::ANY,
    ) {
        let scorer = FitnessScorer::new(FitnessWeights::default());
        let fitness = scorer.score(&EvaluationResult {
            accuracy,
            compression_ratio: compression,
            latency_ms: latency,
            pages: 1,
        });
        prop_assert!(!fitness.is_nan());
        prop_assert!(fitness.is_finite() || fitness == FAILURE_FITNESS);
    }

    #[test]
    fn scoring_is_deterministic(
        accuracy in 0.0f64..=1.0,
        compression in 0.0f64..=1.0,
        latency in 0.0f64..1e9,
    ) {
        let scorer = FitnessScorer::new(FitnessWeights::default());
        let result = EvaluationResult {
            accuracy,
            compression_ratio: compression,
            latency_ms: latency,
            pages: 1,
        };
        prop_assert_eq!(scorer.score(&result).to_bits(), scorer.score(&result).to_bits());
    }
}
