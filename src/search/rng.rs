//! Random sampling, crossover and mutation over the parameter space.
//!
//! Every operator routes its output through [`ConfigSpace`] bounds, so a
//! bred or mutated config is always legal.

use std::collections::BTreeMap;

use rand::prelude::*;

use crate::schema::{ConfigSpace, ParamSpec, ParamValue, RenderingConfig};

/// Random number generator wrapper for search operations.
pub struct SearchRng {
    rng: StdRng,
}

impl SearchRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with an entropy-derived seed.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Draw one uniformly random value for a parameter spec.
    pub fn sample_value(&mut self, spec: &ParamSpec) -> ParamValue {
        match spec {
            ParamSpec::Continuous { min, max } => {
                ParamValue::Float(self.rng.gen_range(*min..=*max))
            }
            ParamSpec::Discrete { min, max } => ParamValue::Int(self.rng.gen_range(*min..=*max)),
            ParamSpec::Categorical { choices } => ParamValue::Choice(
                choices
                    .choose(&mut self.rng)
                    .cloned()
                    .unwrap_or_default(),
            ),
        }
    }

    /// Draw a uniformly random valid configuration.
    pub fn sample_config(&mut self, space: &ConfigSpace) -> RenderingConfig {
        let params: BTreeMap<String, ParamValue> = space
            .iter()
            .map(|(name, spec)| (name.clone(), self.sample_value(spec)))
            .collect();
        RenderingConfig::from_params(params)
    }

    /// Per-parameter crossover of two valid configs.
    ///
    /// Continuous parameters blend with a random mixing ratio drawn per
    /// parameter; discrete and categorical parameters inherit from either
    /// parent with equal probability. Output is re-clamped so no
    /// interpolation artifact escapes the bounds.
    pub fn crossover(
        &mut self,
        space: &ConfigSpace,
        parent_a: &RenderingConfig,
        parent_b: &RenderingConfig,
    ) -> RenderingConfig {
        let params: BTreeMap<String, ParamValue> = space
            .iter()
            .map(|(name, spec)| {
                let a = parent_a.get(name);
                let b = parent_b.get(name);
                let child = match (spec, a, b) {
                    (
                        ParamSpec::Continuous { .. },
                        Some(ParamValue::Float(va)),
                        Some(ParamValue::Float(vb)),
                    ) => {
                        let t = self.rng.r#gen::<f64>();
                        spec.clamp(&ParamValue::Float(va * (1.0 - t) + vb * t))
                    }
                    (_, Some(a), Some(b)) => {
                        let pick = if self.rng.gen_bool(0.5) { a } else { b };
                        spec.clamp(pick)
                    }
                    (_, Some(only), None) | (_, None, Some(only)) => spec.clamp(only),
                    (_, None, None) => self.sample_value(spec),
                };
                (name.clone(), child)
            })
            .collect();
        RenderingConfig::from_params(params)
    }

    /// Per-parameter mutation.
    ///
    /// Continuous parameters are perturbed by Gaussian noise scaled to
    /// the parameter range and clamped back in; discrete and categorical
    /// parameters are resampled uniformly. Each parameter mutates with
    /// probability `rate`.
    pub fn mutate(
        &mut self,
        space: &ConfigSpace,
        config: &RenderingConfig,
        rate: f64,
        strength: f64,
    ) -> RenderingConfig {
        let params: BTreeMap<String, ParamValue> = space
            .iter()
            .map(|(name, spec)| {
                let current = config
                    .get(name)
                    .map(|v| spec.clamp(v))
                    .unwrap_or_else(|| self.sample_value(spec));

                let mutated = if self.rng.r#gen::<f64>() < rate {
                    match (spec, &current) {
                        (ParamSpec::Continuous { min, max }, ParamValue::Float(v)) => {
                            spec.clamp(&ParamValue::Float(self.gaussian_perturb(
                                *v,
                                strength,
                                (*min, *max),
                            )))
                        }
                        _ => self.sample_value(spec),
                    }
                } else {
                    current
                };
                (name.clone(), mutated)
            })
            .collect();
        RenderingConfig::from_params(params)
    }

    /// Add range-scaled Gaussian noise to a value.
    fn gaussian_perturb(&mut self, value: f64, strength: f64, bounds: (f64, f64)) -> f64 {
        let noise: f64 = self.rng.sample(rand_distr::StandardNormal);
        value + noise * strength * (bounds.1 - bounds.0)
    }

    /// Uniform f64 in [0, 1).
    pub fn random(&mut self) -> f64 {
        self.rng.r#gen()
    }

    /// Bernoulli draw.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Sample `k` distinct indices from `0..n` (partial Fisher-Yates),
    /// used for tournament selection without replacement.
    pub fn distinct_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        let k = k.min(n);
        let mut indices: Vec<usize> = (0..n).collect();
        for i in 0..k {
            let j = self.rng.gen_range(i..n);
            indices.swap(i, j);
        }
        indices.truncate(k);
        indices
    }

    /// Generate the next u64, for reseeding on checkpoint.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}

impl ConfigSpace {
    /// Draw a uniformly random valid configuration from this space.
    pub fn sample(&self, rng: &mut SearchRng) -> RenderingConfig {
        rng.sample_config(self)
    }
}
