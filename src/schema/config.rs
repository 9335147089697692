//! Rendering configuration types and the parameter space schema.
//!
//! A [`RenderingConfig`] is one point in the search space: an immutable
//! mapping from parameter name to value. The [`ConfigSpace`] is the
//! authoritative schema that declares which parameters exist and what
//! values are legal for each.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single rendering parameter value.
///
/// Integers are tried before floats during deserialization so that
/// `"dpi": 150` stays discrete while `"font_size": 10.5` stays continuous.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Discrete integer parameter (e.g. DPI).
    Int(i64),
    /// Continuous parameter (e.g. font size in points).
    Float(f64),
    /// Categorical parameter (e.g. font family).
    Choice(String),
}

impl ParamValue {
    /// Continuous value, if this is a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Discrete value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Categorical value, if this is a choice.
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            ParamValue::Choice(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Float equality through bit patterns keeps configs hashable
            // and deduplication exact.
            (ParamValue::Float(a), ParamValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Choice(a), ParamValue::Choice(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

/// An immutable rendering configuration: parameter name to value.
///
/// Configs are only constructed through [`ConfigSpace`] sampling or the
/// breeding operators, so every value is in bounds by construction.
/// Identity is the full parameter tuple; [`RenderingConfig::fingerprint`]
/// gives a stable 64-bit digest for caching and deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderingConfig {
    params: BTreeMap<String, ParamValue>,
}

impl RenderingConfig {
    /// Build from a parameter map. Callers are responsible for bounds;
    /// use [`ConfigSpace::validate`] on externally supplied maps.
    pub fn from_params(params: BTreeMap<String, ParamValue>) -> Self {
        Self { params }
    }

    /// Look up a parameter value by name.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Continuous parameter shorthand.
    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_float)
    }

    /// Discrete parameter shorthand.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    /// Categorical parameter shorthand.
    pub fn choice(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_choice)
    }

    /// Iterate parameters in deterministic (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.params.iter()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the config has no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Copy of the underlying map, for building a derived config.
    pub fn to_params(&self) -> BTreeMap<String, ParamValue> {
        self.params.clone()
    }

    /// Stable 64-bit digest of the full parameter tuple.
    ///
    /// Stable across processes and runs, so it is safe to persist in
    /// checkpoints as a cache key.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1a::new();
        for (name, value) in &self.params {
            h.write(name.as_bytes());
            match value {
                ParamValue::Float(v) => {
                    h.write(b"f");
                    h.write(&v.to_bits().to_le_bytes());
                }
                ParamValue::Int(v) => {
                    h.write(b"i");
                    h.write(&v.to_le_bytes());
                }
                ParamValue::Choice(v) => {
                    h.write(b"c");
                    h.write(v.as_bytes());
                }
            }
        }
        h.finish()
    }
}

impl std::hash::Hash for RenderingConfig {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

/// FNV-1a, used for stable fingerprints that survive checkpointing.
struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(0xcbf29ce484222325)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u64::from(b);
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// Combine a config fingerprint with a workload identifier into one
/// evaluation cache key.
pub fn evaluation_fingerprint(config: &RenderingConfig, workload_id: &str) -> u64 {
    let mut h = Fnv1a::new();
    h.write(&config.fingerprint().to_le_bytes());
    h.write(workload_id.as_bytes());
    h.finish()
}

/// Legal range or choice set for one parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParamSpec {
    /// Continuous parameter in `[min, max]`.
    Continuous { min: f64, max: f64 },
    /// Discrete integer parameter in `[min, max]`.
    Discrete { min: i64, max: i64 },
    /// Categorical parameter drawn from a fixed choice set.
    Categorical { choices: Vec<String> },
}

impl ParamSpec {
    /// Whether a value is legal under this spec.
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamSpec::Continuous { min, max }, ParamValue::Float(v)) => {
                v.is_finite() && *v >= *min && *v <= *max
            }
            (ParamSpec::Discrete { min, max }, ParamValue::Int(v)) => *v >= *min && *v <= *max,
            (ParamSpec::Categorical { choices }, ParamValue::Choice(v)) => {
                choices.iter().any(|c| c == v)
            }
            _ => false,
        }
    }

    /// Pull a value of the right kind back into range. Values of the
    /// wrong kind are replaced by the lower bound / first choice so that
    /// mutation always yields a legal config.
    pub fn clamp(&self, value: &ParamValue) -> ParamValue {
        match self {
            ParamSpec::Continuous { min, max } => {
                let v = value.as_float().unwrap_or(*min);
                let v = if v.is_finite() { v } else { *min };
                ParamValue::Float(v.clamp(*min, *max))
            }
            ParamSpec::Discrete { min, max } => {
                let v = value.as_int().unwrap_or(*min);
                ParamValue::Int(v.clamp(*min, *max))
            }
            ParamSpec::Categorical { choices } => {
                let v = value.as_choice().unwrap_or("");
                if choices.iter().any(|c| c == v) {
                    ParamValue::Choice(v.to_string())
                } else {
                    ParamValue::Choice(choices.first().cloned().unwrap_or_default())
                }
            }
        }
    }
}

/// Rendering configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("missing parameter: {0}")]
    MissingParameter(String),
    #[error("parameter {name} out of bounds: {value:?}")]
    OutOfBounds { name: String, value: ParamValue },
    #[error("invalid parameter spec for {name}: {reason}")]
    InvalidSpec { name: String, reason: String },
}

/// The parameter schema: which rendering knobs exist and their legal
/// ranges. Pure data; sampling and mutation live in the search layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSpace {
    params: BTreeMap<String, ParamSpec>,
}

impl ConfigSpace {
    /// Build an empty space.
    pub fn new() -> Self {
        Self {
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter spec, replacing any existing one with that name.
    pub fn with_param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    /// Look up one parameter spec.
    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    /// Iterate parameter specs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamSpec)> {
        self.params.iter()
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the space declares no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Check that every declared bound is well-formed.
    pub fn validate_schema(&self) -> Result<(), ConfigError> {
        for (name, spec) in &self.params {
            match spec {
                ParamSpec::Continuous { min, max } => {
                    if !min.is_finite() || !max.is_finite() || min > max {
                        return Err(ConfigError::InvalidSpec {
                            name: name.clone(),
                            reason: format!("bad continuous range [{min}, {max}]"),
                        });
                    }
                }
                ParamSpec::Discrete { min, max } => {
                    if min > max {
                        return Err(ConfigError::InvalidSpec {
                            name: name.clone(),
                            reason: format!("bad discrete range [{min}, {max}]"),
                        });
                    }
                }
                ParamSpec::Categorical { choices } => {
                    if choices.is_empty() {
                        return Err(ConfigError::InvalidSpec {
                            name: name.clone(),
                            reason: "empty choice set".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Check a config against the schema: every declared parameter
    /// present and in bounds, no extras.
    pub fn validate(&self, config: &RenderingConfig) -> Result<(), ConfigError> {
        for (name, _) in config.iter() {
            if !self.params.contains_key(name) {
                return Err(ConfigError::UnknownParameter(name.clone()));
            }
        }
        for (name, spec) in &self.params {
            match config.get(name) {
                None => return Err(ConfigError::MissingParameter(name.clone())),
                Some(value) => {
                    if !spec.contains(value) {
                        return Err(ConfigError::OutOfBounds {
                            name: name.clone(),
                            value: value.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Boolean form of [`ConfigSpace::validate`].
    pub fn is_valid(&self, config: &RenderingConfig) -> bool {
        self.validate(config).is_ok()
    }

    /// Pull one parameter value back into its legal range.
    pub fn clamp(&self, name: &str, value: &ParamValue) -> Option<ParamValue> {
        self.params.get(name).map(|spec| spec.clamp(value))
    }
}

impl Default for ConfigSpace {
    /// The rendering knobs exposed by the text-to-image pipeline: font,
    /// layout, density, color and resolution.
    fn default() -> Self {
        Self::new()
            .with_param(
                "font_family",
                ParamSpec::Categorical {
                    choices: vec![
                        "noto-sans".to_string(),
                        "noto-serif".to_string(),
                        "dejavu-sans-mono".to_string(),
                    ],
                },
            )
            .with_param("font_size", ParamSpec::Continuous { min: 6.0, max: 28.0 })
            .with_param(
                "line_height",
                ParamSpec::Continuous { min: 1.0, max: 2.0 },
            )
            .with_param("margin_pt", ParamSpec::Continuous { min: 2.0, max: 40.0 })
            .with_param("dpi", ParamSpec::Discrete { min: 72, max: 300 })
            .with_param(
                "color_mode",
                ParamSpec::Categorical {
                    choices: vec![
                        "black-on-white".to_string(),
                        "grayscale".to_string(),
                        "high-contrast".to_string(),
                    ],
                },
            )
            .with_param(
                "alignment",
                ParamSpec::Categorical {
                    choices: vec![
                        "left".to_string(),
                        "justify".to_string(),
                        "center".to_string(),
                    ],
                },
            )
            .with_param(
                "horizontal_scale",
                ParamSpec::Continuous { min: 0.6, max: 1.2 },
            )
            .with_param(
                "glyph_density",
                ParamSpec::Continuous { min: 0.2, max: 1.0 },
            )
    }
}
