//! Engine configuration.
//!
//! Loaded from JSON (or TOML with the `toml` feature) or assembled with the
//! `with_*` builders. Every field has a default, so an empty document is valid.
use serde::de::Error;

pub use zonemap_types::bbox::BoundingBox2D;

/// Tolerance used by every geometric predicate for boundary and collinearity
/// decisions, in coordinate units.
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Engine configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "Config::default_epsilon")]
    pub epsilon: f64,

    /// Municipal bounds. Points and polygon vertices outside are rejected.
    #[serde(default)]
    pub envelope: Option<BoundingBox2D>,

    #[serde(default)]
    pub index: IndexConfig,
}

/// Spatial index tuning
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Node fan-out; a node splits when it would exceed this.
    #[serde(default = "IndexConfig::default_max_entries")]
    pub max_entries: usize,

    /// Average leaf fill below which the tree is rebuilt.
    #[serde(default = "IndexConfig::default_min_fill_ratio")]
    pub min_fill_ratio: f64,

    /// Removals since the last rebuild before the fill ratio is considered.
    #[serde(default = "IndexConfig::default_rebuild_min_removals")]
    pub rebuild_min_removals: usize,
}

impl IndexConfig {
    const fn default_max_entries() -> usize {
        16
    }

    const fn default_min_fill_ratio() -> f64 {
        0.35
    }

    const fn default_rebuild_min_removals() -> usize {
        64
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        assert!(max_entries >= 4, "Index fan-out must be at least 4");
        self.max_entries = max_entries;
        self
    }

    pub fn with_min_fill_ratio(mut self, ratio: f64) -> Self {
        assert!(
            ratio > 0.0 && ratio < 1.0,
            "Fill ratio must be between 0 and 1"
        );
        self.min_fill_ratio = ratio;
        self
    }

    pub fn with_rebuild_min_removals(mut self, removals: usize) -> Self {
        self.rebuild_min_removals = removals;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries < 4 {
            return Err(format!(
                "Index fan-out must be at least 4, got {}",
                self.max_entries
            ));
        }
        if !(self.min_fill_ratio > 0.0 && self.min_fill_ratio < 1.0) {
            return Err(format!(
                "Fill ratio must be between 0 and 1, got {}",
                self.min_fill_ratio
            ));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_entries: Self::default_max_entries(),
            min_fill_ratio: Self::default_min_fill_ratio(),
            rebuild_min_removals: Self::default_rebuild_min_removals(),
        }
    }
}

impl Config {
    const fn default_epsilon() -> f64 {
        DEFAULT_EPSILON
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        assert!(
            epsilon.is_finite() && epsilon > 0.0,
            "Epsilon must be positive and finite"
        );
        self.epsilon = epsilon;
        self
    }

    pub fn with_envelope(mut self, envelope: BoundingBox2D) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(format!(
                "Epsilon must be positive and finite, got {}",
                self.epsilon
            ));
        }

        if let Some(envelope) = &self.envelope
            && (!envelope.is_finite() || envelope.area() <= 0.0)
        {
            return Err("Municipal envelope must be finite with positive area".to_string());
        }

        self.index.validate()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            epsilon: Self::default_epsilon(),
            envelope: None,
            index: IndexConfig::default(),
        }
    }
}
