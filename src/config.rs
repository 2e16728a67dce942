//! Index configuration.
//!
//! Holds the structural tunables of one index: grid granularity, number of
//! levels and the list/trie thresholds of the per-cell textual index.

use crate::error::{FastError, Result};
use serde::{Deserialize, Serialize};

/// Largest supported granularity. Cell keys pack `y * (cells + 1) + x` below
/// bit 22, which stays collision free up to 1024 cells per side.
pub const MAX_GRANULARITY: u32 = 1024;

/// Largest supported level number.
pub const MAX_LEVEL: u32 = 40;

/// Index configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Cells per side at the finest level (level 0). Must be a power of two.
    #[serde(default = "IndexConfig::default_granularity")]
    pub granularity: u32,

    /// Coarsest level; defaults to `log2(granularity)`.
    #[serde(default)]
    pub max_level: Option<u32>,

    /// List size at which a keyword bucket is promoted to a trie
    #[serde(default = "IndexConfig::default_trie_split_threshold")]
    pub trie_split_threshold: usize,

    /// Terminal range queries a trie node may hold before half of them are
    /// pushed one level finer
    #[serde(default = "IndexConfig::default_degradation_ratio")]
    pub degradation_ratio: usize,
}

impl IndexConfig {
    const fn default_granularity() -> u32 {
        128
    }

    const fn default_trie_split_threshold() -> usize {
        5
    }

    const fn default_degradation_ratio() -> usize {
        10
    }

    pub fn with_granularity(mut self, granularity: u32) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = Some(max_level);
        self
    }

    pub fn with_trie_split_threshold(mut self, threshold: usize) -> Self {
        assert!(threshold > 0, "Trie split threshold must be greater than zero");
        self.trie_split_threshold = threshold;
        self
    }

    pub fn with_degradation_ratio(mut self, ratio: usize) -> Self {
        assert!(ratio > 0, "Degradation ratio must be greater than zero");
        self.degradation_ratio = ratio;
        self
    }

    /// The coarsest level actually used by the index.
    pub fn effective_max_level(&self) -> u32 {
        self.max_level.unwrap_or_else(|| self.granularity.max(1).ilog2())
    }

    pub fn validate(&self) -> Result<()> {
        if self.granularity == 0 || !self.granularity.is_power_of_two() {
            return Err(FastError::InvalidConfig(format!(
                "granularity must be a power of two, got {}",
                self.granularity
            )));
        }
        if self.granularity > MAX_GRANULARITY {
            return Err(FastError::InvalidConfig(format!(
                "granularity {} exceeds the supported maximum of {}",
                self.granularity, MAX_GRANULARITY
            )));
        }
        if self.effective_max_level() > MAX_LEVEL {
            return Err(FastError::InvalidConfig(format!(
                "max level {} exceeds the supported maximum of {}",
                self.effective_max_level(),
                MAX_LEVEL
            )));
        }
        if self.trie_split_threshold == 0 {
            return Err(FastError::InvalidConfig(
                "trie split threshold must be greater than zero".to_string(),
            ));
        }
        if self.degradation_ratio == 0 {
            return Err(FastError::InvalidConfig(
                "degradation ratio must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: IndexConfig =
            toml::from_str(toml_str).map_err(|e| FastError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FastError::InvalidConfig(e.to_string()))
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            granularity: Self::default_granularity(),
            max_level: None,
            trie_split_threshold: Self::default_trie_split_threshold(),
            degradation_ratio: Self::default_degradation_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_max_level(), 7);
    }

    #[test]
    fn test_max_level_defaults_to_log2() {
        assert_eq!(IndexConfig::default().with_granularity(8).effective_max_level(), 3);
        assert_eq!(IndexConfig::default().with_granularity(1).effective_max_level(), 0);
        assert_eq!(
            IndexConfig::default()
                .with_granularity(2)
                .with_max_level(2)
                .effective_max_level(),
            2
        );
    }

    #[test]
    fn test_rejects_bad_granularity() {
        for granularity in [0, 3, 12, 2048] {
            let config = IndexConfig::default().with_granularity(granularity);
            assert!(
                matches!(config.validate(), Err(FastError::InvalidConfig(_))),
                "granularity {} should be rejected",
                granularity
            );
        }
    }

    #[test]
    fn test_rejects_zero_thresholds() {
        let mut config = IndexConfig::default();
        config.trie_split_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = IndexConfig::default();
        config.degradation_ratio = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[should_panic(expected = "Trie split threshold must be greater than zero")]
    fn test_with_trie_split_threshold_zero_panics() {
        let _ = IndexConfig::default().with_trie_split_threshold(0);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = IndexConfig::default()
            .with_granularity(64)
            .with_trie_split_threshold(3);
        let json = config.to_json().unwrap();
        let back = IndexConfig::from_json(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_config_json_defaults_and_unknown_fields() {
        let config = IndexConfig::from_json(r#"{"granularity": 16}"#).unwrap();
        assert_eq!(config.granularity, 16);
        assert_eq!(config.trie_split_threshold, 5);
        assert_eq!(config.degradation_ratio, 10);

        assert!(IndexConfig::from_json(r#"{"granularity": 16, "bogus": 1}"#).is_err());
        assert!(IndexConfig::from_json(r#"{"granularity": 6}"#).is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_config_toml() {
        let config = IndexConfig::from_toml("granularity = 32\ndegradation_ratio = 4\n").unwrap();
        assert_eq!(config.granularity, 32);
        assert_eq!(config.degradation_ratio, 4);
    }
}
