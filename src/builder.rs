//! Index builder for flexible configuration
//!
//! Collects bounds and structural tunables, validating everything once in
//! [`IndexBuilder::build`].

use crate::config::IndexConfig;
use crate::error::{FastError, Result};
use crate::index::FastIndex;
use spatio_fast_types::Rectangle;

/// Builder for a [`FastIndex`].
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    bounds: Option<Rectangle>,
    config: IndexConfig,
}

impl IndexBuilder {
    /// Create a new builder with the default configuration and no bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Area covered by the grid. Objects outside it are clamped to edge cells.
    pub fn bounds(mut self, bounds: Rectangle) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn granularity(mut self, granularity: u32) -> Self {
        self.config.granularity = granularity;
        self
    }

    pub fn max_level(mut self, max_level: u32) -> Self {
        self.config.max_level = Some(max_level);
        self
    }

    pub fn trie_split_threshold(mut self, threshold: usize) -> Self {
        self.config.trie_split_threshold = threshold;
        self
    }

    pub fn degradation_ratio(mut self, ratio: usize) -> Self {
        self.config.degradation_ratio = ratio;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the index.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when no bounds were given or the configuration does not
    /// validate.
    pub fn build(self) -> Result<FastIndex> {
        let bounds = self
            .bounds
            .ok_or_else(|| FastError::InvalidConfig("index bounds are required".to_string()))?;
        FastIndex::with_config(bounds, self.config)
    }
}
