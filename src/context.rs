//! Per-index shared state: structural parameters, logical clocks, level
//! watermarks, keyword frequencies and statistics counters.
//!
//! One `Context` is owned by each index and passed explicitly into the grid
//! and textual operations. Everything mutable in here is atomic or lives in a
//! `DashMap`, so it can be shared by concurrent searches. Callers must not hold
//! a cell lock while calling the frequency methods.

use crate::config::IndexConfig;
use crate::error::{FastError, Result};
use crate::keywords::Keywords;
use crate::query::{ContinuousQuery, QueryRef};
use crate::stats::{IndexStats, StatsCounters};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use spatio_fast_types::Rectangle;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

/// Usage counters of one keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordFrequency {
    /// Live registrations carrying this keyword, as seen by the heuristic.
    pub registration_count: u64,
    /// Bucket hits by searches.
    pub visit_count: u64,
    /// Object clock value when the entry was created.
    pub last_decay_timestamp: u64,
}

impl KeywordFrequency {
    fn new(timestamp: u64) -> Self {
        Self {
            registration_count: 0,
            visit_count: 0,
            last_decay_timestamp: timestamp,
        }
    }
}

#[derive(Debug)]
pub struct Context {
    bounds: Rectangle,
    granularity: u32,
    max_level: u32,
    trie_split_threshold: usize,
    degradation_ratio: usize,
    query_clock: AtomicU64,
    object_clock: AtomicU64,
    /// `i32::MAX` while nothing was inserted.
    min_inserted_level: AtomicI32,
    /// `-1` while nothing was inserted.
    max_inserted_level: AtomicI32,
    frequencies: DashMap<String, KeywordFrequency>,
    pub(crate) stats: StatsCounters,
}

impl Context {
    pub fn new(bounds: Rectangle, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        if !bounds.is_finite() || bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return Err(FastError::InvalidConfig(format!(
                "index bounds must be finite with positive extent, got {}",
                bounds
            )));
        }

        Ok(Self {
            bounds,
            granularity: config.granularity,
            max_level: config.effective_max_level(),
            trie_split_threshold: config.trie_split_threshold,
            degradation_ratio: config.degradation_ratio,
            query_clock: AtomicU64::new(0),
            object_clock: AtomicU64::new(0),
            min_inserted_level: AtomicI32::new(i32::MAX),
            max_inserted_level: AtomicI32::new(-1),
            frequencies: DashMap::new(),
            stats: StatsCounters::default(),
        })
    }

    pub fn bounds(&self) -> &Rectangle {
        &self.bounds
    }

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Cells per side at `level`. Never below one.
    pub fn granularity_at(&self, level: u32) -> u32 {
        self.granularity.checked_shr(level).unwrap_or(0).max(1)
    }

    pub fn trie_split_threshold(&self) -> usize {
        self.trie_split_threshold
    }

    pub fn degradation_ratio(&self) -> usize {
        self.degradation_ratio
    }

    pub fn query_clock(&self) -> u64 {
        self.query_clock.load(Ordering::Acquire)
    }

    pub fn object_clock(&self) -> u64 {
        self.object_clock.load(Ordering::Acquire)
    }

    /// Advance the query clock; returns the new value.
    pub(crate) fn tick_query_clock(&self) -> u64 {
        self.query_clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Advance the object clock; returns the new value.
    pub(crate) fn tick_object_clock(&self) -> u64 {
        self.object_clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn record_inserted_level(&self, level: u32) {
        let level = level as i32;
        self.min_inserted_level.fetch_min(level, Ordering::AcqRel);
        self.max_inserted_level.fetch_max(level, Ordering::AcqRel);
    }

    /// `(min, max)` of the levels that ever received a query.
    pub fn inserted_levels(&self) -> Option<(u32, u32)> {
        let max = self.max_inserted_level.load(Ordering::Acquire);
        let min = self.min_inserted_level.load(Ordering::Acquire);
        if max < 0 || min > max {
            return None;
        }
        Some((min as u32, max as u32))
    }

    /// Finest level in use, or `-1` when nothing was inserted.
    pub fn min_inserted_level(&self) -> i32 {
        self.inserted_levels().map_or(-1, |(min, _)| min as i32)
    }

    /// Coarsest level in use, or `-1` when nothing was inserted.
    pub fn max_inserted_level(&self) -> i32 {
        self.max_inserted_level.load(Ordering::Acquire)
    }

    /// Pick the head keyword of a fresh registration and count the query
    /// against every one of its keywords.
    ///
    /// The winner is the first keyword with the lowest registration count
    /// (unseen keywords count as zero), read before this query's own
    /// contribution is added.
    pub(crate) fn select_head_keyword(&self, keywords: &Keywords) -> Option<String> {
        let mut best: Option<(&str, u64)> = None;
        for keyword in keywords {
            let priority = self
                .frequencies
                .get(keyword.as_str())
                .map_or(0, |f| f.registration_count);
            if best.is_none_or(|(_, current)| priority < current) {
                best = Some((keyword, priority));
            }
        }

        let now = self.object_clock();
        for keyword in keywords {
            self.frequencies
                .entry(keyword.clone())
                .or_insert_with(|| KeywordFrequency::new(now))
                .registration_count += 1;
        }

        best.map(|(keyword, _)| keyword.to_string())
    }

    /// Undo the frequency contribution of a query. Called once per query, by
    /// whoever flipped its deleted flag.
    pub(crate) fn retract(&self, query: &ContinuousQuery) {
        for keyword in query.keywords() {
            if let Some(mut frequency) = self.frequencies.get_mut(keyword.as_str()) {
                frequency.registration_count = frequency.registration_count.saturating_sub(1);
            }
        }
    }

    /// Retract queries reaped during a scan, after the cell lock was released.
    pub(crate) fn settle_reaped(&self, reaped: &[QueryRef]) {
        for query in reaped {
            self.retract(query);
            log::trace!("Reaped expired query {}", query.id());
        }
        StatsCounters::add(&self.stats.expired_queries, reaped.len());
    }

    /// Count search hits on keyword buckets. Unknown keywords are ignored.
    pub(crate) fn record_visits(&self, keywords: &[String]) {
        for keyword in keywords {
            if let Some(mut frequency) = self.frequencies.get_mut(keyword.as_str()) {
                frequency.visit_count += 1;
            }
        }
    }

    pub fn keyword_frequency(&self, keyword: &str) -> Option<KeywordFrequency> {
        self.frequencies.get(keyword).map(|f| *f)
    }

    /// All keyword frequencies, sorted by keyword.
    pub fn keyword_frequencies(&self) -> Vec<(String, KeywordFrequency)> {
        let mut all: Vec<(String, KeywordFrequency)> = self
            .frequencies
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub(crate) fn snapshot_stats(&self, cells: usize) -> IndexStats {
        IndexStats::collect(&self.stats, self.query_clock(), self.object_clock(), cells)
    }
}
