//! Structural counters kept by every index.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated with relaxed atomics from registration and search.
#[derive(Debug, Default)]
pub struct StatsCounters {
    pub(crate) hash_entries: AtomicU64,
    pub(crate) trie_nodes: AtomicU64,
    pub(crate) textual_insertions: AtomicU64,
    pub(crate) search_hash_accesses: AtomicU64,
    pub(crate) search_trie_accesses: AtomicU64,
    pub(crate) list_entries_scanned: AtomicU64,
    pub(crate) trie_entries_scanned: AtomicU64,
    pub(crate) reinserted_queries: AtomicU64,
    pub(crate) expired_queries: AtomicU64,
}

impl StatsCounters {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of the index counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Registration calls so far.
    pub registrations: u64,
    /// Search calls so far.
    pub searches: u64,
    /// Live cells across all levels.
    pub cells: usize,
    /// Keyword buckets created in cell hash maps.
    pub hash_entries: u64,
    /// Trie nodes created by promotion or split.
    pub trie_nodes: u64,
    /// Query placements into textual nodes, cascade placements included.
    pub textual_insertions: u64,
    /// Keyword bucket lookups performed by searches.
    pub search_hash_accesses: u64,
    /// Trie nodes visited by searches.
    pub search_trie_accesses: u64,
    pub list_entries_scanned: u64,
    pub trie_entries_scanned: u64,
    /// Queries pushed one level finer by degradation.
    pub reinserted_queries: u64,
    /// Queries reaped after expiring.
    pub expired_queries: u64,
}

impl IndexStats {
    pub(crate) fn collect(counters: &StatsCounters, registrations: u64, searches: u64, cells: usize) -> Self {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Self {
            registrations,
            searches,
            cells,
            hash_entries: load(&counters.hash_entries),
            trie_nodes: load(&counters.trie_nodes),
            textual_insertions: load(&counters.textual_insertions),
            search_hash_accesses: load(&counters.search_hash_accesses),
            search_trie_accesses: load(&counters.search_trie_accesses),
            list_entries_scanned: load(&counters.list_entries_scanned),
            trie_entries_scanned: load(&counters.trie_entries_scanned),
            reinserted_queries: load(&counters.reinserted_queries),
            expired_queries: load(&counters.expired_queries),
        }
    }

    /// Entries scanned per search, lists and tries together.
    pub fn scanned_per_search(&self) -> f64 {
        if self.searches == 0 {
            return 0.0;
        }
        (self.list_entries_scanned + self.trie_entries_scanned) as f64 / self.searches as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_snapshot() {
        let counters = StatsCounters::default();
        StatsCounters::bump(&counters.trie_nodes);
        StatsCounters::add(&counters.list_entries_scanned, 6);
        StatsCounters::add(&counters.trie_entries_scanned, 2);

        let stats = IndexStats::collect(&counters, 3, 4, 7);
        assert_eq!(stats.registrations, 3);
        assert_eq!(stats.cells, 7);
        assert_eq!(stats.trie_nodes, 1);
        assert_eq!(stats.scanned_per_search(), 2.0);
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(IndexStats::default().scanned_per_search(), 0.0);
    }
}
