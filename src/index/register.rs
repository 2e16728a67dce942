//! Query registration: the coarse-to-fine level cascade.

use super::FastIndex;
use crate::error::{FastError, Result};
use crate::grid::LevelGeometry;
use crate::query::{ContinuousQuery, QueryRef};
use crate::textual::{InsertScope, ReinsertEntry, SharedNode};
use std::sync::Arc;

impl FastIndex {
    /// Register a continuous query.
    ///
    /// The query enters at the coarsest level under the head keyword picked by
    /// the frequency heuristic. Range queries overflowing a trie node are
    /// pushed to finer levels, restricted to the evicting cell, until nothing
    /// overflows or level 0 is reached.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` for queries without keywords, k-NN queries with `k == 0`
    /// and non-finite geometry, before anything is mutated. `InvalidState` if
    /// a cell's textual index turns out to be corrupted.
    pub fn register_query(&self, query: impl Into<ContinuousQuery>) -> Result<QueryRef> {
        let query: QueryRef = Arc::new(query.into());
        query.validate()?;

        let now = self.context.tick_query_clock();
        let mut level = self.context.max_level();
        let mut working = vec![ReinsertEntry {
            range: query.registration_range(self.context.bounds()),
            query: Arc::clone(&query),
            keyword: None,
        }];

        loop {
            let geometry = LevelGeometry::new(&self.context, level);
            let mut next = Vec::new();
            for entry in working.drain(..) {
                self.place_entry(&geometry, &entry, now, &mut next)?;
            }
            if next.is_empty() || level == 0 {
                break;
            }
            log::trace!(
                "Query {}: {} entries cascade to L{}",
                query.id(),
                next.len(),
                level - 1
            );
            working = next;
            level -= 1;
        }

        Ok(query)
    }

    /// Insert one entry into every cell of `geometry` its range overlaps,
    /// collecting the entries those cells push one level finer.
    fn place_entry(
        &self,
        geometry: &LevelGeometry,
        entry: &ReinsertEntry,
        now: u64,
        next: &mut Vec<ReinsertEntry>,
    ) -> Result<()> {
        let head = match &entry.keyword {
            Some(keyword) => keyword.clone(),
            None => self
                .context
                .select_head_keyword(entry.query.keywords())
                .ok_or_else(|| FastError::InvalidQuery(format!("query {} has no keywords", entry.query.id())))?,
        };
        let pinned = entry.keyword.is_some();

        let span = geometry.span(&entry.range);
        self.context.record_inserted_level(geometry.level);

        let mut shared: Option<SharedNode> = None;
        let mut first = true;
        for (x, y) in span.cells() {
            let region = geometry.clip_region(x, y);
            if !region.overlaps(&entry.range) {
                continue;
            }
            let Some(cell) = self.grid.get_or_create(geometry, x, y) else {
                continue;
            };

            let mut scope = InsertScope::new(&self.context, region, geometry.level, now, pinned);
            let outcome = if first {
                first = false;
                cell.add_query(&head, &entry.query, &mut scope)
                    .map(|handle| shared = handle)
            } else if let Some(handle) = &shared {
                cell.add_shared_query(&head, &entry.query, handle, &mut scope)
            } else {
                cell.add_query(&head, &entry.query, &mut scope).map(|_| ())
            };

            self.context.settle_reaped(&scope.reaped);
            self.grid.evict_if_empty(cell.key());
            if let Err(err) = outcome {
                log::warn!(
                    "Registration of query {} failed in cell L{} ({}, {}): {}",
                    entry.query.id(),
                    geometry.level,
                    x,
                    y,
                    err
                );
                return Err(err);
            }
            next.append(&mut scope.reinserts);
        }
        Ok(())
    }
}
