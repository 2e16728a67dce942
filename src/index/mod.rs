//! The continuous query index.
//!
//! `FastIndex` owns one [`Context`] and one [`CellGrid`]. Queries are
//! registered once and then tested against every searched object until they
//! expire; expired queries are reaped lazily by whichever scan touches them.
//!
//! ```rust
//! use spatio_fast::{DataObject, FastIndex, Point, RangeQuery, Rectangle};
//!
//! let index = FastIndex::new(Rectangle::new(0.0, 0.0, 10.0, 10.0), 8)?;
//! index.register_query(RangeQuery::new(1, ["coffee"], Rectangle::new(2.0, 2.0, 4.0, 4.0), 100))?;
//!
//! let hits = index.search_object(&DataObject::new(7, ["coffee", "wifi"], Point::new(3.0, 3.0)));
//! assert_eq!(hits.len(), 1);
//! # Ok::<(), spatio_fast::FastError>(())
//! ```
//!
//! # Thread Safety
//!
//! `FastIndex` is `Send + Sync` and every operation takes `&self`. Searches
//! run in parallel under per-cell read locks. Registrations lock one cell at a
//! time; a registration racing with another registration on the same cell may
//! see that cell evicted underneath it, so callers feeding queries from
//! several threads should serialize registrations (single writer, many
//! readers).

mod register;
mod search;

pub use crate::textual::ReinsertEntry;

use crate::builder::IndexBuilder;
use crate::config::IndexConfig;
use crate::context::{Context, KeywordFrequency};
use crate::dump::{CellDump, IndexDump};
use crate::error::Result;
use crate::grid::CellGrid;
use crate::stats::IndexStats;
use spatio_fast_types::Rectangle;
use std::cmp::Reverse;

#[derive(Debug)]
pub struct FastIndex {
    context: Context,
    grid: CellGrid,
}

impl FastIndex {
    /// Index over `bounds` with `granularity` cells per side at the finest
    /// level and default thresholds.
    pub fn new(bounds: Rectangle, granularity: u32) -> Result<Self> {
        Self::with_config(bounds, IndexConfig::default().with_granularity(granularity))
    }

    pub fn with_config(bounds: Rectangle, config: IndexConfig) -> Result<Self> {
        let context = Context::new(bounds, &config)?;
        log::debug!(
            "Created index over {} (granularity {}, max level {}, split {}, degrade {})",
            bounds,
            context.granularity(),
            context.max_level(),
            context.trie_split_threshold(),
            context.degradation_ratio()
        );
        Ok(Self {
            context,
            grid: CellGrid::new(),
        })
    }

    pub fn builder() -> IndexBuilder {
        IndexBuilder::new()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn bounds(&self) -> &Rectangle {
        self.context.bounds()
    }

    /// Number of live cells across all levels.
    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    /// Snapshot of every live cell and its buckets.
    pub fn dump_index(&self) -> IndexDump {
        let mut cells: Vec<CellDump> = self.grid.snapshot().iter().map(|cell| cell.dump()).collect();
        cells.sort_by_key(|cell| (Reverse(cell.level), cell.y, cell.x));
        IndexDump {
            bounds: *self.context.bounds(),
            granularity: self.context.granularity(),
            max_level: self.context.max_level(),
            cells,
        }
    }

    /// Keyword frequencies sorted by keyword.
    pub fn keyword_frequencies(&self) -> Vec<(String, KeywordFrequency)> {
        self.context.keyword_frequencies()
    }

    pub fn stats(&self) -> IndexStats {
        self.context.snapshot_stats(self.grid.len())
    }
}
