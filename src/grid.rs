//! Multi-level uniform grid and its sparse cell map.
//!
//! Level 0 is the finest level with `granularity` cells per side; every
//! coarser level halves the cell count until a single cell covers the whole
//! bounds. Cells are created on first registration and evicted once their
//! textual index is empty.

use crate::context::Context;
use crate::dump::CellDump;
use crate::error::Result;
use crate::object::DataObject;
use crate::query::QueryRef;
use crate::textual::{InsertScope, SearchScope, SharedNode, TextualIndex};
use dashmap::DashMap;
use parking_lot::RwLock;
use spatio_fast_types::rect::cell_index;
use spatio_fast_types::{CellSpan, Point, Rectangle};
use std::sync::Arc;

/// Bit offset of the level in a packed cell key.
pub const LEVEL_SHIFT: u32 = 22;

/// Relative shrink applied to a cell's upper bounds so neighbours do not
/// both claim the shared edge.
const CELL_EDGE_EPSILON: f64 = 1e-4;

/// Relative slack applied when clipping a query range to a cell.
const CLIP_SLACK: f64 = 1e-9;

/// Pack `(level, x, y)` into a single map key.
///
/// Collision free while `cells_per_side <= 1024`, which config validation
/// guarantees.
#[inline]
pub fn cell_key(level: u32, x: u32, y: u32, cells_per_side: u32) -> u64 {
    (u64::from(level) << LEVEL_SHIFT) + u64::from(y) * (u64::from(cells_per_side) + 1) + u64::from(x)
}

/// Cell layout of one level.
#[derive(Debug, Clone, Copy)]
pub struct LevelGeometry {
    pub level: u32,
    pub cells_per_side: u32,
    origin: Point,
    step_x: f64,
    step_y: f64,
}

impl LevelGeometry {
    pub fn new(ctx: &Context, level: u32) -> Self {
        let bounds = ctx.bounds();
        let cells_per_side = ctx.granularity_at(level);
        Self {
            level,
            cells_per_side,
            origin: bounds.min(),
            step_x: bounds.width() / f64::from(cells_per_side),
            step_y: bounds.height() / f64::from(cells_per_side),
        }
    }

    /// Cells touched by `range`, clamped into the grid.
    pub fn span(&self, range: &Rectangle) -> CellSpan {
        range.map_to_cells(&self.origin, self.step_x, self.step_y, self.cells_per_side)
    }

    /// Cell holding `point`, clamped into the grid.
    pub fn locate(&self, point: &Point) -> (u32, u32) {
        (
            cell_index(point.x(), self.origin.x(), self.step_x, self.cells_per_side),
            cell_index(point.y(), self.origin.y(), self.step_y, self.cells_per_side),
        )
    }

    pub fn contains_cell(&self, x: u32, y: u32) -> bool {
        x < self.cells_per_side && y < self.cells_per_side
    }

    pub fn key(&self, x: u32, y: u32) -> u64 {
        cell_key(self.level, x, y, self.cells_per_side)
    }

    /// Bounds of cell `(x, y)` with the upper edges pulled in slightly.
    pub fn cell_bounds(&self, x: u32, y: u32) -> Rectangle {
        let min_x = self.origin.x() + f64::from(x) * self.step_x;
        let min_y = self.origin.y() + f64::from(y) * self.step_y;
        Rectangle::new(
            min_x,
            min_y,
            min_x + self.step_x * (1.0 - CELL_EDGE_EPSILON),
            min_y + self.step_y * (1.0 - CELL_EDGE_EPSILON),
        )
    }

    /// Closed region of cell `(x, y)` used to clip ranges pushed to the
    /// next finer level. Covers every point `locate` maps into the cell, so
    /// edge cells extend without bound past the grid bounds.
    pub fn clip_region(&self, x: u32, y: u32) -> Rectangle {
        let (min_x, max_x) = self.clip_axis(x, self.origin.x(), self.step_x);
        let (min_y, max_y) = self.clip_axis(y, self.origin.y(), self.step_y);
        Rectangle::new(min_x, min_y, max_x, max_y)
    }

    fn clip_axis(&self, index: u32, origin: f64, step: f64) -> (f64, f64) {
        let slack = step * CLIP_SLACK;
        let low = origin + f64::from(index) * step;
        let min = if index == 0 { f64::NEG_INFINITY } else { low - slack };
        let max = if index + 1 >= self.cells_per_side {
            f64::INFINITY
        } else {
            low + step + slack
        };
        (min, max)
    }
}

/// One grid cell and its lazily created textual index.
#[derive(Debug)]
pub struct SpatialCell {
    key: u64,
    level: u32,
    x: u32,
    y: u32,
    bounds: Rectangle,
    textual: RwLock<Option<TextualIndex>>,
}

impl SpatialCell {
    fn new(geometry: &LevelGeometry, x: u32, y: u32) -> Self {
        Self {
            key: geometry.key(x, y),
            level: geometry.level,
            x,
            y,
            bounds: geometry.cell_bounds(x, y),
            textual: RwLock::new(None),
        }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn coordinates(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn bounds(&self) -> &Rectangle {
        &self.bounds
    }

    /// Register `query` under `head`. Returns the bucket handle when the
    /// query landed in a fresh single-query list under `head`.
    pub(crate) fn add_query(
        &self,
        head: &str,
        query: &QueryRef,
        scope: &mut InsertScope<'_>,
    ) -> Result<Option<SharedNode>> {
        let mut textual = self.textual.write();
        textual
            .get_or_insert_with(TextualIndex::default)
            .add_query(head, query, scope)
    }

    /// Install a sibling's fresh bucket when this cell has nothing under
    /// `head`; otherwise insert normally.
    pub(crate) fn add_shared_query(
        &self,
        head: &str,
        query: &QueryRef,
        shared: &SharedNode,
        scope: &mut InsertScope<'_>,
    ) -> Result<()> {
        let mut textual = self.textual.write();
        let index = textual.get_or_insert_with(TextualIndex::default);
        if index.install_shared(head, shared, scope) {
            return Ok(());
        }
        index.add_query(head, query, scope).map(|_| ())
    }

    /// Test `object` against the buckets of `remaining`, positions into the
    /// object's sorted keywords; returns the positions still open for the
    /// next finer level.
    pub(crate) fn search(&self, remaining: &[usize], scope: &mut SearchScope<'_>) -> Vec<usize> {
        let textual = self.textual.read();
        match textual.as_ref() {
            Some(index) => index.search(remaining, scope),
            None => remaining.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.textual.read().as_ref().is_none_or(TextualIndex::is_empty)
    }

    pub fn dump(&self) -> CellDump {
        let buckets = self
            .textual
            .read()
            .as_ref()
            .map(TextualIndex::dump)
            .unwrap_or_default();
        CellDump {
            level: self.level,
            x: self.x,
            y: self.y,
            bounds: self.bounds,
            buckets,
        }
    }
}

/// Sparse concurrent map of all cells of all levels.
#[derive(Debug, Default)]
pub struct CellGrid {
    cells: DashMap<u64, Arc<SpatialCell>>,
}

impl CellGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, geometry: &LevelGeometry, x: u32, y: u32) -> Option<Arc<SpatialCell>> {
        if !geometry.contains_cell(x, y) {
            return None;
        }
        self.cells
            .get(&geometry.key(x, y))
            .map(|cell| Arc::clone(cell.value()))
    }

    /// Look up a cell, creating it if absent. Cells outside the level's grid
    /// are never created.
    pub fn get_or_create(&self, geometry: &LevelGeometry, x: u32, y: u32) -> Option<Arc<SpatialCell>> {
        if !geometry.contains_cell(x, y) {
            return None;
        }
        let entry = self.cells.entry(geometry.key(x, y)).or_insert_with(|| {
            log::trace!("Creating cell L{} ({}, {})", geometry.level, x, y);
            Arc::new(SpatialCell::new(geometry, x, y))
        });
        Some(Arc::clone(entry.value()))
    }

    /// Cell of `object` at the given level, if it exists.
    pub fn cell_for(&self, geometry: &LevelGeometry, object: &DataObject) -> Option<Arc<SpatialCell>> {
        let (x, y) = geometry.locate(object.location());
        self.get(geometry, x, y)
    }

    /// Drop the cell at `key` if its textual index is empty.
    pub fn evict_if_empty(&self, key: u64) -> bool {
        let evicted = self.cells.remove_if(&key, |_, cell| cell.is_empty()).is_some();
        if evicted {
            log::debug!("Evicted empty cell {:#x}", key);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All cells, ordered by level then key.
    pub fn snapshot(&self) -> Vec<Arc<SpatialCell>> {
        let mut cells: Vec<Arc<SpatialCell>> =
            self.cells.iter().map(|c| Arc::clone(c.value())).collect();
        cells.sort_by_key(|cell| cell.key());
        cells
    }
}
