//! Printable and serializable snapshots of the index structure.

use crate::error::Result;
use crate::query::QueryId;
use serde::Serialize;
use spatio_fast_types::Rectangle;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    List,
    Trie,
}

/// One keyword bucket or trie child.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDump {
    pub keyword: String,
    pub kind: NodeKind,
    /// Live queries held by the node itself.
    pub queries: Vec<QueryId>,
    /// Trie children, sorted by keyword. Always empty for lists.
    pub children: Vec<NodeDump>,
}

impl NodeDump {
    /// Whether `id` is held by this node or any node below it.
    pub fn holds(&self, id: QueryId) -> bool {
        self.queries.contains(&id) || self.children.iter().any(|child| child.holds(id))
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "|  ".repeat(depth);
        let ids: Vec<String> = self.queries.iter().map(u64::to_string).collect();
        let marker = match self.kind {
            NodeKind::List => "",
            NodeKind::Trie => " (trie)",
        };
        writeln!(f, "{}|──{}{} -> [{}]", indent, self.keyword, marker, ids.join(", "))?;
        for child in &self.children {
            child.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CellDump {
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub bounds: Rectangle,
    pub buckets: Vec<NodeDump>,
}

impl CellDump {
    pub fn holds(&self, id: QueryId) -> bool {
        self.buckets.iter().any(|bucket| bucket.holds(id))
    }
}

/// Snapshot of every live cell, coarsest level first.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDump {
    pub bounds: Rectangle,
    pub granularity: u32,
    pub max_level: u32,
    pub cells: Vec<CellDump>,
}

impl IndexDump {
    /// Levels at which the query is currently stored, coarsest first.
    pub fn levels_of(&self, id: QueryId) -> Vec<u32> {
        let mut levels: Vec<u32> = self
            .cells
            .iter()
            .filter(|cell| cell.holds(id))
            .map(|cell| cell.level)
            .collect();
        levels.sort_unstable_by(|a, b| b.cmp(a));
        levels.dedup();
        levels
    }

    pub fn cells_at(&self, level: u32) -> impl Iterator<Item = &CellDump> {
        self.cells.iter().filter(move |cell| cell.level == level)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for IndexDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Index {} granularity={} max_level={}",
            self.bounds, self.granularity, self.max_level
        )?;
        for cell in &self.cells {
            writeln!(f, "Cell L{} ({}, {}) {}", cell.level, cell.x, cell.y, cell.bounds)?;
            for bucket in &cell.buckets {
                bucket.write_tree(f, 0)?;
            }
        }
        Ok(())
    }
}
