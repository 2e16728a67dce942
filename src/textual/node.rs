//! List and trie nodes of the per-cell textual index.

use crate::dump::{NodeDump, NodeKind};
use crate::query::QueryRef;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Handle to a top-level keyword bucket. Buckets may be shared between the
/// cells of one registration span; mutation goes through `Arc::make_mut`.
pub type SharedNode = Arc<TextualNode>;

#[derive(Debug, Clone)]
pub enum TextualNode {
    List(ListNode),
    Trie(TrieNode),
}

impl TextualNode {
    pub(crate) fn single(query: &QueryRef) -> Self {
        Self::List(ListNode {
            queries: vec![Arc::clone(query)],
        })
    }

    pub fn is_trie(&self) -> bool {
        matches!(self, Self::Trie(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::List(list) => list.queries.len(),
            Self::Trie(trie) => trie.queries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn dump(&self, keyword: &str) -> NodeDump {
        match self {
            Self::List(list) => NodeDump {
                keyword: keyword.to_string(),
                kind: NodeKind::List,
                queries: live_ids(&list.queries),
                children: Vec::new(),
            },
            Self::Trie(trie) => {
                let mut children: Vec<NodeDump> = trie
                    .children
                    .iter()
                    .map(|(child_keyword, child)| child.dump(child_keyword))
                    .collect();
                children.sort_by(|a, b| a.keyword.cmp(&b.keyword));
                NodeDump {
                    keyword: keyword.to_string(),
                    kind: NodeKind::Trie,
                    queries: live_ids(&trie.queries),
                    children,
                }
            }
        }
    }
}

fn live_ids(queries: &[QueryRef]) -> Vec<u64> {
    queries
        .iter()
        .filter(|q| !q.is_deleted())
        .map(|q| q.id())
        .collect()
}

/// Flat bucket of queries.
#[derive(Debug, Clone, Default)]
pub struct ListNode {
    pub(crate) queries: Vec<QueryRef>,
}

impl ListNode {
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub(crate) fn contains(&self, query: &QueryRef) -> bool {
        contains(&self.queries, query)
    }

    pub(crate) fn has_dead(&self, now: u64) -> bool {
        self.queries
            .iter()
            .any(|q| q.is_deleted() || q.is_expired(now))
    }
}

/// Queries terminating at this keyword path plus the next-keyword children.
#[derive(Debug, Clone, Default)]
pub struct TrieNode {
    pub(crate) queries: Vec<QueryRef>,
    pub(crate) children: FxHashMap<String, TextualNode>,
}

impl TrieNode {
    pub fn terminal_len(&self) -> usize {
        self.queries.len()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn contains(&self, query: &QueryRef) -> bool {
        contains(&self.queries, query)
    }

    /// Terminal range queries; the only ones degradation may move.
    pub(crate) fn range_query_count(&self) -> usize {
        self.queries.iter().filter(|q| q.is_range()).count()
    }
}

#[inline]
pub(crate) fn contains(queries: &[QueryRef], query: &QueryRef) -> bool {
    queries.iter().any(|q| Arc::ptr_eq(q, query))
}
