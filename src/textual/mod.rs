//! Per-cell adaptive textual index.
//!
//! Every cell maps keywords to buckets. A bucket starts as a flat list and is
//! promoted to a trie once it reaches the split threshold; trie paths follow
//! the sorted keyword order of the queries below them and are always rooted
//! at a query's first keyword. A trie node holding too many terminal range
//! queries hands half of them back as [`ReinsertEntry`]s for the next finer
//! level.
//!
//! Cells below the coarsest level only ever receive cascaded queries, pinned
//! to the root keyword they were evicted from. At those levels alternates are
//! never tried and only the root bucket is promoted, which keeps every query
//! reachable from the keyword the search carries down.

mod node;

pub use node::{ListNode, SharedNode, TextualNode, TrieNode};

use crate::context::Context;
use crate::dump::NodeDump;
use crate::error::{FastError, Result};
use crate::object::DataObject;
use crate::query::QueryRef;
use crate::stats::StatsCounters;
use rustc_hash::{FxHashMap, FxHashSet};
use spatio_fast_types::Rectangle;
use std::collections::VecDeque;
use std::sync::Arc;

/// A query pushed to the next finer level, restricted to the part of its
/// range covered by the cell that evicted it.
#[derive(Debug, Clone)]
pub struct ReinsertEntry {
    pub range: Rectangle,
    pub query: QueryRef,
    /// Root keyword of the trie the query was evicted from; `None` for a
    /// fresh registration.
    pub keyword: Option<String>,
}

/// Mutable state of one insertion into one cell.
pub struct InsertScope<'a> {
    ctx: &'a Context,
    clip: Rectangle,
    level: u32,
    now: u64,
    pinned: bool,
    pub(crate) reinserts: Vec<ReinsertEntry>,
    /// Queries whose deleted flag this scope flipped. Retracted by the
    /// caller once the cell lock is released.
    pub(crate) reaped: Vec<QueryRef>,
}

impl<'a> InsertScope<'a> {
    pub(crate) fn new(ctx: &'a Context, clip: Rectangle, level: u32, now: u64, pinned: bool) -> Self {
        Self {
            ctx,
            clip,
            level,
            now,
            pinned,
            reinserts: Vec::new(),
            reaped: Vec::new(),
        }
    }

    fn threshold(&self) -> usize {
        self.ctx.trie_split_threshold()
    }

    fn stats(&self) -> &StatsCounters {
        &self.ctx.stats
    }

    /// Drop deleted and expired members, flipping the flag of the latter.
    fn reap(&mut self, queries: &mut Vec<QueryRef>) {
        let now = self.now;
        let reaped = &mut self.reaped;
        queries.retain(|query| {
            if query.is_deleted() {
                return false;
            }
            if query.is_expired(now) {
                if query.mark_deleted() {
                    reaped.push(Arc::clone(query));
                }
                return false;
            }
            true
        });
    }
}

/// Mutable state of one object search across all levels.
pub struct SearchScope<'a> {
    ctx: &'a Context,
    object: &'a DataObject,
    now: u64,
    seen: FxHashSet<usize>,
    pub(crate) matches: Vec<QueryRef>,
    pub(crate) reaped: Vec<QueryRef>,
    /// Keywords whose bucket was hit, for the visit counters.
    pub(crate) visited: Vec<String>,
}

impl<'a> SearchScope<'a> {
    pub(crate) fn new(ctx: &'a Context, object: &'a DataObject, now: u64) -> Self {
        Self {
            ctx,
            object,
            now,
            seen: FxHashSet::default(),
            matches: Vec::new(),
            reaped: Vec::new(),
            visited: Vec::new(),
        }
    }

    fn scan(&mut self, queries: &[QueryRef], in_trie: bool) {
        let counter = if in_trie {
            &self.ctx.stats.trie_entries_scanned
        } else {
            &self.ctx.stats.list_entries_scanned
        };
        StatsCounters::add(counter, queries.len());
        for query in queries {
            self.consider(query);
        }
    }

    fn consider(&mut self, query: &QueryRef) {
        // k-NN admission is stateful, so every query is tested at most once
        if !self.seen.insert(Arc::as_ptr(query) as usize) || query.is_deleted() {
            return;
        }
        if query.is_expired(self.now) {
            if query.mark_deleted() {
                self.reaped.push(Arc::clone(query));
            }
            return;
        }
        if query.matches(self.object) {
            self.matches.push(Arc::clone(query));
        }
    }

    /// Visit every trie node whose path is a subsequence of the object's
    /// keywords, starting at keyword position `from`.
    fn walk(&mut self, node: &TrieNode, from: usize) {
        StatsCounters::bump(&self.ctx.stats.search_trie_accesses);
        self.scan(&node.queries, true);

        let object = self.object;
        let keywords = object.keywords().as_slice();
        for (position, keyword) in keywords.iter().enumerate().skip(from) {
            match node.children.get(keyword.as_str()) {
                Some(TextualNode::List(list)) => self.scan(&list.queries, true),
                Some(TextualNode::Trie(child)) => self.walk(child, position + 1),
                None => {}
            }
        }
    }
}

enum Slot {
    /// New single-query list.
    Fresh,
    /// Appended to, or already present in, an existing list.
    Placed,
    /// Bucket is a trie or a full list.
    Full,
}

#[derive(Debug, Default)]
pub struct TextualIndex {
    buckets: FxHashMap<String, SharedNode>,
}

impl TextualIndex {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket(&self, keyword: &str) -> Option<&TextualNode> {
        self.buckets.get(keyword).map(|node| node.as_ref())
    }

    /// Register `query` under `head`, re-placing any queries displaced by
    /// promotions. Returns the bucket handle when the query landed in a fresh
    /// list under `head`.
    pub(crate) fn add_query(
        &mut self,
        head: &str,
        query: &QueryRef,
        scope: &mut InsertScope<'_>,
    ) -> Result<Option<SharedNode>> {
        let mut shared = None;
        match self.try_insert_at(head, query, scope) {
            Slot::Fresh => shared = self.buckets.get(head).cloned(),
            Slot::Placed => {}
            Slot::Full => {
                let mut queue = VecDeque::new();
                self.place_full(query, head, scope, &mut queue)?;
                while let Some((displaced, keyword)) = queue.pop_front() {
                    if let Slot::Full = self.try_insert_at(&keyword, &displaced, scope) {
                        self.place_full(&displaced, &keyword, scope, &mut queue)?;
                    }
                }
            }
        }
        self.buckets
            .retain(|_, node| node.is_trie() || !node.is_empty());
        Ok(shared)
    }

    /// Install `shared` under `head` if no bucket exists there yet.
    pub(crate) fn install_shared(&mut self, head: &str, shared: &SharedNode, scope: &InsertScope<'_>) -> bool {
        if self.buckets.contains_key(head) {
            return false;
        }
        self.buckets.insert(head.to_string(), Arc::clone(shared));
        StatsCounters::bump(&scope.stats().hash_entries);
        StatsCounters::bump(&scope.stats().textual_insertions);
        true
    }

    fn try_insert_at(&mut self, keyword: &str, query: &QueryRef, scope: &mut InsertScope<'_>) -> Slot {
        let threshold = scope.threshold();
        let Some(node) = self.buckets.get_mut(keyword) else {
            self.buckets
                .insert(keyword.to_string(), Arc::new(TextualNode::single(query)));
            StatsCounters::bump(&scope.stats().hash_entries);
            StatsCounters::bump(&scope.stats().textual_insertions);
            return Slot::Fresh;
        };

        match node.as_ref() {
            TextualNode::Trie(_) => return Slot::Full,
            TextualNode::List(list) => {
                if list.contains(query) {
                    return Slot::Placed;
                }
                if list.len() >= threshold && !list.has_dead(scope.now) {
                    return Slot::Full;
                }
            }
        }

        let TextualNode::List(list) = Arc::make_mut(node) else {
            return Slot::Full;
        };
        scope.reap(&mut list.queries);
        if list.len() >= threshold {
            return Slot::Full;
        }
        list.queries.push(Arc::clone(query));
        StatsCounters::bump(&scope.stats().textual_insertions);
        Slot::Placed
    }

    /// Place a query whose target bucket is full: try an alternate keyword,
    /// otherwise promote lists and insert into the trie of its first keyword.
    fn place_full(
        &mut self,
        query: &QueryRef,
        target: &str,
        scope: &mut InsertScope<'_>,
        queue: &mut VecDeque<(QueryRef, String)>,
    ) -> Result<()> {
        let root = query
            .keywords()
            .first()
            .ok_or_else(|| FastError::InvalidState(format!("query {} has no keywords", query.id())))?
            .to_string();

        if scope.pinned {
            self.convert_to_trie(&root, scope, queue);
        } else {
            if let Some(alternate) = self.alternate_keyword(query, target, scope) {
                if !matches!(self.try_insert_at(&alternate, query, scope), Slot::Full) {
                    return Ok(());
                }
            }
            for keyword in query.keywords() {
                self.convert_to_trie(keyword, scope, queue);
            }
        }

        let bucket = self.buckets.entry(root.clone()).or_insert_with(|| {
            StatsCounters::bump(&scope.ctx.stats.hash_entries);
            StatsCounters::bump(&scope.ctx.stats.trie_nodes);
            Arc::new(TextualNode::Trie(TrieNode::default()))
        });
        match Arc::make_mut(bucket) {
            TextualNode::Trie(trie) => {
                insert_into_trie(trie, query, 1, scope);
                Ok(())
            }
            TextualNode::List(_) => Err(FastError::InvalidState(format!(
                "bucket '{}' is still a list after promotion",
                root
            ))),
        }
    }

    /// Another keyword of `query` able to take it: one without a bucket, else
    /// the smallest list below the split threshold.
    fn alternate_keyword(&self, query: &QueryRef, target: &str, scope: &InsertScope<'_>) -> Option<String> {
        let threshold = scope.threshold();
        let mut smallest: Option<(&String, usize)> = None;
        for keyword in query.keywords() {
            if keyword == target {
                continue;
            }
            match self.buckets.get(keyword.as_str()).map(|node| node.as_ref()) {
                None => return Some(keyword.clone()),
                Some(TextualNode::List(list)) if list.len() < threshold => {
                    if smallest.is_none_or(|(_, len)| list.len() < len) {
                        smallest = Some((keyword, list.len()));
                    }
                }
                Some(_) => {}
            }
        }
        smallest.map(|(keyword, _)| keyword.clone())
    }

    /// Turn the list under `keyword` into an empty trie, queueing its live
    /// members for re-placement.
    fn convert_to_trie(
        &mut self,
        keyword: &str,
        scope: &mut InsertScope<'_>,
        queue: &mut VecDeque<(QueryRef, String)>,
    ) {
        let Some(node) = self.buckets.get_mut(keyword) else {
            return;
        };
        if node.is_trie() {
            return;
        }

        let previous = std::mem::replace(node, Arc::new(TextualNode::Trie(TrieNode::default())));
        let mut members = match previous.as_ref() {
            TextualNode::List(list) => list.queries.clone(),
            TextualNode::Trie(_) => Vec::new(),
        };
        StatsCounters::bump(&scope.stats().trie_nodes);
        log::trace!(
            "Promoted '{}' to a trie at L{} ({} members)",
            keyword,
            scope.level,
            members.len()
        );

        scope.reap(&mut members);
        queue.extend(members.into_iter().map(|member| (member, keyword.to_string())));
    }

    /// Test the object against the buckets of `remaining`, given as
    /// positions into the object's sorted keywords. Returns the positions
    /// whose bucket is a trie here, the only ones that can lead to queries at
    /// the next finer level.
    pub(crate) fn search(&self, remaining: &[usize], scope: &mut SearchScope<'_>) -> Vec<usize> {
        let object = scope.object;
        let keywords = object.keywords().as_slice();
        let mut pending: Vec<(usize, &TrieNode)> = Vec::new();
        for &position in remaining {
            let Some(keyword) = keywords.get(position) else {
                continue;
            };
            StatsCounters::bump(&scope.ctx.stats.search_hash_accesses);
            let Some(node) = self.buckets.get(keyword.as_str()) else {
                continue;
            };
            scope.visited.push(keyword.clone());
            match node.as_ref() {
                TextualNode::List(list) => scope.scan(&list.queries, false),
                TextualNode::Trie(trie) => pending.push((position, trie)),
            }
        }

        // tries are walked after every list of this cell was scanned
        for &(position, trie) in &pending {
            scope.walk(trie, position + 1);
        }
        pending.into_iter().map(|(position, _)| position).collect()
    }

    pub fn dump(&self) -> Vec<NodeDump> {
        let mut buckets: Vec<NodeDump> = self
            .buckets
            .iter()
            .map(|(keyword, node)| node.dump(keyword))
            .collect();
        buckets.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        buckets
    }
}

/// Insert `query` below `node`, whose path covers its first `depth` keywords.
fn insert_into_trie(node: &mut TrieNode, query: &QueryRef, depth: usize, scope: &mut InsertScope<'_>) {
    let Some(keyword) = query.keywords().get(depth) else {
        terminate(node, query, scope);
        return;
    };

    let Some(child) = node.children.get_mut(keyword) else {
        node.children
            .insert(keyword.to_string(), TextualNode::single(query));
        StatsCounters::bump(&scope.stats().textual_insertions);
        return;
    };

    let split = match child {
        TextualNode::Trie(trie) => {
            insert_into_trie(trie, query, depth + 1, scope);
            None
        }
        TextualNode::List(list) => {
            if list.contains(query) {
                return;
            }
            scope.reap(&mut list.queries);
            if list.len() < scope.threshold() {
                list.queries.push(Arc::clone(query));
                StatsCounters::bump(&scope.stats().textual_insertions);
                return;
            }

            let members = std::mem::take(&mut list.queries);
            let mut trie = TrieNode::default();
            StatsCounters::bump(&scope.stats().trie_nodes);
            for member in members.iter().chain(std::iter::once(query)) {
                insert_into_trie(&mut trie, member, depth + 1, scope);
            }
            Some(trie)
        }
    };

    if let Some(trie) = split {
        *child = TextualNode::Trie(trie);
    }
}

/// Make `query` a terminal query of `node`, degrading the node if it now
/// holds too many range queries.
fn terminate(node: &mut TrieNode, query: &QueryRef, scope: &mut InsertScope<'_>) {
    scope.reap(&mut node.queries);
    if node.contains(query) {
        return;
    }
    node.queries.push(Arc::clone(query));
    StatsCounters::bump(&scope.stats().textual_insertions);

    if scope.level > 0 && node.range_query_count() > scope.ctx.degradation_ratio() {
        degrade(node, scope);
    }
}

/// Move the half of the terminal range queries covering the least of this
/// cell one level finer.
fn degrade(node: &mut TrieNode, scope: &mut InsertScope<'_>) {
    let mut candidates: Vec<(f64, usize)> = node
        .queries
        .iter()
        .enumerate()
        .filter_map(|(i, query)| {
            query
                .as_range()
                .map(|range| (scope.clip.intersection(range.range()).area(), i))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
    candidates.truncate(candidates.len() / 2);

    let moved: FxHashSet<usize> = candidates.iter().map(|&(_, i)| i).collect();
    for &(_, i) in &candidates {
        let query = &node.queries[i];
        if let Some(range) = query.as_range() {
            scope.reinserts.push(ReinsertEntry {
                range: scope.clip.intersection(range.range()),
                query: Arc::clone(query),
                keyword: query.keywords().first().map(str::to_string),
            });
        }
    }

    let mut index = 0;
    node.queries.retain(|_| {
        let keep = !moved.contains(&index);
        index += 1;
        keep
    });

    StatsCounters::add(&scope.stats().reinserted_queries, moved.len());
    log::debug!(
        "Degraded {} range queries from L{} to L{}",
        moved.len(),
        scope.level,
        scope.level - 1
    );
}
