//! Object search: a coarse-to-fine walk over the cells holding the object.

use super::FastIndex;
use crate::grid::LevelGeometry;
use crate::object::DataObject;
use crate::query::QueryRef;
use crate::textual::SearchScope;

impl FastIndex {
    /// Return every live query matched by `object`, de-duplicated, in the
    /// order the levels discovered them.
    ///
    /// Each level narrows the keywords carried to the next finer level to
    /// those whose bucket in the object's cell is a trie, since cascaded
    /// queries only live below trie roots. A k-NN query matches when the
    /// object enters (or already is in) its monitored set. Expired queries met
    /// on the way are reaped.
    ///
    /// Objects outside the index bounds are searched in the edge cells they
    /// clamp to and still match range queries extending that far out.
    pub fn search_object(&self, object: &DataObject) -> Vec<QueryRef> {
        let ctx = &self.context;
        ctx.tick_object_clock();
        let now = ctx.query_clock().max(object.start_time().unwrap_or(0));

        if object.keywords().is_empty() {
            return Vec::new();
        }
        let Some((finest, coarsest)) = ctx.inserted_levels() else {
            return Vec::new();
        };

        let mut scope = SearchScope::new(ctx, object, now);
        let mut remaining: Vec<usize> = (0..object.keywords().len()).collect();
        for level in (finest..=coarsest).rev() {
            let geometry = LevelGeometry::new(ctx, level);
            let Some(cell) = self.grid.cell_for(&geometry, object) else {
                continue;
            };
            remaining = cell.search(&remaining, &mut scope);
            if remaining.is_empty() {
                break;
            }
        }

        ctx.settle_reaped(&scope.reaped);
        ctx.record_visits(&scope.visited);
        log::trace!(
            "Object {} matched {} queries at time {}",
            object.id(),
            scope.matches.len(),
            now
        );
        scope.matches
    }
}

#[cfg(test)]
mod tests {
    use crate::config::IndexConfig;
    use crate::index::FastIndex;
    use crate::object::DataObject;
    use crate::query::{KnnQuery, RangeQuery};
    use spatio_fast_types::{Point, Rectangle};

    fn ids(index: &FastIndex, object: &DataObject) -> Vec<u64> {
        let mut ids: Vec<u64> = index.search_object(object).iter().map(|q| q.id()).collect();
        ids.sort_unstable();
        ids
    }

    fn index(granularity: u32, split: usize, ratio: usize) -> FastIndex {
        FastIndex::with_config(
            Rectangle::new(0.0, 0.0, 10.0, 10.0),
            IndexConfig::default()
                .with_granularity(granularity)
                .with_trie_split_threshold(split)
                .with_degradation_ratio(ratio),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_index_and_empty_keywords() {
        let index = index(8, 5, 10);
        let object = DataObject::new(1, ["a"], Point::new(1.0, 1.0));
        assert!(index.search_object(&object).is_empty());

        index
            .register_query(RangeQuery::new(1, ["a"], Rectangle::new(0.0, 0.0, 10.0, 10.0), 100))
            .unwrap();
        let bare = DataObject::new(2, Vec::<&str>::new(), Point::new(1.0, 1.0));
        assert!(index.search_object(&bare).is_empty());
        assert_eq!(index.context().object_clock(), 2);
    }

    #[test]
    fn test_range_match_requires_all_keywords_and_containment() {
        let index = index(8, 5, 10);
        index
            .register_query(RangeQuery::new(1, ["a", "b"], Rectangle::new(0.0, 0.0, 5.0, 5.0), 100))
            .unwrap();
        index
            .register_query(RangeQuery::new(2, ["b"], Rectangle::new(0.0, 0.0, 5.0, 5.0), 100))
            .unwrap();

        assert_eq!(ids(&index, &DataObject::new(1, ["a", "b", "c"], Point::new(5.0, 5.0))), vec![1, 2]);
        assert_eq!(ids(&index, &DataObject::new(2, ["b"], Point::new(2.0, 2.0))), vec![2]);
        assert!(ids(&index, &DataObject::new(3, ["a", "b"], Point::new(6.0, 2.0))).is_empty());
    }

    #[test]
    fn test_expired_queries_are_reaped() {
        let index = index(8, 5, 10);
        index
            .register_query(RangeQuery::new(1, ["a"], Rectangle::new(0.0, 0.0, 10.0, 10.0), 3))
            .unwrap();
        let object = DataObject::new(1, ["a"], Point::new(1.0, 1.0));
        assert_eq!(ids(&index, &object), vec![1]);

        let later = DataObject::new(2, ["a"], Point::new(1.0, 1.0)).at(3);
        assert!(ids(&index, &later).is_empty());
        assert!(ids(&index, &object).is_empty());

        assert_eq!(index.stats().expired_queries, 1);
        assert_eq!(index.keyword_frequencies()[0].1.registration_count, 0);
    }

    #[test]
    fn test_knn_monitoring_through_search() {
        let index = index(8, 5, 10);
        index
            .register_query(KnnQuery::new(7, ["a"], Point::new(5.0, 5.0), 1, 100))
            .unwrap();

        assert_eq!(ids(&index, &DataObject::new(1, ["a"], Point::new(9.0, 9.0))), vec![7]);
        assert_eq!(ids(&index, &DataObject::new(2, ["a"], Point::new(5.0, 6.0))), vec![7]);
        // farther than the current member
        assert!(ids(&index, &DataObject::new(3, ["a"], Point::new(0.0, 0.0))).is_empty());
        // the current member matches again
        assert_eq!(ids(&index, &DataObject::new(2, ["a"], Point::new(5.0, 6.0))), vec![7]);
    }

    #[test]
    fn test_cascaded_queries_stay_reachable() {
        let index = index(4, 1, 2);
        for id in 1..=8u64 {
            let side = 1.0 + id as f64 * 0.5;
            index
                .register_query(RangeQuery::new(id, ["a", "b"], Rectangle::new(0.0, 0.0, side, side), 100))
                .unwrap();
        }
        assert!(index.context().min_inserted_level() < 2);

        let object = DataObject::new(1, ["a", "b"], Point::new(1.0, 1.0));
        assert_eq!(ids(&index, &object), (1..=8).collect::<Vec<_>>());

        let object = DataObject::new(2, ["a", "b"], Point::new(3.2, 3.2));
        assert_eq!(ids(&index, &object), (5..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_visits_are_counted() {
        let index = index(8, 5, 10);
        index
            .register_query(RangeQuery::new(1, ["a"], Rectangle::new(0.0, 0.0, 10.0, 10.0), 100))
            .unwrap();
        index.search_object(&DataObject::new(1, ["a", "z"], Point::new(1.0, 1.0)));
        let frequencies = index.keyword_frequencies();
        assert_eq!(frequencies.len(), 1);
        assert_eq!(frequencies[0].1.visit_count, 1);
        assert_eq!(index.stats().searches, 1);
    }
}
