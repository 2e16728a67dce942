use spatio_fast::{DataObject, FastIndex, IndexConfig, Point, RangeQuery, Rectangle};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

fn populated_index() -> FastIndex {
    let index = FastIndex::with_config(
        Rectangle::new(0.0, 0.0, 100.0, 100.0),
        IndexConfig::default()
            .with_granularity(16)
            .with_trie_split_threshold(3)
            .with_degradation_ratio(2),
    )
    .unwrap();

    let keywords = ["a", "b", "c", "d"];
    for id in 0..200u64 {
        let x = (id * 37 % 90) as f64;
        let y = (id * 53 % 90) as f64;
        let side = 5.0 + (id % 7) as f64 * 3.0;
        let query_keywords = [keywords[(id % 4) as usize], keywords[(id / 4 % 4) as usize]];
        index
            .register_query(RangeQuery::new(
                id,
                query_keywords,
                Rectangle::new(x, y, (x + side).min(100.0), (y + side).min(100.0)),
                u64::MAX,
            ))
            .unwrap();
    }
    index
}

fn objects() -> Vec<DataObject> {
    (0..500u64)
        .map(|i| {
            let location = Point::new((i * 13 % 100) as f64 + 0.5, (i * 29 % 100) as f64 + 0.5);
            DataObject::new(i, ["a", "b", "c", "d"].iter().take(1 + (i % 4) as usize), location)
        })
        .collect()
}

fn ids(index: &FastIndex, object: &DataObject) -> BTreeSet<u64> {
    index.search_object(object).iter().map(|q| q.id()).collect()
}

#[test]
fn test_parallel_searches_agree_with_sequential() {
    let reference = populated_index();
    let objects = objects();
    let expected: Vec<BTreeSet<u64>> = objects.iter().map(|o| ids(&reference, o)).collect();
    assert!(expected.iter().any(|hits| !hits.is_empty()));

    let index = Arc::new(populated_index());
    let objects = Arc::new(objects);
    let expected = Arc::new(expected);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let index = Arc::clone(&index);
            let objects = Arc::clone(&objects);
            let expected = Arc::clone(&expected);
            thread::spawn(move || {
                // each worker walks the stream from a different offset
                for step in 0..objects.len() {
                    let i = (step + worker * 125) % objects.len();
                    assert_eq!(ids(&index, &objects[i]), expected[i], "object {}", i);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.stats().searches, 4 * objects.len() as u64);
    assert_eq!(index.stats().expired_queries, 0);
}
