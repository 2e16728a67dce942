//! Continuous queries: standing range and k-NN predicates with an expiry time.
//!
//! Queries are shared by reference (`QueryRef`) across every cell and keyword
//! bucket they are registered in. The `deleted` flag is the single source of
//! truth for lazy reaping and flips exactly once.

use crate::error::{FastError, Result};
use crate::keywords::Keywords;
use crate::knn::KnnMonitor;
use crate::object::DataObject;
use parking_lot::Mutex;
use spatio_fast_types::{Point, Rectangle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifier of a continuous query.
pub type QueryId = u64;

/// Shared handle to a registered query.
pub type QueryRef = Arc<ContinuousQuery>;

/// A standing range query: matches objects inside `range` carrying all keywords.
#[derive(Debug)]
pub struct RangeQuery {
    id: QueryId,
    keywords: Keywords,
    range: Rectangle,
    expire_time: u64,
    deleted: AtomicBool,
}

impl RangeQuery {
    pub fn new<I, S>(id: QueryId, keywords: I, range: Rectangle, expire_time: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            keywords: Keywords::new(keywords),
            range,
            expire_time,
            deleted: AtomicBool::new(false),
        }
    }

    pub fn range(&self) -> &Rectangle {
        &self.range
    }
}

/// A standing k-NN query: reports objects that are among the `k` closest to
/// `location` seen so far.
#[derive(Debug)]
pub struct KnnQuery {
    id: QueryId,
    keywords: Keywords,
    location: Point,
    k: usize,
    expire_time: u64,
    deleted: AtomicBool,
    monitor: Mutex<KnnMonitor>,
}

impl KnnQuery {
    pub fn new<I, S>(id: QueryId, keywords: I, location: Point, k: usize, expire_time: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            keywords: Keywords::new(keywords),
            location,
            k,
            expire_time,
            deleted: AtomicBool::new(false),
            monitor: Mutex::new(KnnMonitor::new(k)),
        }
    }

    pub fn location(&self) -> &Point {
        &self.location
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Offer an object to the monitored set; true if it is a member afterwards.
    pub fn admit(&self, object: &DataObject) -> bool {
        let distance = self.location.distance(object.location());
        self.monitor.lock().admit(object.id(), distance)
    }

    /// Current monitored objects, closest first.
    pub fn monitored(&self) -> Vec<(crate::object::ObjectId, f64)> {
        self.monitor.lock().members()
    }
}

/// A registered continuous query.
#[derive(Debug)]
pub enum ContinuousQuery {
    Range(RangeQuery),
    Knn(KnnQuery),
}

impl ContinuousQuery {
    pub fn id(&self) -> QueryId {
        match self {
            Self::Range(q) => q.id,
            Self::Knn(q) => q.id,
        }
    }

    pub fn keywords(&self) -> &Keywords {
        match self {
            Self::Range(q) => &q.keywords,
            Self::Knn(q) => &q.keywords,
        }
    }

    pub fn expire_time(&self) -> u64 {
        match self {
            Self::Range(q) => q.expire_time,
            Self::Knn(q) => q.expire_time,
        }
    }

    fn deleted_flag(&self) -> &AtomicBool {
        match self {
            Self::Range(q) => &q.deleted,
            Self::Knn(q) => &q.deleted,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_flag().load(Ordering::Acquire)
    }

    /// Mark the query deleted. Returns true only for the call that flipped the flag.
    pub(crate) fn mark_deleted(&self) -> bool {
        !self.deleted_flag().swap(true, Ordering::AcqRel)
    }

    /// Whether the query has expired at logical time `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_time() <= now
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range(_))
    }

    pub fn as_range(&self) -> Option<&RangeQuery> {
        match self {
            Self::Range(q) => Some(q),
            Self::Knn(_) => None,
        }
    }

    pub fn as_knn(&self) -> Option<&KnnQuery> {
        match self {
            Self::Knn(q) => Some(q),
            Self::Range(_) => None,
        }
    }

    /// Rectangle the registration cascade starts from. k-NN queries have no
    /// bounded range and cover the whole index.
    pub(crate) fn registration_range(&self, bounds: &Rectangle) -> Rectangle {
        match self {
            Self::Range(q) => q.range,
            Self::Knn(_) => *bounds,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.keywords().is_empty() {
            return Err(FastError::InvalidQuery(format!(
                "query {} has no keywords",
                self.id()
            )));
        }
        match self {
            Self::Range(q) if !q.range.is_finite() => Err(FastError::InvalidQuery(format!(
                "query {} has a non-finite range {}",
                q.id, q.range
            ))),
            Self::Knn(q) if q.k == 0 => Err(FastError::InvalidQuery(format!(
                "k-NN query {} must ask for at least one neighbor",
                q.id
            ))),
            Self::Knn(q) if !q.location.is_finite() => Err(FastError::InvalidQuery(format!(
                "k-NN query {} has a non-finite location",
                q.id
            ))),
            _ => Ok(()),
        }
    }

    /// Full match test for a live query: keyword subset, then the spatial
    /// predicate (range containment, or k-NN admission).
    pub(crate) fn matches(&self, object: &DataObject) -> bool {
        if !self.keywords().is_subset_of(object.keywords()) {
            return false;
        }
        match self {
            Self::Range(q) => q.range.contains_point(object.location()),
            Self::Knn(q) => q.admit(object),
        }
    }
}

impl From<RangeQuery> for ContinuousQuery {
    fn from(query: RangeQuery) -> Self {
        Self::Range(query)
    }
}

impl From<KnnQuery> for ContinuousQuery {
    fn from(query: KnnQuery) -> Self {
        Self::Knn(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: u64, keywords: &[&str], x: f64, y: f64) -> DataObject {
        DataObject::new(id, keywords.iter().copied(), Point::new(x, y))
    }

    #[test]
    fn test_range_query_matches() {
        let q: ContinuousQuery =
            RangeQuery::new(1, ["k1", "k3"], Rectangle::new(6.0, 0.0, 10.0, 4.0), 100).into();
        assert!(q.matches(&object(1, &["k1", "k3"], 8.0, 2.0)));
        assert!(q.matches(&object(2, &["k3", "k1", "k9"], 6.0, 4.0)));
        assert!(!q.matches(&object(3, &["k1"], 8.0, 2.0)));
        assert!(!q.matches(&object(4, &["k1", "k3"], 0.0, 2.0)));
    }

    #[test]
    fn test_knn_query_admission() {
        let q: ContinuousQuery = KnnQuery::new(14, ["k1", "k2"], Point::new(7.0, 7.0), 2, 100).into();
        assert!(q.matches(&object(1, &["k1", "k2"], 7.0, 8.0)));
        assert!(q.matches(&object(2, &["k1", "k2"], 5.0, 5.0)));
        assert!(!q.matches(&object(3, &["k1", "k2"], 2.0, 6.0)));
        // textual mismatch never reaches the monitor
        assert!(!q.matches(&object(9, &["k1"], 7.0, 7.0)));
        let monitored: Vec<u64> = q.as_knn().unwrap().monitored().iter().map(|m| m.0).collect();
        assert_eq!(monitored, vec![1, 2]);
    }

    #[test]
    fn test_mark_deleted_once() {
        let q: ContinuousQuery =
            RangeQuery::new(1, ["a"], Rectangle::new(0.0, 0.0, 1.0, 1.0), 5).into();
        assert!(!q.is_deleted());
        assert!(q.mark_deleted());
        assert!(!q.mark_deleted());
        assert!(q.is_deleted());
    }

    #[test]
    fn test_expiry() {
        let q: ContinuousQuery =
            RangeQuery::new(1, ["a"], Rectangle::new(0.0, 0.0, 1.0, 1.0), 5).into();
        assert!(!q.is_expired(4));
        assert!(q.is_expired(5));
        assert!(q.is_expired(6));
    }

    #[test]
    fn test_validation() {
        let empty: ContinuousQuery =
            RangeQuery::new(1, Vec::<String>::new(), Rectangle::new(0.0, 0.0, 1.0, 1.0), 5).into();
        assert!(matches!(empty.validate(), Err(FastError::InvalidQuery(_))));

        let zero_k: ContinuousQuery = KnnQuery::new(2, ["a"], Point::new(0.0, 0.0), 0, 5).into();
        assert!(zero_k.validate().is_err());

        let nan: ContinuousQuery =
            RangeQuery::new(3, ["a"], Rectangle::new(0.0, f64::NAN, 1.0, 1.0), 5).into();
        assert!(nan.validate().is_err());

        let ok: ContinuousQuery = KnnQuery::new(4, ["a"], Point::new(1.0, 1.0), 3, 5).into();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_registration_range() {
        let bounds = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let knn: ContinuousQuery = KnnQuery::new(1, ["a"], Point::new(1.0, 1.0), 1, 5).into();
        assert_eq!(knn.registration_range(&bounds), bounds);
        let range: ContinuousQuery =
            RangeQuery::new(2, ["a"], Rectangle::new(1.0, 1.0, 2.0, 2.0), 5).into();
        assert_eq!(range.registration_range(&bounds), Rectangle::new(1.0, 1.0, 2.0, 2.0));
    }
}
