//! Data objects streamed through the index.

use crate::keywords::Keywords;
use spatio_fast_types::Point;

/// Identifier of a data object.
pub type ObjectId = u64;

/// A geo-tagged object arriving on the stream.
///
/// `start_time`/`end_time` are logical timestamps on the same clock as query
/// expiry times; when present, `start_time` advances the time at which
/// queries are checked for expiry during the search.
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    id: ObjectId,
    keywords: Keywords,
    location: Point,
    start_time: Option<u64>,
    end_time: Option<u64>,
}

impl DataObject {
    pub fn new<I, S>(id: ObjectId, keywords: I, location: Point) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            keywords: Keywords::new(keywords),
            location,
            start_time: None,
            end_time: None,
        }
    }

    /// Object valid at a single instant.
    pub fn at(mut self, timestamp: u64) -> Self {
        self.start_time = Some(timestamp);
        self.end_time = Some(timestamp);
        self
    }

    /// Object valid over `[start, end]`.
    pub fn with_validity(mut self, start: u64, end: u64) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end.max(start));
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    pub fn location(&self) -> &Point {
        &self.location
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<u64> {
        self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keywords_are_canonical() {
        let obj = DataObject::new(1, ["K2", "k1"], Point::new(7.0, 8.0));
        assert_eq!(obj.keywords().to_vec(), vec!["k1", "k2"]);
        assert_eq!(obj.location(), &Point::new(7.0, 8.0));
        assert_eq!(obj.start_time(), None);
    }

    #[test]
    fn test_object_validity() {
        let obj = DataObject::new(1, ["a"], Point::new(0.0, 0.0)).at(4);
        assert_eq!(obj.start_time(), Some(4));
        assert_eq!(obj.end_time(), Some(4));

        let obj = DataObject::new(2, ["a"], Point::new(0.0, 0.0)).with_validity(9, 3);
        assert_eq!(obj.start_time(), Some(9));
        assert_eq!(obj.end_time(), Some(9));
    }
}
