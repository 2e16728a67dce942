//! Canonical keyword sets.
//!
//! Query and object keywords are kept trimmed, lower-cased, sorted and
//! de-duplicated, so subset tests are a single linear merge.

use smallvec::SmallVec;
use std::fmt;

/// A canonical, sorted keyword set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Keywords(SmallVec<[String; 4]>);

impl Keywords {
    /// Build a canonical keyword set. Blank entries are dropped.
    ///
    /// ```
    /// use spatio_fast::Keywords;
    ///
    /// let kw = Keywords::new(["Pizza", "bar", " pizza ", ""]);
    /// assert_eq!(kw.as_slice(), &["bar".to_string(), "pizza".to_string()]);
    /// ```
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words: SmallVec<[String; 4]> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        words.sort_unstable();
        words.dedup();
        Self(words)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// The smallest keyword; the root of the query's trie path.
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Position of `keyword` in the sorted set.
    pub fn position(&self, keyword: &str) -> Option<usize> {
        self.0.binary_search_by(|k| k.as_str().cmp(keyword)).ok()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.position(keyword).is_some()
    }

    /// Whether every keyword of `self` also appears in `other`.
    pub fn is_subset_of(&self, other: &Keywords) -> bool {
        if self.len() > other.len() {
            return false;
        }
        let mut theirs = other.0.iter();
        'outer: for mine in &self.0 {
            for candidate in theirs.by_ref() {
                match candidate.cmp(mine) {
                    std::cmp::Ordering::Less => continue,
                    std::cmp::Ordering::Equal => continue 'outer,
                    std::cmp::Ordering::Greater => return false,
                }
            }
            return false;
        }
        true
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.to_vec()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Keywords {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Keywords {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Keywords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let kw = Keywords::new(["k3", "K1", "k2", "k1"]);
        assert_eq!(kw.to_vec(), vec!["k1", "k2", "k3"]);
        assert_eq!(kw.first(), Some("k1"));
        assert_eq!(kw.position("k3"), Some(2));
        assert_eq!(kw.position("k4"), None);
    }

    #[test]
    fn test_blank_keywords_dropped() {
        let kw = Keywords::new(["", "  "]);
        assert!(kw.is_empty());
        assert_eq!(kw.first(), None);
    }

    #[test]
    fn test_subset() {
        let object = Keywords::new(["k1", "k2", "k3", "k7"]);
        assert!(Keywords::new(["k1", "k3"]).is_subset_of(&object));
        assert!(Keywords::new(["k7"]).is_subset_of(&object));
        assert!(Keywords::new(["K2", "k3", "k7"]).is_subset_of(&object));
        assert!(!Keywords::new(["k1", "k4"]).is_subset_of(&object));
        assert!(!Keywords::new(["k0"]).is_subset_of(&object));
        assert!(!Keywords::new(["k8"]).is_subset_of(&object));
        assert!(Keywords::default().is_subset_of(&object));
        assert!(!object.is_subset_of(&Keywords::new(["k1", "k2"])));
    }

    #[test]
    fn test_display() {
        assert_eq!(Keywords::new(["b", "a"]).to_string(), "[a, b]");
    }
}
