//! Bounded top-k monitoring for k-NN continuous queries.
//!
//! Each k-NN query keeps the `k` closest objects it has examined so far in a
//! max-heap keyed by distance. An object matches the query when it is still a
//! member after admission. An object reported again (it moved) is ranked at
//! its latest location only. Evicted objects are never re-admitted, even if the
//! members that displaced them later expire: the monitor is an order-dependent
//! approximation of continuous k-NN.

use crate::object::ObjectId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    object_id: ObjectId,
    distance: f64,
    /// Admission order; on equal distance the later arrival ranks farther.
    sequence: u64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// The monitored set of one k-NN query.
#[derive(Debug, Clone)]
pub struct KnnMonitor {
    capacity: usize,
    heap: BinaryHeap<Candidate>,
    admissions: u64,
}

impl KnnMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(1024)),
            admissions: 0,
        }
    }

    /// Offer an object at `distance`. Returns whether it is a member afterwards.
    ///
    /// A member offered again is re-ranked at its new distance, as a fresh
    /// arrival, before the capacity check.
    pub fn admit(&mut self, object_id: ObjectId, distance: f64) -> bool {
        if self.contains(object_id) {
            self.heap.retain(|c| c.object_id != object_id);
        }

        self.admissions += 1;
        self.heap.push(Candidate {
            object_id,
            distance,
            sequence: self.admissions,
        });

        if self.heap.len() > self.capacity {
            match self.heap.pop() {
                Some(evicted) => evicted.object_id != object_id,
                None => false,
            }
        } else {
            true
        }
    }

    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.heap.iter().any(|c| c.object_id == object_id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Distance of the current k-th neighbor, if any.
    pub fn farthest_distance(&self) -> Option<f64> {
        self.heap.peek().map(|c| c.distance)
    }

    /// Members ordered by ascending distance.
    pub fn members(&self) -> Vec<(ObjectId, f64)> {
        let mut members: Vec<Candidate> = self.heap.iter().copied().collect();
        members.sort();
        members.into_iter().map(|c| (c.object_id, c.distance)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_until_full() {
        let mut monitor = KnnMonitor::new(2);
        assert!(monitor.admit(1, 3.0));
        assert!(monitor.admit(2, 1.0));
        assert_eq!(monitor.len(), 2);
        assert_eq!(monitor.farthest_distance(), Some(3.0));
    }

    #[test]
    fn test_evicts_farthest() {
        let mut monitor = KnnMonitor::new(2);
        monitor.admit(1, 1.0);
        monitor.admit(2, 2.8);
        // farther than both members: rejected immediately
        assert!(!monitor.admit(3, 5.1));
        // closer than member 2: displaces it
        assert!(monitor.admit(5, 2.2));
        assert_eq!(monitor.members(), vec![(1, 1.0), (5, 2.2)]);
        assert!(!monitor.contains(2));
    }

    #[test]
    fn test_readmission_of_member_is_a_match() {
        let mut monitor = KnnMonitor::new(1);
        assert!(monitor.admit(7, 2.0));
        assert!(monitor.admit(7, 2.0));
        assert_eq!(monitor.len(), 1);
    }

    #[test]
    fn test_moved_member_is_ranked_at_new_distance() {
        let mut monitor = KnnMonitor::new(2);
        monitor.admit(1, 0.0);
        monitor.admit(2, 1.0);
        // 1 moves away: it is now the farthest member
        assert!(monitor.admit(1, 6.0));
        assert_eq!(monitor.members(), vec![(2, 1.0), (1, 6.0)]);
        assert_eq!(monitor.len(), 2);

        // a closer newcomer displaces the stale entry
        assert!(monitor.admit(3, 0.5));
        assert_eq!(monitor.members(), vec![(3, 0.5), (2, 1.0)]);

        // a moved member keeps its slot only while fewer than k objects are closer
        assert!(monitor.admit(2, 9.0));
        assert!(monitor.admit(4, 2.0));
        assert_eq!(monitor.members(), vec![(3, 0.5), (4, 2.0)]);
        assert!(!monitor.contains(2));
    }

    #[test]
    fn test_evicted_object_is_not_readmitted_as_member() {
        let mut monitor = KnnMonitor::new(1);
        monitor.admit(1, 4.0);
        monitor.admit(2, 1.0);
        assert!(!monitor.contains(1));
        assert!(!monitor.admit(1, 4.0));
    }

    #[test]
    fn test_ties_keep_incumbent() {
        let mut monitor = KnnMonitor::new(1);
        assert!(monitor.admit(1, 2.0));
        assert!(!monitor.admit(2, 2.0));
        assert_eq!(monitor.members(), vec![(1, 2.0)]);
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut monitor = KnnMonitor::new(3);
        for i in 0..50u64 {
            monitor.admit(i, ((i * 37) % 11) as f64);
            assert!(monitor.len() <= 3);
        }
        let distances: Vec<f64> = monitor.members().into_iter().map(|(_, d)| d).collect();
        assert_eq!(distances, vec![0.0, 0.0, 0.0]);
    }
}
