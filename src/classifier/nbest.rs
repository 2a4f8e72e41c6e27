use std::{cmp::Ordering, collections::BinaryHeap};

/// A token considered for scoring, tagged with its encounter position.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub seq: usize,
    pub token: String,
    pub prob: f64,
}

impl Candidate {
    pub fn distance(&self) -> f64 {
        (self.prob - 0.5).abs()
    }
}

/// Heap entry ordered so that the heap's top is the weakest retained clue:
/// smallest distance first, and among equal distances the latest encountered.
struct Weakest(Candidate);

impl PartialEq for Weakest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Weakest {}

impl PartialOrd for Weakest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Weakest {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .distance()
            .total_cmp(&self.0.distance())
            .then_with(|| self.0.seq.cmp(&other.0.seq))
    }
}

/// Keeps the `capacity` candidates farthest from 0.5.
///
/// A full set only admits a newcomer that is strictly stronger than its
/// weakest member, so on equal distance the earlier token stays.
pub(crate) struct NBest {
    capacity: usize,
    heap: BinaryHeap<Weakest>,
}

impl NBest {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    pub fn offer(&mut self, candidate: Candidate) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Weakest(candidate));
            return;
        }
        let replace = match self.heap.peek() {
            Some(weakest) => candidate.distance() > weakest.0.distance(),
            None => false,
        };
        if replace {
            self.heap.pop();
            self.heap.push(Weakest(candidate));
        }
    }

    /// Retained candidates in encounter order.
    pub fn into_candidates(self) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> =
            self.heap.into_iter().map(|Weakest(candidate)| candidate).collect();
        candidates.sort_by_key(|candidate| candidate.seq);
        candidates
    }
}
