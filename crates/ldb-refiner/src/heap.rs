//! Max-heap of processors keyed by load.
//!
//! Keys are captured at insertion. A processor whose load changes must be
//! extracted and reinserted; the refinement pass rebuilds the heap every
//! trial and only reinserts the donor after a move.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
struct Entry {
    load: f64,
    processor: usize,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal loads pop the lower processor index first.
        self.load
            .total_cmp(&other.load)
            .then_with(|| other.processor.cmp(&self.processor))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

#[derive(Debug, Default)]
pub struct LoadHeap {
    entries: BinaryHeap<Entry>,
}

impl LoadHeap {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, processor: usize, load: f64) {
        self.entries.push(Entry { load, processor });
    }

    /// Remove and return the processor with the greatest load.
    pub fn extract_max(&mut self) -> Option<usize> {
        self.entries.pop().map(|e| e.processor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_in_descending_load() {
        let mut heap = LoadHeap::with_capacity(4);
        heap.insert(0, 3.0);
        heap.insert(1, 9.5);
        heap.insert(2, 0.0);
        heap.insert(3, 4.25);
        assert_eq!(heap.len(), 4);

        let order: Vec<usize> = std::iter::from_fn(|| heap.extract_max()).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
        assert!(heap.is_empty());
    }

    #[test]
    fn equal_loads_prefer_lower_index() {
        let mut heap = LoadHeap::default();
        heap.insert(5, 2.0);
        heap.insert(2, 2.0);
        heap.insert(7, 2.0);

        assert_eq!(heap.extract_max(), Some(2));
        assert_eq!(heap.extract_max(), Some(5));
        assert_eq!(heap.extract_max(), Some(7));
    }

    #[test]
    fn empty_heap_returns_none() {
        let mut heap = LoadHeap::default();
        assert_eq!(heap.extract_max(), None);
        assert_eq!(heap.len(), 0);
    }

    #[test]
    fn duplicate_inserts_are_kept() {
        // The same processor may be present twice if the caller reinserts
        // without extracting; both entries come back.
        let mut heap = LoadHeap::default();
        heap.insert(0, 1.0);
        heap.insert(0, 5.0);
        assert_eq!(heap.extract_max(), Some(0));
        assert_eq!(heap.extract_max(), Some(0));
        assert_eq!(heap.extract_max(), None);
    }
}
