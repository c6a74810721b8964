//! Bounded top-N collection.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::segment::DocOrdinal;

/// Deterministic tie-breaker: position of a document in its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocKey {
    /// Index of the segment in the snapshot.
    pub segment: usize,
    /// Ordinal within the segment.
    pub ordinal: DocOrdinal,
}

/// A collected document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    /// Where the document lives.
    pub key: DocKey,
    /// Its score.
    pub score: f64,
}

impl Eq for ScoredDoc {}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDoc {
    /// Worse documents compare greater: lower score, then larger key.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// Keeps the `from + size` best documents seen so far.
///
/// The heap's top is the worst retained document; a candidate replaces it
/// only if it ranks strictly better, so each candidate costs `O(log N)`.
#[derive(Debug)]
pub struct TopNCollector {
    capacity: usize,
    from: usize,
    hits: BinaryHeap<ScoredDoc>,
    total_hits: u64,
}

impl TopNCollector {
    /// Collect the `size` best documents after skipping the `from` best.
    pub fn new(size: usize, from: usize) -> Self {
        let capacity = size.saturating_add(from);
        TopNCollector {
            capacity,
            from,
            hits: BinaryHeap::with_capacity(capacity.min(1024)),
            total_hits: 0,
        }
    }

    /// Offer a document.
    pub fn collect(&mut self, key: DocKey, score: f64) {
        self.total_hits += 1;
        if self.capacity == 0 {
            return;
        }

        let doc = ScoredDoc { key, score };
        if self.hits.len() < self.capacity {
            self.hits.push(doc);
        } else if let Some(worst) = self.hits.peek()
            && doc < *worst
        {
            self.hits.pop();
            self.hits.push(doc);
        }
    }

    /// Number of documents offered.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Fold in another collector's retained documents.
    pub fn merge(&mut self, other: TopNCollector) {
        let before = self.total_hits;
        for doc in other.hits {
            self.collect(doc.key, doc.score);
        }
        self.total_hits = before + other.total_hits;
    }

    /// Retained documents best-first, with the first `from` skipped.
    pub fn into_sorted(self) -> Vec<ScoredDoc> {
        let from = self.from;
        self.hits
            .into_sorted_vec()
            .into_iter()
            .skip(from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(segment: usize, ordinal: DocOrdinal) -> DocKey {
        DocKey { segment, ordinal }
    }

    #[test]
    fn test_keeps_best_n_in_order() {
        let mut collector = TopNCollector::new(3, 0);
        for (i, score) in [0.5, 2.0, 1.0, 3.0, 0.1].into_iter().enumerate() {
            collector.collect(key(0, i as u32), score);
        }
        assert_eq!(collector.total_hits(), 5);

        let scores: Vec<f64> = collector.into_sorted().iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_ties_prefer_smaller_key() {
        let mut collector = TopNCollector::new(2, 0);
        collector.collect(key(1, 0), 1.0);
        collector.collect(key(0, 5), 1.0);
        collector.collect(key(0, 2), 1.0);
        collector.collect(key(2, 0), 1.0);

        let keys: Vec<DocKey> = collector.into_sorted().iter().map(|d| d.key).collect();
        assert_eq!(keys, vec![key(0, 2), key(0, 5)]);
    }

    #[test]
    fn test_pagination_and_zero_size() {
        let mut collector = TopNCollector::new(2, 1);
        for i in 0..5u32 {
            collector.collect(key(0, i), i as f64);
        }
        let scores: Vec<f64> = collector.into_sorted().iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![3.0, 2.0]);

        let mut empty = TopNCollector::new(0, 0);
        empty.collect(key(0, 0), 1.0);
        assert_eq!(empty.total_hits(), 1);
        assert!(empty.into_sorted().is_empty());
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let docs: Vec<(DocKey, f64)> = (0..20u32)
            .map(|i| (key((i % 3) as usize, i), ((i * 7) % 5) as f64))
            .collect();

        let mut single = TopNCollector::new(4, 1);
        for (k, s) in &docs {
            single.collect(*k, *s);
        }

        let mut merged = TopNCollector::new(4, 1);
        for segment in 0..3 {
            let mut part = TopNCollector::new(4, 1);
            for (k, s) in docs.iter().filter(|(k, _)| k.segment == segment) {
                part.collect(*k, *s);
            }
            merged.merge(part);
        }

        assert_eq!(merged.total_hits(), single.total_hits());
        assert_eq!(merged.into_sorted(), single.into_sorted());
    }
}
