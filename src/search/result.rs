//! Search results.

use std::sync::Arc;

use crate::document::ID_FIELD;
use crate::document::field::FieldValue;
use crate::error::{QuiverError, Result};
use crate::search::aggregation::AggregationResults;
use crate::search::collector::{DocKey, ScoredDoc};
use crate::segment::stored;
use crate::segment::{Segment, SegmentView};

/// One ranked document with its stored fields loaded.
///
/// A match keeps its segment alive on its own, so it stays readable after
/// the snapshot that produced it is closed.
#[derive(Debug, Clone)]
pub struct DocumentMatch {
    segment: Arc<Segment>,
    key: DocKey,
    score: f64,
    hit_number: usize,
    record: Vec<u8>,
}

impl DocumentMatch {
    /// Relevance score.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// 1-based rank of this match across the whole result, counting skipped
    /// documents.
    pub fn hit_number(&self) -> usize {
        self.hit_number
    }

    /// Position of the document in its snapshot.
    pub fn key(&self) -> DocKey {
        self.key
    }

    /// Name of the segment holding the document.
    pub fn segment_name(&self) -> &str {
        self.segment.name()
    }

    /// Visit stored fields, `_id` first, until `visitor` returns `false`.
    /// Numeric and date values arrive in their 8-byte encoded form.
    pub fn visit_stored_fields<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&str, &[u8]) -> bool,
    {
        stored::visit_record(&self.record, |name, _, bytes| visitor(name, bytes))
            .map_err(|e| QuiverError::iterator(e.to_string()))
    }

    /// Decoded stored fields, `_id` first.
    pub fn stored_fields(&self) -> Result<Vec<(String, FieldValue)>> {
        stored::decode_record(&self.record)
            .map_err(|e| QuiverError::iterator(e.to_string()))
    }

    /// The external identifier.
    pub fn id(&self) -> Result<String> {
        let mut id = None;
        self.visit_stored_fields(|name, bytes| {
            if name == ID_FIELD {
                id = Some(String::from_utf8_lossy(bytes).into_owned());
                false
            } else {
                true
            }
        })?;
        id.ok_or_else(|| QuiverError::iterator("stored record has no _id"))
    }
}

/// Ranked matches, best first, plus the aggregations of the search.
///
/// Stored fields are read from storage as each match is pulled; a failed
/// read yields an [`QuiverError::Iterator`] item.
#[derive(Debug)]
pub struct DocumentMatchIterator {
    views: Arc<[SegmentView]>,
    hits: std::vec::IntoIter<ScoredDoc>,
    next_hit_number: usize,
    total_hits: u64,
    aggregations: AggregationResults,
}

impl DocumentMatchIterator {
    pub(crate) fn new(
        views: Arc<[SegmentView]>,
        hits: Vec<ScoredDoc>,
        from: usize,
        total_hits: u64,
        aggregations: AggregationResults,
    ) -> Self {
        DocumentMatchIterator {
            views,
            hits: hits.into_iter(),
            next_hit_number: from + 1,
            total_hits,
            aggregations,
        }
    }

    /// Aggregations over every matching document.
    pub fn aggregations(&self) -> &AggregationResults {
        &self.aggregations
    }

    /// Number of matching documents, including those outside the page.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    fn load(&self, hit: ScoredDoc, hit_number: usize) -> Result<DocumentMatch> {
        let segment = self
            .views
            .get(hit.key.segment)
            .map(|view| Arc::clone(view.segment()))
            .ok_or_else(|| QuiverError::iterator(format!("no segment {}", hit.key.segment)))?;
        let record = segment.read_stored_record(hit.key.ordinal).map_err(|e| {
            QuiverError::iterator(format!(
                "loading document {} of {}: {e}",
                hit.key.ordinal,
                segment.name()
            ))
        })?;

        Ok(DocumentMatch {
            segment,
            key: hit.key,
            score: hit.score,
            hit_number,
            record,
        })
    }
}

impl Iterator for DocumentMatchIterator {
    type Item = Result<DocumentMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let hit = self.hits.next()?;
        let hit_number = self.next_hit_number;
        self.next_hit_number += 1;
        Some(self.load(hit, hit_number))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hits.size_hint()
    }
}

impl ExactSizeIterator for DocumentMatchIterator {}
