//! Point-in-time readers.
//!
//! An [`IndexReader`] pins the segments and tombstones published by one
//! commit. Later commits never change what it sees, and segments it holds
//! keep their files until the reader (and any match taken from it) is gone.

use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::error::Result;
use crate::search::context::SearchContext;
use crate::search::query::Query;
use crate::search::request::TopNSearch;
use crate::search::result::DocumentMatchIterator;
use crate::search::searcher::Searcher;
use crate::segment::SegmentView;

/// The segments of one published generation.
pub(crate) struct Snapshot {
    generation: u64,
    views: Arc<[SegmentView]>,
    analyzer: Arc<dyn Analyzer>,
}

impl Snapshot {
    pub(crate) fn new(
        generation: u64,
        views: Vec<SegmentView>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Snapshot {
            generation,
            views: views.into(),
            analyzer,
        }
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("generation", &self.generation)
            .field("segments", &self.views.len())
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

/// An immutable view of the index.
///
/// Cheap to clone; clones share the same snapshot. Searches are independent
/// of each other and may run concurrently from several threads.
#[derive(Debug, Clone)]
pub struct IndexReader {
    snapshot: Arc<Snapshot>,
}

impl IndexReader {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        IndexReader { snapshot }
    }

    fn searcher(&self) -> Searcher<'_> {
        Searcher::new(&self.snapshot.views, self.snapshot.analyzer.as_ref())
    }

    /// Run a top-N search.
    pub fn search(
        &self,
        context: &SearchContext,
        request: &TopNSearch,
    ) -> Result<DocumentMatchIterator> {
        self.searcher().search(context, request)
    }

    /// Run a top-N search with segments evaluated in parallel. Results are
    /// identical to [`IndexReader::search`].
    pub fn search_parallel(
        &self,
        context: &SearchContext,
        request: &TopNSearch,
    ) -> Result<DocumentMatchIterator> {
        self.searcher().search_parallel(context, request)
    }

    /// Number of live documents matching `query`.
    pub fn count(&self, query: &Query) -> Result<u64> {
        self.searcher().count(&SearchContext::new(), query)
    }

    /// Live documents in the snapshot.
    pub fn doc_count(&self) -> u64 {
        self.snapshot
            .views
            .iter()
            .map(|view| view.live_count() as u64)
            .sum()
    }

    /// Segments in the snapshot.
    pub fn segment_count(&self) -> usize {
        self.snapshot.views.len()
    }

    /// Manifest generation the snapshot was taken from.
    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    /// Release this reader's hold on its segments.
    pub fn close(self) {
        drop(self);
    }
}
