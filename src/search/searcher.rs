//! Top-N search over a snapshot.
//!
//! The sequential path pulls one [`CandidateStream`] across all segments and
//! feeds every candidate to the collector and the aggregator. The parallel
//! path runs one stream per segment on the rayon pool and merges the
//! per-segment collectors; because ties are broken by [`DocKey`], both paths
//! return the same ranking.

use std::sync::Arc;
use std::time::Instant;

use log::debug;
use rayon::prelude::*;

use crate::analysis::analyzer::Analyzer;
use crate::error::Result;
use crate::search::aggregation::Aggregator;
use crate::search::collector::{DocKey, TopNCollector};
use crate::search::context::SearchContext;
use crate::search::cursor::{CandidateStream, QueryPlan};
use crate::search::query::Query;
use crate::search::request::TopNSearch;
use crate::search::result::DocumentMatchIterator;
use crate::segment::SegmentView;

/// Runs requests against one snapshot.
#[derive(Clone, Copy)]
pub struct Searcher<'a> {
    views: &'a Arc<[SegmentView]>,
    analyzer: &'a dyn Analyzer,
}

impl std::fmt::Debug for Searcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("segments", &self.views.len())
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

impl<'a> Searcher<'a> {
    /// Search `views`, analyzing match text with `analyzer`.
    pub fn new(views: &'a Arc<[SegmentView]>, analyzer: &'a dyn Analyzer) -> Self {
        Searcher { views, analyzer }
    }

    /// Evaluate `request` segment by segment.
    pub fn search(
        &self,
        context: &SearchContext,
        request: &TopNSearch,
    ) -> Result<DocumentMatchIterator> {
        let started = Instant::now();
        let plan = Arc::new(QueryPlan::prepare(
            request.query(),
            self.views,
            self.analyzer,
        )?);

        let mut collector = TopNCollector::new(request.size(), request.from());
        let mut aggregator = Aggregator::new(request.aggregations());
        let mut stream = CandidateStream::new(plan, Arc::clone(self.views), context.clone());
        while let Some(candidate) = stream.advance()? {
            collector.collect(
                DocKey {
                    segment: candidate.segment,
                    ordinal: candidate.ordinal,
                },
                candidate.score,
            );
            aggregator.observe(&candidate, self.views);
        }

        Ok(self.finish(request, collector, aggregator, started))
    }

    /// Evaluate `request` with one task per segment.
    pub fn search_parallel(
        &self,
        context: &SearchContext,
        request: &TopNSearch,
    ) -> Result<DocumentMatchIterator> {
        let started = Instant::now();
        let plan = Arc::new(QueryPlan::prepare(
            request.query(),
            self.views,
            self.analyzer,
        )?);

        let partials = (0..self.views.len())
            .into_par_iter()
            .map(|segment| {
                let mut collector = TopNCollector::new(request.size(), request.from());
                let mut aggregator = Aggregator::new(request.aggregations());
                let mut stream = CandidateStream::over(
                    Arc::clone(&plan),
                    Arc::clone(self.views),
                    context.clone(),
                    segment..segment + 1,
                );
                while let Some(candidate) = stream.advance()? {
                    collector.collect(
                        DocKey {
                            segment: candidate.segment,
                            ordinal: candidate.ordinal,
                        },
                        candidate.score,
                    );
                    aggregator.observe(&candidate, self.views);
                }
                Ok((collector, aggregator))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut collector = TopNCollector::new(request.size(), request.from());
        let mut aggregator = Aggregator::new(request.aggregations());
        for (partial_collector, partial_aggregator) in partials {
            collector.merge(partial_collector);
            aggregator.merge(partial_aggregator);
        }

        Ok(self.finish(request, collector, aggregator, started))
    }

    /// Number of live documents matching `query`.
    pub fn count(&self, context: &SearchContext, query: &Query) -> Result<u64> {
        let plan = Arc::new(QueryPlan::prepare(query, self.views, self.analyzer)?);
        let mut stream = CandidateStream::new(plan, Arc::clone(self.views), context.clone());
        let mut count = 0;
        while stream.advance()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn finish(
        &self,
        request: &TopNSearch,
        collector: TopNCollector,
        aggregator: Aggregator,
        started: Instant,
    ) -> DocumentMatchIterator {
        let total_hits = collector.total_hits();
        let hits = collector.into_sorted();
        let elapsed = started.elapsed();
        debug!(
            "search on {:?} matched {total_hits} documents in {elapsed:?}",
            request.query().field()
        );

        DocumentMatchIterator::new(
            Arc::clone(self.views),
            hits,
            request.from(),
            total_hits,
            aggregator.finish(elapsed),
        )
    }
}
