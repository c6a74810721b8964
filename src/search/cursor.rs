//! Query evaluation: per-segment cursors and the cross-segment candidate
//! stream.
//!
//! A [`QueryPlan`] is prepared once per search from the snapshot's
//! collection statistics. Each segment is then evaluated by a
//! [`SegmentCursor`]:
//!
//! - match queries walk a disjunction of posting cursors ordered by a
//!   binary heap, yielding ordinals ascending;
//! - range queries scan the slice of the sorted doc-values column between
//!   the encoded bounds, yielding ordinals in value order.
//!
//! [`CandidateStream`] chains segment cursors lazily, skips tombstoned
//! ordinals and checks the [`SearchContext`] before opening each segment.
//!
//! The stream is not ordered by score. Candidates arrive in (segment,
//! ordinal) order for match queries and (segment, value) order for ranges;
//! ranking by score is done by
//! [`TopNCollector`](crate::search::collector::TopNCollector), which keeps
//! only the best `from + size` candidates.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::{Bound, Range};
use std::sync::Arc;

use bit_vec::BitVec;

use crate::analysis::analyzer::Analyzer;
use crate::document::field::FieldKind;
use crate::error::Result;
use crate::search::context::SearchContext;
use crate::search::query::Query;
use crate::search::scoring::ScoringConfig;
use crate::segment::doc_values::DocValues;
use crate::segment::postings::{FieldStats, PostingCursor};
use crate::segment::{DocOrdinal, Segment, SegmentView};

/// One matching, live document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index of the segment in the snapshot.
    pub segment: usize,
    /// Ordinal within that segment.
    pub ordinal: DocOrdinal,
    /// Relevance score.
    pub score: f64,
}

#[derive(Debug, Clone)]
struct WeightedTerm {
    term: String,
    idf: f64,
}

#[derive(Debug, Clone)]
enum PlanKind {
    Terms {
        field: String,
        terms: Vec<WeightedTerm>,
        avg_len: f64,
        scoring: ScoringConfig,
    },
    Range {
        field: String,
        kind: FieldKind,
        lower: Bound<u64>,
        upper: Bound<u64>,
    },
    Nothing,
}

/// A validated query with snapshot-wide statistics resolved.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    kind: PlanKind,
    boost: f64,
}

impl QueryPlan {
    /// Validate `query` and resolve it against the snapshot `views`.
    pub fn prepare(query: &Query, views: &[SegmentView], analyzer: &dyn Analyzer) -> Result<Self> {
        query.validate()?;
        let boost = query.boost();

        let kind = match query {
            Query::Match(q) => {
                let mut terms = analyzer.terms(q.text())?;
                terms.sort();
                terms.dedup();

                let doc_count: u64 = views.iter().map(|v| v.segment().doc_count() as u64).sum();
                let mut stats = FieldStats::default();
                for view in views {
                    stats.merge(&view.segment().field_stats(q.field()));
                }

                let scoring = ScoringConfig::default();
                let weighted: Vec<WeightedTerm> = terms
                    .into_iter()
                    .filter_map(|term| {
                        let doc_freq: u64 = views
                            .iter()
                            .filter_map(|v| v.segment().postings(q.field(), &term))
                            .map(|p| p.len() as u64)
                            .sum();
                        (doc_freq > 0).then(|| WeightedTerm {
                            idf: scoring.idf(doc_count, doc_freq),
                            term,
                        })
                    })
                    .collect();

                if weighted.is_empty() {
                    PlanKind::Nothing
                } else {
                    PlanKind::Terms {
                        field: q.field().to_string(),
                        terms: weighted,
                        avg_len: stats.average_length() as f64,
                        scoring,
                    }
                }
            }
            Query::NumericRange(q) => {
                let (lower, upper) = q.encoded_bounds()?;
                PlanKind::Range {
                    field: q.field().to_string(),
                    kind: FieldKind::Numeric,
                    lower,
                    upper,
                }
            }
            Query::DateRange(q) => {
                let (lower, upper) = q.encoded_bounds()?;
                PlanKind::Range {
                    field: q.field().to_string(),
                    kind: FieldKind::DateTime,
                    lower,
                    upper,
                }
            }
        };

        Ok(QueryPlan { kind, boost })
    }

    /// Whether the plan can match nothing in any segment.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, PlanKind::Nothing)
    }

    /// Cursor over the matches of one segment, tombstones not yet applied.
    pub fn segment_cursor(&self, segment: &Arc<Segment>) -> SegmentCursor {
        match &self.kind {
            PlanKind::Nothing => SegmentCursor::Empty,
            PlanKind::Terms {
                field,
                terms,
                avg_len,
                scoring,
            } => {
                let mut cursors = Vec::new();
                for weighted in terms {
                    if let Some(list) = segment.postings(field, &weighted.term) {
                        cursors.push(TermCursor {
                            postings: PostingCursor::new(list),
                            idf: weighted.idf,
                        });
                    }
                }
                if cursors.is_empty() {
                    return SegmentCursor::Empty;
                }
                SegmentCursor::Terms(DisjunctionCursor::new(
                    Arc::clone(segment),
                    field.clone(),
                    cursors,
                    *avg_len,
                    *scoring,
                    self.boost,
                ))
            }
            PlanKind::Range {
                field,
                kind,
                lower,
                upper,
            } => match segment.doc_values(field) {
                Some(column) if column.kind() == *kind => {
                    let range = column.range(*lower, *upper);
                    if range.is_empty() {
                        SegmentCursor::Empty
                    } else {
                        SegmentCursor::Range(RangeCursor::new(column, range, self.boost))
                    }
                }
                _ => SegmentCursor::Empty,
            },
        }
    }
}

#[derive(Debug)]
struct TermCursor {
    postings: PostingCursor,
    idf: f64,
}

/// Union of several posting lists of one segment, scored with BM25.
#[derive(Debug)]
pub struct DisjunctionCursor {
    segment: Arc<Segment>,
    field: String,
    terms: Vec<TermCursor>,
    heap: BinaryHeap<Reverse<(DocOrdinal, usize)>>,
    avg_len: f64,
    scoring: ScoringConfig,
    boost: f64,
}

impl DisjunctionCursor {
    fn new(
        segment: Arc<Segment>,
        field: String,
        terms: Vec<TermCursor>,
        avg_len: f64,
        scoring: ScoringConfig,
        boost: f64,
    ) -> Self {
        let heap = terms
            .iter()
            .enumerate()
            .filter_map(|(index, t)| t.postings.ordinal().map(|o| Reverse((o, index))))
            .collect();
        DisjunctionCursor {
            segment,
            field,
            terms,
            heap,
            avg_len,
            scoring,
            boost,
        }
    }

    fn consume(&mut self, index: usize, ordinal: DocOrdinal) -> f64 {
        let term = &mut self.terms[index];
        let field_len = self.segment.norm(&self.field, ordinal);
        let score = self
            .scoring
            .term_score(term.idf, term.postings.freq(), field_len, self.avg_len);
        term.postings.advance();
        if let Some(next) = term.postings.ordinal() {
            self.heap.push(Reverse((next, index)));
        }
        score
    }

    fn next_hit(&mut self) -> Option<(DocOrdinal, f64)> {
        let Reverse((ordinal, index)) = self.heap.pop()?;
        let mut score = self.consume(index, ordinal);
        while let Some(&Reverse((next, index))) = self.heap.peek() {
            if next != ordinal {
                break;
            }
            self.heap.pop();
            score += self.consume(index, ordinal);
        }
        Some((ordinal, score * self.boost))
    }
}

/// Contiguous slice of a sorted doc-values column.
#[derive(Debug)]
pub struct RangeCursor {
    column: Arc<DocValues>,
    position: usize,
    end: usize,
    seen: BitVec,
    boost: f64,
}

impl RangeCursor {
    fn new(column: Arc<DocValues>, range: Range<usize>, boost: f64) -> Self {
        let seen = BitVec::from_elem(column.len(), false);
        RangeCursor {
            column,
            position: range.start,
            end: range.end,
            seen,
            boost,
        }
    }

    fn next_hit(&mut self) -> Option<(DocOrdinal, f64)> {
        while self.position < self.end {
            let (_, ordinal) = self.column.sorted()[self.position];
            self.position += 1;
            if !self.seen.get(ordinal as usize).unwrap_or(true) {
                self.seen.set(ordinal as usize, true);
                return Some((ordinal, self.boost));
            }
        }
        None
    }
}

/// Matches of one segment.
#[derive(Debug)]
pub enum SegmentCursor {
    /// Match query.
    Terms(DisjunctionCursor),
    /// Range query.
    Range(RangeCursor),
    /// Nothing can match.
    Empty,
}

impl SegmentCursor {
    /// Next `(ordinal, score)`, or `None` when exhausted.
    pub fn next_hit(&mut self) -> Option<(DocOrdinal, f64)> {
        match self {
            SegmentCursor::Terms(cursor) => cursor.next_hit(),
            SegmentCursor::Range(cursor) => cursor.next_hit(),
            SegmentCursor::Empty => None,
        }
    }
}

/// Lazy, pull-based stream of live candidates across a snapshot.
#[derive(Debug)]
pub struct CandidateStream {
    plan: Arc<QueryPlan>,
    views: Arc<[SegmentView]>,
    context: SearchContext,
    pending: Range<usize>,
    current: Option<(usize, SegmentCursor)>,
}

impl CandidateStream {
    /// Stream over every segment of `views`.
    pub fn new(plan: Arc<QueryPlan>, views: Arc<[SegmentView]>, context: SearchContext) -> Self {
        let pending = 0..views.len();
        Self::over(plan, views, context, pending)
    }

    /// Stream over the segments with indexes in `segments` only.
    pub fn over(
        plan: Arc<QueryPlan>,
        views: Arc<[SegmentView]>,
        context: SearchContext,
        segments: Range<usize>,
    ) -> Self {
        let end = segments.end.min(views.len());
        CandidateStream {
            plan,
            views,
            context,
            pending: segments.start.min(end)..end,
            current: None,
        }
    }

    /// Next live candidate, `Ok(None)` at the end of the stream, or
    /// [`QuiverError::Cancelled`](crate::error::QuiverError::Cancelled) when
    /// the context expires between segments.
    pub fn advance(&mut self) -> Result<Option<Candidate>> {
        loop {
            if let Some((segment, cursor)) = &mut self.current {
                let view = &self.views[*segment];
                while let Some((ordinal, score)) = cursor.next_hit() {
                    if view.is_live(ordinal) {
                        return Ok(Some(Candidate {
                            segment: *segment,
                            ordinal,
                            score,
                        }));
                    }
                }
                self.current = None;
            }

            let Some(segment) = self.pending.next() else {
                return Ok(None);
            };
            self.context.check()?;
            let cursor = self.plan.segment_cursor(self.views[segment].segment());
            self.current = Some((segment, cursor));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::standard::StandardAnalyzer;
    use crate::document::document::Document;
    use crate::document::field::Field;
    use crate::error::QuiverError;
    use crate::search::query::{MatchQuery, NumericRangeQuery};
    use crate::segment::SegmentBuilder;
    use crate::storage::memory::MemoryStorage;

    fn views() -> Arc<[SegmentView]> {
        let storage = Arc::new(MemoryStorage::new());
        let analyzer = Arc::new(StandardAnalyzer::new());
        let mut result = Vec::new();
        for (name, docs) in [
            ("seg_1", vec![("a", "red fish", 3.0), ("b", "blue fish", 1.0)]),
            ("seg_2", vec![("c", "red red bird", 2.0), ("d", "green", 2.0)]),
        ] {
            let mut builder = SegmentBuilder::new(analyzer.clone());
            for (id, text, n) in docs {
                builder
                    .add(
                        &Document::new(id)
                            .add_field(Field::text("body", text))
                            .add_field(Field::numeric("n", n)),
                    )
                    .unwrap();
            }
            result.push(SegmentView::new(Arc::new(
                builder.build(storage.clone(), name).unwrap(),
            )));
        }
        result.into()
    }

    fn drain(stream: &mut CandidateStream) -> Vec<(usize, DocOrdinal, f64)> {
        let mut out = Vec::new();
        while let Some(c) = stream.advance().unwrap() {
            out.push((c.segment, c.ordinal, c.score));
        }
        out
    }

    #[test]
    fn test_match_disjunction() {
        let views = views();
        let query: Query = MatchQuery::new("red fish").set_field("body").into();
        let plan = QueryPlan::prepare(&query, &views, &StandardAnalyzer::new()).unwrap();
        let hits = drain(&mut CandidateStream::new(
            Arc::new(plan),
            views,
            SearchContext::new(),
        ));

        let keys: Vec<(usize, DocOrdinal)> = hits.iter().map(|h| (h.0, h.1)).collect();
        assert_eq!(keys, vec![(0, 0), (0, 1), (1, 0)]);
        // "a" matches both terms, "b" only one.
        assert!(hits[0].2 > hits[1].2);
        assert!(hits.iter().all(|h| h.2 > 0.0));
    }

    #[test]
    fn test_range_skips_tombstones() {
        let views = views();
        let deleted = views[1].segment().mark_deleted(&[0]);
        let views: Arc<[SegmentView]> = vec![
            views[0].clone(),
            SegmentView::with_tombstones(views[1].segment().clone(), deleted),
        ]
        .into();

        let query: Query = NumericRangeQuery::new(2.0, 3.0).set_field("n").into();
        let plan = QueryPlan::prepare(&query, &views, &StandardAnalyzer::new()).unwrap();
        let hits = drain(&mut CandidateStream::new(
            Arc::new(plan),
            views,
            SearchContext::new(),
        ));
        assert_eq!(hits, vec![(1, 1, 1.0)]);
    }

    #[test]
    fn test_unknown_terms_and_fields_match_nothing() {
        let views = views();
        let analyzer = StandardAnalyzer::new();
        for query in [
            Query::from(MatchQuery::new("purple").set_field("body")),
            Query::from(MatchQuery::new("red").set_field("missing")),
            Query::from(MatchQuery::new("...").set_field("body")),
            Query::from(NumericRangeQuery::new(0.0, 10.0).set_field("body")),
        ] {
            let plan = QueryPlan::prepare(&query, &views, &analyzer).unwrap();
            let mut stream = CandidateStream::new(Arc::new(plan), views.clone(), SearchContext::new());
            assert!(stream.advance().unwrap().is_none());
        }
    }

    #[test]
    fn test_cancellation_between_segments() {
        let views = views();
        let query: Query = NumericRangeQuery::new(0.0, 10.0).set_field("n").into();
        let plan = QueryPlan::prepare(&query, &views, &StandardAnalyzer::new()).unwrap();
        let context = SearchContext::new();
        let mut stream = CandidateStream::new(Arc::new(plan), views, context.clone());

        assert!(stream.advance().unwrap().is_some());
        assert!(stream.advance().unwrap().is_some());
        context.cancel();
        assert!(matches!(stream.advance(), Err(QuiverError::Cancelled(_))));
    }
}
