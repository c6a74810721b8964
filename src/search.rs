//! Query evaluation, ranking and aggregation.
//!
//! A search prepares a [`QueryPlan`](cursor::QueryPlan) against a snapshot,
//! pulls live candidates through a [`CandidateStream`](cursor::CandidateStream),
//! keeps the best of them in a [`TopNCollector`](collector::TopNCollector)
//! and folds every candidate into the requested aggregations.

pub mod aggregation;
pub mod collector;
pub mod context;
pub mod cursor;
pub mod query;
pub mod request;
pub mod result;
pub mod scoring;
pub mod searcher;

pub use aggregation::{Aggregation, AggregationResults, AggregationValue};
pub use context::SearchContext;
pub use query::{DateRangeQuery, MatchQuery, NumericRangeQuery, Query};
pub use request::TopNSearch;
pub use result::{DocumentMatch, DocumentMatchIterator};
