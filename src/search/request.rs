//! Search requests.

use crate::search::aggregation::Aggregation;
use crate::search::query::Query;

/// Ask for the `size` best documents matching a query, with optional
/// aggregations over every match.
///
/// ```
/// use quiver::search::query::MatchQuery;
/// use quiver::search::request::TopNSearch;
///
/// let request = TopNSearch::new(10, MatchQuery::new("quiver").set_field("name"))
///     .with_standard_aggregations()
///     .set_from(20);
/// assert_eq!(request.size(), 10);
/// assert_eq!(request.from(), 20);
/// assert_eq!(request.aggregations().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct TopNSearch {
    size: usize,
    from: usize,
    query: Query,
    aggregations: Vec<(String, Aggregation)>,
}

impl TopNSearch {
    /// Request the top `size` documents for `query`.
    pub fn new(size: usize, query: impl Into<Query>) -> Self {
        TopNSearch {
            size,
            from: 0,
            query: query.into(),
            aggregations: Vec::new(),
        }
    }

    /// Skip the `from` best documents.
    pub fn set_from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    /// Add `count`, `max_score` and `duration`.
    pub fn with_standard_aggregations(self) -> Self {
        self.add_aggregation("count", Aggregation::Count)
            .add_aggregation("max_score", Aggregation::MaxScore)
            .add_aggregation("duration", Aggregation::Duration)
    }

    /// Add a named aggregation. A later aggregation replaces an earlier one
    /// with the same name.
    pub fn add_aggregation<S: Into<String>>(mut self, name: S, aggregation: Aggregation) -> Self {
        let name = name.into();
        self.aggregations.retain(|(existing, _)| *existing != name);
        self.aggregations.push((name, aggregation));
        self
    }

    /// Number of documents requested.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of leading documents skipped.
    pub fn from(&self) -> usize {
        self.from
    }

    /// The query.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Requested aggregations in order.
    pub fn aggregations(&self) -> &[(String, Aggregation)] {
        &self.aggregations
    }
}
