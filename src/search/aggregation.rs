//! Aggregations computed over every candidate of a search.
//!
//! Unlike the top-N collector, aggregations observe all matching documents,
//! including those that never make the cut. Field metrics read the first
//! value of a numeric field (or the nanosecond timestamp of a date field)
//! from doc-values; documents without the field are skipped.

use std::sync::Arc;
use std::time::Duration;

use crate::codec;
use crate::search::cursor::Candidate;
use crate::segment::SegmentView;
use crate::segment::doc_values::DocValues;

/// What to compute.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Number of matching documents.
    Count,
    /// Highest score among matching documents.
    MaxScore,
    /// Smallest first value of a field.
    Min(String),
    /// Largest first value of a field.
    Max(String),
    /// Sum of first values of a field.
    Sum(String),
    /// Mean of first values of a field.
    Avg(String),
    /// Wall-clock time taken by the search.
    Duration,
}

/// A computed aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationValue {
    /// Result of [`Aggregation::Count`].
    Count(u64),
    /// Result of a score or field metric; `None` when nothing was observed.
    Metric(Option<f64>),
    /// Result of [`Aggregation::Duration`].
    Duration(Duration),
}

/// Named aggregation results, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationResults {
    values: Vec<(String, AggregationValue)>,
}

impl AggregationResults {
    /// Look up a result by name.
    pub fn get(&self, name: &str) -> Option<&AggregationValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// The `count` aggregation.
    pub fn count(&self) -> Option<u64> {
        match self.get("count")? {
            AggregationValue::Count(count) => Some(*count),
            _ => None,
        }
    }

    /// The `max_score` aggregation.
    pub fn max_score(&self) -> Option<f64> {
        self.metric("max_score")
    }

    /// The `duration` aggregation.
    pub fn duration(&self) -> Option<Duration> {
        match self.get("duration")? {
            AggregationValue::Duration(duration) => Some(*duration),
            _ => None,
        }
    }

    /// A metric result by name.
    pub fn metric(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            AggregationValue::Metric(value) => *value,
            AggregationValue::Count(count) => Some(*count as f64),
            AggregationValue::Duration(_) => None,
        }
    }

    /// All results in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregationValue)> + '_ {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no aggregation was requested.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MetricOp {
    Min,
    Max,
    Sum,
    Avg,
}

#[derive(Debug, Clone, Default)]
struct MetricAcc {
    min: Option<f64>,
    max: Option<f64>,
    sum: f64,
    count: u64,
}

impl MetricAcc {
    fn observe(&mut self, value: f64) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.sum += value;
        self.count += 1;
    }

    fn merge(&mut self, other: &MetricAcc) {
        if let Some(min) = other.min {
            self.min = Some(self.min.map_or(min, |m| m.min(min)));
        }
        if let Some(max) = other.max {
            self.max = Some(self.max.map_or(max, |m| m.max(max)));
        }
        self.sum += other.sum;
        self.count += other.count;
    }

    fn value(&self, op: MetricOp) -> Option<f64> {
        match op {
            MetricOp::Min => self.min,
            MetricOp::Max => self.max,
            MetricOp::Sum => Some(self.sum),
            MetricOp::Avg => (self.count > 0).then(|| self.sum / self.count as f64),
        }
    }
}

#[derive(Debug, Clone)]
enum AggState {
    Count(u64),
    MaxScore(Option<f64>),
    Field {
        field: String,
        op: MetricOp,
        column: Option<Arc<DocValues>>,
        acc: MetricAcc,
    },
    Duration,
}

/// Incremental state of the requested aggregations.
#[derive(Debug, Clone)]
pub struct Aggregator {
    entries: Vec<(String, AggState)>,
    segment: Option<usize>,
}

impl Aggregator {
    /// Start aggregating.
    pub fn new(requests: &[(String, Aggregation)]) -> Self {
        let entries = requests
            .iter()
            .map(|(name, aggregation)| {
                let field = |field: &String, op| AggState::Field {
                    field: field.clone(),
                    op,
                    column: None,
                    acc: MetricAcc::default(),
                };
                let state = match aggregation {
                    Aggregation::Count => AggState::Count(0),
                    Aggregation::MaxScore => AggState::MaxScore(None),
                    Aggregation::Min(f) => field(f, MetricOp::Min),
                    Aggregation::Max(f) => field(f, MetricOp::Max),
                    Aggregation::Sum(f) => field(f, MetricOp::Sum),
                    Aggregation::Avg(f) => field(f, MetricOp::Avg),
                    Aggregation::Duration => AggState::Duration,
                };
                (name.clone(), state)
            })
            .collect();
        Aggregator {
            entries,
            segment: None,
        }
    }

    /// Observe one candidate from the snapshot `views`.
    pub fn observe(&mut self, candidate: &Candidate, views: &[SegmentView]) {
        let switched = self.segment != Some(candidate.segment);
        self.segment = Some(candidate.segment);

        for (_, state) in &mut self.entries {
            match state {
                AggState::Count(count) => *count += 1,
                AggState::MaxScore(max) => {
                    *max = Some(max.map_or(candidate.score, |m| m.max(candidate.score)));
                }
                AggState::Field {
                    field,
                    column,
                    acc,
                    ..
                } => {
                    if switched {
                        *column = views[candidate.segment].segment().doc_values(field);
                    }
                    if let Some(column) = column
                        && let Some(encoded) = column.get(candidate.ordinal)
                        && let Some(value) = codec::metric_value(column.kind(), encoded)
                    {
                        acc.observe(value);
                    }
                }
                AggState::Duration => {}
            }
        }
    }

    /// Fold in the state of another aggregator built from the same requests.
    pub fn merge(&mut self, other: Aggregator) {
        for ((_, mine), (_, theirs)) in self.entries.iter_mut().zip(other.entries) {
            match (mine, theirs) {
                (AggState::Count(a), AggState::Count(b)) => *a += b,
                (AggState::MaxScore(a), AggState::MaxScore(Some(b))) => {
                    *a = Some(a.map_or(b, |m| m.max(b)));
                }
                (AggState::Field { acc: a, .. }, AggState::Field { acc: b, .. }) => a.merge(&b),
                _ => {}
            }
        }
        self.segment = None;
    }

    /// Final values; `elapsed` feeds the duration aggregation.
    pub fn finish(self, elapsed: Duration) -> AggregationResults {
        let values = self
            .entries
            .into_iter()
            .map(|(name, state)| {
                let value = match state {
                    AggState::Count(count) => AggregationValue::Count(count),
                    AggState::MaxScore(max) => AggregationValue::Metric(max),
                    AggState::Field { op, acc, .. } => AggregationValue::Metric(acc.value(op)),
                    AggState::Duration => AggregationValue::Duration(elapsed),
                };
                (name, value)
            })
            .collect();
        AggregationResults { values }
    }
}
