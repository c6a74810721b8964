//! Query types.
//!
//! Three kinds of queries are supported, modelled as the closed enum
//! [`Query`]:
//!
//! - [`MatchQuery`]: analyzed text against a text field, scored with BM25;
//! - [`NumericRangeQuery`]: numbers in `[min, max)` by default;
//! - [`DateRangeQuery`]: timestamps in `[start, end)` by default.
//!
//! ```
//! use quiver::search::query::{MatchQuery, NumericRangeQuery, Query};
//!
//! let q: Query = MatchQuery::new("quiver").set_field("name").into();
//! assert_eq!(q.field(), "name");
//!
//! let q: Query = NumericRangeQuery::new(0.0, 1.0).set_field("age").into();
//! assert!(q.validate().is_ok());
//! ```

use std::ops::Bound;

use chrono::{DateTime, Utc};

use crate::codec;
use crate::error::{QuiverError, Result};

/// A query against one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Full-text match.
    Match(MatchQuery),
    /// Numeric range.
    NumericRange(NumericRangeQuery),
    /// Date range.
    DateRange(DateRangeQuery),
}

impl Query {
    /// The field the query targets.
    pub fn field(&self) -> &str {
        match self {
            Query::Match(q) => &q.field,
            Query::NumericRange(q) => &q.field,
            Query::DateRange(q) => &q.field,
        }
    }

    /// Score multiplier.
    pub fn boost(&self) -> f64 {
        match self {
            Query::Match(q) => q.boost,
            Query::NumericRange(q) => q.boost,
            Query::DateRange(q) => q.boost,
        }
    }

    /// Reject malformed queries with [`QuiverError::Query`].
    ///
    /// An empty interval is not malformed; it simply matches nothing.
    pub fn validate(&self) -> Result<()> {
        if self.field().is_empty() {
            return Err(QuiverError::query("query field is not set"));
        }
        let boost = self.boost();
        if !boost.is_finite() || boost <= 0.0 {
            return Err(QuiverError::query(format!(
                "boost must be a positive number, got {boost}"
            )));
        }
        match self {
            Query::Match(_) => Ok(()),
            Query::NumericRange(q) => q.encoded_bounds().map(|_| ()),
            Query::DateRange(q) => q.encoded_bounds().map(|_| ()),
        }
    }
}

impl From<MatchQuery> for Query {
    fn from(query: MatchQuery) -> Self {
        Query::Match(query)
    }
}

impl From<NumericRangeQuery> for Query {
    fn from(query: NumericRangeQuery) -> Self {
        Query::NumericRange(query)
    }
}

impl From<DateRangeQuery> for Query {
    fn from(query: DateRangeQuery) -> Self {
        Query::DateRange(query)
    }
}

/// Matches documents containing any term of the analyzed text.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    text: String,
    field: String,
    boost: f64,
}

impl MatchQuery {
    /// Create a match query; bind it with [`MatchQuery::set_field`].
    pub fn new<S: Into<String>>(text: S) -> Self {
        MatchQuery {
            text: text.into(),
            field: String::new(),
            boost: 1.0,
        }
    }

    /// Set the target field.
    pub fn set_field<S: Into<String>>(mut self, field: S) -> Self {
        self.field = field.into();
        self
    }

    /// Set the boost factor for this query.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = boost;
        self
    }

    /// The unanalyzed query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }
}

/// Matches documents with a numeric value in a range.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericRangeQuery {
    min: f64,
    max: f64,
    min_inclusive: bool,
    max_inclusive: bool,
    field: String,
    boost: f64,
}

impl NumericRangeQuery {
    /// Half-open range `[min, max)`. Use `f64::NEG_INFINITY` or
    /// `f64::INFINITY` for an open end.
    pub fn new(min: f64, max: f64) -> Self {
        Self::new_inclusive(min, max, true, false)
    }

    /// Range with explicit bound inclusivity.
    pub fn new_inclusive(min: f64, max: f64, min_inclusive: bool, max_inclusive: bool) -> Self {
        NumericRangeQuery {
            min,
            max,
            min_inclusive,
            max_inclusive,
            field: String::new(),
            boost: 1.0,
        }
    }

    /// Set the target field.
    pub fn set_field<S: Into<String>>(mut self, field: S) -> Self {
        self.field = field.into();
        self
    }

    /// Set the boost factor for this query.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = boost;
        self
    }

    /// Lower bound.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Check if a value satisfies the range.
    pub fn contains(&self, value: f64) -> bool {
        let above = if self.min_inclusive {
            value >= self.min
        } else {
            value > self.min
        };
        let below = if self.max_inclusive {
            value <= self.max
        } else {
            value < self.max
        };
        above && below
    }

    /// Bounds in the sortable encoding.
    pub fn encoded_bounds(&self) -> Result<(Bound<u64>, Bound<u64>)> {
        if self.min.is_nan() || self.max.is_nan() {
            return Err(QuiverError::query("range bound is NaN"));
        }
        if self.min > self.max {
            return Err(QuiverError::query(format!(
                "range minimum {} is greater than maximum {}",
                self.min, self.max
            )));
        }

        let lower = if self.min == f64::NEG_INFINITY {
            Bound::Unbounded
        } else {
            bound(codec::encode_f64_unchecked(self.min), self.min_inclusive)
        };
        let upper = if self.max == f64::INFINITY {
            Bound::Unbounded
        } else {
            bound(codec::encode_f64_unchecked(self.max), self.max_inclusive)
        };
        Ok((lower, upper))
    }
}

/// Matches documents with a timestamp in a range.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRangeQuery {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    start_inclusive: bool,
    end_inclusive: bool,
    field: String,
    boost: f64,
}

impl DateRangeQuery {
    /// Half-open range `[start, end)`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new_inclusive(Some(start), Some(end), true, false)
    }

    /// Range with optional ends and explicit inclusivity. `None` leaves that
    /// end open.
    pub fn new_inclusive(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        start_inclusive: bool,
        end_inclusive: bool,
    ) -> Self {
        DateRangeQuery {
            start,
            end,
            start_inclusive,
            end_inclusive,
            field: String::new(),
            boost: 1.0,
        }
    }

    /// Set the target field.
    pub fn set_field<S: Into<String>>(mut self, field: S) -> Self {
        self.field = field.into();
        self
    }

    /// Set the boost factor for this query.
    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = boost;
        self
    }

    /// Lower bound, if any.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Upper bound, if any.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Bounds in the sortable encoding.
    pub fn encoded_bounds(&self) -> Result<(Bound<u64>, Bound<u64>)> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(QuiverError::query(format!(
                    "range start {start} is after end {end}"
                )));
            }
        }
        // Stored dates always fit in i64 nanoseconds, so a bound beyond that
        // range either admits every stored value or none of them.
        let lower = match &self.start {
            Some(start) => match codec::encode_datetime(start) {
                Ok(encoded) => bound(encoded, self.start_inclusive),
                Err(_) if *start < DateTime::<Utc>::UNIX_EPOCH => Bound::Unbounded,
                Err(_) => Bound::Excluded(u64::MAX),
            },
            None => Bound::Unbounded,
        };
        let upper = match &self.end {
            Some(end) => match codec::encode_datetime(end) {
                Ok(encoded) => bound(encoded, self.end_inclusive),
                Err(_) if *end > DateTime::<Utc>::UNIX_EPOCH => Bound::Unbounded,
                Err(_) => Bound::Excluded(0),
            },
            None => Bound::Unbounded,
        };
        Ok((lower, upper))
    }
}

fn bound(value: u64, inclusive: bool) -> Bound<u64> {
    if inclusive {
        Bound::Included(value)
    } else {
        Bound::Excluded(value)
    }
}
