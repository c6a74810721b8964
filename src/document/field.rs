//! Typed fields.
//!
//! Every field has one of three kinds, modelled as the closed enum
//! [`FieldKind`]; the value itself is a [`FieldValue`]:
//!
//! - **Text**: analyzed into terms when indexed; stored verbatim.
//! - **Numeric**: a finite `f64`.
//! - **DateTime**: a UTC timestamp representable as i64 nanoseconds.
//!
//! Fields are indexed and not stored unless configured otherwise:
//!
//! ```
//! use quiver::document::field::{Field, FieldKind};
//!
//! let field = Field::text("name", "quiver").store_value();
//! assert!(field.is_indexed());
//! assert!(field.is_stored());
//! assert_eq!(field.kind(), FieldKind::Text);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{QuiverError, Result};

/// The kind of a field; fixes how its value is encoded and queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Analyzed text.
    Text,
    /// 64-bit float.
    Numeric,
    /// UTC timestamp.
    DateTime,
}

impl FieldKind {
    /// One-byte tag used in segment files.
    pub fn tag(self) -> u8 {
        match self {
            FieldKind::Text => 0,
            FieldKind::Numeric => 1,
            FieldKind::DateTime => 2,
        }
    }

    /// Inverse of [`FieldKind::tag`].
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(FieldKind::Text),
            1 => Ok(FieldKind::Numeric),
            2 => Ok(FieldKind::DateTime),
            other => Err(QuiverError::corruption(format!("unknown field kind tag {other}"))),
        }
    }
}

/// Represents the value of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Numeric value.
    Numeric(f64),
    /// Date and time value.
    DateTime(DateTime<Utc>),
}

impl FieldValue {
    /// The kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Numeric(_) => FieldKind::Numeric,
            FieldValue::DateTime(_) => FieldKind::DateTime,
        }
    }

    /// Get the text value, if this is a text field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the numeric value, if this is a numeric field.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the datetime value, if this is a datetime field.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

/// A named, typed value with indexing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    value: FieldValue,
    indexed: bool,
    stored: bool,
}

impl Field {
    /// Create a field from a name and value. Indexed, not stored.
    pub fn new<S: Into<String>>(name: S, value: FieldValue) -> Self {
        Field {
            name: name.into(),
            value,
            indexed: true,
            stored: false,
        }
    }

    /// Create a text field.
    pub fn text<S: Into<String>, T: Into<String>>(name: S, text: T) -> Self {
        Self::new(name, FieldValue::Text(text.into()))
    }

    /// Create a numeric field.
    pub fn numeric<S: Into<String>>(name: S, value: f64) -> Self {
        Self::new(name, FieldValue::Numeric(value))
    }

    /// Create a date/time field.
    pub fn datetime<S: Into<String>>(name: S, value: DateTime<Utc>) -> Self {
        Self::new(name, FieldValue::DateTime(value))
    }

    /// Parse a field value from its textual form.
    ///
    /// Numbers use Rust float syntax, dates RFC 3339. Malformed input is an
    /// [`QuiverError::InvalidField`].
    pub fn parse<S: Into<String>>(name: S, kind: FieldKind, input: &str) -> Result<Self> {
        let name = name.into();
        let value = match kind {
            FieldKind::Text => FieldValue::Text(input.to_string()),
            FieldKind::Numeric => {
                let v: f64 = input.trim().parse().map_err(|e| {
                    QuiverError::invalid_field(format!("{name}: '{input}' is not a number: {e}"))
                })?;
                FieldValue::Numeric(v)
            }
            FieldKind::DateTime => {
                let dt = DateTime::parse_from_rfc3339(input.trim()).map_err(|e| {
                    QuiverError::invalid_field(format!("{name}: '{input}' is not RFC 3339: {e}"))
                })?;
                FieldValue::DateTime(dt.with_timezone(&Utc))
            }
        };
        let field = Self::new(name, value);
        field.validate()?;
        Ok(field)
    }

    /// Keep the original value so it can be visited on matches.
    pub fn store_value(mut self) -> Self {
        self.stored = true;
        self
    }

    /// Exclude this field from postings and doc-values.
    pub fn not_indexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field value.
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// The field kind.
    pub fn kind(&self) -> FieldKind {
        self.value.kind()
    }

    /// Whether the field is indexed.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Whether the field is stored.
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    /// Check the field can be indexed and stored.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(QuiverError::invalid_field("field name must not be empty"));
        }
        if self.name.starts_with('_') {
            return Err(QuiverError::invalid_field(format!(
                "field name '{}' uses the reserved '_' prefix",
                self.name
            )));
        }
        match &self.value {
            FieldValue::Text(_) => Ok(()),
            FieldValue::Numeric(v) if !v.is_finite() => Err(QuiverError::invalid_field(
                format!("{}: {v} is not a finite number", self.name),
            )),
            FieldValue::Numeric(_) => Ok(()),
            FieldValue::DateTime(dt) => codec::datetime_nanos(dt).map(|_| ()).map_err(|_| {
                QuiverError::invalid_field(format!(
                    "{}: {dt} is outside the representable nanosecond range",
                    self.name
                ))
            }),
        }
    }
}
