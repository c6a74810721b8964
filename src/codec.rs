//! Order-preserving encodings for numeric and date values.
//!
//! Both kinds map to a `u64` whose unsigned order (and so the byte order of
//! its big-endian form) matches the natural order of the values:
//!
//! - `f64`: take the IEEE-754 bits; negative values have all bits flipped,
//!   non-negative values get the sign bit set.
//! - `i64` (dates as nanoseconds since the Unix epoch): flip the sign bit.
//!
//! ```
//! use quiver::codec::{encode_f64, decode_f64};
//!
//! let a = encode_f64(-2.5).unwrap();
//! let b = encode_f64(0.1).unwrap();
//! assert!(a < b);
//! assert_eq!(a.to_be_bytes() < b.to_be_bytes(), true);
//! assert_eq!(decode_f64(b), 0.1);
//! ```

use chrono::{DateTime, Utc};

use crate::document::field::{FieldKind, FieldValue};
use crate::error::{QuiverError, Result};

/// Width in bytes of an encoded numeric or date value.
pub const ENCODED_LEN: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

/// Encode a finite float. NaN and infinities are rejected; `-0.0` encodes
/// the same as `0.0`.
pub fn encode_f64(value: f64) -> Result<u64> {
    if !value.is_finite() {
        return Err(QuiverError::invalid_field(format!(
            "{value} is not a finite number"
        )));
    }
    Ok(encode_f64_unchecked(value))
}

/// Encode any float, including infinities. Used for open query bounds.
pub(crate) fn encode_f64_unchecked(value: f64) -> u64 {
    let value = if value == 0.0 { 0.0 } else { value };
    let bits = value.to_bits();
    if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits | SIGN_BIT
    }
}

/// Inverse of [`encode_f64`].
pub fn decode_f64(encoded: u64) -> f64 {
    let bits = if encoded & SIGN_BIT != 0 {
        encoded & !SIGN_BIT
    } else {
        !encoded
    };
    f64::from_bits(bits)
}

/// Encode a signed integer.
pub fn encode_i64(value: i64) -> u64 {
    (value as u64) ^ SIGN_BIT
}

/// Inverse of [`encode_i64`].
pub fn decode_i64(encoded: u64) -> i64 {
    (encoded ^ SIGN_BIT) as i64
}

/// Nanoseconds since the Unix epoch, or an error outside the i64 range.
pub fn datetime_nanos(value: &DateTime<Utc>) -> Result<i64> {
    value.timestamp_nanos_opt().ok_or_else(|| {
        QuiverError::invalid_field(format!(
            "{value} is outside the representable nanosecond range"
        ))
    })
}

/// Encode a timestamp as sortable nanoseconds.
pub fn encode_datetime(value: &DateTime<Utc>) -> Result<u64> {
    datetime_nanos(value).map(encode_i64)
}

/// Inverse of [`encode_datetime`].
pub fn decode_datetime(encoded: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(decode_i64(encoded))
}

/// Sortable encoding of a numeric or date value.
pub fn encode_sortable(value: &FieldValue) -> Result<u64> {
    match value {
        FieldValue::Numeric(v) => encode_f64(*v),
        FieldValue::DateTime(dt) => encode_datetime(dt),
        FieldValue::Text(_) => Err(QuiverError::invalid_field(
            "text values have no sortable encoding",
        )),
    }
}

/// Encode a numeric or date value into its 8-byte big-endian form.
pub fn encode(value: &FieldValue) -> Result<[u8; ENCODED_LEN]> {
    encode_sortable(value).map(u64::to_be_bytes)
}

/// Decode an 8-byte value of the given kind.
pub fn decode(kind: FieldKind, bytes: &[u8]) -> Result<FieldValue> {
    let array: [u8; ENCODED_LEN] = bytes.try_into().map_err(|_| {
        QuiverError::corruption(format!(
            "encoded value has {} bytes, expected {ENCODED_LEN}",
            bytes.len()
        ))
    })?;
    let encoded = u64::from_be_bytes(array);
    match kind {
        FieldKind::Numeric => Ok(FieldValue::Numeric(decode_f64(encoded))),
        FieldKind::DateTime => Ok(FieldValue::DateTime(decode_datetime(encoded))),
        FieldKind::Text => Err(QuiverError::corruption(
            "text values have no fixed-width encoding",
        )),
    }
}

/// Numeric view of a sortable value, as used by aggregations: the float
/// itself for numbers, nanoseconds for dates.
pub fn metric_value(kind: FieldKind, encoded: u64) -> Option<f64> {
    match kind {
        FieldKind::Numeric => Some(decode_f64(encoded)),
        FieldKind::DateTime => Some(decode_i64(encoded) as f64),
        FieldKind::Text => None,
    }
}
