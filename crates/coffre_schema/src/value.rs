//! Field values carried by documents and indexed columns.

use crate::catalog::AttrKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field value.
///
/// Documents are maps of attribute name to `FieldValue`; the same type is
/// used for the cleartext indexed columns of a [`crate::Row`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// UTF-8 text.
    Text(String),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Milliseconds since the epoch.
    Timestamp(i64),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Returns the zero value for an attribute kind.
    ///
    /// Zero values are what [`crate::Document`] factories fill in: empty
    /// string, zero integer, zero timestamp, empty byte vec.
    #[must_use]
    pub fn zero(kind: AttrKind) -> Self {
        match kind {
            AttrKind::Text => FieldValue::Text(String::new()),
            AttrKind::Integer => FieldValue::Integer(0),
            AttrKind::Timestamp => FieldValue::Timestamp(0),
            AttrKind::Bytes => FieldValue::Bytes(Vec::new()),
        }
    }

    /// Returns the value's kind.
    #[must_use]
    pub fn kind(&self) -> AttrKind {
        match self {
            FieldValue::Text(_) => AttrKind::Text,
            FieldValue::Integer(_) => AttrKind::Integer,
            FieldValue::Timestamp(_) => AttrKind::Timestamp,
            FieldValue::Bytes(_) => AttrKind::Bytes,
        }
    }

    /// Returns the text content, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer or timestamp content, if any.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) | FieldValue::Timestamp(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Integer(n) | FieldValue::Timestamp(n) => write!(f, "{n}"),
            FieldValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_match_kind() {
        assert_eq!(FieldValue::zero(AttrKind::Text), FieldValue::Text(String::new()));
        assert_eq!(FieldValue::zero(AttrKind::Integer), FieldValue::Integer(0));
        assert_eq!(FieldValue::zero(AttrKind::Timestamp), FieldValue::Timestamp(0));
        for kind in [AttrKind::Text, AttrKind::Integer, AttrKind::Timestamp, AttrKind::Bytes] {
            assert_eq!(FieldValue::zero(kind).kind(), kind);
        }
    }

    #[test]
    fn accessors() {
        assert_eq!(FieldValue::from("abc").as_text(), Some("abc"));
        assert_eq!(FieldValue::from(7).as_i64(), Some(7));
        assert_eq!(FieldValue::Timestamp(12).as_i64(), Some(12));
        assert_eq!(FieldValue::from("abc").as_i64(), None);
    }

    #[test]
    fn serialization_distinguishes_integer_and_timestamp() {
        let json = serde_json::to_string(&FieldValue::Timestamp(42)).unwrap();
        assert!(json.contains("Timestamp"));
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FieldValue::Timestamp(42));
        assert_ne!(back, FieldValue::Integer(42));
    }
}
