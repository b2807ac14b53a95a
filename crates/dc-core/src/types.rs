//! Common types used throughout docclip

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ValueError, ValueResult};

/// Opaque document identifier.
///
/// Document stores hand out non-numeric ids (hex object ids, UUIDs), so the
/// id is kept as text. It must be usable as a path fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Parse an id, rejecting values that are empty or not path-safe
    pub fn parse(raw: impl Into<String>) -> ValueResult<Self> {
        let raw = raw.into();
        let unsafe_char = |c: char| c == '/' || c == '\\' || c.is_whitespace() || c.is_control();
        if raw.is_empty() || raw.contains("..") || raw.chars().any(unsafe_char) {
            return Err(ValueError::InvalidId(raw));
        }
        Ok(Self(raw))
    }

    /// Generate a fresh random id (32 lowercase hex characters)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Declared type of a document attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }

    /// Check whether a value can be stored in an attribute of this type
    pub fn accepts(&self, value: &Value) -> bool {
        value.attribute_type() == *self
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored attribute value.
///
/// There is no null variant: an absent attribute is simply missing from the
/// document, which keeps "never set" distinguishable from any real value.
///
/// Timestamps serialize as RFC 3339 strings and every string deserializes
/// as `Text`, so a file name that happens to look like a date stays text.
/// `as_timestamp` reads either form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Boolean(_) => AttributeType::Boolean,
            Self::Integer(_) => AttributeType::Integer,
            Self::Float(_) => AttributeType::Float,
            Self::Timestamp(_) => AttributeType::Timestamp,
            Self::Text(_) => AttributeType::Text,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            Self::Text(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_parse() {
        let id = DocumentId::parse("507f191e810c19729de860ea").unwrap();
        assert_eq!(id.as_str(), "507f191e810c19729de860ea");
        assert_eq!(id.to_string(), "507f191e810c19729de860ea");

        assert!(DocumentId::parse("").is_err());
        assert!(DocumentId::parse("a/b").is_err());
        assert!(DocumentId::parse("..").is_err());
        assert!(DocumentId::parse("with space").is_err());
    }

    #[test]
    fn test_generated_ids_are_distinct_hex() {
        let a = DocumentId::generate();
        let b = DocumentId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_document_id_serde() {
        let id: DocumentId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert!(serde_json::from_str::<DocumentId>("\"\"").is_err());
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::from("x").attribute_type(), AttributeType::Text);
        assert_eq!(Value::from(3_i64).attribute_type(), AttributeType::Integer);
        assert!(AttributeType::Integer.accepts(&Value::Integer(1)));
        assert!(!AttributeType::Integer.accepts(&Value::Text("1".into())));
        assert_eq!(Value::Integer(7).as_integer(), Some(7));
        assert_eq!(Value::Integer(7).as_text(), None);
    }

    #[test]
    fn test_date_like_text_stays_text() {
        let value: Value = serde_json::from_str("\"2024-01-02T03:04:05Z\"").unwrap();
        assert_eq!(value, Value::Text("2024-01-02T03:04:05Z".to_string()));
        assert_eq!(value.as_text(), Some("2024-01-02T03:04:05Z"));
        assert_eq!(
            value.as_timestamp().map(|at| at.timestamp()),
            Some(1_704_164_645)
        );

        let value: Value = serde_json::from_str("\"report.pdf\"").unwrap();
        assert_eq!(value, Value::Text("report.pdf".to_string()));
        assert_eq!(value.as_timestamp(), None);
    }
}
