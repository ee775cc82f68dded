use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

/// The closed set of shapes a validated field can take.
///
/// Every entity converts its fields into a `FieldValue` before rules run, so rules only ever have
/// to reason about these variants. "Emptiness" and "length" are defined per variant below instead
/// of being discovered at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// Text that must never be printed, such as a password.
    Sensitive(SensitiveText),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Identifier(Uuid),
    Collection(Vec<FieldValue>),
    /// One level of optional indirection. `Required` looks through it, length rules too.
    Optional(Option<Box<FieldValue>>),
}

impl FieldValue {
    /// Whether the value is the "zero" of its kind.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Sensitive(s) => s.0.is_empty(),
            FieldValue::Integer(n) => *n == 0,
            FieldValue::Float(f) => *f == 0.0,
            FieldValue::Bool(b) => !b,
            FieldValue::Timestamp(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
            FieldValue::Identifier(id) => id.is_nil(),
            FieldValue::Collection(items) => items.is_empty(),
            FieldValue::Optional(None) => true,
            FieldValue::Optional(Some(inner)) => inner.is_empty(),
        }
    }

    /// The length of a length-bearing value: graphemes for text, elements for collections.
    ///
    /// Returns `None` for numbers, booleans, timestamps, identifiers and absent optionals.
    pub fn length(&self) -> Option<usize> {
        match self {
            FieldValue::Text(s) => Some(s.graphemes(true).count()),
            FieldValue::Sensitive(s) => Some(s.0.graphemes(true).count()),
            FieldValue::Collection(items) => Some(items.len()),
            FieldValue::Optional(Some(inner)) => match inner.as_ref() {
                FieldValue::Optional(_) => None,
                other => other.length(),
            },
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Sensitive(s) => Some(&s.0),
            FieldValue::Optional(Some(inner)) => match inner.as_ref() {
                FieldValue::Text(s) => Some(s),
                FieldValue::Sensitive(s) => Some(&s.0),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Sensitive(_) => "sensitive text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "bool",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Identifier(_) => "identifier",
            FieldValue::Collection(_) => "collection",
            FieldValue::Optional(_) => "optional",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Sensitive(s) => write!(f, "{s}"),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Float(n) => write!(f, "{n}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            FieldValue::Identifier(id) => write!(f, "{id}"),
            FieldValue::Collection(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            FieldValue::Optional(None) => write!(f, "<nil>"),
            FieldValue::Optional(Some(inner)) => write!(f, "{inner}"),
        }
    }
}

/// Text that rules can measure and compare but that prints as `[REDACTED]`.
#[derive(Clone, PartialEq, Eq)]
pub struct SensitiveText(String);

impl fmt::Debug for SensitiveText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SensitiveText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        FieldValue::Text(s.clone())
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Integer(n.into())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        FieldValue::Integer(n.into())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Float(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(t)
    }
}

impl From<Uuid> for FieldValue {
    fn from(id: Uuid) -> Self {
        FieldValue::Identifier(id)
    }
}

impl From<&Secret<String>> for FieldValue {
    fn from(secret: &Secret<String>) -> Self {
        FieldValue::Sensitive(SensitiveText(secret.expose_secret().clone()))
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::Collection(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        FieldValue::Optional(value.map(|v| Box::new(v.into())))
    }
}
