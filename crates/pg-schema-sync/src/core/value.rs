//! In-memory typed values.
//!
//! [`Value`] holds one non-null value of any [`ColumnKind`]. Nullable columns
//! carry their values inside [`Nullable`], which pairs the content with a
//! validity flag; [`Datum`] is what a table cell stores.

use chrono::{DateTime, FixedOffset, Utc};

use super::kind::ColumnKind;

/// A non-null value of one column kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Timestamp(DateTime<FixedOffset>),
    Bytea(Vec<u8>),
    Json(serde_json::Value),
    TextArray(Vec<String>),
    BoolArray(Vec<bool>),
    Int64Array(Vec<i64>),
    Float64Array(Vec<f64>),
    TimestampArray(Vec<DateTime<FixedOffset>>),
    JsonArray(Vec<serde_json::Value>),
}

impl Value {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Value::Text(_) => ColumnKind::String,
            Value::Bool(_) => ColumnKind::Bool,
            Value::Int64(_) => ColumnKind::Int64,
            Value::Float64(_) => ColumnKind::Float64,
            Value::Timestamp(_) => ColumnKind::Timestamp,
            Value::Bytea(_) => ColumnKind::Bytea,
            Value::Json(_) => ColumnKind::Json,
            Value::TextArray(_) => ColumnKind::StringSlice,
            Value::BoolArray(_) => ColumnKind::BoolSlice,
            Value::Int64Array(_) => ColumnKind::Int64Slice,
            Value::Float64Array(_) => ColumnKind::Float64Slice,
            Value::TimestampArray(_) => ColumnKind::TimestampSlice,
            Value::JsonArray(_) => ColumnKind::JsonSlice,
        }
    }

    /// The zero value of a kind: empty text, false, 0, the Unix epoch,
    /// empty bytes, JSON null, or an empty array.
    pub fn zero(kind: ColumnKind) -> Value {
        match kind {
            ColumnKind::String => Value::Text(String::new()),
            ColumnKind::Bool => Value::Bool(false),
            ColumnKind::Int64 => Value::Int64(0),
            ColumnKind::Float64 => Value::Float64(0.0),
            ColumnKind::Timestamp => Value::Timestamp(DateTime::<Utc>::UNIX_EPOCH.fixed_offset()),
            ColumnKind::Bytea => Value::Bytea(Vec::new()),
            ColumnKind::Json => Value::Json(serde_json::Value::Null),
            ColumnKind::StringSlice => Value::TextArray(Vec::new()),
            ColumnKind::BoolSlice => Value::BoolArray(Vec::new()),
            ColumnKind::Int64Slice => Value::Int64Array(Vec::new()),
            ColumnKind::Float64Slice => Value::Float64Array(Vec::new()),
            ColumnKind::TimestampSlice => Value::TimestampArray(Vec::new()),
            ColumnKind::JsonSlice => Value::JsonArray(Vec::new()),
        }
    }

    /// Whether this is an array value with no elements.
    pub fn is_empty_array(&self) -> bool {
        match self {
            Value::TextArray(v) => v.is_empty(),
            Value::BoolArray(v) => v.is_empty(),
            Value::Int64Array(v) => v.is_empty(),
            Value::Float64Array(v) => v.is_empty(),
            Value::TimestampArray(v) => v.is_empty(),
            Value::JsonArray(v) => v.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float64(n)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(t: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

/// Optional value with an explicit validity flag.
///
/// When `valid` is false the content is meaningless (it holds the kind's
/// zero value) and the value encodes as NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Nullable<T> {
    pub value: T,
    pub valid: bool,
}

impl<T> Nullable<T> {
    pub fn some(value: T) -> Self {
        Self { value, valid: true }
    }

    pub fn null(zero: T) -> Self {
        Self {
            value: zero,
            valid: false,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.valid.then_some(&self.value)
    }

    pub fn into_option(self) -> Option<T> {
        if self.valid {
            Some(self.value)
        } else {
            None
        }
    }
}

impl Nullable<Value> {
    /// NULL for the given kind.
    pub fn null_of(kind: ColumnKind) -> Self {
        Self::null(Value::zero(kind))
    }
}

/// One stored cell: a plain value for NOT NULL columns, a nullable wrapper
/// for nullable ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Value(Value),
    Nullable(Nullable<Value>),
}

impl Datum {
    /// The present value, or `None` for an invalid nullable.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Datum::Value(v) => Some(v),
            Datum::Nullable(n) => n.get(),
        }
    }

    /// Kind of the content, valid or not.
    pub fn kind(&self) -> ColumnKind {
        match self {
            Datum::Value(v) => v.kind(),
            Datum::Nullable(n) => n.value.kind(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.as_value().is_none()
    }
}
