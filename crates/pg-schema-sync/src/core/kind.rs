//! Column kinds and column type descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of value kinds a column can hold.
///
/// Every scalar kind except `Bytea` has a slice counterpart stored as a
/// PostgreSQL array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    String,
    Bool,
    Int64,
    Float64,
    Timestamp,
    Bytea,
    Json,
    StringSlice,
    BoolSlice,
    Int64Slice,
    Float64Slice,
    TimestampSlice,
    JsonSlice,
}

impl ColumnKind {
    /// Every kind, in declaration order.
    pub const ALL: [ColumnKind; 13] = [
        ColumnKind::String,
        ColumnKind::Bool,
        ColumnKind::Int64,
        ColumnKind::Float64,
        ColumnKind::Timestamp,
        ColumnKind::Bytea,
        ColumnKind::Json,
        ColumnKind::StringSlice,
        ColumnKind::BoolSlice,
        ColumnKind::Int64Slice,
        ColumnKind::Float64Slice,
        ColumnKind::TimestampSlice,
        ColumnKind::JsonSlice,
    ];

    pub fn is_slice(self) -> bool {
        self.element() != self
    }

    /// Element kind of a slice kind; scalar kinds return themselves.
    pub fn element(self) -> ColumnKind {
        match self {
            ColumnKind::StringSlice => ColumnKind::String,
            ColumnKind::BoolSlice => ColumnKind::Bool,
            ColumnKind::Int64Slice => ColumnKind::Int64,
            ColumnKind::Float64Slice => ColumnKind::Float64,
            ColumnKind::TimestampSlice => ColumnKind::Timestamp,
            ColumnKind::JsonSlice => ColumnKind::Json,
            scalar => scalar,
        }
    }

    /// Slice kind holding elements of this kind, if one exists.
    pub fn slice_of(self) -> Option<ColumnKind> {
        match self {
            ColumnKind::String => Some(ColumnKind::StringSlice),
            ColumnKind::Bool => Some(ColumnKind::BoolSlice),
            ColumnKind::Int64 => Some(ColumnKind::Int64Slice),
            ColumnKind::Float64 => Some(ColumnKind::Float64Slice),
            ColumnKind::Timestamp => Some(ColumnKind::TimestampSlice),
            ColumnKind::Json => Some(ColumnKind::JsonSlice),
            _ => None,
        }
    }

    /// Whether `max_size` carries meaning for this kind.
    pub fn is_sized(self) -> bool {
        matches!(self, ColumnKind::String | ColumnKind::StringSlice)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::String => "string",
            ColumnKind::Bool => "bool",
            ColumnKind::Int64 => "int64",
            ColumnKind::Float64 => "float64",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Bytea => "bytea",
            ColumnKind::Json => "json",
            ColumnKind::StringSlice => "string_slice",
            ColumnKind::BoolSlice => "bool_slice",
            ColumnKind::Int64Slice => "int64_slice",
            ColumnKind::Float64Slice => "float64_slice",
            ColumnKind::TimestampSlice => "timestamp_slice",
            ColumnKind::JsonSlice => "json_slice",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Describes the storage type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    #[serde(rename = "type")]
    pub kind: ColumnKind,

    /// Maximum character length for string kinds; 0 means unbounded.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_size: u32,

    #[serde(default = "default_true")]
    pub nullable: bool,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl ColumnType {
    /// Nullable, unbounded column of the given kind.
    pub fn new(kind: ColumnKind) -> Self {
        Self {
            kind,
            max_size: 0,
            nullable: true,
        }
    }

    /// Bounded string (or string slice) column.
    pub fn sized(kind: ColumnKind, max_size: u32) -> Self {
        Self {
            kind,
            max_size,
            nullable: true,
        }
    }

    /// Mark the column NOT NULL.
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_not_null(&self) -> bool {
        !self.nullable
    }

    /// `max_size` as the engine sees it: ignored for non-string kinds.
    pub fn effective_max_size(&self) -> u32 {
        if self.kind.is_sized() {
            self.max_size
        } else {
            0
        }
    }

    /// Two descriptors share storage when kind and effective size agree.
    /// Nullability is not part of the storage type.
    pub fn same_storage(&self, other: &ColumnType) -> bool {
        self.kind == other.kind && self.effective_max_size() == other.effective_max_size()
    }
}
