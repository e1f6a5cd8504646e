//! Type mapping between column kinds and PostgreSQL type names.

use crate::core::kind::{ColumnKind, ColumnType};
use crate::error::{Result, SchemaError};

const VARCHAR_PREFIX: &str = "character varying(";
const ARRAY_SUFFIX: &str = "[]";

/// PostgreSQL type name for a kind, without any NOT NULL clause.
pub fn base_type_name(kind: ColumnKind, max_size: u32) -> String {
    let scalar = match kind {
        ColumnKind::String | ColumnKind::StringSlice if max_size > 0 => {
            format!("{}{})", VARCHAR_PREFIX, max_size)
        }
        ColumnKind::String | ColumnKind::StringSlice => "text".to_string(),
        ColumnKind::Bool | ColumnKind::BoolSlice => "boolean".to_string(),
        ColumnKind::Int64 | ColumnKind::Int64Slice => "bigint".to_string(),
        ColumnKind::Float64 | ColumnKind::Float64Slice => "double precision".to_string(),
        ColumnKind::Timestamp | ColumnKind::TimestampSlice => {
            "timestamp without time zone".to_string()
        }
        ColumnKind::Bytea => "bytea".to_string(),
        ColumnKind::Json | ColumnKind::JsonSlice => "jsonb".to_string(),
    };
    if kind.is_slice() {
        format!("{}{}", scalar, ARRAY_SUFFIX)
    } else {
        scalar
    }
}

/// Full column type as used in `ADD COLUMN`, including ` NOT NULL`.
pub fn to_native_type_name(ty: &ColumnType) -> String {
    let base = base_type_name(ty.kind, ty.effective_max_size());
    if ty.is_not_null() {
        format!("{} NOT NULL", base)
    } else {
        base
    }
}

/// Parse a type name as printed by `format_type()`.
///
/// The result is always nullable; callers apply the column's NOT NULL flag.
/// `timestamp with time zone` and `date` collapse into the timestamp kind,
/// and `json` into the json kind, so the mapping is lossy for them.
pub fn from_native_type_name(name: &str) -> Result<ColumnType> {
    let trimmed = name.trim();
    let (scalar, is_array) = match trimmed.strip_suffix(ARRAY_SUFFIX) {
        Some(inner) => (inner.trim_end(), true),
        None => (trimmed, false),
    };

    let (kind, max_size) = match scalar {
        "text" | "character varying" => (ColumnKind::String, 0),
        "boolean" => (ColumnKind::Bool, 0),
        "bigint" => (ColumnKind::Int64, 0),
        "double precision" => (ColumnKind::Float64, 0),
        "timestamp without time zone" | "timestamp with time zone" | "date" => {
            (ColumnKind::Timestamp, 0)
        }
        "bytea" => (ColumnKind::Bytea, 0),
        "json" | "jsonb" => (ColumnKind::Json, 0),
        other => match parse_varchar(other) {
            Some(size) => (ColumnKind::String, size),
            None => return Err(unknown_type(name)),
        },
    };

    let kind = if is_array {
        kind.slice_of().ok_or_else(|| unknown_type(name))?
    } else {
        kind
    };
    Ok(ColumnType::sized(kind, max_size))
}

fn parse_varchar(name: &str) -> Option<u32> {
    name.strip_prefix(VARCHAR_PREFIX)?
        .strip_suffix(')')?
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
}

fn unknown_type(name: &str) -> SchemaError {
    SchemaError::InvalidType(format!("unsupported PostgreSQL type '{}'", name))
}

/// Literal used as the default when a column is forced NOT NULL.
pub fn default_literal(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::String => "''",
        ColumnKind::Bool => "false",
        ColumnKind::Int64 | ColumnKind::Float64 => "0",
        ColumnKind::Timestamp => "'0001-01-01 00:00:00'::timestamp",
        ColumnKind::Bytea
        | ColumnKind::Json
        | ColumnKind::StringSlice
        | ColumnKind::BoolSlice
        | ColumnKind::Int64Slice
        | ColumnKind::Float64Slice
        | ColumnKind::TimestampSlice
        | ColumnKind::JsonSlice => "NULL",
    }
}
