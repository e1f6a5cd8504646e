//! Text codec between typed values and PostgreSQL's text format.
//!
//! Empty text stands for NULL in both directions. This makes an empty
//! string, and an empty array, indistinguishable from NULL once encoded;
//! [`to_param`] avoids the ambiguity when binding statement parameters.

mod array;

pub use array::{format_array, parse_array, ARRAY_DELIMITER};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat};

use crate::core::kind::{ColumnKind, ColumnType};
use crate::core::value::{Datum, Nullable, Value};
use crate::error::{Result, SchemaError};

/// Encode a cell to text. Absent and NULL cells encode to `""`.
pub fn encode(ty: &ColumnType, datum: Option<&Datum>) -> Result<String> {
    let Some(datum) = datum else {
        return Ok(String::new());
    };
    if datum.kind() != ty.kind {
        return Err(SchemaError::InvalidType(format!(
            "value of kind {} stored in {} column",
            datum.kind(),
            ty.kind
        )));
    }
    match datum.as_value() {
        Some(value) => Ok(encode_value(value)),
        None => Ok(String::new()),
    }
}

/// Encode a present value. Empty arrays encode to `""`.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Bool(b) => encode_bool(*b).to_string(),
        Value::Int64(n) => n.to_string(),
        Value::Float64(f) => format_float(*f),
        Value::Timestamp(t) => encode_timestamp(t),
        Value::Bytea(bytes) => {
            if bytes.is_empty() {
                String::new()
            } else {
                format!("\\x{}", hex::encode(bytes))
            }
        }
        Value::Json(j) => j.to_string(),
        Value::TextArray(items) => encode_array(items, |s| s.clone()),
        Value::BoolArray(items) => encode_array(items, |b| encode_bool(*b).to_string()),
        Value::Int64Array(items) => encode_array(items, |n| n.to_string()),
        Value::Float64Array(items) => encode_array(items, |f| format_float(*f)),
        Value::TimestampArray(items) => encode_array(items, encode_timestamp),
        Value::JsonArray(items) => encode_array(items, |j| j.to_string()),
    }
}

/// Text for a statement parameter: `None` for NULL, and explicit literals
/// for empty arrays and empty bytea so they are not sent as NULL.
pub fn to_param(ty: &ColumnType, datum: Option<&Datum>) -> Result<Option<String>> {
    let text = encode(ty, datum)?;
    if !text.is_empty() {
        return Ok(Some(text));
    }
    match datum.and_then(Datum::as_value) {
        None => Ok(None),
        Some(v) if v.is_empty_array() => Ok(Some("{}".to_string())),
        Some(Value::Bytea(_)) => Ok(Some("\\x".to_string())),
        Some(_) => Ok(Some(String::new())),
    }
}

/// Decode text into a cell.
///
/// Empty text is absent: `None` for NOT NULL columns, an invalid
/// [`Nullable`] for nullable ones. Present values on nullable columns come
/// back wrapped in a valid [`Nullable`].
pub fn decode(ty: &ColumnType, text: &str) -> Result<Option<Datum>> {
    if text.is_empty() {
        return Ok(ty
            .nullable
            .then(|| Datum::Nullable(Nullable::null_of(ty.kind))));
    }
    let value = decode_value(ty.kind, text)?;
    Ok(Some(if ty.nullable {
        Datum::Nullable(Nullable::some(value))
    } else {
        Datum::Value(value)
    }))
}

/// Decode non-empty text as a value of `kind`.
pub fn decode_value(kind: ColumnKind, text: &str) -> Result<Value> {
    match kind {
        ColumnKind::String => Ok(Value::Text(text.to_string())),
        ColumnKind::Bool => decode_bool(text, 0).map(Value::Bool),
        ColumnKind::Int64 => decode_int(text, 0).map(Value::Int64),
        ColumnKind::Float64 => decode_float(text, 0).map(Value::Float64),
        ColumnKind::Timestamp => decode_timestamp(text, 0).map(Value::Timestamp),
        ColumnKind::Bytea => decode_bytea(text).map(Value::Bytea),
        ColumnKind::Json => decode_json(text, 0).map(Value::Json),
        ColumnKind::StringSlice => Ok(Value::TextArray(parse_array(text)?)),
        ColumnKind::BoolSlice => decode_array(text, decode_bool).map(Value::BoolArray),
        ColumnKind::Int64Slice => decode_array(text, decode_int).map(Value::Int64Array),
        ColumnKind::Float64Slice => decode_array(text, decode_float).map(Value::Float64Array),
        ColumnKind::TimestampSlice => {
            decode_array(text, decode_timestamp).map(Value::TimestampArray)
        }
        ColumnKind::JsonSlice => decode_array(text, decode_json).map(Value::JsonArray),
    }
}

fn encode_array<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        return String::new();
    }
    let encoded: Vec<String> = items.iter().map(f).collect();
    format_array(&encoded)
}

fn decode_array<T>(text: &str, f: impl Fn(&str, usize) -> Result<T>) -> Result<Vec<T>> {
    parse_array(text)?
        .iter()
        .enumerate()
        .map(|(i, item)| f(item.as_str(), i))
        .collect()
}

fn encode_bool(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "f"
    }
}

fn decode_bool(text: &str, position: usize) -> Result<bool> {
    match text {
        "t" | "true" => Ok(true),
        "f" | "false" => Ok(false),
        other => Err(SchemaError::decode(
            position,
            format!("invalid boolean {:?}", other),
        )),
    }
}

fn decode_int(text: &str, position: usize) -> Result<i64> {
    text.parse::<i64>()
        .map_err(|e| SchemaError::decode(position, format!("{:?}: {}", text, e)))
}

fn decode_float(text: &str, position: usize) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|e| SchemaError::decode(position, format!("{:?}: {}", text, e)))
}

/// Fixed-notation decimal with 17 significant digits, enough for any f64
/// to read back bit-identical.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    // "-d.dddddddddddddddde-N" -> sign, 17 digits, exponent
    let sci = format!("{:.16e}", f);
    let (sign, unsigned) = match sci.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", sci.as_str()),
    };
    let (mantissa, exponent) = unsigned.split_once('e').unwrap_or((unsigned, "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let point = exponent + 1;
    let body = if point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else if point as usize >= digits.len() {
        format!("{}{}", digits, "0".repeat(point as usize - digits.len()))
    } else {
        let (int_part, frac_part) = digits.split_at(point as usize);
        format!("{}.{}", int_part, frac_part)
    };
    format!("{}{}", sign, body)
}

fn encode_timestamp(t: &DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Accepts RFC 3339 plus the forms PostgreSQL prints for `timestamp`,
/// `timestamptz` and `date`. Zoneless input is taken as UTC.
fn decode_timestamp(text: &str, position: usize) -> Result<DateTime<FixedOffset>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t);
    }
    if let Ok(t) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(t);
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(t.and_utc().fixed_offset());
    }
    if let Some(t) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(t.and_utc().fixed_offset());
    }
    Err(SchemaError::decode(
        position,
        format!("invalid timestamp {:?}", text),
    ))
}

fn decode_bytea(text: &str) -> Result<Vec<u8>> {
    let digits = text
        .strip_prefix("\\x")
        .ok_or_else(|| SchemaError::decode(0, "bytea text must start with \\x"))?;
    hex::decode(digits).map_err(|e| SchemaError::decode(0, e))
}

fn decode_json(text: &str, position: usize) -> Result<serde_json::Value> {
    serde_json::from_str(text).map_err(|e| SchemaError::decode(position, e))
}
