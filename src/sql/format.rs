//! Literal formatting for DML statements
//!
//! Values are rendered as best-effort BigQuery literals. Plain strings are
//! emitted verbatim and unquoted, so callers must not pass untrusted text.

use tracing::warn;

use crate::types::{Record, Value};

/// Timestamp layout used in INSERT and UPDATE literals
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a single value as an INSERT literal
///
/// Records become parenthesized value tuples and sequences become
/// `[...]` arrays, recursively.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Sequence(items) => format!(
            "[{}]",
            items.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
        Value::Record(record) => value_tuple(record),
        scalar => format_scalar(scalar),
    }
}

/// Format a value that is not a container
///
/// Containers reaching this function are rendered with the INSERT rules.
pub fn format_scalar(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) if s.contains("https://") => format!("\"{}\"", s),
        Value::String(s) => s.clone(),
        Value::Timestamp(ts) => format!("\"{}\"", ts.format(TIMESTAMP_FORMAT)),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format!("{:?}", f),
        Value::Float(f) => {
            warn!(value = %f, "non-finite float rendered as NULL");
            "NULL".to_string()
        }
        Value::Boolean(true) => "TRUE".to_string(),
        Value::Boolean(false) => "FALSE".to_string(),
        Value::Sequence(_) | Value::Record(_) => format_value(value),
    }
}

/// Parenthesized, comma-separated literals of a record's values, in key order
pub fn value_tuple(record: &Record) -> String {
    format!(
        "({})",
        record.values().map(format_value).collect::<Vec<_>>().join(", ")
    )
}
