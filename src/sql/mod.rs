//! SQL utilities
//!
//! Provides DML generation, literal formatting, and BigQuery identifier
//! sanitization.

pub mod dml;
pub mod format;
pub mod sanitize;

pub use dml::{DmlBuilder, QueryArgs, QueryKind, assignments, column_list, set_clause};
pub use format::{TIMESTAMP_FORMAT, format_scalar, format_value, value_tuple};
pub use sanitize::{
    BIGQUERY_RESERVED_PREFIXES, MAX_FIELD_NAME_LEN, quote_identifier, to_bigquery_field_name,
    validate_field_name,
};
