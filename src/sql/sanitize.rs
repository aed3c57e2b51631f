//! BigQuery Identifier Sanitization Utilities
//!
//! Turns arbitrary strings into BigQuery-compliant field names and quotes
//! identifiers for use in queries.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PipelineError, Result};

/// Maximum length of a BigQuery column name
pub const MAX_FIELD_NAME_LEN: usize = 128;

/// Column name prefixes BigQuery reserves for itself (matched case-insensitively)
pub const BIGQUERY_RESERVED_PREFIXES: &[&str] = &[
    "_TABLE_",
    "_FILE_",
    "_PARTITION",
    "_ROW_TIMESTAMP",
    "__ROOT__",
    "_COLIDENTIFIER",
];

static FIELD_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("field name pattern"));

/// Transform a string into a valid BigQuery field name
///
/// Steps:
/// - Strip leading/trailing whitespace
/// - Replace every character that is not an ASCII letter or digit with `_`
/// - Prefix with `_` if the first character is a digit
/// - Keep only the first 128 characters
///
/// # Example
/// ```
/// use dataops_pipeline_tools::sql::to_bigquery_field_name;
///
/// assert_eq!(to_bigquery_field_name(" ticket-id ").unwrap(), "ticket_id");
/// assert_eq!(to_bigquery_field_name("1st reply").unwrap(), "_1st_reply");
/// ```
pub fn to_bigquery_field_name(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::invalid_argument(format!(
            "Cannot derive a field name from '{}'",
            input
        )));
    }

    let mut name = String::with_capacity(trimmed.len() + 1);
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        name.push('_');
    }
    name.extend(
        trimmed
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }),
    );

    // Every char is ASCII at this point
    name.truncate(MAX_FIELD_NAME_LEN);
    Ok(name)
}

/// Validate a BigQuery column name
///
/// Rules:
/// - Must start with a letter or underscore
/// - Can only contain letters, numbers, and underscores
/// - At most 128 characters
/// - Cannot start with a reserved prefix
///
/// # Example
/// ```
/// use dataops_pipeline_tools::sql::validate_field_name;
///
/// assert!(validate_field_name("ticket_id").is_ok());
/// assert!(validate_field_name("1st").is_err());
/// assert!(validate_field_name("_TABLE_SUFFIX").is_err());
/// ```
pub fn validate_field_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("Field name cannot be empty".to_string());
    }

    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(format!(
            "Field name '{}' is longer than {} characters",
            name, MAX_FIELD_NAME_LEN
        ));
    }

    if !FIELD_NAME_RE.is_match(name) {
        return Err(format!(
            "Field name '{}' is invalid. Must start with a letter or underscore and contain only letters, numbers, and underscores.",
            name
        ));
    }

    let upper = name.to_ascii_uppercase();
    if let Some(prefix) = BIGQUERY_RESERVED_PREFIXES
        .iter()
        .find(|prefix| upper.starts_with(*prefix))
    {
        return Err(format!(
            "Field name '{}' uses the reserved prefix '{}'",
            name, prefix
        ));
    }

    Ok(())
}

/// Quote a BigQuery identifier with backticks
///
/// # Example
/// ```
/// use dataops_pipeline_tools::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("proj.ds.tbl"), "`proj.ds.tbl`");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{}`", escaped)
}
