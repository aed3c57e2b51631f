//! DML Generation for BigQuery tables
//!
//! Builds SELECT, INSERT, and UPDATE statements for a single table from
//! `Record` payloads.

use std::fmt;
use std::str::FromStr;

use crate::error::{PipelineError, Result};
use crate::sql::format::{format_scalar, value_tuple};
use crate::sql::sanitize::quote_identifier;
use crate::types::{Record, TableRef, Value};

/// Kind of statement produced by `DmlBuilder::generate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
}

impl FromStr for QueryKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SELECT" => Ok(QueryKind::Select),
            "INSERT" => Ok(QueryKind::Insert),
            "UPDATE" => Ok(QueryKind::Update),
            other => Err(PipelineError::invalid_argument(format!(
                "query kind '{}' is not one of SELECT, INSERT, UPDATE",
                other
            ))),
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
        };
        f.write_str(kind)
    }
}

/// Optional arguments for `DmlBuilder::generate`
///
/// `selector` only applies to SELECT, `data` is required for INSERT and
/// UPDATE, and `where_clause` is appended verbatim to SELECT and UPDATE.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryArgs<'a> {
    pub selector: Option<&'a str>,
    pub where_clause: Option<&'a str>,
    pub data: Option<&'a Record>,
}

impl<'a> QueryArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(mut self, selector: &'a str) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn where_clause(mut self, where_clause: &'a str) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    pub fn data(mut self, data: &'a Record) -> Self {
        self.data = Some(data);
        self
    }
}

/// DML generator bound to one table
#[derive(Debug, Clone)]
pub struct DmlBuilder {
    table: TableRef,
}

impl DmlBuilder {
    /// Create a new DML builder for the given table
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Generate a statement from a textual query kind
    ///
    /// Fails with `InvalidArgument` for anything other than `SELECT`,
    /// `INSERT`, or `UPDATE`.
    pub fn generate(&self, kind: &str, args: QueryArgs<'_>) -> Result<String> {
        self.generate_kind(kind.parse()?, args)
    }

    /// Generate a statement for a parsed query kind
    pub fn generate_kind(&self, kind: QueryKind, args: QueryArgs<'_>) -> Result<String> {
        match kind {
            QueryKind::Select => Ok(self.select(args.selector, args.where_clause)),
            QueryKind::Insert => Ok(self.insert(Self::require_data(kind, args.data)?)),
            QueryKind::Update => {
                let update = self.update(Self::require_data(kind, args.data)?);
                Ok(append_where(update, args.where_clause))
            }
        }
    }

    fn require_data(kind: QueryKind, data: Option<&Record>) -> Result<&Record> {
        data.ok_or_else(|| {
            PipelineError::invalid_argument(format!("{} requires a record payload", kind))
        })
    }

    /// Generate `SELECT <selector or *> FROM <table> [<where>]`
    pub fn select(&self, selector: Option<&str>, where_clause: Option<&str>) -> String {
        let selector = non_blank(selector).unwrap_or("*");
        let select = format!("SELECT {} FROM {}", selector, self.table);
        append_where(select, where_clause)
    }

    /// Generate an INSERT statement
    ///
    /// Column list and value tuple are built from the same record, so their
    /// positions line up.
    pub fn insert(&self, data: &Record) -> String {
        format!(
            "INSERT {} {}VALUES{}",
            quote_identifier(&self.table.to_string()),
            column_list(data),
            value_tuple(data)
        )
    }

    /// Generate an UPDATE statement without a WHERE clause
    pub fn update(&self, data: &Record) -> String {
        format!("UPDATE {} SET {}", self.table, set_clause(data))
    }
}

fn append_where(statement: String, where_clause: Option<&str>) -> String {
    match non_blank(where_clause) {
        Some(clause) => format!("{} {}", statement, clause),
        None => statement,
    }
}

// Blank selectors and WHERE clauses count as absent
fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|s| !s.trim().is_empty())
}

/// Top-level keys as `(col1, col2, ...) `, trailing space included
pub fn column_list(data: &Record) -> String {
    format!("({}) ", data.keys().collect::<Vec<_>>().join(", "))
}

/// Flatten a record into `(dotted_key, literal)` pairs for a SET clause
///
/// Nested records contribute their fields under `parent.child` paths.
/// Sequences render record elements as `STRUCT(...)`.
pub fn assignments(data: &Record) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    collect_assignments(data, None, &mut pairs);
    pairs
}

fn collect_assignments(data: &Record, parent: Option<&str>, pairs: &mut Vec<(String, String)>) {
    for (key, value) in data.iter() {
        let path = match parent {
            Some(parent) => format!("{}.{}", parent, key),
            None => key.to_string(),
        };
        match value {
            Value::Record(child) => collect_assignments(child, Some(&path), pairs),
            other => pairs.push((path, format_update_value(other))),
        }
    }
}

fn format_update_value(value: &Value) -> String {
    match value {
        Value::Sequence(items) => format!(
            "[{}]",
            items
                .iter()
                .map(|item| match item {
                    Value::Record(record) => format!("STRUCT({})", set_clause(record)),
                    other => format_update_value(other),
                })
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => format_scalar(other),
    }
}

/// Assignments joined as `key = value, ...`
pub fn set_clause(data: &Record) -> String {
    assignments(data)
        .into_iter()
        .map(|(key, value)| format!("{} = {}", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}
