//! BigQuery schema inference
//!
//! Deduces a BigQuery table schema from a batch of JSON records. Types widen
//! across records (INTEGER + FLOAT becomes FLOAT, quoted values mixed with
//! plain strings become STRING); irreconcilable fields are dropped and
//! reported as `SchemaError`s.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::SchemaOptions;

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-\d{1,2}-\d{1,2}[T ]\d{1,2}:\d{1,2}:\d{1,2}(\.\d{1,6})?\s*(Z|UTC|[+-]\d{1,2}(:?\d{2})?)?$",
    )
    .expect("timestamp pattern")
});
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("date pattern"));
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}:\d{1,2}:\d{1,2}(\.\d{1,6})?$").expect("time pattern")
});
static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d+$").expect("integer pattern"));
static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").expect("float pattern")
});

// ============================================================================
// Schema Types
// ============================================================================

/// BigQuery column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
    Time,
    Record,
}

/// BigQuery column mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    Nullable,
    Required,
    Repeated,
}

/// One column of a BigQuery schema
///
/// Fields are declared in alphabetical order so the serialized JSON has
/// sorted keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Sub-fields for RECORD columns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SchemaField>,
    pub mode: FieldMode,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl SchemaField {
    /// Create a NULLABLE field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            fields: Vec::new(),
            mode: FieldMode::Nullable,
            name: name.into(),
            field_type,
        }
    }

    /// Set the mode
    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set sub-fields
    pub fn with_fields(mut self, fields: Vec<SchemaField>) -> Self {
        self.fields = fields;
        self
    }
}

/// A problem found while deducing the schema of one input record
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct SchemaError {
    /// 1-based position of the record in the input
    pub line: usize,
    pub message: String,
}

// ============================================================================
// Deduction State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Null,
    EmptyArray,
    EmptyRecord,
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
    Time,
    // Strings that look like numbers or booleans
    QInteger,
    QFloat,
    QBoolean,
    Record,
}

impl Kind {
    fn is_soft(self) -> bool {
        matches!(self, Kind::Null | Kind::EmptyArray | Kind::EmptyRecord)
    }

    fn is_lexical(self) -> bool {
        matches!(
            self,
            Kind::String
                | Kind::Timestamp
                | Kind::Date
                | Kind::Time
                | Kind::QInteger
                | Kind::QFloat
                | Kind::QBoolean
        )
    }

    fn name(self) -> &'static str {
        match self {
            Kind::Null => "NULL",
            Kind::EmptyArray => "EMPTY ARRAY",
            Kind::EmptyRecord => "EMPTY RECORD",
            Kind::String => "STRING",
            Kind::Integer | Kind::QInteger => "INTEGER",
            Kind::Float | Kind::QFloat => "FLOAT",
            Kind::Boolean | Kind::QBoolean => "BOOLEAN",
            Kind::Timestamp => "TIMESTAMP",
            Kind::Date => "DATE",
            Kind::Time => "TIME",
            Kind::Record => "RECORD",
        }
    }
}

/// Common type of two hard kinds, if any
fn widen(old: Kind, new: Kind) -> Option<Kind> {
    use Kind::*;

    if old == new {
        return Some(old);
    }
    match (old, new) {
        (Integer | QInteger, Float | QFloat) | (Float | QFloat, Integer | QInteger) => {
            if old == QInteger && new == QFloat || old == QFloat && new == QInteger {
                Some(QFloat)
            } else {
                Some(Float)
            }
        }
        (Float, QFloat) | (QFloat, Float) => Some(Float),
        (Integer, QInteger) | (QInteger, Integer) => Some(Integer),
        (Boolean, QBoolean) | (QBoolean, Boolean) => Some(Boolean),
        (a, b) if a.is_lexical() && b.is_lexical() => Some(String),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct Entry {
    kind: Kind,
    repeated: bool,
    fields: Vec<(String, Entry)>,
    /// Parent records in which this field held a non-null value
    filled: usize,
    /// Record instances merged into `fields`
    seen: usize,
    ignored: bool,
}

impl Entry {
    fn scalar(kind: Kind) -> Self {
        Self {
            kind,
            repeated: false,
            fields: Vec::new(),
            filled: usize::from(!kind.is_soft()),
            seen: 0,
            ignored: false,
        }
    }

    fn empty_array() -> Self {
        Self {
            repeated: true,
            ..Self::scalar(Kind::EmptyArray)
        }
    }
}

fn mode_name(repeated: bool) -> &'static str {
    if repeated { "REPEATED" } else { "NULLABLE" }
}

fn merge(
    mut old: Entry,
    new: Entry,
    line: usize,
    errors: &mut Vec<SchemaError>,
) -> Result<Entry, String> {
    if new.kind.is_soft() {
        return Ok(if old.kind == Kind::Null { new } else { old });
    }
    if old.kind.is_soft() {
        return Ok(new);
    }
    if old.repeated != new.repeated {
        return Err(format!(
            "mode mismatch: {} vs {}",
            mode_name(old.repeated),
            mode_name(new.repeated)
        ));
    }

    let kind = widen(old.kind, new.kind).ok_or_else(|| {
        format!("type mismatch: {} vs {}", old.kind.name(), new.kind.name())
    })?;
    if kind == Kind::Record {
        for (key, entry) in new.fields {
            merge_field(&mut old.fields, key, entry, line, errors);
        }
    }
    old.kind = kind;
    old.filled += new.filled;
    old.seen += new.seen;
    Ok(old)
}

fn merge_field(
    fields: &mut Vec<(String, Entry)>,
    key: String,
    new: Entry,
    line: usize,
    errors: &mut Vec<SchemaError>,
) {
    let Some((_, existing)) = fields.iter_mut().find(|(k, _)| *k == key) else {
        fields.push((key, new));
        return;
    };
    if existing.ignored {
        return;
    }

    let old = std::mem::replace(existing, Entry::scalar(Kind::Null));
    match merge(old, new, line, errors) {
        Ok(merged) => *existing = merged,
        Err(message) => {
            errors.push(SchemaError {
                line,
                message: format!("ignoring field '{}': {}", key, message),
            });
            existing.ignored = true;
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Deduces BigQuery schemas from JSON records
#[derive(Debug, Clone, Default)]
pub struct SchemaGenerator {
    options: SchemaOptions,
}

impl SchemaGenerator {
    pub fn new(options: SchemaOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// Deduce the schema of a batch of records
    ///
    /// Returns the schema, sorted by field name at every level, together with
    /// the problems found along the way.
    pub fn deduce_schema<'a, I>(&self, records: I) -> (Vec<SchemaField>, Vec<SchemaError>)
    where
        I: IntoIterator<Item = &'a serde_json::Value>,
    {
        let mut fields = Vec::new();
        let mut errors = Vec::new();
        let mut seen = 0;

        for (index, record) in records.into_iter().enumerate() {
            let line = index + 1;
            let interval = self.options.debugging_interval;
            if interval > 0 && line % interval == 0 {
                debug!(line, "schema inference progress");
            }

            match record {
                serde_json::Value::Object(obj) => {
                    seen += 1;
                    self.deduce_record(obj, &mut fields, line, &mut errors);
                }
                other => errors.push(SchemaError {
                    line,
                    message: format!("expected a JSON object, got {}", json_type_name(other)),
                }),
            }
        }

        (self.flatten(&fields, seen), errors)
    }

    fn deduce_record(
        &self,
        obj: &serde_json::Map<String, serde_json::Value>,
        fields: &mut Vec<(String, Entry)>,
        line: usize,
        errors: &mut Vec<SchemaError>,
    ) {
        for (key, value) in obj {
            match self.infer(value, line, errors) {
                Ok(entry) => merge_field(fields, key.clone(), entry, line, errors),
                Err(message) => errors.push(SchemaError {
                    line,
                    message: format!("ignoring field '{}': {}", key, message),
                }),
            }
        }
    }

    fn infer(
        &self,
        value: &serde_json::Value,
        line: usize,
        errors: &mut Vec<SchemaError>,
    ) -> Result<Entry, String> {
        match value {
            serde_json::Value::Null => Ok(Entry::scalar(Kind::Null)),
            serde_json::Value::Bool(_) => Ok(Entry::scalar(Kind::Boolean)),
            serde_json::Value::Number(n) if n.is_i64() => Ok(Entry::scalar(Kind::Integer)),
            serde_json::Value::Number(_) => Ok(Entry::scalar(Kind::Float)),
            serde_json::Value::String(s) => Ok(Entry::scalar(self.infer_string(s))),
            serde_json::Value::Object(obj) if obj.is_empty() => {
                Ok(Entry::scalar(Kind::EmptyRecord))
            }
            serde_json::Value::Object(obj) => {
                let mut fields = Vec::new();
                self.deduce_record(obj, &mut fields, line, errors);
                Ok(Entry {
                    fields,
                    seen: 1,
                    ..Entry::scalar(Kind::Record)
                })
            }
            serde_json::Value::Array(items) => {
                let mut merged: Option<Entry> = None;
                for item in items {
                    if item.is_array() {
                        return Err("arrays of arrays are not supported".to_string());
                    }
                    if item.is_null() {
                        continue;
                    }
                    let entry = self.infer(item, line, errors)?;
                    merged = Some(match merged {
                        None => entry,
                        Some(prev) => merge(prev, entry, line, errors)?,
                    });
                }
                match merged {
                    Some(entry) if !entry.kind.is_soft() => Ok(Entry {
                        repeated: true,
                        filled: 1,
                        ..entry
                    }),
                    _ => Ok(Entry::empty_array()),
                }
            }
        }
    }

    fn infer_string(&self, s: &str) -> Kind {
        if TIMESTAMP_RE.is_match(s) {
            return Kind::Timestamp;
        }
        if DATE_RE.is_match(s) {
            return Kind::Date;
        }
        if TIME_RE.is_match(s) {
            return Kind::Time;
        }
        if self.options.quoted_values_are_strings {
            return Kind::String;
        }
        if INTEGER_RE.is_match(s) {
            return if s.parse::<i64>().is_ok() {
                Kind::QInteger
            } else {
                Kind::QFloat
            };
        }
        if FLOAT_RE.is_match(s) {
            return Kind::QFloat;
        }
        if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
            return Kind::QBoolean;
        }
        Kind::String
    }

    fn flatten(&self, fields: &[(String, Entry)], records: usize) -> Vec<SchemaField> {
        let mut schema: Vec<SchemaField> = fields
            .iter()
            .filter(|(_, entry)| !entry.ignored)
            .filter_map(|(name, entry)| self.to_field(name, entry, records))
            .collect();
        schema.sort_by(|a, b| a.name.cmp(&b.name));
        schema
    }

    fn to_field(&self, name: &str, entry: &Entry, records: usize) -> Option<SchemaField> {
        let field_type = match entry.kind {
            Kind::Null | Kind::EmptyArray | Kind::EmptyRecord => {
                if !self.options.keep_nulls {
                    return None;
                }
                FieldType::String
            }
            Kind::String => FieldType::String,
            Kind::Integer | Kind::QInteger => FieldType::Integer,
            Kind::Float | Kind::QFloat => FieldType::Float,
            Kind::Boolean | Kind::QBoolean => FieldType::Boolean,
            Kind::Timestamp => FieldType::Timestamp,
            Kind::Date => FieldType::Date,
            Kind::Time => FieldType::Time,
            Kind::Record => FieldType::Record,
        };

        let mode = if entry.repeated {
            FieldMode::Repeated
        } else if self.options.infer_mode && !entry.kind.is_soft() && entry.filled == records {
            FieldMode::Required
        } else {
            FieldMode::Nullable
        };

        let fields = if entry.kind == Kind::Record {
            let nested = self.flatten(&entry.fields, entry.seen);
            if nested.is_empty() {
                return None;
            }
            nested
        } else {
            Vec::new()
        };

        Some(SchemaField {
            fields,
            mode,
            name: name.to_string(),
            field_type,
        })
    }
}

/// Deduce a schema with the given options (defaults when `None`)
///
/// Deduction problems are logged at debug level and otherwise ignored.
pub fn generate_bq_schema(
    records: &[serde_json::Value],
    options: Option<SchemaOptions>,
) -> Vec<SchemaField> {
    let generator = SchemaGenerator::new(options.unwrap_or_default());
    let (schema, errors) = generator.deduce_schema(records);
    for error in &errors {
        debug!(%error, "schema inference problem");
    }
    schema
}
