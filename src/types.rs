//! Core type definitions
//!
//! Includes the `Value` sum type, the ordered `Record` mapping, and `TableRef`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::PipelineError;

// ============================================================================
// Values
// ============================================================================

/// A single column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Sequence(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Convert back to JSON. Timestamps become RFC 3339 strings and
    /// non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(record) => record.to_json(),
        }
    }

    fn coerce_timestamps(&mut self) {
        match self {
            Value::String(s) => {
                if let Some(ts) = parse_timestamp(s) {
                    *self = Value::Timestamp(ts);
                }
            }
            Value::Sequence(items) => items.iter_mut().for_each(Value::coerce_timestamps),
            Value::Record(record) => record.coerce_timestamps(),
            _ => {}
        }
    }
}

// Same shape as `to_json`, without building the intermediate tree
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(_) => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            Value::Sequence(items) => items.serialize(serializer),
            Value::Record(record) => record.serialize(serializer),
        }
    }
}

/// Parse RFC 3339, or `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` taken as UTC
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Record(Record::from(map)),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Ordered mapping from column name to value
///
/// Iteration follows insertion order. Inserting an existing key replaces
/// its value without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.fields.push((key, value));
                None
            }
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Recursively convert string values that look like timestamps into
    /// `Value::Timestamp`
    pub fn coerce_timestamps(&mut self) {
        for (_, value) in &mut self.fields {
            value.coerce_timestamps();
        }
    }

    /// Render top-level timestamps as strings using a chrono format string,
    /// e.g. to compare a stored row against a source-system payload
    pub fn format_timestamps(&mut self, format: &str) {
        for (_, value) in &mut self.fields {
            if let Value::Timestamp(ts) = value {
                *value = Value::String(ts.format(format).to_string());
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().collect()
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = PipelineError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Record::from(map)),
            other => Err(PipelineError::validation(format!(
                "Expected a JSON object, got {}",
                other
            ))),
        }
    }
}

// ============================================================================
// Table References
// ============================================================================

/// Fully qualified BigQuery table: `project.dataset.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    project: String,
    dataset: String,
    table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

impl FromStr for TableRef {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if !project.is_empty() && !dataset.is_empty() && !table.is_empty() =>
            {
                Ok(TableRef::new(*project, *dataset, *table))
            }
            _ => Err(PipelineError::invalid_argument(format!(
                "Table reference '{}' must have the form project.dataset.table",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    // =========================================================================
    // Record Tests
    // =========================================================================

    #[test]
    fn test_record_preserves_insertion_order() {
        let record = Record::new().with("b", 1).with("a", 2).with("c", 3);
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_record_insert_replaces_in_place() {
        let mut record = Record::new().with("a", 1).with("b", 2);
        let previous = record.insert("a", 10);

        assert_eq!(previous, Some(Value::Integer(1)));
        assert_eq!(record.len(), 2);
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&Value::Integer(10)));
    }

    #[test]
    fn test_record_from_json_keeps_key_order() {
        let value = json!({"zeta": 1, "alpha": "x", "mid": null});
        let record = Record::try_from(value).unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(record.get("mid"), Some(&Value::Null));
    }

    #[test]
    fn test_record_from_non_object_fails() {
        assert!(matches!(
            Record::try_from(json!([1, 2])),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_value_from_json_numbers() {
        assert_eq!(Value::from(json!(42)), Value::Integer(42));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(json!(u64::MAX)), Value::Float(u64::MAX as f64));
    }

    #[test]
    fn test_value_from_json_nested() {
        let value = Value::from(json!({"a": [1, {"b": true}]}));
        let record = value.as_record().unwrap();
        match record.get("a") {
            Some(Value::Sequence(items)) => {
                assert_eq!(items[0], Value::Integer(1));
                assert_eq!(
                    items[1],
                    Value::Record(Record::new().with("b", true))
                );
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_value_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".to_string()));
    }

    #[test]
    fn test_to_json() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let record = Record::new()
            .with("id", 7)
            .with("at", ts)
            .with("bad", f64::NAN)
            .with("tags", vec!["a", "b"]);

        assert_eq!(
            record.to_json(),
            json!({"id": 7, "at": "2024-01-02T03:04:05+00:00", "bad": null, "tags": ["a", "b"]})
        );
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let record = Record::new()
            .with("z", 1)
            .with("a", Record::new().with("at", ts).with("ok", true))
            .with("bad", f64::INFINITY)
            .with("score", 1.5)
            .with("items", vec![Value::Null, Value::from("x")]);

        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            "{\"z\":1,\"a\":{\"at\":\"2024-01-02T03:04:05+00:00\",\"ok\":true},\"bad\":null,\"score\":1.5,\"items\":[null,\"x\"]}"
        );
        assert_eq!(serde_json::to_value(&record).unwrap(), record.to_json());
    }

    // =========================================================================
    // Timestamp Coercion Tests
    // =========================================================================

    #[test]
    fn test_coerce_timestamps() {
        let mut record = Record::try_from(json!({
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01 11:30:00",
            "name": "not a date",
            "via": {"at": "2024-03-01T10:00:00+02:00"}
        }))
        .unwrap();

        record.coerce_timestamps();

        assert_eq!(
            record.get("created_at"),
            Some(&Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
            ))
        );
        assert_eq!(
            record.get("updated_at"),
            Some(&Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 1, 11, 30, 0).unwrap()
            ))
        );
        assert_eq!(record.get("name"), Some(&Value::from("not a date")));
        let via = record.get("via").and_then(Value::as_record).unwrap();
        assert_eq!(
            via.get("at"),
            Some(&Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
            ))
        );
    }

    #[test]
    fn test_format_timestamps() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let mut record = Record::new().with("at", ts).with("id", 1);

        record.format_timestamps("%Y-%m-%dT%H:%M:%SZ");

        assert_eq!(record.get("at"), Some(&Value::from("2024-05-06T07:08:09Z")));
        assert_eq!(record.get("id"), Some(&Value::Integer(1)));
    }

    // =========================================================================
    // TableRef Tests
    // =========================================================================

    #[test]
    fn test_table_ref_display() {
        let table = TableRef::new("proj", "ds", "tickets");
        assert_eq!(table.to_string(), "proj.ds.tickets");
        assert_eq!(table.project(), "proj");
        assert_eq!(table.dataset(), "ds");
        assert_eq!(table.table(), "tickets");
    }

    #[test]
    fn test_table_ref_parse() {
        let table: TableRef = "proj.ds.tickets".parse().unwrap();
        assert_eq!(table, TableRef::new("proj", "ds", "tickets"));
    }

    #[test]
    fn test_table_ref_parse_invalid() {
        assert!("proj.ds".parse::<TableRef>().is_err());
        assert!("a.b.c.d".parse::<TableRef>().is_err());
        assert!("a..c".parse::<TableRef>().is_err());
        assert!(matches!(
            "".parse::<TableRef>(),
            Err(PipelineError::InvalidArgument(_))
        ));
    }
}
