//! Upsert orchestration against a query execution service
//!
//! The service is injected as a `QueryExecutor`; this module only decides
//! which statement to run. An empty result set means "no such row" and leads
//! to an INSERT. A missing table or dataset is a `PipelineError::NotFound`
//! from the executor and is propagated unchanged.

use std::future::Future;

use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::sql::dml::{DmlBuilder, QueryArgs, QueryKind};
use crate::sql::format::format_scalar;
use crate::types::{Record, TableRef, Value};

/// Rows returned by a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows matched or affected
    pub row_count: u64,
    pub rows: Vec<Record>,
}

impl QueryResult {
    /// A result with no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// A result holding the given rows
    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self {
            row_count: rows.len() as u64,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}

/// A service that runs SQL text and returns its rows
///
/// Implementations report a missing table as `PipelineError::NotFound` and an
/// empty match as `Ok` with `row_count == 0`.
pub trait QueryExecutor {
    fn execute(&self, sql: &str) -> impl Future<Output = Result<QueryResult>> + Send;
}

/// Which statement an upsert ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted,
    Updated,
}

/// Result of `Upserter::upsert`
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub action: UpsertAction,
    /// The record id as rendered in the WHERE clause
    pub id: String,
    /// Result of the INSERT or UPDATE
    pub result: QueryResult,
}

/// Inserts or updates records keyed by their `id` field
pub struct Upserter<E> {
    dml: DmlBuilder,
    executor: E,
}

impl<E: QueryExecutor> Upserter<E> {
    pub fn new(table: TableRef, executor: E) -> Self {
        Self {
            dml: DmlBuilder::new(table),
            executor,
        }
    }

    pub fn dml(&self) -> &DmlBuilder {
        &self.dml
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run `SELECT * FROM <table> <where_clause>`
    pub async fn find(&self, where_clause: &str) -> Result<QueryResult> {
        let sql = self
            .dml
            .generate_kind(QueryKind::Select, QueryArgs::new().where_clause(where_clause))?;
        self.run(&sql).await
    }

    /// Run an INSERT for the record
    pub async fn insert_record(&self, data: &Record) -> Result<QueryResult> {
        let sql = self
            .dml
            .generate_kind(QueryKind::Insert, QueryArgs::new().data(data))?;
        self.run(&sql).await
    }

    /// Run an UPDATE for the record, matched on its `id` field
    pub async fn update_record(&self, data: &Record) -> Result<QueryResult> {
        let (_, where_clause) = id_where_clause(data)?;
        let sql = self.dml.generate_kind(
            QueryKind::Update,
            QueryArgs::new().data(data).where_clause(&where_clause),
        )?;
        self.run(&sql).await
    }

    /// Insert the record if no row shares its `id`, update it otherwise
    pub async fn upsert(&self, data: &Record) -> Result<UpsertOutcome> {
        let (id, where_clause) = id_where_clause(data)?;
        let existing = self.find(&where_clause).await?;

        if existing.is_empty() {
            info!(table = %self.dml.table(), id = %id, "inserting record");
            let result = self.insert_record(data).await?;
            Ok(UpsertOutcome {
                action: UpsertAction::Inserted,
                id,
                result,
            })
        } else {
            info!(table = %self.dml.table(), id = %id, "updating record");
            let result = self.update_record(data).await?;
            Ok(UpsertOutcome {
                action: UpsertAction::Updated,
                id,
                result,
            })
        }
    }

    async fn run(&self, sql: &str) -> Result<QueryResult> {
        debug!(sql, "executing query");
        self.executor.execute(sql).await
    }
}

fn id_where_clause(data: &Record) -> Result<(String, String)> {
    let id = match data.get("id") {
        None | Some(Value::Null) => {
            return Err(PipelineError::validation("record has no id field"));
        }
        Some(Value::Record(_) | Value::Sequence(_)) => {
            return Err(PipelineError::validation("record id must be a scalar value"));
        }
        Some(id) => format_scalar(id),
    };
    let where_clause = format!("WHERE id = {}", id);
    Ok((id, where_clause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results and records every statement
    #[derive(Default)]
    struct ScriptedExecutor {
        responses: Mutex<VecDeque<Result<QueryResult>>>,
        statements: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn with(responses: Vec<Result<QueryResult>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                statements: Mutex::new(Vec::new()),
            }
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    impl QueryExecutor for ScriptedExecutor {
        async fn execute(&self, sql: &str) -> Result<QueryResult> {
            self.statements.lock().unwrap().push(sql.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(QueryResult::empty()))
        }
    }

    fn table() -> TableRef {
        TableRef::new("proj", "zendesk", "ticket_metrics")
    }

    fn ticket() -> Record {
        Record::new().with("id", 17).with("status", "'open'")
    }

    #[tokio::test]
    async fn test_upsert_inserts_when_no_rows() {
        let upserter = Upserter::new(table(), ScriptedExecutor::default());

        let outcome = upserter.upsert(&ticket()).await.unwrap();

        assert_eq!(outcome.action, UpsertAction::Inserted);
        assert_eq!(outcome.id, "17");
        assert_eq!(
            upserter.executor().statements(),
            vec![
                "SELECT * FROM proj.zendesk.ticket_metrics WHERE id = 17".to_string(),
                "INSERT `proj.zendesk.ticket_metrics` (id, status) VALUES(17, 'open')".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_upsert_updates_when_row_exists() {
        let executor = ScriptedExecutor::with(vec![
            Ok(QueryResult::from_rows(vec![Record::new().with("id", 17)])),
            Ok(QueryResult {
                row_count: 1,
                rows: Vec::new(),
            }),
        ]);
        let upserter = Upserter::new(table(), executor);

        let outcome = upserter.upsert(&ticket()).await.unwrap();

        assert_eq!(outcome.action, UpsertAction::Updated);
        assert_eq!(outcome.result.row_count, 1);
        assert_eq!(
            upserter.executor().statements()[1],
            "UPDATE proj.zendesk.ticket_metrics SET id = 17, status = 'open' WHERE id = 17"
        );
    }

    #[tokio::test]
    async fn test_upsert_propagates_not_found() {
        let executor = ScriptedExecutor::with(vec![Err(PipelineError::not_found(
            "table proj.zendesk.ticket_metrics",
        ))]);
        let upserter = Upserter::new(table(), executor);

        let result = upserter.upsert(&ticket()).await;

        assert!(matches!(result, Err(PipelineError::NotFound(_))));
        assert_eq!(upserter.executor().statements().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_requires_id() {
        let upserter = Upserter::new(table(), ScriptedExecutor::default());

        let missing = Record::new().with("status", "open");
        assert!(matches!(
            upserter.upsert(&missing).await,
            Err(PipelineError::Validation(_))
        ));

        let null_id = Record::new().with("id", Value::Null);
        assert!(upserter.upsert(&null_id).await.is_err());

        let nested_id = Record::new().with("id", Record::new().with("a", 1));
        assert!(upserter.upsert(&nested_id).await.is_err());

        assert!(upserter.executor().statements().is_empty());
    }

    #[tokio::test]
    async fn test_string_id_rendered_verbatim() {
        let upserter = Upserter::new(table(), ScriptedExecutor::default());
        let record = Record::new().with("id", "'abc-1'");

        let outcome = upserter.upsert(&record).await.unwrap();

        assert_eq!(outcome.id, "'abc-1'");
        assert_eq!(
            upserter.executor().statements()[0],
            "SELECT * FROM proj.zendesk.ticket_metrics WHERE id = 'abc-1'"
        );
    }

    #[tokio::test]
    async fn test_find_returns_rows() {
        let rows = vec![Record::new().with("id", 1), Record::new().with("id", 2)];
        let executor = ScriptedExecutor::with(vec![Ok(QueryResult::from_rows(rows.clone()))]);
        let upserter = Upserter::new(table(), executor);

        let result = upserter.find("WHERE id > 0").await.unwrap();

        assert_eq!(result.row_count, 2);
        assert_eq!(result.rows, rows);
    }

    #[test]
    fn test_query_result_helpers() {
        assert!(QueryResult::empty().is_empty());
        let result = QueryResult::from_rows(vec![Record::new()]);
        assert_eq!(result.row_count, 1);
        assert!(!result.is_empty());
    }
}
