//! # dataops-pipeline-tools
//!
//! Helpers for ETL jobs that load data into Google BigQuery.
//!
//! ## Features
//!
//! - **DML Generation**: Build SELECT, INSERT, and UPDATE statements from ordered records
//! - **Upserts**: Insert-or-update records keyed by `id` through an injected `QueryExecutor`
//! - **Field Name Sanitization**: Turn arbitrary keys into BigQuery-compliant column names
//! - **Payload Transforms**: Rename keys recursively and prune empty values
//! - **Schema Inference**: Deduce a BigQuery schema from JSON records
//! - **Writers**: Newline-delimited JSON and `.bqschema.json` output files
//! - **Retrying HTTP**: GET/POST/PUT with exponential backoff
//!
//! Generated DML is best effort: plain string values are emitted verbatim and
//! unquoted, so payloads must come from trusted sources.
//!
//! ## Quick Start
//!
//! ```rust
//! use dataops_pipeline_tools::{DmlBuilder, QueryArgs, Record, TableRef};
//!
//! let dml = DmlBuilder::new(TableRef::new("my-project", "zendesk", "tickets"));
//! let ticket = Record::new()
//!     .with("id", 42)
//!     .with("url", "https://acme.zendesk.com/api/v2/tickets/42.json")
//!     .with("via", Record::new().with("channel", "'web'"));
//!
//! assert_eq!(
//!     dml.insert(&ticket),
//!     "INSERT `my-project.zendesk.tickets` (id, url, via) \
//!      VALUES(42, \"https://acme.zendesk.com/api/v2/tickets/42.json\", ('web'))"
//! );
//!
//! let update = dml
//!     .generate("UPDATE", QueryArgs::new().data(&ticket).where_clause("WHERE id = 42"))
//!     .unwrap();
//! assert_eq!(
//!     update,
//!     "UPDATE my-project.zendesk.tickets SET id = 42, \
//!      url = \"https://acme.zendesk.com/api/v2/tickets/42.json\", \
//!      via.channel = 'web' WHERE id = 42"
//! );
//! ```
//!
//! ## Preparing Payloads
//!
//! ```rust
//! use dataops_pipeline_tools::transform::{drop_empty_iters, rename_keys_recursive};
//! use dataops_pipeline_tools::schema::generate_bq_schema;
//!
//! let raw = serde_json::json!({"Ticket ID": 1, "custom fields": [], "assignee": null});
//! let clean = drop_empty_iters(rename_keys_recursive(raw).unwrap());
//! assert_eq!(clean, serde_json::json!({"Ticket_ID": 1}));
//!
//! let schema = generate_bq_schema(&[clean], None);
//! assert_eq!(schema[0].name, "Ticket_ID");
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod schema;
pub mod sql;
pub mod transform;
pub mod types;
pub mod upsert;
pub mod writer;

// Re-export main types for convenience
pub use config::{RetryPolicy, RetryPolicyBuilder, SchemaOptions, SchemaOptionsBuilder};
pub use error::{PipelineError, Result};
pub use http::RetryingClient;
pub use schema::{FieldMode, FieldType, SchemaError, SchemaField, SchemaGenerator};
pub use types::{Record, TableRef, Value};
pub use upsert::{QueryExecutor, QueryResult, UpsertAction, UpsertOutcome, Upserter};
pub use writer::{NdjsonWriter, write_to_file};

// Re-export SQL utilities for advanced users
pub use sql::dml::{DmlBuilder, QueryArgs, QueryKind};
pub use sql::sanitize::{quote_identifier, to_bigquery_field_name, validate_field_name};
