//! SQL executors.
//!
//! The pipeline talks to a [`DatabaseClient`]; PostgreSQL and the in-memory
//! demo warehouse both implement it.

mod cache;
mod error;
mod mock;
mod postgres;
mod schema;
mod types;

pub use cache::{SchemaCache, DEFAULT_SCHEMA_TTL};
pub use error::{ExecutorError, ExecutorErrorKind};
pub use mock::MockDatabaseClient;
pub use postgres::PostgresClient;
pub use schema::{Column, ForeignKey, Schema, Table};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::{ConnectionConfig, PipelineConfig};
use crate::error::Result;
use async_trait::async_trait;

/// Connects to PostgreSQL with the pipeline's timeout and row cap.
pub async fn connect(
    config: &ConnectionConfig,
    pipeline: &PipelineConfig,
) -> Result<Box<dyn DatabaseClient>> {
    let client = PostgresClient::connect(config)
        .await?
        .with_limits(pipeline.query_timeout(), pipeline.max_rows);
    Ok(Box::new(client))
}

/// A warehouse the pipeline can introspect and query.
///
/// Statement failures surface as [`crate::error::AskError::Executor`]
/// carrying an already-classified [`ExecutorError`].
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Runs one statement. Callers gate it as read-only beforehand.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    async fn close(&self) -> Result<()>;
}
