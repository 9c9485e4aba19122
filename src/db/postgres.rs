//! PostgreSQL executor.
//!
//! Statements run through a small sqlx pool with a per-statement timeout and
//! a row cap. Failures are classified by SQLSTATE where the server sends one.

use crate::config::ConnectionConfig;
use crate::db::{
    Column, ColumnInfo, DatabaseClient, ExecutorError, ExecutorErrorKind, ForeignKey,
    QueryResult, Row, Schema, Table, Value,
};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default query timeout in seconds.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Default maximum rows to return from a query.
const MAX_ROWS: usize = 1000;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    schema: String,
    query_timeout: Duration,
    max_rows: usize,
}

impl PostgresClient {
    /// Connects using the given configuration, retrying transient failures.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!(target = %config.display_string(), "Connected to database");
                    return Ok(Self {
                        pool,
                        schema: config.schema.clone(),
                        query_timeout: Duration::from_secs(QUERY_TIMEOUT_SECS),
                        max_rows: MAX_ROWS,
                    });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(map_connection_error(e, config)),
            None => Err(AskError::internal("no connection attempt was made")),
        }
    }

    /// Overrides the per-statement timeout and row cap.
    pub fn with_limits(mut self, query_timeout: Duration, max_rows: usize) -> Self {
        self.query_timeout = query_timeout;
        self.max_rows = max_rows;
        self
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        let tables = self.fetch_tables().await?;
        let foreign_keys = self.fetch_foreign_keys().await?;

        Ok(Schema {
            tables,
            foreign_keys,
        })
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let fetch = sqlx::query(sql).fetch_all(&self.pool);
        let result = tokio::time::timeout(self.query_timeout, fetch)
            .await
            .map_err(|_| {
                ExecutorError::timeout(format!(
                    "Query timed out after {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(classify_query_error)?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|first_row| {
                first_row
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let total_rows = result.len();
        let was_truncated = total_rows > self.max_rows;

        if was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, self.max_rows
            );
        }

        let rows: Vec<Row> = result.iter().take(self.max_rows).map(convert_row).collect();
        let row_count = rows.len();

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

impl PostgresClient {
    /// Loads every base table of the schema with its columns and primary key
    /// in one round trip, ordered by table name.
    async fn fetch_tables(&self) -> Result<Vec<Table>> {
        let rows: Vec<(String, Option<String>, Option<String>, Option<String>, Option<i32>)> =
            sqlx::query_as(
                r#"
            SELECT
                t.table_name::text,
                c.column_name::text,
                c.data_type::text,
                c.is_nullable::text,
                pk.ordinal_position::int4
            FROM information_schema.tables t
            LEFT JOIN information_schema.columns c
                ON c.table_schema = t.table_schema AND c.table_name = t.table_name
            LEFT JOIN (
                SELECT kcu.table_name, kcu.column_name, kcu.ordinal_position
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                WHERE tc.table_schema = $1 AND tc.constraint_type = 'PRIMARY KEY'
            ) pk ON pk.table_name = c.table_name AND pk.column_name = c.column_name
            WHERE t.table_schema = $1 AND t.table_type = 'BASE TABLE'
            ORDER BY t.table_name, c.ordinal_position
            "#,
            )
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| introspection_error("tables", e))?;

        let mut tables: Vec<Table> = Vec::new();
        let mut key_positions: Vec<Vec<(i32, String)>> = Vec::new();

        for (table_name, column_name, data_type, is_nullable, pk_position) in rows {
            if tables.last().map(|t| t.name.as_str()) != Some(table_name.as_str()) {
                tables.push(Table {
                    name: table_name,
                    columns: Vec::new(),
                    primary_key: Vec::new(),
                });
                key_positions.push(Vec::new());
            }
            let (Some(table), Some(keys)) = (tables.last_mut(), key_positions.last_mut()) else {
                continue;
            };
            // Tables without columns come back as a single all-NULL row.
            let Some(name) = column_name else {
                continue;
            };
            if let Some(position) = pk_position {
                keys.push((position, name.clone()));
            }
            table.columns.push(Column {
                name,
                data_type: data_type.unwrap_or_default(),
                is_nullable: is_nullable.as_deref() == Some("YES"),
            });
        }

        for (table, mut keys) in tables.iter_mut().zip(key_positions) {
            keys.sort();
            table.primary_key = keys.into_iter().map(|(_, name)| name).collect();
        }

        Ok(tables)
    }

    /// Fetches all foreign key relationships, grouped by constraint.
    async fn fetch_foreign_keys(&self) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                tc.constraint_name::text,
                kcu.table_name::text AS from_table,
                kcu.column_name::text AS from_column,
                ccu.table_name::text AS to_table,
                ccu.column_name::text AS to_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON tc.constraint_name = ccu.constraint_name
                AND tc.table_schema = ccu.table_schema
            WHERE tc.table_schema = $1
                AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY kcu.table_name, tc.constraint_name, kcu.ordinal_position
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| introspection_error("foreign keys", e))?;

        let mut order = Vec::new();
        let mut by_constraint: HashMap<String, ForeignKey> = HashMap::new();

        for (constraint, from_table, from_column, to_table, to_column) in rows {
            let fk = by_constraint.entry(constraint.clone()).or_insert_with(|| {
                order.push(constraint);
                ForeignKey::new(from_table, Vec::new(), to_table, Vec::new())
            });
            fk.from_columns.push(from_column);
            fk.to_columns.push(to_column);
        }

        Ok(order
            .into_iter()
            .filter_map(|name| by_constraint.remove(&name))
            .collect())
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Decodes column `index` as `T`, mapping NULL and decode failures to `Value::Null`.
fn decode<'r, T>(row: &'r PgRow, index: usize, wrap: impl FnOnce(T) -> Value) -> Value
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .ok()
        .flatten()
        .map(wrap)
        .unwrap_or(Value::Null)
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index, Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index, |v| Value::Int(v as i64)),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index, |v| Value::Int(v as i64)),
        "INT8" | "BIGINT" => decode::<i64>(row, index, Value::Int),
        "FLOAT4" | "REAL" => decode::<f32>(row, index, |v| Value::Float(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index, Value::Float),
        "NUMERIC" | "DECIMAL" => decode::<Decimal>(row, index, Value::Decimal),
        "DATE" => decode::<NaiveDate>(row, index, Value::Date),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index, Value::Timestamp),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index, |v| Value::Timestamp(v.naive_utc())),
        "BYTEA" => decode::<Vec<u8>>(row, index, Value::Bytes),
        _ => decode::<String>(row, index, Value::String),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> AskError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        AskError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("authentication failed") {
        AskError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        AskError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        AskError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        AskError::connection(error.to_string())
    }
}

fn introspection_error(what: &str, error: sqlx::Error) -> AskError {
    let mut classified = classify_query_error(error);
    classified.message = format!("Failed to fetch {what}: {}", classified.message);
    classified.into()
}

/// Classifies a statement failure, preferring the SQLSTATE code when the
/// server supplied one.
fn classify_query_error(error: sqlx::Error) -> ExecutorError {
    let kind = match &error {
        sqlx::Error::Database(db_error) => db_error
            .code()
            .map(|code| ExecutorErrorKind::from_sqlstate(&code))
            .unwrap_or_else(|| ExecutorErrorKind::classify_message(db_error.message())),
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            ExecutorErrorKind::Connection
        }
        other => ExecutorErrorKind::classify_message(&other.to_string()),
    };

    ExecutorError::new(kind, format_query_error(&error))
}

/// Formats a query error with detail and hint if available.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
