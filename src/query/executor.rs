//! Gated, timed statement execution.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::db::{DatabaseClient, QueryResult};
use crate::error::AskError;
use crate::safety::{GateDecision, ReadGate};

/// Runs statements that pass the read-only gate.
pub struct QueryExecutor<'a> {
    db: &'a dyn DatabaseClient,
    gate: ReadGate,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(db: &'a dyn DatabaseClient) -> Self {
        Self {
            db,
            gate: ReadGate::new(),
        }
    }

    /// Classifies and, if allowed, executes a statement.
    ///
    /// Statements the parser reads as writes are rejected. Statements it
    /// cannot read at all are executed with a warning; the caller has
    /// already checked their leading keyword.
    pub async fn execute(&self, sql: &str) -> ExecutionResult {
        match self.gate.check(sql) {
            GateDecision::Allow { .. } => {}
            decision @ GateDecision::Reject { .. } => {
                warn!(%decision, "Rejected statement");
                return ExecutionResult::Rejected(decision);
            }
            GateDecision::Unparsed { reason } => {
                warn!(%reason, "Executing statement the parser could not read");
            }
        }

        let start = Instant::now();
        let result = self.db.execute_query(sql).await;
        let execution_time = start.elapsed();

        match result {
            Ok(query_result) => {
                debug!(
                    rows = query_result.row_count,
                    elapsed_ms = execution_time.as_millis() as u64,
                    "Statement executed"
                );
                let log_entry = QueryLogEntry::success(sql, execution_time, query_result.row_count);
                ExecutionResult::Success(QueryOutcome {
                    result: query_result,
                    log_entry,
                })
            }
            Err(e) => {
                let log_entry = QueryLogEntry::error(sql, execution_time, e.to_string());
                debug!(summary = %log_entry.summary(), "Statement failed");
                ExecutionResult::Error(e)
            }
        }
    }
}

/// Result of executing a query.
#[derive(Debug)]
pub enum ExecutionResult {
    /// Query executed successfully.
    Success(QueryOutcome),
    /// The gate rejected the statement; it was not sent.
    Rejected(GateDecision),
    /// Query execution failed.
    Error(AskError),
}

/// Successful query execution outcome.
#[derive(Debug)]
pub struct QueryOutcome {
    pub result: QueryResult,
    pub log_entry: QueryLogEntry,
}

/// Record of one statement sent to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    pub sql: String,
    pub execution_time: Duration,
    pub row_count: Option<usize>,
    pub error: Option<String>,
}

impl QueryLogEntry {
    pub fn success(sql: impl Into<String>, execution_time: Duration, row_count: usize) -> Self {
        Self {
            sql: sql.into(),
            execution_time,
            row_count: Some(row_count),
            error: None,
        }
    }

    pub fn error(
        sql: impl Into<String>,
        execution_time: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            sql: sql.into(),
            execution_time,
            row_count: None,
            error: Some(error.into()),
        }
    }

    /// One-line summary for the processing log.
    pub fn summary(&self) -> String {
        let ms = self.execution_time.as_millis();
        match (&self.row_count, &self.error) {
            (_, Some(error)) => format!("failed after {} ms: {}", ms, error),
            (Some(rows), None) => format!("{} row(s) in {} ms", rows, ms),
            (None, None) => format!("finished in {} ms", ms),
        }
    }
}
