//! Mock database client for testing.
//!
//! Returns scripted results keyed by SQL substrings and records every
//! statement it is asked to run. `MockDatabaseClient::real_estate` backs the
//! `--mock-db` flag with a small demo warehouse.

use super::{ColumnInfo, DatabaseClient, ExecutorError, QueryResult, Row, Schema, Value};
use crate::db::{Column, ForeignKey, Table};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum MockResponse {
    Rows(QueryResult),
    Error(ExecutorError),
}

/// A mock database client that returns predefined results.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    schema: Schema,
    responses: Vec<(String, MockResponse)>,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new mock database client with the given schema.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Returns `rows` for any statement containing `pattern` (case-insensitive).
    ///
    /// Patterns are checked in registration order.
    pub fn with_result(mut self, pattern: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        let columns = columns
            .iter()
            .map(|name| ColumnInfo::new(*name, "text"))
            .collect();
        let result =
            QueryResult::with_data(columns, rows).with_execution_time(Duration::from_millis(1));
        self.responses
            .push((pattern.to_lowercase(), MockResponse::Rows(result)));
        self
    }

    /// Fails any statement containing `pattern` with `error`.
    pub fn with_error(mut self, pattern: &str, error: ExecutorError) -> Self {
        self.responses
            .push((pattern.to_lowercase(), MockResponse::Error(error)));
        self
    }

    /// Returns every statement executed so far, in order.
    pub fn executed_queries(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// A small real-estate warehouse used by `--mock-db`.
    ///
    /// Catalog patterns come first: the catalog queries also call
    /// `CURRENT_SCHEMA()`.
    pub fn real_estate() -> Self {
        let money = |s: &str| Value::Decimal(s.parse::<Decimal>().unwrap_or_default());

        Self::new()
            .with_schema(real_estate_schema())
            .with_result(
                "count(*) from information_schema.tables",
                &["COUNT(*)"],
                vec![vec![Value::Int(5)]],
            )
            .with_result(
                "information_schema.tables",
                &["TABLE_NAME", "TABLE_TYPE"],
                ["AGENTS", "LOCATIONS", "OWNERS", "PROPERTIES", "TRANSACTIONS"]
                    .iter()
                    .map(|name| vec![Value::from(*name), Value::from("BASE TABLE")])
                    .collect(),
            )
            .with_result("current_database()", &["DATABASE_NAME"], vec![vec![
                Value::from("REAL_ESTATE_DB"),
            ]])
            .with_result("current_schema()", &["SCHEMA_NAME"], vec![vec![
                Value::from("PUBLIC"),
            ]])
            .with_result("count(*) from properties", &["COUNT(*)"], vec![vec![
                Value::Int(42),
            ]])
            .with_result("from properties", &["PROPERTY_ID", "PRICE"], vec![
                vec![Value::Int(101), money("750000.00")],
                vec![Value::Int(102), money("525000.50")],
                vec![Value::Int(103), money("1250000.00")],
            ])
            .with_result("from locations", &["CITY", "STATE"], vec![
                vec![Value::from("Austin"), Value::from("TX")],
                vec![Value::from("Denver"), Value::from("CO")],
            ])
            .with_result("from agents", &["FIRST_NAME", "LAST_NAME", "AGENCY"], vec![
                vec![
                    Value::from("Maria"),
                    Value::from("Lopez"),
                    Value::from("Sunrise Realty"),
                ],
                vec![
                    Value::from("Sam"),
                    Value::from("Okafor"),
                    Value::from("Keystone Homes"),
                ],
            ])
    }

    fn record(&self, sql: &str) {
        if let Ok(mut guard) = self.executed.lock() {
            guard.push(sql.to_string());
        }
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.record(sql);
        let lower = sql.to_lowercase();

        let scripted = self
            .responses
            .iter()
            .find(|(pattern, _)| lower.contains(pattern.as_str()));

        match scripted {
            Some((_, MockResponse::Rows(result))) => Ok(result.clone()),
            Some((_, MockResponse::Error(error))) => Err(error.clone().into()),
            None if lower.trim_start().starts_with("select") => {
                let columns = vec![ColumnInfo::new("result", "text")];
                let rows = vec![vec![Value::String(format!("Mock result for: {}", sql))]];
                Ok(QueryResult::with_data(columns, rows)
                    .with_execution_time(Duration::from_millis(1)))
            }
            None => Ok(QueryResult::new().with_execution_time(Duration::from_millis(1))),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn real_estate_schema() -> Schema {
    let table = |name: &str, columns: &[(&str, &str)], pk: &str| {
        columns
            .iter()
            .fold(Table::new(name), |t, (col, ty)| {
                t.with_column(Column::new(*col, *ty).nullable(*col != pk))
            })
            .with_primary_key(&[pk])
    };
    let fk = |from: &str, col: &str, to: &str, to_col: &str| {
        ForeignKey::new(from, vec![col.to_string()], to, vec![to_col.to_string()])
    };

    Schema {
        tables: vec![
            table(
                "locations",
                &[
                    ("location_id", "integer"),
                    ("city", "varchar"),
                    ("state", "varchar"),
                    ("zip_code", "varchar"),
                ],
                "location_id",
            ),
            table(
                "properties",
                &[
                    ("property_id", "integer"),
                    ("location_id", "integer"),
                    ("price", "numeric"),
                    ("bedrooms", "integer"),
                    ("status", "varchar"),
                ],
                "property_id",
            ),
            table(
                "agents",
                &[
                    ("agent_id", "integer"),
                    ("first_name", "varchar"),
                    ("last_name", "varchar"),
                    ("agency", "varchar"),
                ],
                "agent_id",
            ),
        ],
        foreign_keys: vec![fk("properties", "location_id", "locations", "location_id")],
    }
}
