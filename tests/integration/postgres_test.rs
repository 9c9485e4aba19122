//! PostgreSQL executor integration tests.
//!
//! Tests that need a server skip unless DATABASE_URL is set.

use std::time::Duration;

use db_ask::config::{ConnectionConfig, PipelineConfig};
use db_ask::db::{DatabaseClient, ExecutorErrorKind, PostgresClient, Value};
use db_ask::error::AskError;
use db_ask::llm::{LlmProvider, MockLlmClient};
use db_ask::pipeline::Session;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test client.
async fn get_test_client() -> Option<PostgresClient> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    PostgresClient::connect(&config).await.ok()
}

fn executor_kind(error: &AskError) -> Option<ExecutorErrorKind> {
    match error {
        AskError::Executor(e) => Some(e.kind),
        _ => None,
    }
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_port() {
    let config = ConnectionConfig {
        host: Some("localhost".to_string()),
        port: 59999, // Unlikely to be in use
        database: Some("testdb".to_string()),
        user: Some("testuser".to_string()),
        password: Some("testpass".to_string()),
        ..Default::default()
    };

    let result = PostgresClient::connect(&config).await;
    assert!(matches!(result, Err(AskError::Connection(_))));
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1 as num, 'hello' as greeting, NULL::text as nothing")
        .await
        .unwrap();

    assert_eq!(result.columns.len(), 3);
    assert_eq!(result.columns[0].name, "num");
    assert_eq!(result.columns[1].name, "greeting");
    assert_eq!(result.row_count, 1);
    assert!(matches!(result.rows[0][0], Value::Int(1)));
    assert!(matches!(&result.rows[0][1], Value::String(s) if s == "hello"));
    assert!(result.rows[0][2].is_null());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_numeric_values_stay_exact() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 750000.50::numeric AS price, DATE '2024-03-01' AS sale_date")
        .await
        .unwrap();

    match &result.rows[0][0] {
        Value::Decimal(d) => assert_eq!(d.to_string(), "750000.50"),
        other => panic!("Expected Decimal for price, got {:?}", other),
    }
    assert!(matches!(result.rows[0][1], Value::Date(_)));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_row_cap_truncates() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let client = client.with_limits(Duration::from_secs(30), 5);

    let result = client
        .execute_query("SELECT generate_series(1, 20) AS n")
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 5);
    assert_eq!(result.total_rows, Some(20));
    assert!(result.was_truncated);
    assert!(result.truncation_warning().is_some());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_syntax_error_is_compilation() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let error = client.execute_query("SELEC 1").await.unwrap_err();
    assert_eq!(executor_kind(&error), Some(ExecutorErrorKind::Compilation));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_table_is_not_found() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let error = client
        .execute_query("SELECT * FROM nonexistent_table_xyz_123")
        .await
        .unwrap_err();
    assert_eq!(
        executor_kind(&error),
        Some(ExecutorErrorKind::NotFoundOrUnauthorized)
    );
    assert!(error.to_string().contains("does not exist"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_slow_statement_times_out() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let client = client.with_limits(Duration::from_secs(1), 1000);

    let error = client.execute_query("SELECT pg_sleep(3)").await.unwrap_err();
    assert_eq!(executor_kind(&error), Some(ExecutorErrorKind::Timeout));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_introspect_schema_formats_for_llm() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let schema = client.introspect_schema().await.unwrap();
    let formatted = schema.format_for_llm();

    for table in &schema.tables {
        assert!(
            formatted.contains(&format!("Table: {}", table.name)),
            "Expected 'Table: {}' in formatted output",
            table.name
        );
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_metadata_question_against_server() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let mut session = Session::new(
        Box::new(MockLlmClient::new()),
        LlmProvider::Mock,
        Box::new(client),
        &PipelineConfig::default(),
    );

    let outcome = session.ask("what schema am I in?").await;
    let table = outcome.table().unwrap();
    assert_eq!(table.columns(), ["Schema".to_string()].as_slice());
    assert_eq!(table.row_count(), 1);

    session.close().await.unwrap();
}
