//! End-to-end question answering against the demo warehouse.

use db_ask::config::PipelineConfig;
use db_ask::db::{ExecutorError, MockDatabaseClient};
use db_ask::llm::{extract_sql, AgentOutput, IntermediateStep, LlmProvider, MockLlmClient};
use db_ask::obfuscation::LeakPolicy;
use db_ask::pipeline::{
    steps, ErrorKind, MemoryLog, PipelineOutcome, QueryOrchestrator, Session, Severity,
};
use pretty_assertions::assert_eq;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn session_with(llm: MockLlmClient, db: MockDatabaseClient, config: &PipelineConfig) -> Session {
    Session::new(Box::new(llm), LlmProvider::Mock, Box::new(db), config)
}

fn demo_session() -> Session {
    session_with(
        MockLlmClient::new(),
        MockDatabaseClient::real_estate(),
        &PipelineConfig::default(),
    )
}

#[test]
fn test_fenced_completion_extracts_statement() {
    let candidate = extract_sql("```sql\nSELECT city FROM locations\n```");
    assert_eq!(candidate.cleaned, "SELECT city FROM locations");
    assert!(candidate.is_executable());

    // Already clean input comes back unchanged.
    assert_eq!(extract_sql(&candidate.cleaned).cleaned, candidate.cleaned);
}

#[tokio::test]
async fn test_fenced_completion_is_executed() {
    let llm = MockLlmClient::new()
        .with_response("which cities", "```sql\nSELECT city FROM locations\n```");
    let config = PipelineConfig {
        obfuscation: false,
        ..PipelineConfig::default()
    };
    let mut session = session_with(llm, MockDatabaseClient::real_estate(), &config);

    let outcome = session.ask("which cities do we cover?").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.sql(), Some("SELECT city FROM locations"));
}

#[tokio::test]
async fn test_obfuscated_answer_runs_against_real_schema() {
    let mut session = demo_session();
    let outcome = session.ask("show me the most expensive properties").await;

    assert_eq!(
        outcome.sql(),
        Some("SELECT PROPERTY_ID, PRICE FROM PROPERTIES ORDER BY PRICE DESC LIMIT 10")
    );
    let table = outcome.table().unwrap();
    assert_eq!(table.columns(), strings(&["Property Id", "Price"]).as_slice());
    assert_eq!(
        table.rows(),
        [
            strings(&["101", "$750,000.00"]),
            strings(&["102", "$525,000.50"]),
            strings(&["103", "$1,250,000.00"]),
        ]
        .as_slice()
    );
}

#[tokio::test]
async fn test_count_question_uses_count_layout() {
    let mut session = demo_session();
    let outcome = session.ask("how many properties are there").await;

    let table = outcome.table().unwrap();
    assert_eq!(table.columns(), strings(&["Description", "Count"]).as_slice());
    assert_eq!(table.rows(), [strings(&["Total records", "42"])].as_slice());
}

#[tokio::test]
async fn test_refusal_without_fallback_is_extraction_failure() {
    let db = MockDatabaseClient::real_estate();
    let output = AgentOutput::text("I'm sorry, I can't help with that request.");

    let outcome = QueryOrchestrator::new(&PipelineConfig::default())
        .run(&db, "write me a poem", &output, &mut MemoryLog::new())
        .await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::ExtractionFailure));
    assert!(db.executed_queries().is_empty());
}

#[tokio::test]
async fn test_refusal_with_step_result_uses_fallback() {
    let db = MockDatabaseClient::real_estate();
    let mut log = MemoryLog::new();
    let output = AgentOutput::text("I'm sorry, I can't help with that request.")
        .with_step(IntermediateStep::default().with_result("[(42,)]"));

    let outcome = QueryOrchestrator::new(&PipelineConfig::default())
        .run(&db, "how many listings", &output, &mut log)
        .await;

    let table = outcome.table().unwrap();
    assert_eq!(table.rows(), [strings(&["42"])].as_slice());
    assert!(db.executed_queries().is_empty());
    assert_eq!(log.for_step(steps::FALLBACK).count(), 1);
}

#[tokio::test]
async fn test_agent_json_completion() {
    let completion = r#"{
        "intermediate_steps": [{"sql_cmd": "SELECT rep_id, company_name FROM sales_representatives"}],
        "answer": "Two agents are on file."
    }"#;
    let llm = MockLlmClient::new().with_response("agents", completion);
    let mut session =
        session_with(llm, MockDatabaseClient::real_estate(), &PipelineConfig::default());

    let outcome = session.ask("list the agents").await;

    assert_eq!(outcome.sql(), Some("SELECT AGENT_ID, AGENCY FROM AGENTS"));
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_leaked_identifiers_are_logged_and_executed() {
    let llm = MockLlmClient::new().with_response("cities", "SELECT city, state FROM locations");
    let mut session =
        session_with(llm, MockDatabaseClient::real_estate(), &PipelineConfig::default());

    let outcome = session.ask("which cities").await;

    assert!(outcome.is_success());
    let warnings: Vec<_> = session
        .log()
        .for_step(steps::VALIDATE)
        .filter(|entry| entry.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
}

#[tokio::test]
async fn test_leaked_identifiers_block_when_configured() {
    let llm = MockLlmClient::new().with_response("cities", "SELECT city, state FROM locations");
    let config = PipelineConfig {
        leak_policy: LeakPolicy::Block,
        ..PipelineConfig::default()
    };
    let mut session = session_with(llm, MockDatabaseClient::real_estate(), &config);

    let outcome = session.ask("which cities").await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::SchemaLeak));
}

#[tokio::test]
async fn test_missing_object_is_classified() {
    let db = MockDatabaseClient::new().with_error(
        "from properties",
        ExecutorError::from_message("relation \"properties\" does not exist"),
    );
    let mut session = session_with(MockLlmClient::new(), db, &PipelineConfig::default());

    let outcome = session.ask("most expensive properties").await;

    match outcome {
        PipelineOutcome::Failure {
            kind,
            message,
            technical,
            ..
        } => {
            assert_eq!(kind, ErrorKind::ObjectNotFoundOrUnauthorized);
            assert_eq!(message, ErrorKind::ObjectNotFoundOrUnauthorized.user_message());
            assert!(technical.contains("does not exist"));
        }
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_metadata_questions_bypass_llm() {
    let mut session = demo_session();

    let outcome = session.ask("what database is this?").await;
    let table = outcome.table().unwrap();
    assert_eq!(table.columns(), strings(&["Database"]).as_slice());
    assert_eq!(table.rows(), [strings(&["REAL_ESTATE_DB"])].as_slice());

    let outcome = session.ask("show tables").await;
    let table = outcome.table().unwrap();
    assert_eq!(table.columns(), strings(&["Name", "Type"]).as_slice());
    assert_eq!(table.row_count(), 5);
    assert_eq!(table.rows()[0], strings(&["AGENTS", "BASE TABLE"]));
}

#[tokio::test]
async fn test_outcome_serializes_with_status_tag() {
    let mut session = demo_session();
    let outcome = session.ask("how many properties are there").await;

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["table"]["columns"][1], "Count");
    assert_eq!(json["table"]["rows"][0][1], "42");

    let outcome = session.ask("tell me a joke").await;
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "failure");
    assert_eq!(json["kind"], "extraction_failure");
}

#[tokio::test]
async fn test_log_records_every_step() {
    let mut session = demo_session();
    session.ask("show me the cities").await;

    let log = session.log();
    for step in [
        "question",
        "llm",
        steps::EXTRACT,
        steps::TRANSLATE,
        steps::EXECUTE,
        steps::MATERIALIZE,
    ] {
        assert!(
            log.for_step(step).count() >= 1,
            "Expected a log entry for step '{}'",
            step
        );
    }
}
