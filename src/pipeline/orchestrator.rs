//! Query orchestration.
//!
//! Takes one model answer through extraction, translation, execution and
//! materialization. Every path ends in a [`PipelineOutcome`]; nothing here
//! returns an error or panics on bad input.

use tracing::{debug, info};

use super::log::{ProcessingLog, Severity};
use super::outcome::{ErrorKind, PipelineOutcome};
use crate::config::PipelineConfig;
use crate::db::{DatabaseClient, ExecutorErrorKind};
use crate::error::AskError;
use crate::llm::{extract_sql, AgentOutput, CandidateSql};
use crate::materialize::{FormatOptions, Materializer, RawResult};
use crate::obfuscation::{IdentifierTranslator, LeakPolicy};
use crate::query::{ExecutionResult, QueryExecutor};

/// Processing log step names.
pub mod steps {
    pub const EXTRACT: &str = "extract";
    pub const VALIDATE: &str = "validate";
    pub const TRANSLATE: &str = "translate";
    pub const EXECUTE: &str = "execute";
    pub const MATERIALIZE: &str = "materialize";
    pub const FALLBACK: &str = "fallback";
}

/// Where a SQL candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    IntermediateStep,
    Completion,
    FinalAnswer,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntermediateStep => "intermediate step",
            Self::Completion => "completion",
            Self::FinalAnswer => "final answer",
        }
    }
}

/// Runs model answers against a database.
#[derive(Debug, Clone)]
pub struct QueryOrchestrator {
    translator: Option<IdentifierTranslator>,
    leak_policy: LeakPolicy,
    materializer: Materializer,
    max_error_chars: usize,
}

impl QueryOrchestrator {
    /// Builds an orchestrator from pipeline settings. With obfuscation on,
    /// the built-in real-estate vocabulary is used.
    pub fn new(config: &PipelineConfig) -> Self {
        let translator = config.obfuscation.then(IdentifierTranslator::real_estate);
        Self {
            translator,
            leak_policy: config.leak_policy,
            materializer: Materializer::new(FormatOptions {
                currency_symbol: config.currency_symbol.clone(),
            }),
            max_error_chars: config.max_error_chars,
        }
    }

    /// Replaces the translator; `None` sends SQL through untranslated.
    pub fn with_translator(mut self, translator: Option<IdentifierTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn translator(&self) -> Option<&IdentifierTranslator> {
        self.translator.as_ref()
    }

    /// Answers `question` from the model's `output`.
    pub async fn run(
        &self,
        db: &dyn DatabaseClient,
        question: &str,
        output: &AgentOutput,
        log: &mut dyn ProcessingLog,
    ) -> PipelineOutcome {
        let Some((candidate, source)) = select_candidate(output, log) else {
            return self.fallback_to_step_result(output, question, log);
        };
        info!(source = source.as_str(), sql = %candidate.cleaned, "Extracted SQL");

        let sql = match self.to_real_schema(&candidate.cleaned, log) {
            Ok(sql) => sql,
            Err(outcome) => return outcome,
        };

        self.execute_and_materialize(db, question, &sql, log).await
    }

    /// Runs a trusted statement directly, skipping extraction and
    /// translation.
    pub async fn run_statement(
        &self,
        db: &dyn DatabaseClient,
        question: &str,
        sql: &str,
        log: &mut dyn ProcessingLog,
    ) -> PipelineOutcome {
        self.execute_and_materialize(db, question, sql, log).await
    }

    /// Checks for leaked identifiers, then rewrites to the real schema.
    fn to_real_schema(
        &self,
        sql: &str,
        log: &mut dyn ProcessingLog,
    ) -> std::result::Result<String, PipelineOutcome> {
        let Some(translator) = &self.translator else {
            return Ok(sql.to_string());
        };

        let report = translator.validate(sql);
        if !report.is_valid() {
            let detail = report.violations.join("; ");
            match self.leak_policy {
                LeakPolicy::Warn => log.record(steps::VALIDATE, &detail, Severity::Warning),
                LeakPolicy::Block => {
                    log.record(steps::VALIDATE, &detail, Severity::Error);
                    return Err(PipelineOutcome::failure(
                        ErrorKind::SchemaLeak,
                        detail,
                        Some(sql.to_string()),
                    ));
                }
            }
        }

        let translated = translator.to_real(sql);
        if translated.succeeded {
            log.record(steps::TRANSLATE, &translated.text, Severity::Info);
        } else {
            log.record(
                steps::TRANSLATE,
                &format!(
                    "{}: running untranslated SQL",
                    ErrorKind::TranslationFailure.user_message()
                ),
                Severity::Warning,
            );
        }
        Ok(translated.text)
    }

    async fn execute_and_materialize(
        &self,
        db: &dyn DatabaseClient,
        question: &str,
        sql: &str,
        log: &mut dyn ProcessingLog,
    ) -> PipelineOutcome {
        let executor = QueryExecutor::new(db);

        let outcome = match executor.execute(sql).await {
            ExecutionResult::Success(outcome) => outcome,
            ExecutionResult::Rejected(decision) => {
                let detail = decision.to_string();
                log.record(steps::EXECUTE, &detail, Severity::Error);
                return PipelineOutcome::failure(
                    ErrorKind::ExtractionFailure,
                    detail,
                    Some(sql.to_string()),
                );
            }
            ExecutionResult::Error(e) => {
                log.record(steps::EXECUTE, &e.to_string(), Severity::Error);
                return self.classify_failure(e, sql);
            }
        };

        log.record(steps::EXECUTE, &outcome.log_entry.summary(), Severity::Info);
        if let Some(warning) = outcome.result.truncation_warning() {
            log.record(steps::EXECUTE, &warning, Severity::Warning);
        }

        let materialized = self
            .materializer
            .materialize(&RawResult::from(outcome.result), sql, question);
        if materialized.degraded {
            log.record(
                steps::MATERIALIZE,
                ErrorKind::MaterializationFailure.user_message(),
                Severity::Warning,
            );
        } else {
            log.record(
                steps::MATERIALIZE,
                &format!("rule {}, {} row(s)", materialized.rule, materialized.table.row_count()),
                Severity::Debug,
            );
        }

        PipelineOutcome::success(materialized.table, Some(sql.to_string()))
    }

    /// Uses a result an intermediate step already observed when no SQL
    /// could be run.
    fn fallback_to_step_result(
        &self,
        output: &AgentOutput,
        question: &str,
        log: &mut dyn ProcessingLog,
    ) -> PipelineOutcome {
        let step = output
            .intermediate_steps
            .iter()
            .rev()
            .find_map(|step| step.result_text().map(|text| (step, text)));

        let Some((step, text)) = step else {
            log.record(
                steps::EXTRACT,
                "No executable SQL and no intermediate result",
                Severity::Error,
            );
            return PipelineOutcome::failure(
                ErrorKind::ExtractionFailure,
                "No executable SQL found in the completion, final answer or intermediate steps",
                None,
            );
        };

        log.record(steps::FALLBACK, "Using intermediate step result", Severity::Warning);
        let sql = step.sql_cmd.clone().unwrap_or_default();
        let materialized = self
            .materializer
            .materialize(&RawResult::Text(text), &sql, question);
        if materialized.degraded {
            log.record(
                steps::MATERIALIZE,
                ErrorKind::MaterializationFailure.user_message(),
                Severity::Warning,
            );
        }

        PipelineOutcome::success(materialized.table, step.sql_cmd.clone())
    }

    fn classify_failure(&self, error: AskError, sql: &str) -> PipelineOutcome {
        let sql = Some(sql.to_string());
        let (kind, technical) = match error {
            AskError::Executor(e) => (ErrorKind::from(e.kind), e.message),
            AskError::Connection(message) => (ErrorKind::ConnectionError, message),
            other => {
                let message = other.to_string();
                (ErrorKind::from(ExecutorErrorKind::classify_message(&message)), message)
            }
        };

        match kind {
            ErrorKind::Unknown => PipelineOutcome::unknown(technical, self.max_error_chars, sql),
            kind => PipelineOutcome::failure(kind, technical, sql),
        }
    }
}

/// Picks the first executable statement from the answer's sources: the
/// latest intermediate step with SQL, then the completion, then the final
/// answer.
pub fn select_candidate(
    output: &AgentOutput,
    log: &mut dyn ProcessingLog,
) -> Option<(CandidateSql, CandidateSource)> {
    let step_sql = output
        .intermediate_steps
        .iter()
        .rev()
        .find_map(|step| step.sql_cmd.as_deref());

    let sources = [
        (step_sql, CandidateSource::IntermediateStep),
        (Some(output.completion.as_str()), CandidateSource::Completion),
        (output.final_answer.as_deref(), CandidateSource::FinalAnswer),
    ];

    for (text, source) in sources {
        let Some(text) = text else { continue };
        let candidate = extract_sql(text);

        if candidate.is_executable() {
            log.record(steps::EXTRACT, &candidate.cleaned, Severity::Info);
            return Some((candidate, source));
        }

        if candidate.is_empty() {
            debug!(source = source.as_str(), "No SQL in source");
        } else {
            log.record(
                steps::EXTRACT,
                &format!(
                    "Ignoring {} statement from {}: {}",
                    candidate.kind,
                    source.as_str(),
                    candidate.cleaned
                ),
                Severity::Warning,
            );
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ExecutorError, MockDatabaseClient};
    use crate::llm::IntermediateStep;
    use crate::pipeline::log::MemoryLog;
    use pretty_assertions::assert_eq;

    fn orchestrator() -> QueryOrchestrator {
        QueryOrchestrator::new(&PipelineConfig::default())
    }

    fn plain_orchestrator() -> QueryOrchestrator {
        orchestrator().with_translator(None)
    }

    #[tokio::test]
    async fn test_translates_and_executes() {
        let db = MockDatabaseClient::real_estate();
        let mut log = MemoryLog::new();
        let output = AgentOutput::text(
            "```sql\nSELECT item_id, monetary_value FROM real_estate_items WHERE monetary_value > 500000\n```",
        );

        let outcome = orchestrator()
            .run(&db, "expensive listings", &output, &mut log)
            .await;

        assert_eq!(
            db.executed_queries(),
            vec!["SELECT PROPERTY_ID, PRICE FROM PROPERTIES WHERE PRICE > 500000".to_string()]
        );
        let table = outcome.table().unwrap();
        assert_eq!(table.columns(), ["Property Id", "Price"].map(String::from).as_slice());
        assert_eq!(table.rows()[0], vec!["101".to_string(), "$750,000.00".to_string()]);
        assert_eq!(log.for_step(steps::TRANSLATE).count(), 1);
    }

    #[tokio::test]
    async fn test_intermediate_step_sql_is_preferred() {
        let db = MockDatabaseClient::real_estate();
        let output = AgentOutput::text("I looked at the cities for you.")
            .with_step(IntermediateStep::sql("SELECT city_name, state_name FROM geographic_areas"));

        let outcome = orchestrator()
            .run(&db, "cities", &output, &mut MemoryLog::new())
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.sql(), Some("SELECT CITY, STATE FROM LOCATIONS"));
    }

    #[tokio::test]
    async fn test_final_answer_is_second_source() {
        let db = MockDatabaseClient::real_estate();
        let output = AgentOutput::text("Sure, let me check.")
            .with_final_answer("SELECT COUNT(*) FROM real_estate_items");

        let outcome = orchestrator()
            .run(&db, "how many properties", &output, &mut MemoryLog::new())
            .await;

        let table = outcome.table().unwrap();
        assert_eq!(table.rows()[0], vec!["Total records".to_string(), "42".to_string()]);
    }

    #[tokio::test]
    async fn test_step_result_fallback() {
        let db = MockDatabaseClient::real_estate();
        let mut log = MemoryLog::new();
        let output = AgentOutput::text("Here you go.").with_step(
            IntermediateStep::default().with_result("[('Austin', 'TX'), ('Denver', 'CO')]"),
        );

        let outcome = plain_orchestrator().run(&db, "cities", &output, &mut log).await;

        assert!(db.executed_queries().is_empty());
        let table = outcome.table().unwrap();
        assert_eq!(table.columns(), ["Column 1", "Column 2"].map(String::from).as_slice());
        assert_eq!(table.row_count(), 2);
        assert_eq!(log.for_step(steps::FALLBACK).count(), 1);
    }

    #[tokio::test]
    async fn test_refusal_is_extraction_failure() {
        let db = MockDatabaseClient::real_estate();
        let output = AgentOutput::text("I'm sorry, I can only help with questions about listings.");

        let outcome = orchestrator()
            .run(&db, "tell me a joke", &output, &mut MemoryLog::new())
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::ExtractionFailure));
        assert!(db.executed_queries().is_empty());
    }

    #[tokio::test]
    async fn test_non_select_is_never_executed() {
        let db = MockDatabaseClient::real_estate();
        let output = AgentOutput::text("DELETE FROM real_estate_items WHERE item_id = 1");

        let outcome = orchestrator()
            .run(&db, "remove listing", &output, &mut MemoryLog::new())
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::ExtractionFailure));
        assert!(db.executed_queries().is_empty());
    }

    #[tokio::test]
    async fn test_stacked_statement_is_rejected() {
        let db = MockDatabaseClient::real_estate();
        let output = AgentOutput::text("SELECT 1; DROP TABLE real_estate_items");

        let outcome = plain_orchestrator()
            .run(&db, "q", &output, &mut MemoryLog::new())
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::ExtractionFailure));
        assert!(db.executed_queries().is_empty());
    }

    #[tokio::test]
    async fn test_leak_warns_by_default() {
        let db = MockDatabaseClient::real_estate();
        let mut log = MemoryLog::new();
        let output = AgentOutput::text("SELECT city FROM locations");

        let outcome = orchestrator().run(&db, "cities", &output, &mut log).await;

        assert!(outcome.is_success());
        let leak = log.for_step(steps::VALIDATE).next().unwrap();
        assert_eq!(leak.severity, Severity::Warning);
        assert!(leak.content.contains("locations"));
    }

    #[tokio::test]
    async fn test_leak_blocks_when_configured() {
        let db = MockDatabaseClient::real_estate();
        let config = PipelineConfig {
            leak_policy: LeakPolicy::Block,
            ..PipelineConfig::default()
        };
        let output = AgentOutput::text("SELECT city FROM locations");

        let outcome = QueryOrchestrator::new(&config)
            .run(&db, "cities", &output, &mut MemoryLog::new())
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::SchemaLeak));
        assert!(db.executed_queries().is_empty());
    }

    #[tokio::test]
    async fn test_executor_failures_are_classified() {
        let db = MockDatabaseClient::new()
            .with_error(
                "from ghosts",
                ExecutorError::from_message(
                    "SQL compilation error: Object 'GHOSTS' does not exist or not authorized.",
                ),
            )
            .with_error("from slow", ExecutorError::timeout("statement timeout"));

        let outcome = plain_orchestrator()
            .run(&db, "q", &AgentOutput::text("SELECT * FROM ghosts"), &mut MemoryLog::new())
            .await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ObjectNotFoundOrUnauthorized));
        assert_eq!(outcome.sql(), Some("SELECT * FROM ghosts"));

        let outcome = plain_orchestrator()
            .run(&db, "q", &AgentOutput::text("SELECT * FROM slow"), &mut MemoryLog::new())
            .await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_unknown_failure_is_truncated() {
        let raw = format!("driver exploded: {}", "z".repeat(400));
        let db = MockDatabaseClient::new()
            .with_error("from t", ExecutorError::from_message(raw.clone()));

        let outcome = plain_orchestrator()
            .run(&db, "q", &AgentOutput::text("SELECT a FROM t"), &mut MemoryLog::new())
            .await;

        match outcome {
            PipelineOutcome::Failure {
                kind,
                message,
                technical,
                ..
            } => {
                assert_eq!(kind, ErrorKind::Unknown);
                assert!(message.ends_with("..."));
                assert!(message.chars().count() < 300);
                assert_eq!(technical, raw);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_result_reads_no_data() {
        let db = MockDatabaseClient::new().with_result("from t", &["A"], vec![]);
        let outcome = plain_orchestrator()
            .run(&db, "q", &AgentOutput::text("SELECT a FROM t"), &mut MemoryLog::new())
            .await;

        let table = outcome.table().unwrap();
        assert_eq!(table.rows()[0], vec!["No data".to_string()]);
    }

    #[tokio::test]
    async fn test_run_statement_skips_translation() {
        let db = MockDatabaseClient::real_estate();
        let outcome = orchestrator()
            .run_statement(
                &db,
                "what database",
                "SELECT CURRENT_DATABASE() AS database_name",
                &mut MemoryLog::new(),
            )
            .await;

        let table = outcome.table().unwrap();
        assert_eq!(table.rows()[0], vec!["REAL_ESTATE_DB".to_string()]);
    }
}
