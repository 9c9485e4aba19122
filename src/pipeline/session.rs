//! Interactive session state.
//!
//! A session owns the database handle, the LLM client, the schema cache and
//! the processing log. Questions are answered one at a time.

use std::sync::Arc;

use tracing::{debug, info};

use super::log::{MemoryLog, ProcessingLog, Severity};
use super::metadata::MetadataQuery;
use super::orchestrator::QueryOrchestrator;
use super::outcome::{ErrorKind, PipelineOutcome};
use crate::config::PipelineConfig;
use crate::db::{DatabaseClient, Schema, SchemaCache};
use crate::error::Result;
use crate::llm::{build_messages, AgentOutput, LlmClient, LlmProvider};
use crate::obfuscation::describe_obfuscated_schema;

const DEFAULT_CONNECTION_NAME: &str = "default";

/// One user's conversation with one database.
pub struct Session {
    llm: Box<dyn LlmClient>,
    provider: LlmProvider,
    db: Box<dyn DatabaseClient>,
    connection_name: String,
    schema_cache: SchemaCache,
    orchestrator: QueryOrchestrator,
    log: MemoryLog,
}

impl Session {
    pub fn new(
        llm: Box<dyn LlmClient>,
        provider: LlmProvider,
        db: Box<dyn DatabaseClient>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            llm,
            provider,
            db,
            connection_name: DEFAULT_CONNECTION_NAME.to_string(),
            schema_cache: SchemaCache::new(config.schema_cache_ttl()),
            orchestrator: QueryOrchestrator::new(config),
            log: MemoryLog::new(),
        }
    }

    /// Names the connection; the schema cache is keyed by it.
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = name.into();
        self
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn log(&self) -> &MemoryLog {
        &self.log
    }

    /// Answers one question.
    pub async fn ask(&mut self, question: &str) -> PipelineOutcome {
        let question = question.trim();
        if question.is_empty() {
            return PipelineOutcome::failure(ErrorKind::ExtractionFailure, "Empty question", None);
        }
        self.log.record("question", question, Severity::Info);

        if let Some(query) = MetadataQuery::detect(question) {
            info!(kind = query.as_str(), "Answering metadata question directly");
            self.log.record("metadata", query.as_str(), Severity::Info);
            return self
                .orchestrator
                .run_statement(self.db.as_ref(), question, query.sql(), &mut self.log)
                .await;
        }

        let schema = match self.schema_description().await {
            Ok(schema) => schema,
            Err(e) => {
                self.log.record("schema", &e.to_string(), Severity::Error);
                return PipelineOutcome::failure(ErrorKind::ConnectionError, e.to_string(), None);
            }
        };

        let messages = build_messages(self.provider, &schema, question);
        let completion = match self.llm.complete(&messages).await {
            Ok(completion) => completion,
            Err(e) => {
                self.log.record("llm", &e.to_string(), Severity::Error);
                return PipelineOutcome::failure(ErrorKind::LlmFailure, e.to_string(), None);
            }
        };
        debug!(provider = %self.provider, chars = completion.len(), "LLM completion received");
        self.log.record("llm", &completion, Severity::Debug);

        let output = AgentOutput::from_completion(&completion);
        self.orchestrator
            .run(self.db.as_ref(), question, &output, &mut self.log)
            .await
    }

    /// Clears the processing log and cached schema.
    pub fn reset(&mut self) {
        self.log.clear();
        self.schema_cache.clear();
    }

    pub async fn close(self) -> Result<()> {
        self.db.close().await
    }

    /// Schema text for the prompt: the obfuscated vocabulary when
    /// translation is on, else the introspected schema.
    async fn schema_description(&mut self) -> Result<String> {
        if let Some(translator) = self.orchestrator.translator() {
            return Ok(describe_obfuscated_schema(translator));
        }
        Ok(self.schema().await?.format_for_llm())
    }

    async fn schema(&mut self) -> Result<Arc<Schema>> {
        if let Some(schema) = self.schema_cache.get(&self.connection_name) {
            debug!(connection = %self.connection_name, "Using cached schema");
            return Ok(schema);
        }
        let schema = self.db.introspect_schema().await?;
        Ok(self.schema_cache.insert(self.connection_name.clone(), schema))
    }
}
