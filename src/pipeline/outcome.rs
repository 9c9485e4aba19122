//! Terminal outcomes of a pipeline run.

use serde::Serialize;
use std::fmt;

use crate::db::ExecutorErrorKind;
use crate::materialize::CanonicalTable;

/// Why a question could not be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No executable SQL in any candidate source.
    ExtractionFailure,
    /// Rewriting to the real schema failed.
    TranslationFailure,
    /// Generated SQL used real identifiers while the leak policy blocks them.
    SchemaLeak,
    ObjectNotFoundOrUnauthorized,
    CompilationError,
    ConnectionError,
    Timeout,
    /// The LLM could not be reached or returned an error.
    LlmFailure,
    MaterializationFailure,
    Unknown,
}

impl ErrorKind {
    /// Friendly message shown as the primary error text.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ExtractionFailure => {
                "I couldn't find a safe SQL query in the response. Try rephrasing your question."
            }
            Self::TranslationFailure => {
                "The generated query could not be mapped to the database schema."
            }
            Self::SchemaLeak => {
                "The generated query referenced internal schema names and was not executed."
            }
            Self::ObjectNotFoundOrUnauthorized => {
                "This table or column doesn't exist, or you don't have permission to access it."
            }
            Self::CompilationError => {
                "The generated query was invalid. The schema may differ from what was assumed."
            }
            Self::ConnectionError => "There was a problem with the database connection.",
            Self::Timeout => "The query took too long. Try a simpler request.",
            Self::LlmFailure => "The language model could not be reached.",
            Self::MaterializationFailure => "The result could not be displayed as a table.",
            Self::Unknown => "Something went wrong while running the query.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractionFailure => "extraction_failure",
            Self::TranslationFailure => "translation_failure",
            Self::SchemaLeak => "schema_leak",
            Self::ObjectNotFoundOrUnauthorized => "object_not_found_or_unauthorized",
            Self::CompilationError => "compilation_error",
            Self::ConnectionError => "connection_error",
            Self::Timeout => "timeout",
            Self::LlmFailure => "llm_failure",
            Self::MaterializationFailure => "materialization_failure",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ExecutorErrorKind> for ErrorKind {
    fn from(kind: ExecutorErrorKind) -> Self {
        match kind {
            ExecutorErrorKind::NotFoundOrUnauthorized => Self::ObjectNotFoundOrUnauthorized,
            ExecutorErrorKind::Compilation => Self::CompilationError,
            ExecutorErrorKind::Connection => Self::ConnectionError,
            ExecutorErrorKind::Timeout => Self::Timeout,
            ExecutorErrorKind::Other => Self::Unknown,
        }
    }
}

/// Result of answering one question. Every run ends in one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PipelineOutcome {
    Success {
        table: CanonicalTable,
        /// The statement that produced the table, if any was executed.
        sql: Option<String>,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        /// Raw detail for logs and `--show-log`.
        technical: String,
        sql: Option<String>,
    },
}

impl PipelineOutcome {
    pub fn success(table: CanonicalTable, sql: Option<String>) -> Self {
        Self::Success { table, sql }
    }

    /// A failure with the kind's standard message.
    pub fn failure(kind: ErrorKind, technical: impl Into<String>, sql: Option<String>) -> Self {
        Self::Failure {
            kind,
            message: kind.user_message().to_string(),
            technical: technical.into(),
            sql,
        }
    }

    /// An unclassified failure. The message carries the raw text, cut to
    /// `max_chars`; the technical field keeps all of it.
    pub fn unknown(technical: impl Into<String>, max_chars: usize, sql: Option<String>) -> Self {
        let technical = technical.into();
        Self::Failure {
            kind: ErrorKind::Unknown,
            message: format!(
                "{} {}",
                ErrorKind::Unknown.user_message(),
                truncate(&technical, max_chars)
            ),
            technical,
            sql,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn table(&self) -> Option<&CanonicalTable> {
        match self {
            Self::Success { table, .. } => Some(table),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Success { sql, .. } | Self::Failure { sql, .. } => sql.as_deref(),
        }
    }
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
