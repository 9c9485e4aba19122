//! Classified executor failures.
//!
//! Database drivers report failures in their own vocabulary. The executor
//! boundary folds them into a handful of kinds the pipeline can turn into
//! user-facing messages.

use std::fmt;

use thiserror::Error;

/// Broad category of an executor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorErrorKind {
    /// A referenced table or column does not exist, or the role may not see it.
    NotFoundOrUnauthorized,
    /// The statement did not compile (syntax error, invalid identifier).
    Compilation,
    /// The session to the warehouse failed or was dropped.
    Connection,
    /// The statement exceeded its time budget.
    Timeout,
    /// Anything the classifier does not recognize.
    Other,
}

impl ExecutorErrorKind {
    /// Classifies a Postgres SQLSTATE code.
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            // undefined_table, undefined_column, undefined_function,
            // invalid_schema_name, insufficient_privilege
            "42P01" | "42703" | "42883" | "3F000" | "42501" => Self::NotFoundOrUnauthorized,
            // query_canceled (statement_timeout)
            "57014" => Self::Timeout,
            c if c.starts_with("08") || c.starts_with("57P") => Self::Connection,
            c if c.starts_with("42") => Self::Compilation,
            _ => Self::Other,
        }
    }

    /// Classifies a driver message by its wording.
    ///
    /// Used when no structured code is available, e.g. for errors relayed
    /// through an LLM agent or a foreign driver.
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("does not exist")
            || lower.contains("not authorized")
            || lower.contains("permission denied")
            || lower.contains("insufficient privilege")
        {
            return Self::NotFoundOrUnauthorized;
        }

        if lower.contains("compilation error")
            || lower.contains("syntax error")
            || lower.contains("invalid identifier")
            || lower.contains("unexpected")
        {
            return Self::Compilation;
        }

        let mentions_connection = lower.contains("connect")
            || lower.contains("network")
            || lower.contains("broken pipe")
            || lower.contains("session");

        if (lower.contains("timeout") || lower.contains("timed out")) && !mentions_connection {
            return Self::Timeout;
        }

        if mentions_connection {
            return Self::Connection;
        }

        Self::Other
    }

    /// Connection drops and timeouts may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }

    /// Returns a short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFoundOrUnauthorized => "not_found_or_unauthorized",
            Self::Compilation => "compilation",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ExecutorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the executor, with its classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutorError {
    pub kind: ExecutorErrorKind,
    pub message: String,
}

impl ExecutorError {
    /// Creates an error with an explicit kind.
    pub fn new(kind: ExecutorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an error whose kind is inferred from the message wording.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ExecutorErrorKind::classify_message(&message),
            message,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::Connection, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(
            ExecutorErrorKind::from_sqlstate("42P01"),
            ExecutorErrorKind::NotFoundOrUnauthorized
        );
        assert_eq!(
            ExecutorErrorKind::from_sqlstate("42501"),
            ExecutorErrorKind::NotFoundOrUnauthorized
        );
        assert_eq!(
            ExecutorErrorKind::from_sqlstate("42601"),
            ExecutorErrorKind::Compilation
        );
        assert_eq!(
            ExecutorErrorKind::from_sqlstate("08006"),
            ExecutorErrorKind::Connection
        );
        assert_eq!(
            ExecutorErrorKind::from_sqlstate("57P01"),
            ExecutorErrorKind::Connection
        );
        assert_eq!(
            ExecutorErrorKind::from_sqlstate("57014"),
            ExecutorErrorKind::Timeout
        );
        assert_eq!(
            ExecutorErrorKind::from_sqlstate("23505"),
            ExecutorErrorKind::Other
        );
    }

    #[test]
    fn test_message_classification_not_found_wins_over_compilation() {
        let msg = "SQL compilation error: Object 'REAL_ESTATE_ITEMS' does not exist or not authorized.";
        assert_eq!(
            ExecutorErrorKind::classify_message(msg),
            ExecutorErrorKind::NotFoundOrUnauthorized
        );
    }

    #[test]
    fn test_message_classification_compilation() {
        let msg = "SQL compilation error: syntax error line 1 at position 7 unexpected 'FORM'.";
        assert_eq!(
            ExecutorErrorKind::classify_message(msg),
            ExecutorErrorKind::Compilation
        );
    }

    #[test]
    fn test_message_classification_timeout_and_connection() {
        assert_eq!(
            ExecutorErrorKind::classify_message("Statement reached its statement timeout"),
            ExecutorErrorKind::Timeout
        );
        assert_eq!(
            ExecutorErrorKind::classify_message("Connection to host timed out"),
            ExecutorErrorKind::Connection
        );
        assert_eq!(
            ExecutorErrorKind::classify_message("Session no longer exists"),
            ExecutorErrorKind::Connection
        );
        assert_eq!(
            ExecutorErrorKind::classify_message("network unreachable"),
            ExecutorErrorKind::Connection
        );
    }

    #[test]
    fn test_message_classification_other() {
        assert_eq!(
            ExecutorErrorKind::classify_message("Division by zero"),
            ExecutorErrorKind::Other
        );
    }

    #[test]
    fn test_from_message_keeps_text() {
        let err = ExecutorError::from_message("syntax error at or near \"FORM\"");
        assert_eq!(err.kind, ExecutorErrorKind::Compilation);
        assert_eq!(err.to_string(), "syntax error at or near \"FORM\"");
    }
}
