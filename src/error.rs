//! Plumbing errors.
//!
//! Failures a question can end in are reported as
//! [`crate::pipeline::PipelineOutcome::Failure`]; `AskError` is what the
//! layers underneath (connections, providers, config) hand back up.

use thiserror::Error;

use crate::db::ExecutorError;

#[derive(Error, Debug)]
pub enum AskError {
    /// The warehouse could not be reached or refused the login.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement failed in the warehouse; already classified.
    #[error("Query error: {0}")]
    Executor(#[from] ExecutorError),

    /// Provider failures: HTTP, auth, rate limits, malformed replies.
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AskError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short heading used when the CLI aborts.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Executor(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Whether the same question could succeed if asked again unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Executor(e) => e.kind.is_transient(),
            Self::Llm(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("rate limit") || msg.contains("timed out")
            }
            Self::Config(_) | Self::Internal(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AskError>;
