//! Query execution.
//!
//! Keeps the read-only gate and timing out of the orchestrator.

pub mod executor;

pub use executor::{ExecutionResult, QueryExecutor, QueryLogEntry, QueryOutcome};
