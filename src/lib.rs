//! db-ask - Ask a SQL warehouse questions in plain language.
//!
//! This library exposes the pipeline modules for the `ask` binary and for
//! integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod materialize;
pub mod obfuscation;
pub mod pipeline;
pub mod query;
pub mod safety;
