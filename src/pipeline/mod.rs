//! Question answering pipeline.
//!
//! A question goes to the LLM (or, for metadata questions, straight to a
//! predefined statement), the answer is mined for SQL, the SQL is
//! translated and executed, and the result becomes a display table.

pub mod log;
pub mod metadata;
pub mod orchestrator;
pub mod outcome;
pub mod session;

pub use log::{MemoryLog, ProcessingLog, ProcessingLogEntry, Severity};
pub use metadata::MetadataQuery;
pub use orchestrator::{select_candidate, steps, CandidateSource, QueryOrchestrator};
pub use outcome::{truncate, ErrorKind, PipelineOutcome};
pub use session::Session;
