//! Read-only gate for generated SQL.
//!
//! Statements are parsed with the Snowflake dialect. Input passes only when
//! every statement in it reads; one write anywhere (a stacked statement, a
//! data-modifying CTE, `EXPLAIN ANALYZE` of a write) rejects the whole input.

mod parser;

pub use parser::{check_read_only, ReadGate};

use std::fmt;

/// What a parsed statement does, with its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(&'static str),
    /// Writes data, changes schema or privileges, or anything not known to read.
    Write(&'static str),
}

impl Access {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Read(keyword) | Self::Write(keyword) => keyword,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}

/// The gate's decision for one piece of SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Every statement reads.
    Allow { keyword: &'static str, statements: usize },
    /// At least one statement writes; `keyword` names the first writer.
    Reject { keyword: &'static str, statements: usize },
    /// The parser could not read the input.
    Unparsed { reason: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Reject { .. })
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow { keyword, statements: 1 } => write!(f, "{keyword} allowed"),
            Self::Allow { statements, .. } => write!(f, "{statements} read statements allowed"),
            Self::Reject { keyword, statements: 1 } => {
                write!(f, "{keyword} statement rejected: only reads are executed")
            }
            Self::Reject { keyword, statements } => write!(
                f,
                "{statements} stacked statements rejected: {keyword} is not a read"
            ),
            Self::Unparsed { reason } => write!(f, "Could not parse SQL: {reason}"),
        }
    }
}
