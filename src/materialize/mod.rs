//! Result materialization.
//!
//! Turns whatever the executor (or an intermediate step) produced into a
//! [`CanonicalTable`]: typed rows, a stringified repr of rows, or a bare
//! answer. Nothing here fails; unusable shapes degrade to a single
//! "Result" cell.

pub mod columns;
pub mod format;
pub mod literal;
pub mod rules;
pub mod table;

pub use columns::{humanize, infer_column_names};
pub use format::{ColumnFormat, FormatOptions};
pub use literal::{looks_like_rows, parse_stringified_rows};
pub use rules::{default_rules, Rule, RuleContext};
pub use table::CanonicalTable;

use crate::db::{ColumnInfo, QueryResult, Row, Value};
use tracing::warn;

/// A result before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// Typed rows with optional column descriptors.
    Rows {
        columns: Vec<ColumnInfo>,
        rows: Vec<Row>,
    },
    /// A textual answer, possibly the repr of a row sequence.
    Text(String),
    /// A bare value.
    Scalar(Value),
}

impl From<QueryResult> for RawResult {
    fn from(result: QueryResult) -> Self {
        RawResult::Rows {
            columns: result.columns,
            rows: result.rows,
        }
    }
}

/// Normalized input to the formatting rules.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    Text(String),
    Rows {
        columns: Vec<ColumnInfo>,
        rows: Vec<Row>,
    },
}

impl ResultData {
    /// Normalizes a raw result. The flag is set when text that looked like
    /// rows could not be parsed.
    fn from_raw(raw: &RawResult) -> (Self, bool) {
        match raw {
            RawResult::Rows { columns, rows } => (
                ResultData::Rows {
                    columns: columns.clone(),
                    rows: rows.clone(),
                },
                false,
            ),
            RawResult::Text(text) => {
                let shaped = looks_like_rows(text) || text.contains("Decimal(");
                if !shaped {
                    return (ResultData::Text(text.clone()), false);
                }
                match parse_stringified_rows(text) {
                    Some(rows) => (
                        ResultData::Rows {
                            columns: Vec::new(),
                            rows,
                        },
                        false,
                    ),
                    None => {
                        warn!(len = text.len(), "Could not parse stringified rows, showing text");
                        (ResultData::Text(text.clone()), true)
                    }
                }
            }
            RawResult::Scalar(Value::String(text)) => (ResultData::Text(text.clone()), false),
            RawResult::Scalar(Value::Null) => (
                ResultData::Rows {
                    columns: Vec::new(),
                    rows: Vec::new(),
                },
                false,
            ),
            RawResult::Scalar(value) => (
                ResultData::Rows {
                    columns: Vec::new(),
                    rows: vec![vec![value.clone()]],
                },
                false,
            ),
        }
    }
}

/// The table plus the rule that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub table: CanonicalTable,
    pub rule: &'static str,
    /// The result shape could not be normalized and was shown as text.
    pub degraded: bool,
}

/// Applies the formatting rules to raw results.
#[derive(Debug, Clone)]
pub struct Materializer {
    rules: Vec<Rule>,
    options: FormatOptions,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(FormatOptions::default())
    }
}

impl Materializer {
    pub fn new(options: FormatOptions) -> Self {
        Self {
            rules: default_rules(),
            options,
        }
    }

    /// Replaces the rule table.
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn materialize(&self, raw: &RawResult, sql: &str, question: &str) -> Materialized {
        let (data, unparsed) = ResultData::from_raw(raw);
        let ctx = RuleContext {
            data: &data,
            sql,
            question,
        };
        let (table, rule) = rules::apply_rules(&self.rules, &ctx, &self.options);

        Materialized {
            table,
            rule,
            degraded: unparsed || rule == rules::FALLBACK,
        }
    }
}
