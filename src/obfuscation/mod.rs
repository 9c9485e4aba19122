//! Schema obfuscation.
//!
//! The LLM only ever sees a substitute vocabulary for the warehouse's tables
//! and columns. Generated SQL is checked for leaked real identifiers and then
//! rewritten to the real schema before execution.

mod mapping;
mod translator;

pub use mapping::{ColumnPair, IdentifierMapping, TablePair};
pub use translator::{Direction, IdentifierTranslator, Translated, ValidationReport};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// What to do when generated SQL contains real identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakPolicy {
    /// Record the leak and continue.
    #[default]
    Warn,
    /// Refuse to execute the statement.
    Block,
}

impl LeakPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Block => "block",
        }
    }
}

impl FromStr for LeakPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "block" => Ok(Self::Block),
            _ => Err(format!("Unknown leak policy: {}", s)),
        }
    }
}

impl fmt::Display for LeakPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Renders the obfuscated vocabulary for an LLM prompt.
///
/// Relationships are stored in real vocabulary and translated on the way
/// out; one that fails to translate is omitted rather than leaked.
pub fn describe_obfuscated_schema(translator: &IdentifierTranslator) -> String {
    let mapping = translator.mapping();
    let mut out = String::from("Tables:\n");

    for table in mapping.tables() {
        let columns: Vec<&str> = mapping.obfuscated_columns_of(&table.obfuscated).collect();
        out.push_str(&format!("- {} ({})\n", table.obfuscated, columns.join(", ")));
    }

    if !mapping.relationships().is_empty() {
        out.push_str("\nRelationships:\n");
        for relationship in mapping.relationships() {
            let translated = translator.to_obfuscated(relationship);
            if translated.succeeded {
                out.push_str(&format!("- {}\n", translated.text));
            } else {
                warn!("Skipping relationship that could not be obfuscated");
            }
        }
    }

    out
}
