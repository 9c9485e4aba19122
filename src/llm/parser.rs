//! SQL extraction from LLM completions.
//!
//! Completions arrive as free text that may wrap the statement in markdown
//! fences, surround it with prose, or spread it over several lines. The
//! extractor reduces them to a single-line candidate statement.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Leading keywords that mark a line as part of a statement.
const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "WITH", "FROM", "WHERE", "GROUP", "ORDER", "HAVING",
    "LIMIT", "SHOW", "DESCRIBE", "EXPLAIN",
];

/// Trailing keywords after which the next line continues the statement.
const CONTINUATION_KEYWORDS: &[&str] = &[
    "SELECT", "DISTINCT", "WHERE", "AND", "OR", "ON", "BY", "HAVING", "FROM", "JOIN",
];

/// The leading keyword of an extracted statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Show,
    Describe,
    /// Any other leading word, uppercased.
    Other(String),
    /// Nothing was extracted.
    Empty,
}

impl StatementKind {
    /// Determines the kind from the first word of `sql`.
    pub fn of(sql: &str) -> Self {
        let Some(first) = sql.split_whitespace().next() else {
            return Self::Empty;
        };
        let word: String = first
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_uppercase();

        match word.as_str() {
            "SELECT" => Self::Select,
            "SHOW" => Self::Show,
            "DESCRIBE" => Self::Describe,
            _ => Self::Other(word),
        }
    }

    /// Only reads the pipeline knows how to present may be executed.
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Select | Self::Show | Self::Describe)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Show => write!(f, "SHOW"),
            Self::Describe => write!(f, "DESCRIBE"),
            Self::Other(word) if word.is_empty() => write!(f, "Unknown"),
            Self::Other(word) => write!(f, "{}", word),
            Self::Empty => write!(f, "Empty"),
        }
    }
}

/// A statement pulled out of a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSql {
    /// The text the candidate was extracted from.
    pub raw: String,
    /// Single-line statement with fences, prose and extra whitespace removed.
    pub cleaned: String,
    pub kind: StatementKind,
}

impl CandidateSql {
    pub fn is_empty(&self) -> bool {
        self.cleaned.is_empty()
    }

    /// Returns true if there is a statement and its kind may be executed.
    pub fn is_executable(&self) -> bool {
        !self.is_empty() && self.kind.is_executable()
    }
}

/// Extracts a candidate statement from LLM output.
///
/// The first fenced block is used when present (multi-line fences are tried
/// before inline ones). Within the candidate, only lines that look like SQL
/// survive, and they are joined into one line. Input that is already a clean
/// single-line statement comes back unchanged.
pub fn extract_sql(response: &str) -> CandidateSql {
    let trimmed = response.trim();
    let body = fenced_body(trimmed).unwrap_or(trimmed);
    let body = strip_outer_backticks(body);

    let mut kept: Vec<&str> = Vec::new();
    let mut previous_kept = false;

    for line in body.lines() {
        let line = line.trim().trim_start_matches('`').trim();
        if line.is_empty() {
            continue;
        }

        let keep = starts_with_statement_keyword(line)
            || contains_clause_keyword(line)
            || (previous_kept && continues_statement(kept.last().copied().unwrap_or(""), line));

        if keep {
            kept.push(line);
        }
        previous_kept = keep;
    }

    let cleaned = kept
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let kind = StatementKind::of(&cleaned);

    CandidateSql {
        raw: response.to_string(),
        cleaned,
        kind,
    }
}

fn fenced_body(text: &str) -> Option<&str> {
    static MULTILINE: OnceLock<Regex> = OnceLock::new();
    static INLINE: OnceLock<Regex> = OnceLock::new();

    let multiline = MULTILINE.get_or_init(|| {
        Regex::new(r"(?is)```(?:sql)?[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("valid fence regex")
    });
    let inline = INLINE
        .get_or_init(|| Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").expect("valid fence regex"));

    multiline
        .captures(text)
        .or_else(|| inline.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn strip_outer_backticks(mut text: &str) -> &str {
    loop {
        let stripped = text.trim().trim_matches('`').trim();
        if stripped.len() == text.len() {
            return stripped;
        }
        text = stripped;
    }
}

fn starts_with_statement_keyword(line: &str) -> bool {
    let word = leading_word(line);
    STATEMENT_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn contains_clause_keyword(line: &str) -> bool {
    static CLAUSE: OnceLock<Regex> = OnceLock::new();
    CLAUSE
        .get_or_init(|| {
            Regex::new(r"(?i)\b(?:FROM|WHERE|AND|OR|ORDER\s+BY|GROUP\s+BY|HAVING|JOIN)\b")
                .expect("valid clause regex")
        })
        .is_match(line)
}

/// Multi-line statements break after a comma, an open paren, or a keyword
/// that still needs its operand. Such lines survive only when the line
/// before them did.
fn continues_statement(previous: &str, line: &str) -> bool {
    if previous.ends_with(',') || previous.ends_with('(') {
        return true;
    }
    if line.starts_with(',') || line.starts_with(')') {
        return true;
    }
    let last_word = previous
        .rsplit(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("");
    CONTINUATION_KEYWORDS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(last_word))
}

fn leading_word(line: &str) -> &str {
    let end = line
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(line.len());
    &line[..end]
}
