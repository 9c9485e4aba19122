//! Ordered formatting rules.
//!
//! Each rule pairs a predicate with a formatter. The first rule whose
//! predicate holds and whose formatter produces a table wins; the last rule
//! always produces one.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::columns::{humanize, infer_column_names, is_count_expression, select_items};
use super::format::{
    column_format, format_count, format_value, plain, ColumnFormat, FormatOptions,
};
use super::table::CanonicalTable;
use super::ResultData;
use crate::db::{ColumnInfo, Row, Value};

/// Inputs every rule sees.
pub struct RuleContext<'a> {
    pub data: &'a ResultData,
    pub sql: &'a str,
    pub question: &'a str,
}

impl RuleContext<'_> {
    fn rows(&self) -> Option<&[Row]> {
        match self.data {
            ResultData::Rows { rows, .. } => Some(rows.as_slice()),
            ResultData::Text(_) => None,
        }
    }

    fn descriptors(&self) -> &[ColumnInfo] {
        match self.data {
            ResultData::Rows { columns, .. } => columns.as_slice(),
            ResultData::Text(_) => &[],
        }
    }

    /// The only value of a one-row, one-column result.
    fn single_value(&self) -> Option<&Value> {
        match self.rows()? {
            [row] if row.len() == 1 => row.first(),
            _ => None,
        }
    }
}

type Predicate = fn(&RuleContext) -> bool;
type Formatter = fn(&RuleContext, &FormatOptions) -> Option<CanonicalTable>;

/// One entry of the rule table.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matches: Predicate,
    pub format: Formatter,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

pub const TEXT_RESULT: &str = "text_result";
pub const NO_DATA: &str = "no_data";
pub const COUNT_STAR: &str = "count_star";
pub const METADATA_SCALAR: &str = "metadata_scalar";
pub const TABLE_LISTING: &str = "table_listing";
pub const TABULAR: &str = "tabular";
pub const FALLBACK: &str = "fallback";

/// The rules in priority order.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: TEXT_RESULT,
            matches: |ctx| matches!(ctx.data, ResultData::Text(_)),
            format: text_result,
        },
        Rule {
            name: NO_DATA,
            matches: |ctx| ctx.rows().is_some_and(|rows| rows.is_empty()),
            format: |_, _| Some(CanonicalTable::single_cell("Result", "No data")),
        },
        Rule {
            name: COUNT_STAR,
            matches: |ctx| count_star_pattern().is_match(ctx.sql) && ctx.single_value().is_some(),
            format: count_star,
        },
        Rule {
            name: METADATA_SCALAR,
            matches: |ctx| {
                metadata_pattern().is_match(ctx.sql)
                    && !ctx.sql.to_uppercase().contains("INFORMATION_SCHEMA")
                    && ctx.single_value().is_some()
            },
            format: metadata_scalar,
        },
        Rule {
            name: TABLE_LISTING,
            matches: |ctx| {
                ctx.rows().is_some()
                    && (show_tables_pattern().is_match(ctx.sql)
                        || ctx.sql.to_uppercase().contains("INFORMATION_SCHEMA.TABLES"))
            },
            format: table_listing,
        },
        Rule {
            name: TABULAR,
            matches: |ctx| ctx.rows().is_some_and(|rows| !rows.is_empty()),
            format: tabular,
        },
        Rule {
            name: FALLBACK,
            matches: |_| true,
            format: |ctx, _| Some(CanonicalTable::single_cell("Result", stringify(ctx.data))),
        },
    ]
}

/// Applies `rules` in order. Falls back to a stringified single cell if no
/// rule produces a table.
pub fn apply_rules(
    rules: &[Rule],
    ctx: &RuleContext,
    options: &FormatOptions,
) -> (CanonicalTable, &'static str) {
    for rule in rules {
        if !(rule.matches)(ctx) {
            continue;
        }
        match (rule.format)(ctx, options) {
            Some(table) => {
                debug!(rule = rule.name, rows = table.row_count(), "Materialized result");
                return (table, rule.name);
            }
            None => debug!(rule = rule.name, "Rule declined, trying next"),
        }
    }
    (
        CanonicalTable::single_cell("Result", stringify(ctx.data)),
        FALLBACK,
    )
}

fn count_star_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)COUNT\s*\(\s*\*\s*\)").expect("valid count regex"))
}

fn metadata_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)CURRENT_(DATABASE|SCHEMA)\s*\(\s*\)").expect("valid metadata regex")
    })
}

fn show_tables_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*SHOW\s+(?:TERSE\s+)?TABLES\b").expect("valid show regex")
    })
}

fn text_result(ctx: &RuleContext, _: &FormatOptions) -> Option<CanonicalTable> {
    match ctx.data {
        ResultData::Text(text) => Some(CanonicalTable::single_cell("Result", text.clone())),
        ResultData::Rows { .. } => None,
    }
}

fn count_star(ctx: &RuleContext, _: &FormatOptions) -> Option<CanonicalTable> {
    let value = ctx.single_value()?;
    let rendered = match value {
        Value::Int(i) => format_count((*i).into()),
        Value::Decimal(d) => format_count(*d),
        other => plain(other),
    };
    Some(CanonicalTable::new(
        vec!["Description".to_string(), "Count".to_string()],
        vec![vec![count_label(ctx.question).to_string(), rendered]],
    ))
}

/// Label for a bare count, from keywords in the question.
fn count_label(question: &str) -> &'static str {
    let question = question.to_lowercase();
    [
        ("table", "Total tables"),
        ("customer", "Total customers"),
        ("order", "Total orders"),
        ("sale", "Total sales"),
    ]
    .iter()
    .find(|(keyword, _)| question.contains(keyword))
    .map(|(_, label)| *label)
    .unwrap_or("Total records")
}

fn metadata_scalar(ctx: &RuleContext, _: &FormatOptions) -> Option<CanonicalTable> {
    let value = ctx.single_value()?;
    let kind = metadata_pattern().captures(ctx.sql)?.get(1)?.as_str().to_uppercase();
    let column = match kind.as_str() {
        "DATABASE" => "Database",
        _ => "Schema",
    };
    Some(CanonicalTable::single_cell(column, plain(value)))
}

fn table_listing(ctx: &RuleContext, _: &FormatOptions) -> Option<CanonicalTable> {
    let rows = ctx.rows()?;
    let cell = |row: &Row, i: usize| row.get(i).map(plain).filter(|s| !s.is_empty());

    if show_tables_pattern().is_match(ctx.sql) {
        // created_on, name, database_name, schema_name, kind, comment, ...
        let rows = rows
            .iter()
            .map(|row| {
                vec![
                    cell(row, 1).unwrap_or_default(),
                    cell(row, 4).unwrap_or_else(|| "TABLE".to_string()),
                    cell(row, 5).unwrap_or_else(|| "No description".to_string()),
                ]
            })
            .collect();
        return Some(CanonicalTable::new(
            vec!["Name".into(), "Type".into(), "Description".into()],
            rows,
        ));
    }

    let with_description = rows.iter().any(|row| row.len() > 2);
    let mut columns = vec!["Name".to_string(), "Type".to_string()];
    if with_description {
        columns.push("Description".to_string());
    }

    let rows = rows
        .iter()
        .map(|row| {
            let mut out = vec![
                cell(row, 0).unwrap_or_default(),
                cell(row, 1).unwrap_or_else(|| "TABLE".to_string()),
            ];
            if with_description {
                out.push(cell(row, 2).unwrap_or_default());
            }
            out
        })
        .collect();
    Some(CanonicalTable::new(columns, rows))
}

fn tabular(ctx: &RuleContext, options: &FormatOptions) -> Option<CanonicalTable> {
    let rows = ctx.rows()?;
    let arity = rows.iter().map(Vec::len).max().unwrap_or(0);
    if arity == 0 {
        return None;
    }

    let names = column_names(ctx.sql, ctx.descriptors(), arity);
    let counted = count_columns(ctx.sql, arity);
    let empty = Value::Null;
    let formats: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if counted[i] {
                ColumnFormat::Count
            } else {
                column_format(name, rows.iter().map(|row| row.get(i).unwrap_or(&empty)))
            }
        })
        .collect();

    let cells = rows
        .iter()
        .map(|row| {
            (0..arity)
                .map(|i| format_value(row.get(i).unwrap_or(&empty), formats[i], options))
                .collect()
        })
        .collect();

    Some(CanonicalTable::new(names, cells))
}

/// Which positions hold a `COUNT(...)` expression, whatever their alias.
fn count_columns(sql: &str, arity: usize) -> Vec<bool> {
    select_items(sql)
        .filter(|items| items.len() == arity)
        .map(|items| items.iter().map(|item| is_count_expression(item)).collect())
        .unwrap_or_else(|| vec![false; arity])
}

/// Labels in precedence order: names inferred from the SQL, then the
/// executor's descriptors, then positional names. A source is used only when
/// it has exactly one name per value.
pub fn column_names(sql: &str, descriptors: &[ColumnInfo], arity: usize) -> Vec<String> {
    if let Some(names) = infer_column_names(sql).filter(|names| names.len() == arity) {
        return names;
    }

    let described: Vec<String> = descriptors
        .iter()
        .map(|c| humanize(&c.name))
        .filter(|name| !name.is_empty())
        .collect();
    if described.len() == arity && descriptors.len() == arity {
        return described;
    }

    (1..=arity).map(|i| format!("Column {}", i)).collect()
}

fn stringify(data: &ResultData) -> String {
    match data {
        ResultData::Text(text) => text.clone(),
        ResultData::Rows { rows, .. } => {
            let rows: Vec<String> = rows
                .iter()
                .map(|row| {
                    let cells: Vec<String> = row.iter().map(Value::to_display_string).collect();
                    format!("({})", cells.join(", "))
                })
                .collect();
            format!("[{}]", rows.join(", "))
        }
    }
}
