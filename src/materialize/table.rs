//! The display table handed to renderers.

use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Ordered, uniquely named columns and rows of display-ready cells.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CanonicalTable {
    /// Builds a table, making column names unique and fitting every row to
    /// the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let columns = dedupe(columns);
        let width = columns.len();

        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() != width {
                    warn!(expected = width, got = row.len(), "Fitting row to column count");
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    /// A one-column, one-row table.
    pub fn single_cell(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(vec![column.into()], vec![vec![value.into()]])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Aligned plain-text rendering followed by a row count caption.
    pub fn render_text(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let pad = |text: &str, width: usize| {
            let fill = width.saturating_sub(text.chars().count());
            format!("{}{}", text, " ".repeat(fill))
        };

        let mut output = String::new();

        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, h)| pad(h, widths[i]))
            .collect();
        output.push_str(header.join(" │ ").trim_end());
        output.push('\n');

        let separator: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        output.push_str(&separator.join("─┼─"));
        output.push('\n');

        for row in &self.rows {
            let line: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| pad(cell, widths[i]))
                .collect();
            output.push_str(line.join(" │ ").trim_end());
            output.push('\n');
        }

        output.push_str(&row_caption(self.rows.len()));
        output
    }

    /// JSON object with `columns` and `rows`.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {}\"}}", e))
    }
}

fn row_caption(count: usize) -> String {
    if count == 1 {
        "1 row".to_string()
    } else {
        format!("{} rows", count)
    }
}

/// Repeated names get a numeric suffix: "Name", "Name 2", "Name 3".
fn dedupe(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(columns.len());

    for name in columns {
        let mut candidate = name.clone();
        let mut n = seen.get(&name).copied().unwrap_or(0);
        while out.contains(&candidate) {
            n += 1;
            candidate = format!("{} {}", name, n + 1);
        }
        seen.insert(name, n);
        out.push(candidate);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rows_are_fitted_to_columns() {
        let table = CanonicalTable::new(
            strings(&["A", "B"]),
            vec![strings(&["1"]), strings(&["1", "2", "3"])],
        );
        assert_eq!(table.rows()[0], strings(&["1", ""]));
        assert_eq!(table.rows()[1], strings(&["1", "2"]));
    }

    #[test]
    fn test_duplicate_columns_are_renamed() {
        let table = CanonicalTable::new(strings(&["Name", "Name", "Name 2", "Id"]), vec![]);
        assert_eq!(table.columns(), strings(&["Name", "Name 2", "Name 2 2", "Id"]).as_slice());
    }

    #[test]
    fn test_single_cell() {
        let table = CanonicalTable::single_cell("Result", "No data");
        assert_eq!(table.columns(), ["Result".to_string()].as_slice());
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_render_text() {
        let table = CanonicalTable::new(
            strings(&["City", "Price"]),
            vec![
                strings(&["Austin", "$750,000.00"]),
                strings(&["Denver", "$1,250,000.00"]),
            ],
        );
        let expected = "\
City   │ Price
───────┼──────────────
Austin │ $750,000.00
Denver │ $1,250,000.00
2 rows";
        assert_eq!(table.render_text(), expected);
    }

    #[test]
    fn test_render_single_row_caption() {
        let table = CanonicalTable::single_cell("Result", "ok");
        assert!(table.render_text().ends_with("\n1 row"));
    }

    #[test]
    fn test_to_json() {
        let table = CanonicalTable::single_cell("Count", "42");
        let json: serde_json::Value = serde_json::from_str(&table.to_json()).unwrap();
        assert_eq!(json["columns"][0], "Count");
        assert_eq!(json["rows"][0][0], "42");
    }
}
