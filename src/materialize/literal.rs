//! Parsing of stringified result rows.
//!
//! Some upstream producers hand back the textual form of their rows, e.g.
//! `[(1, Decimal('500000.00')), (2, None)]`. This module turns such text back
//! into typed rows. It is a restricted literal reader: numbers, strings,
//! booleans and nested sequences only. Nothing is ever evaluated.

use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use crate::db::{Row, Value};

/// Stands in for `None` between normalization and parsing.
const NULL_PLACEHOLDER: &str = "__NULL__";

/// Returns true if `text` looks like a stringified sequence of rows: the
/// whole trimmed text is one bracketed or parenthesized sequence.
pub fn looks_like_rows(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('(') && trimmed.ends_with(')'))
}

/// Parses stringified rows.
///
/// Returns `None` if the text is empty or neither the literal reader nor the
/// tuple scanner can make sense of it. Rows of uneven length are padded
/// with nulls to the widest row.
pub fn parse_stringified_rows(text: &str) -> Option<Vec<Row>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = normalize(trimmed);

    let rows = match LiteralParser::new(&normalized).parse_document() {
        Some(literal) => rows_from_literal(literal)?,
        None => {
            debug!("Literal reader failed, falling back to tuple scan");
            scan_tuples(&normalized)?
        }
    };

    Some(pad_rows(rows))
}

/// Rewrites constructs the literal reader does not accept.
///
/// `Decimal('x')` becomes `x`, `None` becomes a quoted placeholder, and
/// `datetime.date(...)` / `datetime.datetime(...)` become quoted ISO strings.
/// Text inside string literals is left alone.
fn normalize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' || c == '"' {
            let end = string_end(&chars, i);
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }

        let at_word_start = i == 0 || !is_ident_char(chars[i - 1]);
        if at_word_start {
            if let Some((replacement, next)) = rewrite_construct(&chars, i) {
                out.push_str(&replacement);
                i = next;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }

    out
}

fn rewrite_construct(chars: &[char], start: usize) -> Option<(String, usize)> {
    if matches_word(chars, start, "None") {
        return Some((format!("'{}'", NULL_PLACEHOLDER), start + 4));
    }

    for (name, kind) in [
        ("Decimal", Construct::Decimal),
        ("datetime.datetime", Construct::DateTime),
        ("datetime.date", Construct::Date),
    ] {
        let open = start + name.len();
        if !matches_prefix(chars, start, name) || chars.get(open) != Some(&'(') {
            continue;
        }
        let close = matching_paren(chars, open)?;
        let inner: String = chars[open + 1..close].iter().collect();
        let replacement = match kind {
            Construct::Decimal => decimal_argument(&inner)?,
            Construct::Date => format!("'{}'", date_from_args(&inner, false)?),
            Construct::DateTime => format!("'{}'", date_from_args(&inner, true)?),
        };
        return Some((replacement, close + 1));
    }

    None
}

#[derive(Clone, Copy)]
enum Construct {
    Decimal,
    Date,
    DateTime,
}

fn decimal_argument(inner: &str) -> Option<String> {
    let arg = inner.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if arg.is_empty() {
        None
    } else {
        Some(arg.to_string())
    }
}

/// Renders positional integer arguments as `YYYY-MM-DD[ HH:MM:SS]`.
/// Keyword arguments such as `tzinfo=...` are ignored.
fn date_from_args(inner: &str, with_time: bool) -> Option<String> {
    let parts: Vec<u32> = split_top_level(inner, ',')
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty() && !p.contains('='))
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    let part = |i: usize| parts.get(i).copied().unwrap_or(0);
    if parts.len() < 3 {
        return None;
    }

    let date = format!("{:04}-{:02}-{:02}", part(0), part(1), part(2));
    if with_time {
        Some(format!(
            "{} {:02}:{:02}:{:02}",
            date,
            part(3),
            part(4),
            part(5)
        ))
    } else {
        Some(date)
    }
}

/// A parsed literal.
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Scalar(Value),
    Tuple(Vec<Literal>),
    List(Vec<Literal>),
}

/// Recursive-descent reader for Python/JSON-style literals.
struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn parse_document(mut self) -> Option<Literal> {
        let literal = self.parse_value()?;
        self.skip_whitespace();
        if self.pos == self.chars.len() {
            Some(literal)
        } else {
            None
        }
    }

    fn parse_value(&mut self) -> Option<Literal> {
        self.skip_whitespace();
        match self.peek()? {
            '(' => self.parse_sequence(')').map(Literal::Tuple),
            '[' => self.parse_sequence(']').map(Literal::List),
            '\'' | '"' => self.parse_string().map(|s| {
                if s == NULL_PLACEHOLDER {
                    Literal::Scalar(Value::Null)
                } else {
                    Literal::Scalar(Value::String(s))
                }
            }),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            c if c.is_ascii_alphabetic() => self.parse_keyword(),
            _ => None,
        }
    }

    fn parse_sequence(&mut self, close: char) -> Option<Vec<Literal>> {
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek()? == close {
                self.pos += 1;
                return Some(items);
            }

            items.push(self.parse_value()?);
            self.skip_whitespace();

            match self.peek()? {
                ',' => self.pos += 1,
                c if c == close => {
                    self.pos += 1;
                    return Some(items);
                }
                _ => return None,
            }
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.peek()?;
        self.pos += 1;
        let mut out = String::new();

        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    let escaped = self.peek()?;
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }

        None
    }

    fn parse_number(&mut self) -> Option<Literal> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        parse_number_token(&token).map(Literal::Scalar)
    }

    fn parse_keyword(&mut self) -> Option<Literal> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let value = match word.as_str() {
            "True" | "true" => Value::Bool(true),
            "False" | "false" => Value::Bool(false),
            "null" => Value::Null,
            _ => return None,
        };
        Some(Literal::Scalar(value))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }
}

/// Integers become `Int`, plain decimals become exact `Decimal`, and
/// exponent forms become `Float`.
fn parse_number_token(token: &str) -> Option<Value> {
    let token = token.replace('_', "");
    if let Ok(i) = token.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if !token.contains(|c| c == 'e' || c == 'E') {
        if let Ok(d) = Decimal::from_str(&token) {
            return Some(Value::Decimal(d));
        }
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

/// Shapes a parsed literal into rows.
///
/// A sequence of sequences is a list of rows and a flat tuple is a single
/// row. In a list, each scalar element becomes a one-value row.
fn rows_from_literal(literal: Literal) -> Option<Vec<Row>> {
    let items = match literal {
        Literal::Scalar(_) => return None,
        Literal::Tuple(items) if items.iter().all(|i| matches!(i, Literal::Scalar(_))) => {
            return Some(vec![items.into_iter().map(flatten_cell).collect()]);
        }
        Literal::Tuple(items) | Literal::List(items) => items,
    };

    Some(
        items
            .into_iter()
            .map(|item| match item {
                Literal::Tuple(cells) | Literal::List(cells) => {
                    cells.into_iter().map(flatten_cell).collect()
                }
                scalar => vec![flatten_cell(scalar)],
            })
            .collect(),
    )
}

/// Nested sequences inside a cell are rendered back to text.
fn flatten_cell(literal: Literal) -> Value {
    match literal {
        Literal::Scalar(value) => value,
        sequence => Value::String(render_literal(&sequence)),
    }
}

fn render_literal(literal: &Literal) -> String {
    let join = |items: &[Literal]| {
        items
            .iter()
            .map(render_literal)
            .collect::<Vec<_>>()
            .join(", ")
    };
    match literal {
        Literal::Scalar(Value::String(s)) => format!("'{}'", s),
        Literal::Scalar(value) => value.to_display_string(),
        Literal::Tuple(items) => format!("({})", join(items)),
        Literal::List(items) => format!("[{}]", join(items)),
    }
}

/// Fallback: walks the text tracking paren depth and splits each top-level
/// tuple on its depth-1 commas.
fn scan_tuples(text: &str) -> Option<Vec<Row>> {
    let mut rows = Vec::new();
    let mut depth = 0usize;
    let mut field = String::new();
    let mut fields: Vec<String> = Vec::new();
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            if depth >= 1 {
                field.push(c);
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                if depth >= 1 {
                    field.push(c);
                }
            }
            '(' => {
                depth += 1;
                if depth > 1 {
                    field.push(c);
                }
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    fields.push(std::mem::take(&mut field));
                    rows.push(fields.drain(..).map(|f| coerce_field(&f)).collect());
                } else {
                    field.push(c);
                }
            }
            ',' if depth == 1 => fields.push(std::mem::take(&mut field)),
            _ if depth >= 1 => field.push(c),
            // Between tuples only list brackets and separators may appear.
            '[' | ']' | ',' => {}
            c if c.is_whitespace() => {}
            _ => return None,
        }
    }

    if depth != 0 || quote.is_some() || rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

fn coerce_field(field: &str) -> Value {
    let trimmed = field.trim().trim_matches(|c| c == '\'' || c == '"').trim();

    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed == "None"
        || trimmed == NULL_PLACEHOLDER
    {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    let numeric_shape = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && trimmed.chars().any(|c| c.is_ascii_digit());
    if numeric_shape {
        if let Some(value) = parse_number_token(trimmed) {
            return value;
        }
    }

    Value::String(trimmed.to_string())
}

fn pad_rows(mut rows: Vec<Row>) -> Vec<Row> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, Value::Null);
    }
    rows
}

fn string_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\'' | '"' => {
                i = string_end(chars, i);
                continue;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn matches_prefix(chars: &[char], start: usize, word: &str) -> bool {
    let mut i = start;
    for w in word.chars() {
        if chars.get(i) != Some(&w) {
            return false;
        }
        i += 1;
    }
    true
}

fn matches_word(chars: &[char], start: usize, word: &str) -> bool {
    let end = start + word.chars().count();
    matches_prefix(chars, start, word) && !chars.get(end).copied().is_some_and(is_ident_char)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Value {
        Value::Decimal(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_parse_decimal_rows() {
        let rows =
            parse_stringified_rows("[(1, Decimal('500000.00')), (2, Decimal('750000.00'))]")
                .unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), dec("500000.00")],
                vec![Value::Int(2), dec("750000.00")],
            ]
        );
    }

    #[test]
    fn test_parse_none_as_null() {
        let rows = parse_stringified_rows("[('Austin', None), ('None of these', 3)]").unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::from("Austin"), Value::Null],
                vec![Value::from("None of these"), Value::Int(3)],
            ]
        );
    }

    #[test]
    fn test_parse_dates() {
        let rows = parse_stringified_rows(
            "[(7, datetime.date(2024, 3, 9), datetime.datetime(2024, 3, 9, 14, 5))]",
        )
        .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::Int(7),
                Value::from("2024-03-09"),
                Value::from("2024-03-09 14:05:00"),
            ]]
        );
    }

    #[test]
    fn test_parse_single_count() {
        assert_eq!(
            parse_stringified_rows("[(42,)]").unwrap(),
            vec![vec![Value::Int(42)]]
        );
    }

    #[test]
    fn test_parse_single_tuple_is_one_row() {
        assert_eq!(
            parse_stringified_rows("('REAL_ESTATE_DB', 'PUBLIC')").unwrap(),
            vec![vec![Value::from("REAL_ESTATE_DB"), Value::from("PUBLIC")]]
        );
    }

    #[test]
    fn test_parse_json_style_rows() {
        assert_eq!(
            parse_stringified_rows(r#"[[1, "a", true], [2, "b", null]]"#).unwrap(),
            vec![
                vec![Value::Int(1), Value::from("a"), Value::Bool(true)],
                vec![Value::Int(2), Value::from("b"), Value::Null],
            ]
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert_eq!(parse_stringified_rows("[]").unwrap(), Vec::<Row>::new());
    }

    #[test]
    fn test_empty_text_is_not_rows() {
        assert_eq!(parse_stringified_rows(""), None);
        assert_eq!(parse_stringified_rows("   "), None);
    }

    #[test]
    fn test_uneven_rows_are_padded() {
        let rows = parse_stringified_rows("[(1, 2, 3), (4,)]").unwrap();
        assert_eq!(rows[1], vec![Value::Int(4), Value::Null, Value::Null]);
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        let rows = parse_stringified_rows(r"[('O\'Brien', 1)]").unwrap();
        assert_eq!(rows, vec![vec![Value::from("O'Brien"), Value::Int(1)]]);
    }

    #[test]
    fn test_fallback_scanner_handles_unknown_constructors() {
        let rows =
            parse_stringified_rows("[(1, UUID('ab-12'), 'x'), (2, UUID('cd-34'), null)]").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::Int(1));
        assert_eq!(rows[0][2], Value::from("x"));
        assert_eq!(rows[1][2], Value::Null);
    }

    #[test]
    fn test_fallback_scanner_coerces_fields() {
        let rows = scan_tuples("(1, 2.50, 'text', true, null)").unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::Int(1),
                dec("2.50"),
                Value::from("text"),
                Value::Bool(true),
                Value::Null,
            ]]
        );
    }

    #[test]
    fn test_unparseable_text() {
        assert_eq!(parse_stringified_rows("[this is not data"), None);
    }

    #[test]
    fn test_no_code_is_evaluated() {
        let rows = parse_stringified_rows("[(__import__('os').system('ls'),)]");
        // Only the scanner can read it, and it yields inert text.
        let rows = rows.unwrap();
        assert!(matches!(rows[0][0], Value::String(_)));
    }

    #[test]
    fn test_looks_like_rows() {
        assert!(looks_like_rows(" [(1,)]"));
        assert!(looks_like_rows("(1, 2)"));
        assert!(!looks_like_rows("The answer is 42"));
        assert!(!looks_like_rows("(approx) 42 properties match"));
        assert!(!looks_like_rows("[(1, 'open"));
    }

    #[test]
    fn test_scanner_rejects_text_outside_tuples() {
        assert_eq!(scan_tuples("(approx) 42 properties match"), None);
        assert_eq!(scan_tuples("[(1, 'a'), oops]"), None);
        assert_eq!(scan_tuples("[(1, 'a'"), None);
        assert_eq!(
            scan_tuples("[(1, 'a'),\n (2, 'b')]").map(|rows| rows.len()),
            Some(2)
        );
    }
}
