//! Column labels derived from the SELECT list.

use regex::Regex;
use std::sync::OnceLock;

/// Derives human-readable column labels from a statement's select list.
///
/// Returns `None` for `*` selections or when no select list can be found.
/// Callers must still check the length against the row arity.
pub fn infer_column_names(sql: &str) -> Option<Vec<String>> {
    let items = select_items(sql)?;
    if items.iter().any(|item| is_star(item)) {
        return None;
    }

    Some(
        items
            .iter()
            .enumerate()
            .map(|(i, item)| label_for_item(item, i))
            .collect(),
    )
}

/// The outer select list split into its items as written, aliases included.
pub fn select_items(sql: &str) -> Option<Vec<&str>> {
    let select_list = strip_distinct(select_list(sql)?.trim());
    if select_list.is_empty() {
        return None;
    }
    Some(split_top_level_commas(select_list).into_iter().map(str::trim).collect())
}

/// Whether a select item is a `COUNT(...)` call, aliased or not.
pub fn is_count_expression(item: &str) -> bool {
    let item = item.trim_start();
    match (item.get(..5), item.get(5..)) {
        (Some(head), Some(rest)) => {
            head.eq_ignore_ascii_case("COUNT") && rest.trim_start().starts_with('(')
        }
        _ => false,
    }
}

/// Converts `snake_case` or `UPPER_CASE` identifiers to "Title Case".
pub fn humanize(identifier: &str) -> String {
    identifier
        .trim_matches('"')
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn label_for_item(item: &str, index: usize) -> String {
    if let Some(alias) = explicit_alias(item) {
        return alias;
    }
    if is_column_ref(item) {
        let last = item.rsplit('.').next().unwrap_or(item);
        return humanize(last);
    }
    if let Some(name) = function_name(item) {
        return function_label(&name);
    }
    if let Some(alias) = implicit_alias(item) {
        return alias;
    }
    format!("Column {}", index + 1)
}

/// `expr AS alias` or `expr AS "Quoted Alias"`.
fn explicit_alias(item: &str) -> Option<String> {
    static ALIAS: OnceLock<Regex> = OnceLock::new();
    let re = ALIAS.get_or_init(|| {
        Regex::new(r#"(?is)\s+AS\s+(?:"([^"]+)"|([A-Za-z_][A-Za-z0-9_$]*))\s*$"#)
            .expect("valid alias regex")
    });
    let caps = re.captures(item)?;
    if let Some(quoted) = caps.get(1) {
        return Some(quoted.as_str().to_string());
    }
    caps.get(2).map(|m| humanize(m.as_str()))
}

/// `COUNT(*) total` or `p.price cost`.
fn implicit_alias(item: &str) -> Option<String> {
    static ALIAS: OnceLock<Regex> = OnceLock::new();
    let re = ALIAS.get_or_init(|| {
        Regex::new(r"(?s)^(.*[\w)\]])\s+([A-Za-z_][A-Za-z0-9_]*)$").expect("valid alias regex")
    });
    let caps = re.captures(item)?;
    let expr = caps.get(1)?.as_str().trim();
    let alias = caps.get(2)?.as_str();

    const NOT_ALIASES: &[&str] = &["END", "NULL", "TRUE", "FALSE", "DESC", "ASC"];
    if NOT_ALIASES.iter().any(|k| k.eq_ignore_ascii_case(alias)) {
        return None;
    }
    if is_column_ref(expr) || function_name(expr).is_some() {
        Some(humanize(alias))
    } else {
        None
    }
}

fn is_column_ref(item: &str) -> bool {
    static COLUMN: OnceLock<Regex> = OnceLock::new();
    COLUMN
        .get_or_init(|| {
            let part = r#"(?:"[^"]+"|[A-Za-z_][A-Za-z0-9_$]*)"#;
            Regex::new(&format!(r"^{part}(?:\.{part})*$")).expect("valid column regex")
        })
        .is_match(item)
}

/// Name of a call expression spanning the whole item, e.g. `AVG(price)`.
fn function_name(item: &str) -> Option<String> {
    static CALL: OnceLock<Regex> = OnceLock::new();
    let re = CALL.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*\(")
            .expect("valid call regex")
    });
    let caps = re.captures(item)?;
    let open = caps.get(0)?.end() - 1;
    if closing_paren(item, open)? != item.len() - 1 {
        return None;
    }
    caps.get(1).map(|m| m.as_str().to_string())
}

fn function_label(name: &str) -> String {
    let bare = name.rsplit('.').next().unwrap_or(name);
    match bare.to_uppercase().as_str() {
        "COUNT" => "Count".to_string(),
        "AVG" => "Average".to_string(),
        "SUM" => "Total".to_string(),
        "MAX" => "Maximum".to_string(),
        "MIN" => "Minimum".to_string(),
        "CURRENT_DATABASE" => "Database".to_string(),
        "CURRENT_SCHEMA" => "Schema".to_string(),
        _ => humanize(bare),
    }
}

/// Text between the outermost SELECT and its FROM (or the end).
fn select_list(sql: &str) -> Option<&str> {
    let sql = sql.trim().trim_end_matches(';');
    let select = find_top_level_keyword(sql, "SELECT", 0)?;
    let start = select + "SELECT".len();
    let end = find_top_level_keyword(sql, "FROM", start).unwrap_or(sql.len());
    Some(&sql[start..end])
}

fn strip_distinct(list: &str) -> &str {
    for keyword in ["DISTINCT", "ALL"] {
        let (Some(head), Some(rest)) = (list.get(..keyword.len()), list.get(keyword.len()..))
        else {
            continue;
        };
        if head.eq_ignore_ascii_case(keyword) && rest.starts_with(char::is_whitespace) {
            return rest.trim_start();
        }
    }
    list
}

fn is_star(item: &str) -> bool {
    let item = item.trim();
    item == "*" || item.ends_with(".*")
}

/// Byte offset of `keyword` outside parentheses and quotes, word-bounded.
fn find_top_level_keyword(sql: &str, keyword: &str, from: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 && word_at(bytes, i, keyword) => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn word_at(bytes: &[u8], i: usize, keyword: &str) -> bool {
    let end = i + keyword.len();
    if end > bytes.len() || !bytes[i..end].eq_ignore_ascii_case(keyword.as_bytes()) {
        return false;
    }
    let boundary = |b: u8| !(b.is_ascii_alphanumeric() || b == b'_');
    (i == 0 || boundary(bytes[i - 1])) && (end == bytes.len() || boundary(bytes[end]))
}

fn split_top_level_commas(list: &str) -> Vec<&str> {
    let bytes = list.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

fn closing_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    for (i, &b) in text.as_bytes().iter().enumerate().skip(open) {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
