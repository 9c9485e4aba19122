//! Display formatting for result cells.
//!
//! Formatting happens only when the display table is built. The typed
//! values themselves are never modified.

use rust_decimal::prelude::*;

use crate::db::Value;

/// Fractional values at or above this magnitude read as money.
const MONEY_MAGNITUDE: i64 = 1000;

const MONEY_WORDS: &[&str] = &[
    "price", "amount", "value", "income", "cost", "worth", "revenue", "salary",
];
const RATIO_WORDS: &[&str] = &["percent", "rate", "ratio", "pct"];
const COUNT_WORDS: &[&str] = &["count", "number", "num", "quantity", "population", "resident"];
const PLAIN_WORDS: &[&str] = &[
    "id", "year", "zip", "zipcode", "postal", "code", "phone", "area", "sqft", "size",
];

/// How values of a column are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    /// Currency symbol, thousands separators, two decimals.
    Money,
    /// Thousands separators, no decimals.
    Count,
    Plain,
}

/// Display options shared by all rules.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub currency_symbol: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
        }
    }
}

/// Chooses a format from the column label and its values.
///
/// Name hints win over magnitude: identifiers, years and ratios stay plain
/// whatever their size.
pub fn column_format<'a>(name: &str, values: impl IntoIterator<Item = &'a Value>) -> ColumnFormat {
    let lower = name.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let has_word = |list: &[&str]| words.iter().any(|w| list.contains(w));
    let has_fragment = |list: &[&str]| list.iter().any(|f| lower.contains(f));

    if has_word(PLAIN_WORDS) || has_fragment(RATIO_WORDS) {
        return ColumnFormat::Plain;
    }
    if has_fragment(MONEY_WORDS) {
        return ColumnFormat::Money;
    }
    if has_fragment(COUNT_WORDS) {
        return ColumnFormat::Count;
    }

    let large_fraction = values.into_iter().any(|v| {
        v.is_fractional_type()
            && v.as_f64()
                .is_some_and(|f| f.abs() >= MONEY_MAGNITUDE as f64)
    });
    if large_fraction {
        ColumnFormat::Money
    } else {
        ColumnFormat::Plain
    }
}

/// Renders one cell. Non-numeric values ignore the column format.
pub fn format_value(value: &Value, format: ColumnFormat, options: &FormatOptions) -> String {
    match (format, numeric(value)) {
        (ColumnFormat::Money, Some(d)) => format_money(d, &options.currency_symbol),
        (ColumnFormat::Count, Some(d)) => format_count(d),
        _ => plain(value),
    }
}

/// Plain rendering; nulls become empty cells.
pub fn plain(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_display_string(),
    }
}

/// `$1,234.50`, or `-$1,234.50` for negatives.
pub fn format_money(amount: Decimal, symbol: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, "00"));
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{}{}.{}", sign, symbol, group_thousands(int_part), frac_part)
}

/// `1,234` with no decimals.
pub fn format_count(count: Decimal) -> String {
    let rounded = count.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let text = rounded.abs().trunc().to_string();
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{}", sign, group_thousands(&text))
}

fn numeric(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Decimal(d) => Some(*d),
        Value::Float(f) => Decimal::from_f64(*f),
        _ => None,
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
