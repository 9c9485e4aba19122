//! Rewrites identifiers in SQL text between the real and obfuscated schemas.
//!
//! Translation is lexical: tables are replaced first, then qualified and bare
//! column names in a single pass so a replacement is never rewritten again.
//! When a bare column name is ambiguous, columns of tables mentioned in the
//! statement win, then longer qualified names.
//!
//! Real identifiers are emitted uppercase (the warehouse's canonical case);
//! obfuscated identifiers are emitted lowercase.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use super::mapping::{ColumnPair, IdentifierMapping};

/// Default compiled-size budget for the translation patterns.
const DEFAULT_REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Translation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Obfuscated vocabulary to real schema.
    ToReal,
    /// Real schema to obfuscated vocabulary.
    ToObfuscated,
}

/// Output of a translation.
///
/// When `succeeded` is false, `text` is the input unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    pub text: String,
    pub succeeded: bool,
}

/// Real identifiers found where only obfuscated ones were expected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub violations: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Translates SQL between the real and obfuscated vocabularies of a mapping.
#[derive(Debug, Clone)]
pub struct IdentifierTranslator {
    mapping: Arc<IdentifierMapping>,
    regex_size_limit: usize,
}

impl IdentifierTranslator {
    pub fn new(mapping: Arc<IdentifierMapping>) -> Self {
        Self {
            mapping,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }

    /// Translator over the built-in real-estate mapping.
    pub fn real_estate() -> Self {
        Self::new(IdentifierMapping::real_estate())
    }

    /// Caps the compiled size of each translation pattern. A pattern that
    /// exceeds the cap makes translation fail open.
    pub fn with_regex_size_limit(mut self, limit: usize) -> Self {
        self.regex_size_limit = limit;
        self
    }

    pub fn mapping(&self) -> &IdentifierMapping {
        &self.mapping
    }

    /// Rewrites obfuscated identifiers to real, uppercase identifiers.
    pub fn to_real(&self, sql: &str) -> Translated {
        self.translate(sql, Direction::ToReal)
    }

    /// Rewrites real identifiers to obfuscated, lowercase identifiers.
    pub fn to_obfuscated(&self, sql: &str) -> Translated {
        self.translate(sql, Direction::ToObfuscated)
    }

    pub fn translate(&self, sql: &str, direction: Direction) -> Translated {
        if sql.trim().is_empty() {
            return Translated {
                text: sql.to_string(),
                succeeded: true,
            };
        }

        match self.rewrite(sql, direction) {
            Ok(text) => {
                debug!(?direction, before = %sql, after = %text, "Translated identifiers");
                Translated {
                    text,
                    succeeded: true,
                }
            }
            Err(e) => {
                warn!(
                    ?direction,
                    error = %e,
                    "Identifier translation failed, keeping original SQL"
                );
                Translated {
                    text: sql.to_string(),
                    succeeded: false,
                }
            }
        }
    }

    /// Reports every real table name and distinctive real column name that
    /// appears as a whole word in `sql`.
    pub fn validate(&self, sql: &str) -> ValidationReport {
        let mut violations = Vec::new();

        for table in self.mapping.tables() {
            if self.contains_word(sql, &table.real) {
                violations.push(format!("Real table name found: {}", table.real));
            }
        }
        for column in self.mapping.distinctive_columns() {
            if self.contains_word(sql, column) {
                violations.push(format!("Real column name found: {column}"));
            }
        }

        ValidationReport { violations }
    }

    fn contains_word(&self, sql: &str, word: &str) -> bool {
        // A word this short always compiles; failing closed here would hide leaks.
        match self.word_pattern(&[word.to_string()]) {
            Ok(re) => re.is_match(sql),
            Err(_) => sql.to_lowercase().contains(word),
        }
    }

    fn rewrite(&self, sql: &str, direction: Direction) -> Result<String, regex::Error> {
        let in_scope = self.tables_in_scope(sql, direction)?;
        let with_tables = self.replace_tables(sql, direction)?;
        self.replace_columns(&with_tables, direction, &in_scope)
    }

    /// Source-side table names mentioned in the statement.
    fn tables_in_scope(
        &self,
        sql: &str,
        direction: Direction,
    ) -> Result<HashSet<String>, regex::Error> {
        let names: Vec<String> = self
            .mapping
            .tables()
            .iter()
            .map(|t| source_of(direction, &t.real, &t.obfuscated).to_string())
            .collect();
        let re = self.word_pattern(&names)?;
        Ok(re
            .find_iter(sql)
            .map(|m| m.as_str().to_lowercase())
            .collect())
    }

    fn replace_tables(&self, sql: &str, direction: Direction) -> Result<String, regex::Error> {
        let lookup: HashMap<String, String> = self
            .mapping
            .tables()
            .iter()
            .map(|t| {
                let (from, to) = endpoints(direction, &t.real, &t.obfuscated);
                (from.to_string(), emit(direction, to))
            })
            .collect();

        let mut names: Vec<String> = lookup.keys().cloned().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let re = self.word_pattern(&names)?;

        Ok(re
            .replace_all(sql, |caps: &regex::Captures| {
                let found = &caps[0];
                lookup
                    .get(&found.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| found.to_string())
            })
            .into_owned())
    }

    fn replace_columns(
        &self,
        sql: &str,
        direction: Direction,
        in_scope: &HashSet<String>,
    ) -> Result<String, regex::Error> {
        let columns = self.mapping.columns();
        if columns.is_empty() {
            return Ok(sql.to_string());
        }

        // Qualified forms: the table part may still be in source form (it is
        // not after the table pass, but the lookup is harmless) or already in
        // target form.
        let mut qualified: HashMap<String, String> = HashMap::new();
        for column in columns {
            let (src_table, dst_table, src_col, dst_col) = column_endpoints(direction, column);
            let target = format!("{}.{}", emit(direction, dst_table), emit(direction, dst_col));
            qualified.insert(format!("{src_table}.{src_col}"), target.clone());
            qualified.insert(format!("{dst_table}.{src_col}"), target);
        }

        let mut ordered: Vec<(usize, &ColumnPair)> = columns.iter().enumerate().collect();
        ordered.sort_by(|(ia, a), (ib, b)| {
            let (a_table, _, a_col, _) = column_endpoints(direction, a);
            let (b_table, _, b_col, _) = column_endpoints(direction, b);
            let a_scoped = in_scope.contains(a_table);
            let b_scoped = in_scope.contains(b_table);
            b_scoped
                .cmp(&a_scoped)
                .then_with(|| (b_table.len() + b_col.len()).cmp(&(a_table.len() + a_col.len())))
                .then_with(|| ia.cmp(ib))
        });

        let mut bare: HashMap<String, String> = HashMap::new();
        for (_, column) in ordered {
            let (_, _, src_col, dst_col) = column_endpoints(direction, column);
            bare.entry(src_col.to_string())
                .or_insert_with(|| emit(direction, dst_col));
        }

        let mut alternatives: Vec<String> = qualified.keys().cloned().collect();
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let mut bare_names: Vec<String> = bare.keys().cloned().collect();
        bare_names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        alternatives.extend(bare_names);

        let re = self.word_pattern(&alternatives)?;

        Ok(re
            .replace_all(sql, |caps: &regex::Captures| {
                let found = &caps[0];
                let key = found.to_lowercase();
                qualified
                    .get(&key)
                    .or_else(|| bare.get(&key))
                    .cloned()
                    .unwrap_or_else(|| found.to_string())
            })
            .into_owned())
    }

    /// Case-insensitive, word-bounded alternation of literal names.
    fn word_pattern(&self, names: &[String]) -> Result<Regex, regex::Error> {
        let body = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        RegexBuilder::new(&format!(r"\b(?:{body})\b"))
            .case_insensitive(true)
            .size_limit(self.regex_size_limit)
            .build()
    }
}

fn source_of<'a>(direction: Direction, real: &'a str, obfuscated: &'a str) -> &'a str {
    endpoints(direction, real, obfuscated).0
}

/// Returns `(from, to)` for the direction.
fn endpoints<'a>(direction: Direction, real: &'a str, obfuscated: &'a str) -> (&'a str, &'a str) {
    match direction {
        Direction::ToReal => (obfuscated, real),
        Direction::ToObfuscated => (real, obfuscated),
    }
}

/// Returns `(src_table, dst_table, src_column, dst_column)`.
fn column_endpoints(direction: Direction, column: &ColumnPair) -> (&str, &str, &str, &str) {
    let (src_table, dst_table) = endpoints(direction, &column.real_table, &column.obfuscated_table);
    let (src_col, dst_col) = endpoints(direction, &column.real_column, &column.obfuscated_column);
    (src_table, dst_table, src_col, dst_col)
}

fn emit(direction: Direction, name: &str) -> String {
    match direction {
        Direction::ToReal => name.to_uppercase(),
        Direction::ToObfuscated => name.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn translator() -> IdentifierTranslator {
        IdentifierTranslator::real_estate()
    }

    #[test]
    fn test_to_real_simple_select() {
        let out =
            translator().to_real("SELECT first_name, last_name FROM property_holders LIMIT 10");
        assert!(out.succeeded);
        assert_eq!(out.text, "SELECT FIRST_NAME, LAST_NAME FROM OWNERS LIMIT 10");
    }

    #[test]
    fn test_to_real_filters_and_values_untouched() {
        let sql =
            "SELECT item_id, monetary_value FROM real_estate_items WHERE monetary_value > 500000";
        let out = translator().to_real(sql);
        assert_eq!(
            out.text,
            "SELECT PROPERTY_ID, PRICE FROM PROPERTIES WHERE PRICE > 500000"
        );
    }

    #[test]
    fn test_to_real_ignores_identifier_case() {
        let out = translator().to_real(
            "SELECT ITEM_ID, MONETARY_VALUE FROM REAL_ESTATE_ITEMS WHERE MONETARY_VALUE > 500000",
        );
        assert!(out.succeeded);
        assert_eq!(
            out.text,
            "SELECT PROPERTY_ID, PRICE FROM PROPERTIES WHERE PRICE > 500000"
        );

        let out = translator().to_real(
            "SELECT Item_Id, MONETARY_VALUE FROM REAL_ESTATE_ITEMS r WHERE r.Monetary_Value > 5",
        );
        assert_eq!(out.text, "SELECT PROPERTY_ID, PRICE FROM PROPERTIES r WHERE r.PRICE > 5");

        let out = translator().to_real("SELECT Geographic_Areas.City_Name FROM Geographic_Areas");
        assert_eq!(out.text, "SELECT LOCATIONS.CITY FROM LOCATIONS");
    }

    #[test]
    fn test_to_real_qualified_columns() {
        let out = translator().to_real(
            "SELECT geographic_areas.city_name, COUNT(*) FROM real_estate_items JOIN geographic_areas ON real_estate_items.area_ref = geographic_areas.area_id GROUP BY geographic_areas.city_name",
        );
        assert_eq!(
            out.text,
            "SELECT LOCATIONS.CITY, COUNT(*) FROM PROPERTIES JOIN LOCATIONS ON PROPERTIES.LOCATION_ID = LOCATIONS.LOCATION_ID GROUP BY LOCATIONS.CITY"
        );
    }

    #[test]
    fn test_to_real_uses_scope_for_ambiguous_bare_names() {
        // rep_ref exists on both real_estate_items and commercial_events
        let out = translator().to_real("SELECT rep_ref FROM commercial_events");
        assert_eq!(out.text, "SELECT AGENT_ID FROM TRANSACTIONS");

        let out = translator().to_real("SELECT rep_ref FROM real_estate_items");
        assert_eq!(out.text, "SELECT LISTING_AGENT_ID FROM PROPERTIES");
    }

    #[test]
    fn test_to_obfuscated_uses_scope_for_ambiguous_bare_names() {
        let out = translator().to_obfuscated("SELECT avg_sale_price FROM agents");
        assert_eq!(out.text, "SELECT average_deal_value FROM sales_representatives");

        let out = translator().to_obfuscated("SELECT avg_sale_price FROM locations");
        assert_eq!(out.text, "SELECT price_average FROM geographic_areas");
    }

    #[test]
    fn test_alias_qualified_columns_use_bare_mapping() {
        let out = translator()
            .to_real("SELECT r.city_name FROM geographic_areas r WHERE r.state_name = 'TX'");
        assert_eq!(out.text, "SELECT r.CITY FROM LOCATIONS r WHERE r.STATE = 'TX'");
    }

    #[test]
    fn test_word_boundaries_are_respected() {
        let out = translator().to_real("SELECT item_id_backup FROM real_estate_items_archive");
        assert_eq!(out.text, "SELECT item_id_backup FROM real_estate_items_archive");
    }

    #[test]
    fn test_no_chained_rewrites() {
        // CITY must not be translated again once produced
        let out = translator().to_obfuscated("SELECT city FROM locations");
        assert_eq!(out.text, "SELECT city_name FROM geographic_areas");
        let back = translator().to_real(&out.text);
        assert_eq!(back.text, "SELECT CITY FROM LOCATIONS");
    }

    #[test]
    fn test_empty_input_is_unchanged() {
        let out = translator().to_real("   ");
        assert!(out.succeeded);
        assert_eq!(out.text, "   ");
    }

    #[test]
    fn test_fails_open_when_patterns_cannot_compile() {
        let t = translator().with_regex_size_limit(16);
        let sql = "SELECT item_id FROM real_estate_items";
        let out = t.to_real(sql);
        assert!(!out.succeeded);
        assert_eq!(out.text, sql);
    }

    #[test]
    fn test_validate_reports_all_real_names() {
        let report =
            translator().validate("SELECT property_id, agent_id FROM properties JOIN agents");
        assert!(!report.is_valid());
        assert_eq!(
            report.violations,
            vec![
                "Real table name found: properties".to_string(),
                "Real table name found: agents".to_string(),
                "Real column name found: property_id".to_string(),
                "Real column name found: agent_id".to_string(),
            ]
        );
    }

    #[test]
    fn test_validate_accepts_obfuscated_sql() {
        let report = translator().validate(
            "SELECT item_id, monetary_value FROM real_estate_items \
             JOIN property_holders ON holder_ref = holder_id",
        );
        assert!(report.is_valid());
    }

    #[test]
    fn test_validate_is_case_insensitive() {
        let report = translator().validate("select * from PROPERTIES");
        assert_eq!(
            report.violations,
            vec!["Real table name found: properties".to_string()]
        );
    }
}
