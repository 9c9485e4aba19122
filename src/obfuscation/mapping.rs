//! Bidirectional identifier mapping between the real warehouse schema and the
//! vocabulary shown to the LLM.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use crate::error::{AskError, Result};

const REAL_ESTATE_TABLES: &[(&str, &str)] = &[
    ("properties", "real_estate_items"),
    ("locations", "geographic_areas"),
    ("agents", "sales_representatives"),
    ("transactions", "commercial_events"),
    ("owners", "property_holders"),
];

const REAL_ESTATE_COLUMNS: &[(&str, &str)] = &[
    ("properties.property_id", "real_estate_items.item_id"),
    ("properties.location_id", "real_estate_items.area_ref"),
    ("properties.price", "real_estate_items.monetary_value"),
    ("properties.bedrooms", "real_estate_items.sleeping_rooms"),
    ("properties.bathrooms", "real_estate_items.bath_facilities"),
    ("properties.sqft", "real_estate_items.floor_area"),
    ("properties.property_type", "real_estate_items.item_category"),
    ("properties.status", "real_estate_items.current_state"),
    ("properties.owner_id", "real_estate_items.holder_ref"),
    ("properties.listing_agent_id", "real_estate_items.rep_ref"),
    ("locations.location_id", "geographic_areas.area_id"),
    ("locations.city", "geographic_areas.city_name"),
    ("locations.state", "geographic_areas.state_name"),
    ("locations.county", "geographic_areas.county_name"),
    ("locations.zipcode", "geographic_areas.postal_code"),
    ("locations.population", "geographic_areas.resident_count"),
    ("locations.median_income", "geographic_areas.income_median"),
    ("locations.avg_sale_price", "geographic_areas.price_average"),
    ("agents.agent_id", "sales_representatives.rep_id"),
    ("agents.first_name", "sales_representatives.first_name"),
    ("agents.last_name", "sales_representatives.last_name"),
    ("agents.agency", "sales_representatives.company_name"),
    ("agents.transaction_count", "sales_representatives.deal_count"),
    ("agents.avg_sale_price", "sales_representatives.average_deal_value"),
    ("agents.commission_rate", "sales_representatives.fee_percentage"),
    ("transactions.transaction_id", "commercial_events.event_id"),
    ("transactions.property_id", "commercial_events.item_ref"),
    ("transactions.agent_id", "commercial_events.rep_ref"),
    ("transactions.sale_date", "commercial_events.completion_date"),
    ("transactions.sale_price", "commercial_events.final_amount"),
    ("transactions.days_on_market", "commercial_events.market_duration"),
    ("owners.owner_id", "property_holders.holder_id"),
    ("owners.first_name", "property_holders.first_name"),
    ("owners.last_name", "property_holders.last_name"),
    ("owners.num_properties_owned", "property_holders.item_count"),
    ("owners.total_portfolio_value", "property_holders.portfolio_worth"),
    ("owners.investor_flag", "property_holders.investor_status"),
];

/// Real columns whose presence in generated SQL betrays knowledge of the
/// real schema.
const REAL_ESTATE_DISTINCTIVE: &[&str] =
    &["property_id", "location_id", "agent_id", "transaction_id"];

/// Join paths between real tables, rendered in obfuscated form for the prompt.
const REAL_ESTATE_RELATIONSHIPS: &[&str] = &[
    "properties.location_id = locations.location_id",
    "transactions.property_id = properties.property_id",
    "transactions.agent_id = agents.agent_id",
    "properties.owner_id = owners.owner_id",
];

/// A real/obfuscated table name pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePair {
    pub real: String,
    pub obfuscated: String,
}

/// A qualified real/obfuscated column pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    pub real_table: String,
    pub real_column: String,
    pub obfuscated_table: String,
    pub obfuscated_column: String,
}

impl ColumnPair {
    pub fn real_qualified(&self) -> String {
        format!("{}.{}", self.real_table, self.real_column)
    }

    pub fn obfuscated_qualified(&self) -> String {
        format!("{}.{}", self.obfuscated_table, self.obfuscated_column)
    }
}

/// A validated bijection between real and obfuscated identifiers.
///
/// All names are stored lowercase. Column pairs must belong to a mapped
/// table pair, and the qualified names are unique in both directions.
#[derive(Debug, Clone)]
pub struct IdentifierMapping {
    tables: Vec<TablePair>,
    columns: Vec<ColumnPair>,
    distinctive_columns: Vec<String>,
    relationships: Vec<String>,
}

impl IdentifierMapping {
    /// Builds a mapping from `(real, obfuscated)` pairs.
    ///
    /// Columns are given as `table.column` on both sides.
    pub fn new(
        tables: &[(&str, &str)],
        columns: &[(&str, &str)],
        distinctive_columns: &[&str],
    ) -> Result<Self> {
        let tables: Vec<TablePair> = tables
            .iter()
            .map(|(real, obf)| TablePair {
                real: real.to_lowercase(),
                obfuscated: obf.to_lowercase(),
            })
            .collect();

        check_unique(tables.iter().map(|t| t.real.clone()), "real table")?;
        check_unique(tables.iter().map(|t| t.obfuscated.clone()), "obfuscated table")?;

        let table_pairs: HashMap<&str, &str> = tables
            .iter()
            .map(|t| (t.real.as_str(), t.obfuscated.as_str()))
            .collect();

        let mut parsed = Vec::with_capacity(columns.len());
        for (real, obf) in columns {
            let (real_table, real_column) = split_qualified(real)?;
            let (obfuscated_table, obfuscated_column) = split_qualified(obf)?;

            match table_pairs.get(real_table.as_str()) {
                Some(expected) if *expected == obfuscated_table => {}
                Some(expected) => {
                    return Err(AskError::config(format!(
                        "Column '{real}' maps into table '{obfuscated_table}', but '{real_table}' maps to '{expected}'"
                    )))
                }
                None => {
                    return Err(AskError::config(format!(
                        "Column '{real}' belongs to unmapped table '{real_table}'"
                    )))
                }
            }

            parsed.push(ColumnPair {
                real_table,
                real_column,
                obfuscated_table,
                obfuscated_column,
            });
        }

        check_unique(parsed.iter().map(ColumnPair::real_qualified), "real column")?;
        check_unique(
            parsed.iter().map(ColumnPair::obfuscated_qualified),
            "obfuscated column",
        )?;

        let distinctive_columns: Vec<String> =
            distinctive_columns.iter().map(|c| c.to_lowercase()).collect();
        if let Some(unknown) = distinctive_columns
            .iter()
            .find(|c| !parsed.iter().any(|p| &p.real_column == *c))
        {
            return Err(AskError::config(format!(
                "Distinctive column '{unknown}' is not a mapped real column"
            )));
        }

        Ok(Self {
            tables,
            columns: parsed,
            distinctive_columns,
            relationships: Vec::new(),
        })
    }

    /// Adds join paths (in real vocabulary) used when describing the schema.
    pub fn with_relationships(mut self, relationships: &[&str]) -> Self {
        self.relationships = relationships.iter().map(|r| r.to_string()).collect();
        self
    }

    /// The built-in real-estate warehouse mapping.
    pub fn real_estate() -> Arc<IdentifierMapping> {
        static MAPPING: OnceLock<Arc<IdentifierMapping>> = OnceLock::new();
        Arc::clone(MAPPING.get_or_init(|| {
            let mapping = IdentifierMapping::new(
                REAL_ESTATE_TABLES,
                REAL_ESTATE_COLUMNS,
                REAL_ESTATE_DISTINCTIVE,
            )
            .expect("built-in real-estate mapping is a bijection")
            .with_relationships(REAL_ESTATE_RELATIONSHIPS);
            Arc::new(mapping)
        }))
    }

    pub fn tables(&self) -> &[TablePair] {
        &self.tables
    }

    pub fn columns(&self) -> &[ColumnPair] {
        &self.columns
    }

    pub fn distinctive_columns(&self) -> &[String] {
        &self.distinctive_columns
    }

    pub fn relationships(&self) -> &[String] {
        &self.relationships
    }

    /// Columns of the given obfuscated table, in declaration order.
    pub fn obfuscated_columns_of<'a>(
        &'a self,
        obfuscated_table: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.columns
            .iter()
            .filter(move |c| c.obfuscated_table == obfuscated_table)
            .map(|c| c.obfuscated_column.as_str())
    }
}

fn split_qualified(name: &str) -> Result<(String, String)> {
    match name.split_once('.') {
        Some((table, column))
            if !table.is_empty() && !column.is_empty() && !column.contains('.') =>
        {
            Ok((table.to_lowercase(), column.to_lowercase()))
        }
        _ => Err(AskError::config(format!(
            "Expected a 'table.column' name, got '{name}'"
        ))),
    }
}

fn check_unique(names: impl Iterator<Item = String>, what: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.clone()) {
            return Err(AskError::config(format!("Duplicate {what} '{name}' in mapping")));
        }
    }
    Ok(())
}
