//! Metadata questions answered without the LLM.

/// A question about the warehouse itself rather than its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataQuery {
    TableCount,
    ShowTables,
    DatabaseInfo,
    SchemaInfo,
}

const TABLE_COUNT_PHRASES: &[&str] = &[
    "how many tables",
    "count of tables",
    "tables count",
    "count tables",
    "number of tables",
];

const SHOW_TABLES_PHRASES: &[&str] = &[
    "show tables",
    "show me the tables",
    "show me tables",
    "show all tables",
    "show me all tables",
    "list tables",
    "list all tables",
    "list the tables",
    "what tables",
    "which tables",
    "display tables",
    "get tables",
    "tables list",
];

const DATABASE_PHRASES: &[&str] = &["what database", "current database", "which database"];

const SCHEMA_PHRASES: &[&str] = &["what schema", "current schema", "which schema"];

impl MetadataQuery {
    /// Detects a metadata question by phrase. Counting is checked first so
    /// "how many tables" is not read as a listing.
    pub fn detect(question: &str) -> Option<Self> {
        let q = question.to_lowercase();
        let q = q.split_whitespace().collect::<Vec<_>>().join(" ");
        let any = |phrases: &[&str]| phrases.iter().any(|p| q.contains(p));

        if any(TABLE_COUNT_PHRASES) {
            Some(Self::TableCount)
        } else if any(SHOW_TABLES_PHRASES) {
            Some(Self::ShowTables)
        } else if any(DATABASE_PHRASES) {
            Some(Self::DatabaseInfo)
        } else if any(SCHEMA_PHRASES) {
            Some(Self::SchemaInfo)
        } else {
            None
        }
    }

    /// The statement that answers the question.
    pub fn sql(&self) -> &'static str {
        match self {
            Self::TableCount => {
                "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = CURRENT_SCHEMA()"
            }
            Self::ShowTables => {
                "SELECT TABLE_NAME, TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = CURRENT_SCHEMA() ORDER BY TABLE_NAME"
            }
            Self::DatabaseInfo => "SELECT CURRENT_DATABASE() AS database_name",
            Self::SchemaInfo => "SELECT CURRENT_SCHEMA() AS schema_name",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TableCount => "table_count",
            Self::ShowTables => "show_tables",
            Self::DatabaseInfo => "database_info",
            Self::SchemaInfo => "schema_info",
        }
    }
}
