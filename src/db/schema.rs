//! Introspected warehouse structure.
//!
//! Only shown to the LLM when identifiers are not obfuscated; otherwise the
//! substitute vocabulary stands in for it.

use std::collections::hash_map::DefaultHasher;
use std::fmt::Write;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders one block per table, columns annotated with PK, NOT NULL and
    /// outgoing foreign keys.
    pub fn format_for_llm(&self) -> String {
        let mut out = String::from("Database Schema:\n\n");

        for table in &self.tables {
            let _ = writeln!(out, "Table: {}", table.name);
            for column in &table.columns {
                let notes = self.annotations(table, column);
                if notes.is_empty() {
                    let _ = writeln!(out, "  - {}: {}", column.name, column.data_type);
                } else {
                    let _ = writeln!(
                        out,
                        "  - {}: {} ({})",
                        column.name,
                        column.data_type,
                        notes.join(", ")
                    );
                }
            }
            out.push('\n');
        }

        out
    }

    fn annotations(&self, table: &Table, column: &Column) -> Vec<String> {
        let mut notes = Vec::new();
        if table.primary_key.contains(&column.name) {
            notes.push("PK".to_string());
        }
        if !column.is_nullable {
            notes.push("NOT NULL".to_string());
        }
        for fk in &self.foreign_keys {
            if fk.from_table != table.name {
                continue;
            }
            // Composite keys pair columns by position.
            if let Some(i) = fk.from_columns.iter().position(|c| *c == column.name) {
                let target = fk.to_columns.get(i).map(String::as_str).unwrap_or("");
                notes.push(format!("FK -> {}.{}", fk.to_table, target));
            }
        }
        notes
    }

    /// Fingerprint used to notice drift when a cached copy is refreshed.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Key columns in key order.
    pub primary_key: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    /// As reported by `information_schema`, e.g. `numeric` or `character varying`.
    pub data_type: String,
    pub is_nullable: bool,
}

impl Column {
    /// A nullable column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
        }
    }

    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub from_table: String,
    pub from_columns: Vec<String>,
    pub to_table: String,
    pub to_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(
        from_table: impl Into<String>,
        from_columns: Vec<String>,
        to_table: impl Into<String>,
        to_columns: Vec<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_columns,
            to_table: to_table.into(),
            to_columns,
        }
    }
}
