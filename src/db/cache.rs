//! Time-bounded cache of introspected schemas.
//!
//! Schema introspection is a round trip per table; a session asking several
//! questions reuses the last result until it ages out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Schema;

/// Default lifetime of a cached schema.
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct CachedSchema {
    schema: Arc<Schema>,
    fetched_at: Instant,
}

/// Cache of schemas keyed by connection name.
#[derive(Debug)]
pub struct SchemaCache {
    ttl: Duration,
    entries: HashMap<String, CachedSchema>,
}

impl SchemaCache {
    /// Creates a cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached schema for `key` if it has not expired.
    pub fn get(&self, key: &str) -> Option<Arc<Schema>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Arc<Schema>> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.fetched_at) < self.ttl {
            Some(Arc::clone(&entry.schema))
        } else {
            None
        }
    }

    /// Stores a freshly introspected schema and returns a shared handle to it.
    pub fn insert(&mut self, key: impl Into<String>, schema: Schema) -> Arc<Schema> {
        let key = key.into();
        let schema = Arc::new(schema);

        if let Some(previous) = self.entries.get(&key) {
            if previous.schema.content_hash() != schema.content_hash() {
                tracing::info!(connection = %key, "Schema changed since last introspection");
            }
        }

        self.entries.insert(
            key,
            CachedSchema {
                schema: Arc::clone(&schema),
                fetched_at: Instant::now(),
            },
        );
        schema
    }

    /// Drops the entry for `key`.
    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_TTL)
    }
}
