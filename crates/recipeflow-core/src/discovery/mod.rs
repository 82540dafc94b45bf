//! Table discovery and caching.
//!
//! The engine never talks to the warehouse. A [`TableDiscovery`] implementation
//! supplied by the caller answers "which tables exist in `db.schema`", and
//! [`TableCatalog`] caches those answers so that concurrent flows can check table
//! existence without repeating the round trip.

mod cache;
mod similar;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use cache::{CacheStats, TtlLruCache};
pub use similar::{confident_alternative, find_alternative_tables, AlternativeTable, CONFIDENT_SCORE};

use crate::error::DiscoveryError;
use crate::types::TableSet;

/// Collaborator that lists the tables in one schema.
pub trait TableDiscovery {
    /// Uppercase table names present in `database.schema`.
    fn discover_tables(&self, database: &str, schema: &str) -> Result<TableSet, DiscoveryError>;
}

impl<F> TableDiscovery for F
where
    F: Fn(&str, &str) -> Result<TableSet, DiscoveryError>,
{
    fn discover_tables(&self, database: &str, schema: &str) -> Result<TableSet, DiscoveryError> {
        self(database, schema)
    }
}

/// Cache sizing and expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Seconds a discovered table set stays fresh.
    pub table_ttl_secs: u64,
    /// Seconds a column list stays fresh.
    pub column_ttl_secs: u64,
    pub table_capacity: usize,
    pub column_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            table_ttl_secs: 600,
            column_ttl_secs: 900,
            table_capacity: 5_000,
            column_capacity: 10_000,
        }
    }
}

/// Uppercased `(database, schema)`.
type SchemaKey = (String, String);

/// Uppercased `(database, schema, table)`.
type TableKey = (String, String, String);

fn schema_key(database: &str, schema: &str) -> SchemaKey {
    (database.to_uppercase(), schema.to_uppercase())
}

fn table_key(database: &str, schema: &str, table: &str) -> TableKey {
    (database.to_uppercase(), schema.to_uppercase(), table.to_uppercase())
}

/// Cached table sets (per `database.schema`) and column lists (per
/// `database.schema.table`). Safe to share between threads.
pub struct TableCatalog {
    tables: TtlLruCache<SchemaKey, TableSet>,
    columns: TtlLruCache<TableKey, Vec<String>>,
}

impl Default for TableCatalog {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl TableCatalog {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            tables: TtlLruCache::new(
                Duration::from_secs(settings.table_ttl_secs),
                settings.table_capacity,
            ),
            columns: TtlLruCache::new(
                Duration::from_secs(settings.column_ttl_secs),
                settings.column_capacity,
            ),
        }
    }

    /// Cached tables of `database.schema`, if fresh.
    pub fn tables(&self, database: &str, schema: &str) -> Option<TableSet> {
        self.tables.get(&schema_key(database, schema))
    }

    pub fn put_tables(&self, database: &str, schema: &str, tables: TableSet) {
        self.tables.insert(schema_key(database, schema), tables);
    }

    /// Cached tables, or ask `discovery` and cache its answer.
    ///
    /// Discovery failures are returned and nothing is cached.
    pub fn tables_or_discover<D>(
        &self,
        discovery: &D,
        database: &str,
        schema: &str,
    ) -> Result<TableSet, DiscoveryError>
    where
        D: TableDiscovery + ?Sized,
    {
        if let Some(tables) = self.tables(database, schema) {
            return Ok(tables);
        }
        let tables = discovery.discover_tables(database, schema)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(database, schema, count = tables.len(), "discovered tables");
        self.put_tables(database, schema, tables.clone());
        Ok(tables)
    }

    pub fn columns(&self, database: &str, schema: &str, table: &str) -> Option<Vec<String>> {
        self.columns.get(&table_key(database, schema, table))
    }

    pub fn put_columns(&self, database: &str, schema: &str, table: &str, columns: Vec<String>) {
        self.columns.insert(table_key(database, schema, table), columns);
    }

    /// Forget the table set and every column list of `database.schema`.
    pub fn invalidate(&self, database: &str, schema: &str) {
        let key = schema_key(database, schema);
        self.tables.remove(&key);
        self.columns
            .remove_where(|(db, sch, _)| *db == key.0 && *sch == key.1);
    }

    pub fn clear(&self) {
        self.tables.clear();
        self.columns.clear();
    }

    /// Whether `table` exists, or `None` when the schema has not been discovered.
    pub fn table_exists(&self, database: &str, schema: &str, table: &str) -> Option<bool> {
        self.tables(database, schema)
            .map(|tables| tables.contains(table))
    }

    /// Replacement candidates for `table` among the cached tables of the schema.
    pub fn find_alternative_tables(
        &self,
        database: &str,
        schema: &str,
        table: &str,
        limit: usize,
    ) -> Vec<AlternativeTable> {
        self.tables(database, schema)
            .map(|tables| find_alternative_tables(table, database, schema, &tables, limit))
            .unwrap_or_default()
    }

    pub fn stats(&self) -> (CacheStats, CacheStats) {
        (self.tables.stats(), self.columns.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn tables(names: &[&str]) -> TableSet {
        names.iter().collect()
    }

    #[test]
    fn test_tables_or_discover_caches() {
        let catalog = TableCatalog::default();
        let calls = Cell::new(0);
        let discovery = |_: &str, _: &str| -> Result<TableSet, DiscoveryError> {
            calls.set(calls.get() + 1);
            Ok(tables(&["PROCESS_ENTITY"]))
        };

        let first = catalog.tables_or_discover(&discovery, "mdlh", "gold").unwrap();
        let second = catalog.tables_or_discover(&discovery, "MDLH", "GOLD").unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(catalog.table_exists("MDLH", "GOLD", "process_entity"), Some(true));
        assert_eq!(catalog.table_exists("MDLH", "GOLD", "TABLE_ENTITY"), Some(false));
        assert_eq!(catalog.table_exists("MDLH", "RAW", "TABLE_ENTITY"), None);
    }

    #[test]
    fn test_discovery_errors_are_not_cached() {
        let catalog = TableCatalog::default();
        let failing = |db: &str, schema: &str| -> Result<TableSet, DiscoveryError> {
            Err(DiscoveryError::new(db, schema, "permission denied"))
        };
        assert!(catalog.tables_or_discover(&failing, "DB", "S").is_err());
        assert_eq!(catalog.tables("DB", "S"), None);
    }

    #[test]
    fn test_invalidate_drops_columns_of_schema() {
        let catalog = TableCatalog::default();
        catalog.put_tables("DB", "S", tables(&["T"]));
        catalog.put_columns("DB", "S", "T", vec!["ID".to_string()]);
        catalog.put_columns("DB", "S2", "T", vec!["ID".to_string()]);

        catalog.invalidate("db", "s");
        assert_eq!(catalog.tables("DB", "S"), None);
        assert_eq!(catalog.columns("DB", "S", "T"), None);
        assert_eq!(catalog.columns("DB", "S2", "T"), Some(vec!["ID".to_string()]));
    }

    #[test]
    fn test_dotted_names_do_not_share_entries() {
        let catalog = TableCatalog::default();
        catalog.put_tables("A.B", "C", tables(&["LEFT"]));
        catalog.put_tables("A", "B.C", tables(&["RIGHT"]));
        assert_eq!(catalog.table_exists("A.B", "C", "LEFT"), Some(true));
        assert_eq!(catalog.table_exists("A", "B.C", "LEFT"), Some(false));
        assert_eq!(catalog.table_exists("A", "B.C", "RIGHT"), Some(true));

        catalog.put_columns("A", "B", "C.D", vec!["X".to_string()]);
        catalog.put_columns("A", "B.C", "D", vec!["Y".to_string()]);
        assert_eq!(catalog.columns("A", "B", "C.D"), Some(vec!["X".to_string()]));
        assert_eq!(catalog.columns("A", "B.C", "D"), Some(vec!["Y".to_string()]));

        catalog.invalidate("A", "B");
        assert_eq!(catalog.columns("A", "B", "C.D"), None);
        assert_eq!(catalog.columns("A", "B.C", "D"), Some(vec!["Y".to_string()]));
        assert_eq!(catalog.tables("A", "B.C"), Some(tables(&["RIGHT"])));
    }

    #[test]
    fn test_catalog_alternatives() {
        let catalog = TableCatalog::default();
        catalog.put_tables("DB", "S", tables(&["PROCESS", "ORDERS"]));
        let found = catalog.find_alternative_tables("DB", "S", "PROCESS_ENTITY", 5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].table_name, "PROCESS");
        assert!(catalog.find_alternative_tables("DB", "X", "PROCESS_ENTITY", 5).is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let catalog = TableCatalog::new(CacheSettings {
            table_capacity: 16,
            ..CacheSettings::default()
        });
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let catalog = &catalog;
                scope.spawn(move || {
                    for i in 0..50 {
                        let schema = format!("S{}", (worker * 50 + i) % 32);
                        catalog.put_tables("DB", &schema, tables(&["T"]));
                        let _ = catalog.table_exists("DB", &schema, "T");
                    }
                });
            }
        });
        assert!(catalog.stats().0.size <= 16);
    }
}
