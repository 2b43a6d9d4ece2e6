//! Live catalog introspection.
//!
//! Read-only views over the warehouse catalog: table existence, column
//! lists, and key constraints. Everything here is derived state; the only
//! durable state this crate owns lives in the syncer's watermark table.

use crate::dialect::Dialect;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_postgres::Client;
use tracing::debug;

/// A column as reported by the live catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    /// Column name.
    pub name: String,

    /// Reported type, e.g. "character varying", "integer", "super".
    pub data_type: String,

    /// Underlying type name, e.g. "varchar", "int4".
    pub udt_name: String,

    /// Declared maximum length for string types.
    pub max_length: Option<i32>,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Ordinal position (1-based).
    pub ordinal: i32,
}

/// Catalog introspection operations.
#[async_trait]
pub trait Introspect: Send + Sync {
    /// Check whether a table exists.
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool>;

    /// Check whether a schema exists.
    async fn schema_exists(&self, schema: &str) -> Result<bool>;

    /// Load the column list for a table, in ordinal order.
    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<LiveColumn>>;

    /// Column names carrying the table's primary key constraint.
    async fn primary_key_columns(&self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Whether a foreign key constraint exists on the given column.
    async fn foreign_key_exists(&self, schema: &str, table: &str, column: &str) -> Result<bool>;

    /// Whether the column is NOT NULL according to the catalog.
    async fn column_is_not_null(&self, schema: &str, table: &str, column: &str) -> Result<bool>;

    /// Whether the column carries a PRIMARY KEY or UNIQUE constraint.
    async fn column_has_key_constraint(
        &self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<bool>;
}

/// Catalog introspector over a checked-out warehouse connection.
pub struct CatalogIntrospector<'a> {
    client: &'a Client,
    dialect: Dialect,
}

impl<'a> CatalogIntrospector<'a> {
    pub fn new(client: &'a Client, dialect: Dialect) -> Self {
        Self { client, dialect }
    }

    /// Map of non-system schemas to their tables, excluding intake
    /// tables. Used by downstream audit tooling.
    pub async fn schema_table_map(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let rows = self
            .client
            .query(
                "SELECT schema_name FROM information_schema.schemata \
                 WHERE schema_name NOT IN \
                 ('information_schema', 'pg_catalog', 'public', 'pg_toast')",
                &[],
            )
            .await?;

        let mut map = BTreeMap::new();
        for row in rows {
            let schema: String = row.get(0);
            let tables = self.tables_in_schema(&schema).await?;
            map.insert(schema, tables);
        }
        Ok(map)
    }

    async fn tables_in_schema(&self, schema: &str) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = $1 ORDER BY table_name",
                &[&schema],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| r.get::<_, String>(0))
            .filter(|name| !is_intake_table(name))
            .collect())
    }
}

/// Intake tables hold not-yet-extracted payload rows and are skipped by
/// catalog enumeration.
pub fn is_intake_table(name: &str) -> bool {
    name.starts_with("unextracted_")
}

#[async_trait]
impl Introspect for CatalogIntrospector<'_> {
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = $1 AND table_name = $2
                )",
                &[&schema, &table],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.schemata
                    WHERE schema_name = $1
                )",
                &[&schema],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<LiveColumn>> {
        let rows = self
            .client
            .query(
                "SELECT column_name, data_type, udt_name, \
                        character_maximum_length, is_nullable, ordinal_position \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position",
                &[&schema, &table],
            )
            .await?;

        let columns: Vec<LiveColumn> = rows
            .iter()
            .map(|row| LiveColumn {
                name: row.get(0),
                data_type: row.get(1),
                udt_name: row.get(2),
                max_length: row.get(3),
                nullable: row.get::<_, String>(4) == "YES",
                ordinal: row.get(5),
            })
            .collect();

        debug!("Loaded {} columns for {}.{}", columns.len(), schema, table);
        Ok(columns)
    }

    async fn primary_key_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT kcu.column_name \
                 FROM information_schema.table_constraints tco \
                 JOIN information_schema.key_column_usage kcu \
                   ON kcu.constraint_name = tco.constraint_name \
                  AND kcu.table_schema = tco.table_schema \
                 WHERE tco.table_schema = $1 \
                   AND tco.table_name = $2 \
                   AND tco.constraint_type = 'PRIMARY KEY' \
                 ORDER BY kcu.ordinal_position",
                &[&schema, &table],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn foreign_key_exists(&self, schema: &str, table: &str, column: &str) -> Result<bool> {
        let rows = self
            .client
            .query(
                "SELECT kcu.column_name \
                 FROM information_schema.table_constraints tco \
                 JOIN information_schema.key_column_usage kcu \
                   ON kcu.constraint_name = tco.constraint_name \
                  AND kcu.table_schema = tco.table_schema \
                 WHERE tco.table_schema = $1 \
                   AND tco.table_name = $2 \
                   AND tco.constraint_type = 'FOREIGN KEY' \
                   AND kcu.column_name = $3",
                &[&schema, &table, &column],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn column_is_not_null(&self, schema: &str, table: &str, column: &str) -> Result<bool> {
        let rows = self
            .client
            .query(self.dialect.not_null_probe_sql(), &[&schema, &table, &column])
            .await?;
        Ok(!rows.is_empty())
    }

    async fn column_has_key_constraint(
        &self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<bool> {
        let rows = self
            .client
            .query(
                "SELECT 1 \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.constraint_column_usage ccu \
                   ON tc.constraint_name = ccu.constraint_name \
                 WHERE tc.table_schema = $1 \
                   AND tc.table_name = $2 \
                   AND ccu.column_name = $3 \
                   AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')",
                &[&schema, &table, &column],
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_intake_table() {
        assert!(is_intake_table("unextracted_events"));
        assert!(is_intake_table("unextracted_production"));
        assert!(!is_intake_table("events"));
        assert!(!is_intake_table("production"));
    }
}
