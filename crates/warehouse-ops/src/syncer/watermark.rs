//! Persisted sync watermarks.
//!
//! One row per synced table: the timestamp boundary of the last
//! successful sync. This metadata table is the only durable state the
//! crate owns; everything else is derived from the live catalog each run.

use crate::error::{OpsError, Result};
use crate::ident;
use crate::pool::WarehousePool;
use chrono::{DateTime, Duration, Utc};
use tracing::error;

/// How far back the first sync of a table reaches when no watermark has
/// been recorded yet.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 6;

/// Name of the metadata table, within the configured metadata schema.
const METADATA_TABLE: &str = "system_tables_sync_metadata";

/// Watermark for a table that has never been synced.
pub fn default_watermark(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(DEFAULT_LOOKBACK_DAYS)
}

/// Store for per-table sync times, backed by a small metadata table.
pub struct WatermarkStore {
    pool: WarehousePool,
    schema: String,
}

impl WatermarkStore {
    pub fn new(pool: WarehousePool, schema: String) -> Self {
        Self { pool, schema }
    }

    fn qualified_table(&self) -> Result<String> {
        ident::qualify(&self.schema, METADATA_TABLE)
    }

    /// Create the metadata schema and table if they do not exist.
    pub async fn init(&self) -> Result<()> {
        let client = self.pool.client().await?;

        client
            .execute(
                format!("CREATE SCHEMA IF NOT EXISTS {}", ident::quote(&self.schema)?).as_str(),
                &[],
            )
            .await?;

        client
            .execute(
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (\n    \
                     table_name VARCHAR(256) NOT NULL PRIMARY KEY,\n    \
                     last_sync_time TIMESTAMPTZ NOT NULL,\n    \
                     created_at TIMESTAMPTZ NOT NULL,\n    \
                     updated_at TIMESTAMPTZ NOT NULL\n)",
                    self.qualified_table()?
                )
                .as_str(),
                &[],
            )
            .await?;

        Ok(())
    }

    /// The recorded watermark for a table, if any.
    pub async fn last_sync_time(&self, table_name: &str) -> Result<Option<DateTime<Utc>>> {
        let client = self.pool.client().await?;

        let row = client
            .query_opt(
                format!(
                    "SELECT last_sync_time FROM {} WHERE table_name = $1",
                    self.qualified_table()?
                )
                .as_str(),
                &[&table_name],
            )
            .await?;

        Ok(row.map(|r| r.get(0)))
    }

    /// Record a successful sync. Update-then-insert rather than a native
    /// upsert: the columnar engine has no ON CONFLICT clause, and the
    /// caller serializes runs per table, so the two statements cannot
    /// race themselves.
    pub async fn record_sync_time(
        &self,
        table_name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let client = self.pool.client().await?;
        let table = self.qualified_table()?;
        let now = Utc::now();

        let updated = client
            .execute(
                format!(
                    "UPDATE {} SET last_sync_time = $2, updated_at = $3 WHERE table_name = $1",
                    table
                )
                .as_str(),
                &[&table_name, &timestamp, &now],
            )
            .await
            .map_err(|e| {
                error!(
                    job = "TableSyncer",
                    success = false,
                    table = %table_name,
                    "Failed to update sync time: {}", e
                );
                OpsError::sync(table_name, e.to_string())
            })?;

        if updated == 0 {
            client
                .execute(
                    format!(
                        "INSERT INTO {} (table_name, last_sync_time, created_at, updated_at) \
                         VALUES ($1, $2, $3, $3)",
                        table
                    )
                    .as_str(),
                    &[&table_name, &timestamp, &now],
                )
                .await
                .map_err(|e| {
                    error!(
                        job = "TableSyncer",
                        success = false,
                        table = %table_name,
                        "Failed to record sync time: {}", e
                    );
                    OpsError::sync(table_name, e.to_string())
                })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_watermark_is_six_days_back() {
        let now = Utc::now();
        let watermark = default_watermark(now);
        assert_eq!(now - watermark, Duration::days(6));
    }
}
