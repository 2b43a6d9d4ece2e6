//! Incremental system-table syncer.
//!
//! Mirrors catalog/system tables from a source schema into a target
//! schema using a per-table watermark: only rows whose timestamp column
//! is newer than the last successful sync are copied, with an upsert so
//! re-processing is safe. System tables are not under this crate's schema
//! authority, so the target table is built from the source's introspected
//! column list on first run rather than from a declared spec.

mod watermark;

pub use watermark::{default_watermark, WatermarkStore, DEFAULT_LOOKBACK_DAYS};

use crate::catalog::{CatalogIntrospector, Introspect, LiveColumn};
use crate::config::SyncerConfig;
use crate::dialect::UpsertStrategy;
use crate::error::{OpsError, Result};
use crate::ident;
use crate::pool::WarehousePool;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

/// Primary key of a synced table: one column or several.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    One(String),
    Many(Vec<String>),
}

impl KeySpec {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            KeySpec::One(c) => vec![c.as_str()],
            KeySpec::Many(cs) => cs.iter().map(String::as_str).collect(),
        }
    }
}

/// One table to mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTableDescriptor {
    pub source_schema: String,
    pub source_table: String,
    pub target_schema: String,
    pub target_table: String,
    pub primary_key: KeySpec,
    pub timestamp_column: String,
}

impl SyncTableDescriptor {
    pub fn validate(&self) -> Result<()> {
        ident::validate_identifier(&self.source_schema)?;
        ident::validate_identifier(&self.source_table)?;
        ident::validate_identifier(&self.target_schema)?;
        ident::validate_identifier(&self.target_table)?;
        ident::validate_identifier(&self.timestamp_column)?;
        let keys = self.primary_key.columns();
        if keys.is_empty() {
            return Err(OpsError::Config(format!(
                "Sync descriptor for {} declares no primary key columns",
                self.target_table
            )));
        }
        for key in keys {
            ident::validate_identifier(key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SyncTablesFile {
    tables: Vec<SyncTableDescriptor>,
}

/// Load sync descriptors from a YAML file with a `tables:` root key.
pub fn load_sync_tables(path: &Path) -> Result<Vec<SyncTableDescriptor>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        OpsError::Config(format!(
            "Cannot read sync tables file {}: {}",
            path.display(),
            e
        ))
    })?;
    let file: SyncTablesFile = serde_yaml::from_str(&content)?;
    for table in &file.tables {
        table.validate()?;
    }
    Ok(file.tables)
}

/// What one table's sync pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Rows were copied and the watermark advanced.
    Upserted(u64),
    /// Nothing newer than the watermark; watermark unchanged.
    NoNewRows,
}

/// Result of a whole sync run across tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub synced: usize,
    pub no_new_rows: usize,
    pub failed: Vec<String>,
}

impl SyncSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

// --- statement rendering ---------------------------------------------------

/// Rendered type for a column copied verbatim from the source catalog.
fn render_live_type(col: &LiveColumn) -> String {
    match (col.data_type.as_str(), col.max_length) {
        ("character varying" | "varchar" | "character" | "char", Some(n)) => {
            format!("{}({})", col.data_type, n)
        }
        _ => col.data_type.clone(),
    }
}

/// Target table DDL mirroring the introspected source columns. The
/// primary key is declared so the conventional engine's ON CONFLICT
/// upsert has a constraint to land on.
pub(crate) fn render_create_target(
    desc: &SyncTableDescriptor,
    columns: &[LiveColumn],
) -> Result<String> {
    let mut ddl = format!(
        "CREATE TABLE {} (\n",
        ident::qualify(&desc.target_schema, &desc.target_table)?
    );

    for col in columns {
        ddl.push_str(&format!(
            "    {} {},\n",
            ident::quote(&col.name)?,
            render_live_type(col)
        ));
    }

    let keys: Vec<String> = desc
        .primary_key
        .columns()
        .iter()
        .map(|c| ident::quote(c))
        .collect::<Result<_>>()?;
    ddl.push_str(&format!("    PRIMARY KEY ({})\n)", keys.join(", ")));
    Ok(ddl)
}

/// Watermark-filtered source subquery with duplicate keys collapsed to
/// the newest row per key. System tables may legitimately contain
/// duplicate keys; without this, one copy statement could touch the same
/// target row twice.
fn render_ranked_source(desc: &SyncTableDescriptor, column_list: &str) -> Result<String> {
    let partition: Vec<String> = desc
        .primary_key
        .columns()
        .iter()
        .map(|c| ident::quote(c))
        .collect::<Result<_>>()?;
    let wm = ident::quote(&desc.timestamp_column)?;

    Ok(format!(
        "(\n    SELECT {columns}\n    FROM (\n        \
         SELECT *, ROW_NUMBER() OVER (PARTITION BY {partition} ORDER BY {wm} DESC) AS row_num\n        \
         FROM {source}\n        \
         WHERE {wm} > $1\n    ) ranked\n    WHERE row_num = 1\n)",
        columns = column_list,
        partition = partition.join(", "),
        wm = wm,
        source = ident::qualify(&desc.source_schema, &desc.source_table)?,
    ))
}

/// The incremental copy statement, parameterized on the watermark (`$1`).
pub(crate) fn render_copy_statement(
    desc: &SyncTableDescriptor,
    columns: &[LiveColumn],
    strategy: UpsertStrategy,
) -> Result<String> {
    let keys = desc.primary_key.columns();
    let quoted: Vec<String> = columns
        .iter()
        .map(|c| ident::quote(&c.name))
        .collect::<Result<_>>()?;
    let column_list = quoted.join(", ");
    let wm = ident::quote(&desc.timestamp_column)?;
    let target = ident::qualify(&desc.target_schema, &desc.target_table)?;
    let ranked = render_ranked_source(desc, &column_list)?;

    match strategy {
        UpsertStrategy::Merge => {
            let on_clause: Vec<String> = keys
                .iter()
                .map(|k| {
                    let k = ident::quote(k)?;
                    Ok(format!("t.{} = s.{}", k, k))
                })
                .collect::<Result<_>>()?;

            let updates: Vec<String> = columns
                .iter()
                .filter(|c| !keys.contains(&c.name.as_str()))
                .map(|c| {
                    let c = ident::quote(&c.name)?;
                    Ok(format!("{} = s.{}", c, c))
                })
                .collect::<Result<_>>()?;

            let insert_values: Vec<String> = quoted.iter().map(|c| format!("s.{}", c)).collect();

            Ok(format!(
                "MERGE INTO {target} AS t\nUSING {ranked} AS s\nON {on}\n\
                 WHEN MATCHED AND s.{wm} > t.{wm} THEN UPDATE SET {updates}\n\
                 WHEN NOT MATCHED THEN INSERT ({columns}) VALUES ({values})",
                target = target,
                ranked = ranked,
                on = on_clause.join(" AND "),
                wm = wm,
                updates = updates.join(", "),
                columns = column_list,
                values = insert_values.join(", "),
            ))
        }
        UpsertStrategy::InsertOnConflict => {
            let conflict_keys: Vec<String> = keys
                .iter()
                .map(|k| ident::quote(k))
                .collect::<Result<_>>()?;

            let updates: Vec<String> = columns
                .iter()
                .filter(|c| !keys.contains(&c.name.as_str()))
                .map(|c| {
                    let c = ident::quote(&c.name)?;
                    Ok(format!("{} = EXCLUDED.{}", c, c))
                })
                .collect::<Result<_>>()?;

            Ok(format!(
                "INSERT INTO {target} ({columns})\nSELECT {columns} FROM {ranked} AS s\n\
                 ON CONFLICT ({keys}) DO UPDATE SET {updates}",
                target = target,
                columns = column_list,
                ranked = ranked,
                keys = conflict_keys.join(", "),
                updates = updates.join(", "),
            ))
        }
    }
}

// --- execution -------------------------------------------------------------

/// Mirrors system tables incrementally, keeping one watermark per table.
pub struct TableSyncer {
    pool: WarehousePool,
    store: WatermarkStore,
}

impl TableSyncer {
    pub fn new(pool: WarehousePool, config: &SyncerConfig) -> Self {
        let store = WatermarkStore::new(pool.clone(), config.metadata_schema.clone());
        Self { pool, store }
    }

    /// Sync every descriptor, isolating failures per table: one table's
    /// failure is logged and counted but does not block the others.
    pub async fn sync_all(&self, tables: &[SyncTableDescriptor]) -> Result<SyncSummary> {
        self.store.init().await?;

        let mut summary = SyncSummary::default();
        for desc in tables {
            match self.sync_table(desc).await {
                Ok(SyncOutcome::Upserted(_)) => summary.synced += 1,
                Ok(SyncOutcome::NoNewRows) => summary.no_new_rows += 1,
                Err(e) => {
                    error!(
                        job = "TableSyncer",
                        success = false,
                        target_table = %desc.target_table,
                        "Sync failed: {}", e
                    );
                    summary.failed.push(desc.target_table.clone());
                }
            }
        }
        Ok(summary)
    }

    /// Sync one table. The watermark only advances after the copy
    /// statement succeeds, so a failed run reprocesses the same window on
    /// retry (at-least-once, never at-most-once).
    pub async fn sync_table(&self, desc: &SyncTableDescriptor) -> Result<SyncOutcome> {
        desc.validate()?;

        let client = self.pool.client().await?;
        let dialect = self.pool.dialect();
        let introspector = CatalogIntrospector::new(&client, dialect);

        let columns = introspector
            .columns(&desc.source_schema, &desc.source_table)
            .await?;
        if columns.is_empty() {
            return Err(OpsError::sync(
                &desc.target_table,
                format!(
                    "source table {}.{} has no columns or does not exist",
                    desc.source_schema, desc.source_table
                ),
            ));
        }
        info!(
            job = "TableSyncer",
            success = true,
            source_table = %desc.source_table,
            "Columns fetched for source table"
        );

        self.ensure_target(&client, &introspector, desc, &columns)
            .await?;

        let last_sync_time = match self.store.last_sync_time(&desc.target_table).await? {
            Some(ts) => ts,
            None => default_watermark(Utc::now()),
        };

        let started_at = Utc::now();
        let sql = render_copy_statement(desc, &columns, dialect.upsert_strategy())?;
        let affected = client
            .execute(sql.as_str(), &[&last_sync_time])
            .await
            .map_err(|e| {
                error!(
                    job = "TableSyncer",
                    success = false,
                    target_table = %desc.target_table,
                    "Copy statement failed: {}", e
                );
                OpsError::sync(&desc.target_table, e.to_string())
            })?;

        if affected == 0 {
            info!(
                job = "TableSyncer",
                success = false,
                source_table = %desc.source_table,
                last_sync_time = %last_sync_time,
                "Missing data in source table"
            );
            return Ok(SyncOutcome::NoNewRows);
        }

        self.store
            .record_sync_time(&desc.target_table, started_at)
            .await?;
        info!(
            job = "TableSyncer",
            success = true,
            target_table = %desc.target_table,
            record_count = affected,
            "Upserted data into target table"
        );
        Ok(SyncOutcome::Upserted(affected))
    }

    async fn ensure_target(
        &self,
        client: &tokio_postgres::Client,
        introspector: &CatalogIntrospector<'_>,
        desc: &SyncTableDescriptor,
        columns: &[LiveColumn],
    ) -> Result<()> {
        if introspector.schema_exists(&desc.target_schema).await? {
            info!(
                job = "TableSyncer",
                success = true,
                "Schema {} already created", desc.target_schema
            );
        } else {
            client
                .execute(
                    format!("CREATE SCHEMA {}", ident::quote(&desc.target_schema)?).as_str(),
                    &[],
                )
                .await
                .map_err(|e| OpsError::sync(&desc.target_table, e.to_string()))?;
            info!(
                job = "TableSyncer",
                success = true,
                "Schema {} created", desc.target_schema
            );
        }

        if !introspector
            .table_exists(&desc.target_schema, &desc.target_table)
            .await?
        {
            let ddl = render_create_target(desc, columns)?;
            client
                .execute(ddl.as_str(), &[])
                .await
                .map_err(|e| OpsError::sync(&desc.target_table, e.to_string()))?;
            info!(
                job = "TableSyncer",
                success = true,
                target_table = %desc.target_table,
                "Created target table"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_col(name: &str, data_type: &str, max_length: Option<i32>) -> LiveColumn {
        LiveColumn {
            name: name.into(),
            data_type: data_type.into(),
            udt_name: data_type.into(),
            max_length,
            nullable: true,
            ordinal: 1,
        }
    }

    fn stl_query_descriptor() -> SyncTableDescriptor {
        SyncTableDescriptor {
            source_schema: "pg_catalog".into(),
            source_table: "stl_query".into(),
            target_schema: "system_tables".into(),
            target_table: "stl_query".into(),
            primary_key: KeySpec::One("userid".into()),
            timestamp_column: "endtime".into(),
        }
    }

    fn stl_query_columns() -> Vec<LiveColumn> {
        vec![
            live_col("userid", "integer", None),
            live_col("querytxt", "character varying", Some(4000)),
            live_col("endtime", "timestamp without time zone", None),
        ]
    }

    #[test]
    fn test_descriptor_yaml_with_single_key() {
        let yaml = r#"
tables:
  - source_schema: pg_catalog
    source_table: stl_query
    target_schema: system_tables
    target_table: stl_query
    primary_key: userid
    timestamp_column: endtime
"#;
        let file: SyncTablesFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.tables.len(), 1);
        assert_eq!(file.tables[0].primary_key.columns(), vec!["userid"]);
        file.tables[0].validate().unwrap();
    }

    #[test]
    fn test_descriptor_yaml_with_composite_key() {
        let yaml = r#"
tables:
  - source_schema: pg_catalog
    source_table: stl_load_errors
    target_schema: system_tables
    target_table: stl_load_errors
    primary_key: [userid, slice]
    timestamp_column: starttime
"#;
        let file: SyncTablesFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.tables[0].primary_key.columns(), vec!["userid", "slice"]);
    }

    #[test]
    fn test_render_live_type() {
        assert_eq!(
            render_live_type(&live_col("querytxt", "character varying", Some(4000))),
            "character varying(4000)"
        );
        assert_eq!(render_live_type(&live_col("userid", "integer", None)), "integer");
        assert_eq!(
            render_live_type(&live_col("endtime", "timestamp without time zone", None)),
            "timestamp without time zone"
        );
    }

    #[test]
    fn test_render_create_target_carries_primary_key() {
        let ddl = render_create_target(&stl_query_descriptor(), &stl_query_columns()).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE \"system_tables\".\"stl_query\" (\n    \
             \"userid\" integer,\n    \
             \"querytxt\" character varying(4000),\n    \
             \"endtime\" timestamp without time zone,\n    \
             PRIMARY KEY (\"userid\")\n)"
        );
    }

    #[test]
    fn test_render_copy_merge() {
        let sql = render_copy_statement(
            &stl_query_descriptor(),
            &stl_query_columns(),
            UpsertStrategy::Merge,
        )
        .unwrap();

        assert!(sql.starts_with("MERGE INTO \"system_tables\".\"stl_query\" AS t\nUSING ("));
        assert!(sql.contains(
            "ROW_NUMBER() OVER (PARTITION BY \"userid\" ORDER BY \"endtime\" DESC) AS row_num"
        ));
        assert!(sql.contains("WHERE \"endtime\" > $1"));
        assert!(sql.contains("WHERE row_num = 1"));
        assert!(sql.contains("ON t.\"userid\" = s.\"userid\""));
        assert!(sql.contains(
            "WHEN MATCHED AND s.\"endtime\" > t.\"endtime\" THEN UPDATE SET \
             \"querytxt\" = s.\"querytxt\", \"endtime\" = s.\"endtime\""
        ));
        assert!(sql.contains(
            "WHEN NOT MATCHED THEN INSERT (\"userid\", \"querytxt\", \"endtime\") \
             VALUES (s.\"userid\", s.\"querytxt\", s.\"endtime\")"
        ));
        // The merge key is never part of the update set.
        assert!(!sql.contains("\"userid\" = s.\"userid\","));
    }

    #[test]
    fn test_render_copy_insert_on_conflict() {
        let sql = render_copy_statement(
            &stl_query_descriptor(),
            &stl_query_columns(),
            UpsertStrategy::InsertOnConflict,
        )
        .unwrap();

        assert!(sql.starts_with(
            "INSERT INTO \"system_tables\".\"stl_query\" \
             (\"userid\", \"querytxt\", \"endtime\")"
        ));
        assert!(sql.contains("WHERE \"endtime\" > $1"));
        assert!(sql.contains("ON CONFLICT (\"userid\") DO UPDATE SET"));
        assert!(sql.contains("\"querytxt\" = EXCLUDED.\"querytxt\""));
        assert!(!sql.contains("\"userid\" = EXCLUDED.\"userid\""));
    }

    #[test]
    fn test_render_copy_composite_key() {
        let desc = SyncTableDescriptor {
            primary_key: KeySpec::Many(vec!["userid".into(), "querytxt".into()]),
            ..stl_query_descriptor()
        };
        let sql =
            render_copy_statement(&desc, &stl_query_columns(), UpsertStrategy::Merge).unwrap();
        assert!(sql.contains("PARTITION BY \"userid\", \"querytxt\""));
        assert!(sql.contains("ON t.\"userid\" = s.\"userid\" AND t.\"querytxt\" = s.\"querytxt\""));
        assert!(sql.contains("UPDATE SET \"endtime\" = s.\"endtime\""));
    }

    #[test]
    fn test_descriptor_rejects_empty_key_list() {
        let desc = SyncTableDescriptor {
            primary_key: KeySpec::Many(vec![]),
            ..stl_query_descriptor()
        };
        assert!(desc.validate().is_err());
    }
}
