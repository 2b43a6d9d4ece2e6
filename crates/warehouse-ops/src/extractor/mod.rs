//! Semi-structured column extractor.
//!
//! Projects fields out of an intake table's payload column into typed
//! columns in the mapped target table. One run is a single transaction:
//! lock the intake table, materialize a staging table with the casts
//! applied, drop duplicate business keys keeping the newest ingestion,
//! merge into the target, truncate the intake. Truncation is safe because
//! the lock taken at the start is held for the whole transaction; re-runs
//! with no new intake rows are no-ops.

mod mapping;

pub use mapping::{ExtractType, ExtractionMappings, FieldMapping, TableMapping};

use crate::catalog::{CatalogIntrospector, Introspect};
use crate::config::ExtractorConfig;
use crate::dialect::{Dialect, UpsertStrategy};
use crate::error::{OpsError, Result};
use crate::ident;
use crate::pool::WarehousePool;
use tracing::{error, info};

/// Column carrying the raw semi-structured payload on intake, staging,
/// and target tables.
pub const PAYLOAD_COLUMN: &str = "payload";

/// Column carrying the ingestion timestamp; newest wins at dedup time.
pub const INGESTED_AT_COLUMN: &str = "ingested_at";

/// The physical column order the target table must carry for a mapping:
/// payload and ingestion timestamp first, then the mapped columns in
/// mapping order.
pub fn expected_target_columns(mapping: &TableMapping) -> Vec<String> {
    let mut cols = vec![PAYLOAD_COLUMN.to_string(), INGESTED_AT_COLUMN.to_string()];
    cols.extend(mapping.fields.iter().map(|f| f.column.clone()));
    cols
}

/// Verify that the mapping's field order still matches the target
/// table's physical columns. The columnar engine's merge consumes the
/// staging table positionally, so silent drift here would corrupt data
/// without raising an error.
pub async fn validate_column_order<I: Introspect + ?Sized>(
    introspector: &I,
    schema: &str,
    mapping: &TableMapping,
) -> Result<()> {
    let live = introspector.columns(schema, &mapping.target_table).await?;
    let found: Vec<String> = live.into_iter().map(|c| c.name).collect();
    let expected = expected_target_columns(mapping);

    if found != expected {
        return Err(OpsError::MappingDrift {
            table: mapping.target_table.clone(),
            expected: expected.join(", "),
            found: found.join(", "),
        });
    }
    Ok(())
}

// --- statement rendering ---------------------------------------------------

fn stage_table(mapping: &TableMapping) -> String {
    format!("{}_stage", mapping.source_table)
}

pub(crate) fn render_lock(schema: &str, mapping: &TableMapping) -> Result<String> {
    Ok(format!(
        "LOCK {}",
        ident::qualify(schema, &mapping.source_table)?
    ))
}

/// Pooled sessions keep their temp namespace between checkouts, so a
/// stale staging table from an earlier run on the same session is
/// dropped before the fresh one is materialized.
pub(crate) fn render_drop_stage(mapping: &TableMapping) -> Result<String> {
    Ok(format!(
        "DROP TABLE IF EXISTS {}",
        ident::quote(&stage_table(mapping))?
    ))
}

pub(crate) fn render_create_stage(
    schema: &str,
    mapping: &TableMapping,
    dialect: Dialect,
) -> Result<String> {
    let payload = ident::quote(PAYLOAD_COLUMN)?;
    let ingested_at = ident::quote(INGESTED_AT_COLUMN)?;

    let mut selects = vec![payload.clone(), ingested_at];
    for field in &mapping.fields {
        let expr = dialect.json_path_expr(
            &payload,
            &field.path,
            field.datatype.extracted_as_text(),
        );
        selects.push(format!(
            "{}::{} AS {}",
            expr,
            field.datatype.sql(),
            ident::quote(&field.column)?
        ));
    }

    Ok(format!(
        "CREATE TEMP TABLE {} AS\nSELECT\n    {}\nFROM {}",
        ident::quote(&stage_table(mapping))?,
        selects.join(",\n    "),
        ident::qualify(schema, &mapping.source_table)?
    ))
}

/// Rank-and-delete dedup: partition staged rows by business key, order
/// newest ingestion first, delete everything past rank 1.
pub(crate) fn render_dedup_stage(mapping: &TableMapping) -> Result<String> {
    let stage = ident::quote(&stage_table(mapping))?;
    let key = ident::quote(&mapping.business_key)?;
    let ingested_at = ident::quote(INGESTED_AT_COLUMN)?;

    Ok(format!(
        "WITH duplicate_rows AS (\n    \
         SELECT {key},\n           \
         ROW_NUMBER() OVER (PARTITION BY {key} ORDER BY {ingested_at} DESC) AS row_num\n    \
         FROM {stage}\n)\n\
         DELETE FROM {stage}\n\
         USING duplicate_rows\n\
         WHERE duplicate_rows.{key} = {stage}.{key} AND duplicate_rows.row_num > 1",
        key = key,
        ingested_at = ingested_at,
        stage = stage,
    ))
}

pub(crate) fn render_merge(
    schema: &str,
    mapping: &TableMapping,
    dialect: Dialect,
) -> Result<String> {
    let target = ident::qualify(schema, &mapping.target_table)?;
    let stage = ident::quote(&stage_table(mapping))?;
    let key = ident::quote(&mapping.business_key)?;

    match dialect.upsert_strategy() {
        UpsertStrategy::Merge => Ok(format!(
            "MERGE INTO {target}\nUSING {stage}\nON {target}.{key} = {stage}.{key}\n\
             REMOVE DUPLICATES",
            target = target,
            stage = stage,
            key = key,
        )),
        UpsertStrategy::InsertOnConflict => {
            let mut columns = vec![
                ident::quote(PAYLOAD_COLUMN)?,
                ident::quote(INGESTED_AT_COLUMN)?,
            ];
            for field in &mapping.fields {
                columns.push(ident::quote(&field.column)?);
            }
            let updates: Vec<String> = columns
                .iter()
                .map(|c| format!("{} = EXCLUDED.{}", c, c))
                .collect();

            Ok(format!(
                "INSERT INTO {} ({})\nSELECT * FROM {}\n\
                 ON CONFLICT ({}) DO UPDATE SET\n    {}",
                target,
                columns.join(", "),
                stage,
                key,
                updates.join(",\n    ")
            ))
        }
    }
}

pub(crate) fn render_truncate(schema: &str, mapping: &TableMapping) -> Result<String> {
    Ok(format!(
        "TRUNCATE {}",
        ident::qualify(schema, &mapping.source_table)?
    ))
}

/// All statements for one extraction run, in execution order.
pub(crate) fn build_statements(
    schema: &str,
    mapping: &TableMapping,
    dialect: Dialect,
) -> Result<Vec<String>> {
    Ok(vec![
        render_lock(schema, mapping)?,
        render_drop_stage(mapping)?,
        render_create_stage(schema, mapping, dialect)?,
        render_dedup_stage(mapping)?,
        render_merge(schema, mapping, dialect)?,
        render_truncate(schema, mapping)?,
    ])
}

// --- execution -------------------------------------------------------------

/// Extracts typed columns from intake payload rows.
pub struct ColumnExtractor {
    pool: WarehousePool,
    schema: String,
    mappings: ExtractionMappings,
}

impl ColumnExtractor {
    /// Build an extractor, loading the mapping file named in the config.
    pub fn new(pool: WarehousePool, config: &ExtractorConfig) -> Result<Self> {
        let mappings = ExtractionMappings::load(&config.mappings_file)?;
        Ok(Self::with_mappings(pool, config.schema.clone(), mappings))
    }

    pub fn with_mappings(
        pool: WarehousePool,
        schema: String,
        mappings: ExtractionMappings,
    ) -> Self {
        Self {
            pool,
            schema,
            mappings,
        }
    }

    /// Run one extraction for an intake table. Deterministic for fixed
    /// intake contents and safe to re-run: the merge is idempotent and
    /// the intake is only truncated after it succeeds.
    pub async fn extract(&self, source_table: &str) -> Result<()> {
        let mapping = self.mappings.for_source(source_table)?;
        let dialect = self.pool.dialect();
        let statements = build_statements(&self.schema, mapping, dialect)?;

        info!(
            job = "ColumnExtractor",
            source_table = %mapping.source_table,
            target_table = %mapping.target_table,
            "Processing intake rows"
        );

        let mut client = self.pool.client().await?;

        {
            let introspector = CatalogIntrospector::new(&client, dialect);
            validate_column_order(&introspector, &self.schema, mapping).await?;
        }

        let tx = client.transaction().await?;
        for sql in &statements {
            tx.execute(sql.as_str(), &[]).await.map_err(|e| {
                error!(
                    job = "ColumnExtractor",
                    success = false,
                    source_table = %mapping.source_table,
                    "Extraction statement failed: {}", e
                );
                OpsError::extraction(&mapping.source_table, e.to_string())
            })?;
        }
        tx.commit().await?;

        info!(
            job = "ColumnExtractor",
            success = true,
            source_table = %mapping.source_table,
            target_table = %mapping.target_table,
            "Extraction completed"
        );
        Ok(())
    }
}
