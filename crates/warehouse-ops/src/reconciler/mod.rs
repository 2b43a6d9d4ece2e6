//! Schema reconciler.
//!
//! Diffs a declarative table specification against the live warehouse
//! schema and executes the DDL needed to bring the live tables into
//! conformance: create missing tables, add/retype/resize/drop columns,
//! and create primary and foreign keys. The spec is the single source of
//! truth for warehouse-facing tables.
//!
//! Key preconditions are verified through the catalog rather than trusted
//! from the spec: a primary key is only added to a column the catalog
//! reports NOT NULL, and a foreign key's referenced column gets a UNIQUE
//! constraint first when it carries neither a PK nor a UNIQUE already.

use crate::catalog::{CatalogIntrospector, Introspect, LiveColumn};
use crate::config::ReconcilerConfig;
use crate::dialect::Dialect;
use crate::error::{OpsError, Result};
use crate::ident;
use crate::pool::WarehousePool;
use crate::schema::{self, ColumnSpec, ForeignKeySpec, TableSpec};
use std::path::PathBuf;
use tokio_postgres::Client;
use tracing::{error, info, warn};

/// One column-level change needed to converge a live table on its spec.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnAction {
    /// Column declared but absent live.
    Add(ColumnSpec),

    /// String column present on both sides with only a length change;
    /// altered in place on either engine.
    AlterStringLength { name: String, new_limit: Option<u32> },

    /// Column present on both sides with a type mismatch. Rebuilt via
    /// rename/backfill/drop on engines without in-place retyping.
    Retype(ColumnSpec),

    /// Column present live but absent from the spec.
    Drop { name: String },
}

/// Diff declared columns against the live column list.
///
/// Running the diff against a table that already conforms yields no
/// actions, so a second reconciliation run is a no-op.
pub fn diff_columns(
    spec_cols: &[ColumnSpec],
    live: &[LiveColumn],
    dialect: Dialect,
) -> Vec<ColumnAction> {
    let mut actions = Vec::new();

    for col in spec_cols {
        let live_col = live.iter().find(|l| l.name == col.name);
        let Some(live_col) = live_col else {
            actions.push(ColumnAction::Add(col.clone()));
            continue;
        };

        let type_matches = col.datatype.matches_live(&live_col.data_type, dialect)
            || col.datatype.matches_live(&live_col.udt_name, dialect);
        let live_is_string = matches!(
            live_col.data_type.to_lowercase().as_str(),
            "character varying" | "varchar" | "text"
        );
        let limit_changed =
            live_col.max_length.map(|n| n as u32) != col.effective_limit(dialect);

        if type_matches && col.datatype.is_string() && live_is_string && limit_changed {
            actions.push(ColumnAction::AlterStringLength {
                name: col.name.clone(),
                new_limit: col.effective_limit(dialect),
            });
        } else if !type_matches {
            actions.push(ColumnAction::Retype(col.clone()));
        }
    }

    for live_col in live {
        if !spec_cols.iter().any(|c| c.name == live_col.name) {
            actions.push(ColumnAction::Drop {
                name: live_col.name.clone(),
            });
        }
    }

    actions
}

// --- statement rendering ---------------------------------------------------

pub(crate) fn render_create_table(
    schema: &str,
    spec: &TableSpec,
    dialect: Dialect,
) -> Result<String> {
    let mut ddl = format!("CREATE TABLE {} (\n", ident::qualify(schema, &spec.table)?);

    for (i, col) in spec.include_columns.iter().enumerate() {
        let not_null = if col.not_null { " NOT NULL" } else { "" };
        ddl.push_str(&format!(
            "    {} {}{}",
            ident::quote(&col.name)?,
            col.concrete_type(dialect),
            not_null
        ));
        if i < spec.include_columns.len() - 1 {
            ddl.push_str(",\n");
        } else {
            ddl.push('\n');
        }
    }

    ddl.push(')');
    Ok(ddl)
}

pub(crate) fn render_add_column(
    schema: &str,
    table: &str,
    col: &ColumnSpec,
    dialect: Dialect,
) -> Result<String> {
    let not_null = if col.not_null { " NOT NULL" } else { "" };
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} {}{}",
        ident::qualify(schema, table)?,
        ident::quote(&col.name)?,
        col.concrete_type(dialect),
        not_null
    ))
}

pub(crate) fn render_drop_column(schema: &str, table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
        ident::qualify(schema, table)?,
        ident::quote(column)?
    ))
}

pub(crate) fn render_rename_column(
    schema: &str,
    table: &str,
    from: &str,
    to: &str,
) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        ident::qualify(schema, table)?,
        ident::quote(from)?,
        ident::quote(to)?
    ))
}

pub(crate) fn render_backfill(
    schema: &str,
    table: &str,
    from: &str,
    to: &str,
) -> Result<String> {
    Ok(format!(
        "UPDATE {} SET {} = {}",
        ident::qualify(schema, table)?,
        ident::quote(to)?,
        ident::quote(from)?
    ))
}

pub(crate) fn render_alter_string_length(
    schema: &str,
    table: &str,
    column: &str,
    new_limit: Option<u32>,
) -> Result<String> {
    let new_type = match new_limit {
        Some(n) => format!("VARCHAR({})", n),
        None => "VARCHAR".to_string(),
    };
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
        ident::qualify(schema, table)?,
        ident::quote(column)?,
        new_type
    ))
}

pub(crate) fn render_retype_in_place(
    schema: &str,
    table: &str,
    col: &ColumnSpec,
    dialect: Dialect,
) -> Result<String> {
    let new_type = col.concrete_type(dialect);
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
        ident::qualify(schema, table)?,
        ident::quote(&col.name)?,
        new_type,
        ident::quote(&col.name)?,
        new_type
    ))
}

pub(crate) fn render_add_primary_key(
    schema: &str,
    table: &str,
    column: &str,
    dialect: Dialect,
) -> Result<String> {
    if dialect.supports_named_key_constraints() {
        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            ident::qualify(schema, table)?,
            ident::quote(&format!("{}_{}_pkey", table, column))?,
            ident::quote(column)?
        ))
    } else {
        Ok(format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            ident::qualify(schema, table)?,
            ident::quote(column)?
        ))
    }
}

pub(crate) fn render_add_unique(
    schema: &str,
    table: &str,
    column: &str,
    dialect: Dialect,
) -> Result<String> {
    if dialect.supports_named_key_constraints() {
        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            ident::qualify(schema, table)?,
            ident::quote(&format!("{}_{}_unique", table, column))?,
            ident::quote(column)?
        ))
    } else {
        Ok(format!(
            "ALTER TABLE {} ADD UNIQUE ({})",
            ident::qualify(schema, table)?,
            ident::quote(column)?
        ))
    }
}

pub(crate) fn render_add_foreign_key(
    schema: &str,
    table: &str,
    fk: &ForeignKeySpec,
) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        ident::qualify(schema, table)?,
        ident::quote(&format!("{}_{}_fkey", table, fk.column))?,
        ident::quote(&fk.column)?,
        ident::qualify(schema, &fk.references.table)?,
        ident::quote(&fk.references.column)?
    ))
}

// --- execution -------------------------------------------------------------

struct PendingForeignKey {
    table: String,
    fk: ForeignKeySpec,
}

/// Reconciles declared table specs against the live warehouse schema.
pub struct SchemaReconciler {
    pool: WarehousePool,
    schema: String,
    spec_file: PathBuf,
    allow_destructive_drift: bool,
}

impl SchemaReconciler {
    pub fn new(pool: WarehousePool, config: &ReconcilerConfig) -> Self {
        Self {
            pool,
            schema: config.schema.clone(),
            spec_file: config.spec_file.clone(),
            allow_destructive_drift: config.allow_destructive_drift,
        }
    }

    /// Load the spec file and reconcile every table in it.
    ///
    /// A missing or unreadable spec file performs no DDL; the load step
    /// logs and the run returns early.
    pub async fn run(&self) -> Result<()> {
        let Some(specs) = schema::load_table_specs(&self.spec_file)? else {
            return Ok(());
        };
        self.reconcile(&specs).await
    }

    /// Reconcile the given table specs. Any DDL failure aborts the whole
    /// run; later steps (the deferred foreign key pass in particular)
    /// depend on earlier DDL having succeeded.
    pub async fn reconcile(&self, specs: &[TableSpec]) -> Result<()> {
        let client = self.pool.client().await?;
        let dialect = self.pool.dialect();
        let introspector = CatalogIntrospector::new(&client, dialect);

        let mut pending_fks: Vec<PendingForeignKey> = Vec::new();

        for spec in specs {
            if introspector.table_exists(&self.schema, &spec.table).await? {
                self.update_existing_table(&client, &introspector, spec)
                    .await?;
            } else {
                self.create_table(&client, &introspector, spec, &mut pending_fks)
                    .await?;
            }
        }

        self.process_foreign_keys(&client, &introspector, &pending_fks)
            .await?;

        info!(
            job = "SchemaReconciler",
            success = true,
            tables = specs.len(),
            "Schema reconciled"
        );
        Ok(())
    }

    async fn create_table(
        &self,
        client: &Client,
        introspector: &CatalogIntrospector<'_>,
        spec: &TableSpec,
        pending_fks: &mut Vec<PendingForeignKey>,
    ) -> Result<()> {
        let dialect = self.pool.dialect();
        let ddl = render_create_table(&self.schema, spec, dialect)?;
        self.execute_ddl(client, &spec.table, &ddl).await?;
        info!(
            job = "SchemaReconciler",
            success = true,
            table = %spec.table,
            "Table created"
        );

        match &spec.primary_key {
            Some(pk) => {
                let existing = introspector
                    .primary_key_columns(&self.schema, &spec.table)
                    .await?;
                if !existing.contains(pk) {
                    self.add_primary_key(client, introspector, &spec.table, pk)
                        .await?;
                }
            }
            None => {
                error!(
                    job = "SchemaReconciler",
                    success = false,
                    table = %spec.table,
                    "No primary key declared for table"
                );
            }
        }

        for fk in &spec.foreign_keys {
            pending_fks.push(PendingForeignKey {
                table: spec.table.clone(),
                fk: fk.clone(),
            });
        }

        Ok(())
    }

    async fn update_existing_table(
        &self,
        client: &Client,
        introspector: &CatalogIntrospector<'_>,
        spec: &TableSpec,
    ) -> Result<()> {
        let dialect = self.pool.dialect();
        let live = introspector.columns(&self.schema, &spec.table).await?;
        let actions = diff_columns(&spec.include_columns, &live, dialect);

        for action in &actions {
            match action {
                ColumnAction::Add(col) => {
                    let sql = render_add_column(&self.schema, &spec.table, col, dialect)?;
                    self.execute_ddl(client, &spec.table, &sql).await?;
                    info!(
                        job = "SchemaReconciler",
                        success = true,
                        table = %spec.table,
                        column = %col.name,
                        "Column added"
                    );
                }
                ColumnAction::AlterStringLength { name, new_limit } => {
                    let sql = render_alter_string_length(
                        &self.schema,
                        &spec.table,
                        name,
                        *new_limit,
                    )?;
                    self.execute_ddl(client, &spec.table, &sql).await?;
                    info!(
                        job = "SchemaReconciler",
                        success = true,
                        table = %spec.table,
                        column = %name,
                        "String length altered in place"
                    );
                }
                ColumnAction::Retype(col) => {
                    self.retype_column(client, &spec.table, col).await?;
                }
                ColumnAction::Drop { name } => {
                    if self.allow_destructive_drift {
                        let sql = render_drop_column(&self.schema, &spec.table, name)?;
                        self.execute_ddl(client, &spec.table, &sql).await?;
                        info!(
                            job = "SchemaReconciler",
                            success = true,
                            table = %spec.table,
                            column = %name,
                            "Undeclared column dropped"
                        );
                    } else {
                        warn!(
                            job = "SchemaReconciler",
                            table = %spec.table,
                            column = %name,
                            "Undeclared column retained (destructive drift correction disabled)"
                        );
                    }
                }
            }
        }

        self.log_primary_key_status(introspector, spec).await?;
        info!(
            job = "SchemaReconciler",
            table = %spec.table,
            "Foreign keys are not processed when updating an existing table"
        );
        Ok(())
    }

    /// Rebuild a column with a new type. Engines without in-place
    /// retyping get the rename/add/backfill/drop dance; the rest take a
    /// single ALTER.
    async fn retype_column(&self, client: &Client, table: &str, col: &ColumnSpec) -> Result<()> {
        let dialect = self.pool.dialect();

        if dialect.supports_in_place_retype() {
            let sql = render_retype_in_place(&self.schema, table, col, dialect)?;
            self.execute_ddl(client, table, &sql).await?;
        } else {
            let copy_name = format!("{}_copy", col.name);
            let steps = [
                render_rename_column(&self.schema, table, &col.name, &copy_name)?,
                render_add_column(&self.schema, table, col, dialect)?,
                render_backfill(&self.schema, table, &copy_name, &col.name)?,
                render_drop_column(&self.schema, table, &copy_name)?,
            ];
            for sql in &steps {
                self.execute_ddl(client, table, sql).await?;
            }
        }

        info!(
            job = "SchemaReconciler",
            success = true,
            table = %table,
            column = %col.name,
            "Column retyped"
        );
        Ok(())
    }

    /// Add a primary key after verifying NOT NULL through the catalog. A
    /// nullable column is never forced into a primary key; the key is
    /// skipped with a warning.
    async fn add_primary_key(
        &self,
        client: &Client,
        introspector: &CatalogIntrospector<'_>,
        table: &str,
        column: &str,
    ) -> Result<()> {
        if introspector
            .column_is_not_null(&self.schema, table, column)
            .await?
        {
            info!(
                job = "SchemaReconciler",
                table = %table,
                column = %column,
                "Verified primary key column is not null"
            );
        } else {
            warn!(
                job = "SchemaReconciler",
                table = %table,
                column = %column,
                "Primary key column is nullable; skipping primary key"
            );
            return Ok(());
        }

        let sql = render_add_primary_key(&self.schema, table, column, self.pool.dialect())?;
        self.execute_ddl(client, table, &sql).await?;
        info!(
            job = "SchemaReconciler",
            success = true,
            table = %table,
            column = %column,
            "Primary key added"
        );
        Ok(())
    }

    async fn log_primary_key_status(
        &self,
        introspector: &CatalogIntrospector<'_>,
        spec: &TableSpec,
    ) -> Result<()> {
        match &spec.primary_key {
            Some(pk) => {
                let existing = introspector
                    .primary_key_columns(&self.schema, &spec.table)
                    .await?;
                if existing.contains(pk) {
                    info!(
                        job = "SchemaReconciler",
                        table = %spec.table,
                        column = %pk,
                        "Primary key already satisfied"
                    );
                } else {
                    warn!(
                        job = "SchemaReconciler",
                        table = %spec.table,
                        column = %pk,
                        "Primary key is not processed for existing table"
                    );
                }
            }
            None => {
                warn!(
                    job = "SchemaReconciler",
                    table = %spec.table,
                    "No primary key declared for table"
                );
            }
        }
        Ok(())
    }

    /// Deferred foreign key pass, run after every table in the spec has
    /// been created or updated so declaration order never causes a
    /// missing-reference failure.
    async fn process_foreign_keys(
        &self,
        client: &Client,
        introspector: &CatalogIntrospector<'_>,
        pending: &[PendingForeignKey],
    ) -> Result<()> {
        for entry in pending {
            if introspector
                .foreign_key_exists(&self.schema, &entry.table, &entry.fk.column)
                .await?
            {
                info!(
                    job = "SchemaReconciler",
                    table = %entry.table,
                    column = %entry.fk.column,
                    "Foreign key already satisfied"
                );
                continue;
            }
            self.add_foreign_key(client, introspector, &entry.table, &entry.fk)
                .await?;
        }
        if !pending.is_empty() {
            info!(job = "SchemaReconciler", success = true, "Foreign keys processed");
        }
        Ok(())
    }

    async fn add_foreign_key(
        &self,
        client: &Client,
        introspector: &CatalogIntrospector<'_>,
        table: &str,
        fk: &ForeignKeySpec,
    ) -> Result<()> {
        let ref_table = &fk.references.table;
        let ref_column = &fk.references.column;

        if !introspector.table_exists(&self.schema, ref_table).await? {
            error!(
                job = "SchemaReconciler",
                success = false,
                table = %table,
                referenced_table = %ref_table,
                "Referenced table does not exist; skipping foreign key"
            );
            return Ok(());
        }

        if !introspector
            .column_has_key_constraint(&self.schema, ref_table, ref_column)
            .await?
        {
            warn!(
                job = "SchemaReconciler",
                referenced_table = %ref_table,
                referenced_column = %ref_column,
                "Referenced column lacks a unique or primary key constraint; adding unique"
            );
            let sql =
                render_add_unique(&self.schema, ref_table, ref_column, self.pool.dialect())?;
            self.execute_ddl(client, ref_table, &sql).await?;
            info!(
                job = "SchemaReconciler",
                success = true,
                table = %ref_table,
                column = %ref_column,
                "Unique constraint added"
            );
        }

        let sql = render_add_foreign_key(&self.schema, table, fk)?;
        self.execute_ddl(client, table, &sql).await?;
        info!(
            job = "SchemaReconciler",
            success = true,
            table = %table,
            column = %fk.column,
            "Foreign key added"
        );
        Ok(())
    }

    async fn execute_ddl(&self, client: &Client, table: &str, sql: &str) -> Result<()> {
        client.execute(sql, &[]).await.map_err(|e| {
            error!(
                job = "SchemaReconciler",
                success = false,
                table = %table,
                "DDL failed: {}", e
            );
            OpsError::ddl(table, e.to_string())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKeyTarget, LogicalType};

    fn spec_col(name: &str, datatype: LogicalType, limit: Option<u32>) -> ColumnSpec {
        ColumnSpec {
            name: name.into(),
            datatype,
            limit,
            not_null: false,
        }
    }

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

    #[test]
    fn test_diff_conforming_table_is_empty() {
        let spec = vec![
            spec_col("id", LogicalType::String, None),
            spec_col("count", LogicalType::Integer, None),
            spec_col("payload", LogicalType::Json, None),
        ];
        let live = vec![
            live_col("id", "character varying", Some(256)),
            live_col("count", "integer", None),
            live_col("payload", "super", None),
        ];
        let actions = diff_columns(&spec, &live, Dialect::Redshift);
        assert!(actions.is_empty(), "expected no actions, got {:?}", actions);
    }

    #[test]
    fn test_diff_adds_missing_column() {
        let spec = vec![
            spec_col("id", LogicalType::String, None),
            spec_col("added", LogicalType::Boolean, None),
        ];
        let live = vec![live_col("id", "character varying", Some(256))];
        let actions = diff_columns(&spec, &live, Dialect::Redshift);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], ColumnAction::Add(c) if c.name == "added"));
    }

    #[test]
    fn test_diff_length_change_is_in_place_alter() {
        let spec = vec![spec_col("foo", LogicalType::String, Some(300))];
        let live = vec![live_col("foo", "character varying", Some(100))];
        let actions = diff_columns(&spec, &live, Dialect::Redshift);
        assert_eq!(
            actions,
            vec![ColumnAction::AlterStringLength {
                name: "foo".into(),
                new_limit: Some(300),
            }]
        );
    }

    #[test]
    fn test_diff_type_mismatch_is_retype() {
        let spec = vec![spec_col("duration", LogicalType::Float, None)];
        let live = vec![live_col("duration", "character varying", Some(256))];
        let actions = diff_columns(&spec, &live, Dialect::Redshift);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], ColumnAction::Retype(c) if c.name == "duration"));
    }

    #[test]
    fn test_diff_drops_undeclared_column() {
        let spec = vec![spec_col("id", LogicalType::String, None)];
        let live = vec![
            live_col("id", "character varying", Some(256)),
            live_col("legacy", "integer", None),
        ];
        let actions = diff_columns(&spec, &live, Dialect::Redshift);
        assert_eq!(
            actions,
            vec![ColumnAction::Drop {
                name: "legacy".into()
            }]
        );
    }

    #[test]
    fn test_diff_json_matches_per_dialect() {
        let spec = vec![spec_col("payload", LogicalType::Json, None)];

        let live_redshift = vec![live_col("payload", "super", None)];
        assert!(diff_columns(&spec, &live_redshift, Dialect::Redshift).is_empty());

        let live_postgres = vec![live_col("payload", "jsonb", None)];
        assert!(diff_columns(&spec, &live_postgres, Dialect::Postgres).is_empty());

        // A jsonb column on the columnar engine needs a rebuild into SUPER.
        let actions = diff_columns(&spec, &live_postgres, Dialect::Redshift);
        assert!(matches!(&actions[0], ColumnAction::Retype(_)));
    }

    #[test]
    fn test_render_create_table() {
        let spec = TableSpec {
            table: "events".into(),
            include_columns: vec![
                ColumnSpec {
                    name: "id".into(),
                    datatype: LogicalType::String,
                    limit: None,
                    not_null: true,
                },
                spec_col("time", LogicalType::Timestamp, None),
                spec_col("payload", LogicalType::Json, None),
            ],
            primary_key: Some("id".into()),
            foreign_keys: vec![],
        };

        let ddl = render_create_table("logs", &spec, Dialect::Redshift).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE \"logs\".\"events\" (\n    \
             \"id\" VARCHAR(256) NOT NULL,\n    \
             \"time\" TIMESTAMP,\n    \
             \"payload\" SUPER\n)"
        );

        let ddl = render_create_table("logs", &spec, Dialect::Postgres).unwrap();
        assert!(ddl.contains("\"id\" VARCHAR NOT NULL"));
        assert!(ddl.contains("\"payload\" JSONB"));
    }

    #[test]
    fn test_render_primary_key_per_dialect() {
        assert_eq!(
            render_add_primary_key("logs", "events", "id", Dialect::Redshift).unwrap(),
            "ALTER TABLE \"logs\".\"events\" ADD PRIMARY KEY (\"id\")"
        );
        assert_eq!(
            render_add_primary_key("logs", "events", "id", Dialect::Postgres).unwrap(),
            "ALTER TABLE \"logs\".\"events\" ADD CONSTRAINT \"events_id_pkey\" \
             PRIMARY KEY (\"id\")"
        );
    }

    #[test]
    fn test_render_unique_per_dialect() {
        assert_eq!(
            render_add_unique("logs", "agencies", "id", Dialect::Redshift).unwrap(),
            "ALTER TABLE \"logs\".\"agencies\" ADD UNIQUE (\"id\")"
        );
        assert_eq!(
            render_add_unique("logs", "agencies", "id", Dialect::Postgres).unwrap(),
            "ALTER TABLE \"logs\".\"agencies\" ADD CONSTRAINT \"agencies_id_unique\" \
             UNIQUE (\"id\")"
        );
    }

    #[test]
    fn test_render_foreign_key() {
        let fk = ForeignKeySpec {
            column: "agency_id".into(),
            references: ForeignKeyTarget {
                table: "agencies".into(),
                column: "id".into(),
            },
        };
        assert_eq!(
            render_add_foreign_key("logs", "events", &fk).unwrap(),
            "ALTER TABLE \"logs\".\"events\" ADD CONSTRAINT \"events_agency_id_fkey\" \
             FOREIGN KEY (\"agency_id\") REFERENCES \"logs\".\"agencies\" (\"id\")"
        );
    }

    #[test]
    fn test_render_rebuild_steps() {
        let col = spec_col("duration", LogicalType::Float, None);

        assert_eq!(
            render_rename_column("logs", "production", "duration", "duration_copy").unwrap(),
            "ALTER TABLE \"logs\".\"production\" RENAME COLUMN \"duration\" TO \"duration_copy\""
        );
        assert_eq!(
            render_add_column("logs", "production", &col, Dialect::Redshift).unwrap(),
            "ALTER TABLE \"logs\".\"production\" ADD COLUMN \"duration\" DOUBLE PRECISION"
        );
        assert_eq!(
            render_backfill("logs", "production", "duration_copy", "duration").unwrap(),
            "UPDATE \"logs\".\"production\" SET \"duration\" = \"duration_copy\""
        );
        assert_eq!(
            render_drop_column("logs", "production", "duration_copy").unwrap(),
            "ALTER TABLE \"logs\".\"production\" DROP COLUMN IF EXISTS \"duration_copy\""
        );
    }

    #[test]
    fn test_render_retype_in_place() {
        let col = spec_col("status", LogicalType::Integer, None);
        assert_eq!(
            render_retype_in_place("logs", "production", &col, Dialect::Postgres).unwrap(),
            "ALTER TABLE \"logs\".\"production\" ALTER COLUMN \"status\" TYPE INTEGER \
             USING \"status\"::INTEGER"
        );
    }

    #[test]
    fn test_render_alter_string_length() {
        assert_eq!(
            render_alter_string_length("logs", "events", "path", Some(12000)).unwrap(),
            "ALTER TABLE \"logs\".\"events\" ALTER COLUMN \"path\" TYPE VARCHAR(12000)"
        );
    }
}
