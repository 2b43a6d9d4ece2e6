//! Declarative table specifications.
//!
//! The reconciler's input: a YAML list of table descriptors, each with an
//! ordered column list, an optional primary key, and optional foreign
//! keys. Specs are read fresh on every run and compared against the live
//! catalog; they are never persisted.

use crate::dialect::Dialect;
use crate::error::{OpsError, Result};
use crate::ident;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::error;

/// Dialect-neutral column datatypes. Mapped to a concrete engine type
/// only at statement-rendering time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Json,
}

impl LogicalType {
    /// Whether this type renders as a VARCHAR family type.
    pub fn is_string(&self) -> bool {
        matches!(self, LogicalType::String | LogicalType::Text)
    }

    /// Concrete engine type for this logical type, with an optional
    /// length for string types.
    pub fn concrete_type(&self, dialect: Dialect, limit: Option<u32>) -> String {
        match self {
            LogicalType::String | LogicalType::Text => match limit {
                Some(n) => format!("VARCHAR({})", n),
                None => "VARCHAR".to_string(),
            },
            LogicalType::Integer => "INTEGER".to_string(),
            LogicalType::Float => "DOUBLE PRECISION".to_string(),
            LogicalType::Boolean => "BOOLEAN".to_string(),
            LogicalType::Timestamp => "TIMESTAMP".to_string(),
            LogicalType::Json => dialect.json_storage_type().to_string(),
        }
    }

    /// Whether a live column's reported type satisfies this logical type.
    /// Length differences are judged separately.
    pub fn matches_live(&self, data_type: &str, dialect: Dialect) -> bool {
        let live = data_type.to_lowercase();
        let live = live.as_str();
        match self {
            LogicalType::String | LogicalType::Text => {
                matches!(live, "character varying" | "varchar" | "text")
            }
            LogicalType::Integer => matches!(
                live,
                "integer" | "int4" | "bigint" | "int8" | "smallint" | "int2"
            ),
            LogicalType::Float => {
                matches!(live, "double precision" | "float8" | "real" | "float4")
            }
            LogicalType::Boolean => matches!(live, "boolean" | "bool"),
            LogicalType::Timestamp => matches!(
                live,
                "timestamp without time zone"
                    | "timestamp"
                    | "timestamp with time zone"
                    | "timestamptz"
            ),
            LogicalType::Json => match dialect {
                Dialect::Redshift => live == "super",
                Dialect::Postgres => matches!(live, "jsonb" | "json"),
            },
        }
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,

    /// Logical datatype.
    pub datatype: LogicalType,

    /// Declared length for string types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Whether the column is declared NOT NULL.
    #[serde(default)]
    pub not_null: bool,
}

impl ColumnSpec {
    /// The length this column should carry live: the declared limit, or
    /// the dialect's default for unsized string columns.
    pub fn effective_limit(&self, dialect: Dialect) -> Option<u32> {
        if self.datatype.is_string() {
            self.limit.or(dialect.default_string_limit())
        } else {
            None
        }
    }

    /// Concrete engine type for this column.
    pub fn concrete_type(&self, dialect: Dialect) -> String {
        self.datatype
            .concrete_type(dialect, self.effective_limit(dialect))
    }
}

/// A declared foreign key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    /// Referencing column on the declaring table.
    pub column: String,

    /// Referenced table and column.
    pub references: ForeignKeyTarget,
}

/// The referenced side of a foreign key, within the same schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyTarget {
    pub table: String,
    pub column: String,
}

/// One declared table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    /// Unqualified table name; the reconciler supplies the schema.
    pub table: String,

    /// Ordered column list.
    pub include_columns: Vec<ColumnSpec>,

    /// Declared primary key column, if any. At most one column per table
    /// may be the primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Declared foreign keys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl TableSpec {
    /// Validate identifiers and internal consistency.
    pub fn validate(&self) -> Result<()> {
        ident::validate_identifier(&self.table)?;

        if self.include_columns.is_empty() {
            return Err(OpsError::Config(format!(
                "Table {} declares no columns",
                self.table
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for col in &self.include_columns {
            ident::validate_identifier(&col.name)?;
            if !seen.insert(col.name.as_str()) {
                return Err(OpsError::Config(format!(
                    "Table {} declares column {} more than once",
                    self.table, col.name
                )));
            }
        }

        if let Some(pk) = &self.primary_key {
            if !seen.contains(pk.as_str()) {
                return Err(OpsError::Config(format!(
                    "Table {} declares primary key {} but no such column",
                    self.table, pk
                )));
            }
        }

        for fk in &self.foreign_keys {
            if !seen.contains(fk.column.as_str()) {
                return Err(OpsError::Config(format!(
                    "Table {} declares foreign key on {} but no such column",
                    self.table, fk.column
                )));
            }
            ident::validate_identifier(&fk.references.table)?;
            ident::validate_identifier(&fk.references.column)?;
        }

        Ok(())
    }

    /// Look up a declared column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.include_columns.iter().find(|c| c.name == name)
    }
}

/// Load table specs from a YAML file.
///
/// A missing or unreadable file is logged and reported as `None` so the
/// caller can return early without touching the warehouse. A file that
/// reads but does not parse, or that parses into an invalid spec, is a
/// configuration error.
pub fn load_table_specs(path: &Path) -> Result<Option<Vec<TableSpec>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(
                job = "SchemaReconciler",
                success = false,
                path = %path.display(),
                "Error loading schema spec file: {}", e
            );
            return Ok(None);
        }
    };

    let specs: Vec<TableSpec> = serde_yaml::from_str(&content)?;
    for spec in &specs {
        spec.validate()?;
    }
    Ok(Some(specs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_YAML: &str = r#"
- table: events
  include_columns:
    - name: id
      datatype: string
      not_null: true
    - name: time
      datatype: timestamp
    - name: payload
      datatype: json
    - name: path
      datatype: string
      limit: 12000
  primary_key: id
- table: agencies
  include_columns:
    - name: id
      datatype: integer
      not_null: true
    - name: name
      datatype: text
  primary_key: id
  foreign_keys:
    - column: id
      references:
        table: agency_statuses
        column: agency_id
"#;

    #[test]
    fn test_parse_sample_yaml() {
        let specs: Vec<TableSpec> = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        assert_eq!(specs.len(), 2);

        let events = &specs[0];
        assert_eq!(events.table, "events");
        assert_eq!(events.include_columns.len(), 4);
        assert_eq!(events.primary_key.as_deref(), Some("id"));
        assert!(events.foreign_keys.is_empty());
        assert!(events.include_columns[0].not_null);
        assert!(!events.include_columns[1].not_null);
        assert_eq!(events.include_columns[3].limit, Some(12000));

        let agencies = &specs[1];
        assert_eq!(agencies.foreign_keys.len(), 1);
        assert_eq!(agencies.foreign_keys[0].references.table, "agency_statuses");

        for spec in &specs {
            spec.validate().unwrap();
        }
    }

    #[test]
    fn test_concrete_types() {
        assert_eq!(
            LogicalType::Json.concrete_type(Dialect::Redshift, None),
            "SUPER"
        );
        assert_eq!(
            LogicalType::Json.concrete_type(Dialect::Postgres, None),
            "JSONB"
        );
        assert_eq!(
            LogicalType::String.concrete_type(Dialect::Redshift, Some(300)),
            "VARCHAR(300)"
        );
        assert_eq!(LogicalType::Integer.concrete_type(Dialect::Postgres, None), "INTEGER");
        assert_eq!(
            LogicalType::Float.concrete_type(Dialect::Redshift, None),
            "DOUBLE PRECISION"
        );
    }

    #[test]
    fn test_effective_limit_defaults_on_columnar_only() {
        let col = ColumnSpec {
            name: "name".into(),
            datatype: LogicalType::String,
            limit: None,
            not_null: false,
        };
        assert_eq!(col.effective_limit(Dialect::Redshift), Some(256));
        assert_eq!(col.effective_limit(Dialect::Postgres), None);
        assert_eq!(col.concrete_type(Dialect::Redshift), "VARCHAR(256)");
        assert_eq!(col.concrete_type(Dialect::Postgres), "VARCHAR");

        let sized = ColumnSpec {
            limit: Some(100),
            ..col.clone()
        };
        assert_eq!(sized.effective_limit(Dialect::Redshift), Some(100));

        let int_col = ColumnSpec {
            name: "n".into(),
            datatype: LogicalType::Integer,
            limit: None,
            not_null: false,
        };
        assert_eq!(int_col.effective_limit(Dialect::Redshift), None);
    }

    #[test]
    fn test_matches_live() {
        assert!(LogicalType::String.matches_live("character varying", Dialect::Redshift));
        assert!(LogicalType::Text.matches_live("varchar", Dialect::Postgres));
        assert!(LogicalType::Json.matches_live("super", Dialect::Redshift));
        assert!(!LogicalType::Json.matches_live("super", Dialect::Postgres));
        assert!(LogicalType::Json.matches_live("jsonb", Dialect::Postgres));
        assert!(LogicalType::Timestamp.matches_live("timestamp without time zone", Dialect::Redshift));
        assert!(!LogicalType::Integer.matches_live("character varying", Dialect::Postgres));
        assert!(LogicalType::Float.matches_live("double precision", Dialect::Redshift));
    }

    #[test]
    fn test_validate_rejects_unknown_primary_key() {
        let spec = TableSpec {
            table: "events".into(),
            include_columns: vec![ColumnSpec {
                name: "id".into(),
                datatype: LogicalType::String,
                limit: None,
                not_null: true,
            }],
            primary_key: Some("uuid".into()),
            foreign_keys: vec![],
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let col = ColumnSpec {
            name: "id".into(),
            datatype: LogicalType::String,
            limit: None,
            not_null: false,
        };
        let spec = TableSpec {
            table: "events".into(),
            include_columns: vec![col.clone(), col],
            primary_key: None,
            foreign_keys: vec![],
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.yml");
        let loaded = load_table_specs(&path).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("include_columns.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE_YAML.as_bytes()).unwrap();

        let loaded = load_table_specs(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("include_columns.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"table: [unterminated").unwrap();

        assert!(load_table_specs(&path).is_err());
    }
}
