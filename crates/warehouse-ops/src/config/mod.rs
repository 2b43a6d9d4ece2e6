//! Configuration loading and validation.

use crate::dialect::Dialect;
use crate::error::{OpsError, Result};
use crate::ident;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Warehouse connection.
    pub warehouse: WarehouseConfig,

    /// Schema reconciler settings.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Column extractor settings.
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// System table syncer settings.
    #[serde(default)]
    pub syncer: SyncerConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.warehouse.host.is_empty() {
            return Err(OpsError::Config("warehouse.host is required".into()));
        }
        if self.warehouse.database.is_empty() {
            return Err(OpsError::Config("warehouse.database is required".into()));
        }
        if self.warehouse.user.is_empty() {
            return Err(OpsError::Config("warehouse.user is required".into()));
        }
        if self.warehouse.max_connections == 0 {
            return Err(OpsError::Config(
                "warehouse.max_connections must be at least 1".into(),
            ));
        }
        ident::validate_identifier(&self.reconciler.schema)?;
        ident::validate_identifier(&self.extractor.schema)?;
        ident::validate_identifier(&self.syncer.metadata_schema)?;
        Ok(())
    }
}

/// Warehouse connection configuration.
///
/// Both engines speak the PostgreSQL wire protocol; `dialect` selects
/// which capability set generated SQL is rendered against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5439, the columnar engine's default).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Engine dialect (default: redshift).
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,

    /// Connection pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Schema reconciler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Schema the declared tables live in.
    #[serde(default = "default_logs_schema")]
    pub schema: String,

    /// Path to the declarative table spec YAML.
    #[serde(default = "default_spec_file")]
    pub spec_file: PathBuf,

    /// Whether live columns absent from the spec are dropped. The spec is
    /// the single source of truth for warehouse-facing tables, so this
    /// defaults on; turning it off logs drift instead of correcting it.
    #[serde(default = "default_true")]
    pub allow_destructive_drift: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            schema: default_logs_schema(),
            spec_file: default_spec_file(),
            allow_destructive_drift: true,
        }
    }
}

/// Column extractor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Schema holding the intake and target tables.
    #[serde(default = "default_logs_schema")]
    pub schema: String,

    /// Path to the field-mapping YAML.
    #[serde(default = "default_mappings_file")]
    pub mappings_file: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            schema: default_logs_schema(),
            mappings_file: default_mappings_file(),
        }
    }
}

/// System table syncer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncerConfig {
    /// Schema holding the sync watermark metadata table.
    #[serde(default = "default_metadata_schema")]
    pub metadata_schema: String,

    /// Path to the sync descriptor YAML.
    #[serde(default = "default_tables_file")]
    pub tables_file: PathBuf,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            metadata_schema: default_metadata_schema(),
            tables_file: default_tables_file(),
        }
    }
}

fn default_port() -> u16 {
    5439
}

fn default_dialect() -> Dialect {
    Dialect::Redshift
}

fn default_max_connections() -> usize {
    4
}

fn default_logs_schema() -> String {
    "logs".to_string()
}

fn default_metadata_schema() -> String {
    "system_metadata".to_string()
}

fn default_spec_file() -> PathBuf {
    PathBuf::from("include_columns.yml")
}

fn default_mappings_file() -> PathBuf {
    PathBuf::from("extract_mappings.yml")
}

fn default_tables_file() -> PathBuf {
    PathBuf::from("system_tables.yml")
}

fn default_true() -> bool {
    true
}
