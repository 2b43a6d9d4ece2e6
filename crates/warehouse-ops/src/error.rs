//! Error types for the warehouse operations library.

use thiserror::Error;

/// Main error type for warehouse operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// Configuration error (invalid YAML, missing fields, bad identifiers, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Warehouse connection or statement error
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] tokio_postgres::Error),

    /// Connection pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// DDL statement failed while reconciling a table
    #[error("DDL failed for table {table}: {message}")]
    Ddl { table: String, message: String },

    /// Extraction transaction failed for an intake table
    #[error("Extraction failed for table {table}: {message}")]
    Extraction { table: String, message: String },

    /// Incremental sync failed for a target table
    #[error("Sync failed for table {table}: {message}")]
    Sync { table: String, message: String },

    /// The extractor was asked to process a table it has no mapping for
    #[error("Invalid source table: {0}")]
    InvalidSourceTable(String),

    /// Field mapping order no longer matches the target table's physical columns
    #[error(
        "Field mapping for {table} does not match target column order: \
         mapping [{expected}], live [{found}]"
    )]
    MappingDrift {
        table: String,
        expected: String,
        found: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OpsError {
    /// Create a Ddl error with the failing table's context.
    pub fn ddl(table: impl Into<String>, message: impl Into<String>) -> Self {
        OpsError::Ddl {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an Extraction error.
    pub fn extraction(table: impl Into<String>, message: impl Into<String>) -> Self {
        OpsError::Extraction {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Sync error.
    pub fn sync(table: impl Into<String>, message: impl Into<String>) -> Self {
        OpsError::Sync {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI: configuration problems are
    /// distinguishable from execution failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            OpsError::Config(_)
            | OpsError::InvalidSourceTable(_)
            | OpsError::MappingDrift { .. }
            | OpsError::Yaml(_) => 2,
            _ => 1,
        }
    }
}

impl From<deadpool_postgres::PoolError> for OpsError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        OpsError::Pool(e.to_string())
    }
}

/// Result type alias for warehouse operations.
pub type Result<T> = std::result::Result<T, OpsError>;
