//! # warehouse-ops
//!
//! Operations core for a columnar analytics warehouse:
//!
//! - **Schema reconciliation**: diff a declarative YAML table spec
//!   against the live schema and execute the DDL to converge them.
//! - **Column extraction**: project semi-structured payload fields from
//!   intake tables into typed target columns, deduplicated by business
//!   key and merged idempotently.
//! - **System table sync**: watermark-based incremental mirroring of
//!   catalog tables into a target schema.
//!
//! The production engine (Redshift) and the development engine
//! (PostgreSQL) both speak the PostgreSQL wire protocol; their behavioral
//! differences are captured by [`Dialect`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use warehouse_ops::{Config, SchemaReconciler, WarehousePool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), warehouse_ops::OpsError> {
//!     let config = Config::load("config.yaml")?;
//!     let pool = WarehousePool::connect(&config.warehouse).await?;
//!     SchemaReconciler::new(pool, &config.reconciler).run().await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod dialect;
pub mod error;
pub mod extractor;
pub mod ident;
pub mod pool;
pub mod reconciler;
pub mod schema;
pub mod syncer;

// Re-exports for convenient access
pub use config::{Config, ExtractorConfig, ReconcilerConfig, SyncerConfig, WarehouseConfig};
pub use dialect::{Dialect, UpsertStrategy};
pub use error::{OpsError, Result};
pub use extractor::{ColumnExtractor, ExtractionMappings};
pub use pool::WarehousePool;
pub use reconciler::SchemaReconciler;
pub use schema::{ColumnSpec, LogicalType, TableSpec};
pub use syncer::{SyncOutcome, SyncSummary, SyncTableDescriptor, TableSyncer};
