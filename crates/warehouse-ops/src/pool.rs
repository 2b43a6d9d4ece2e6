//! Warehouse connection pool.

use crate::config::WarehouseConfig;
use crate::dialect::Dialect;
use crate::error::{OpsError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::info;

/// Pooled connection handle to the warehouse.
///
/// Cheap to clone; all three components share one pool. No component
/// holds a connection across suspension points: each checks one out,
/// runs its statements, and releases it.
#[derive(Clone)]
pub struct WarehousePool {
    pool: Pool,
    dialect: Dialect,
}

impl WarehousePool {
    /// Connect to the warehouse and verify the connection.
    pub async fn connect(config: &WarehouseConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| OpsError::Pool(format!("Failed to create pool: {}", e)))?;

        let client = pool.get().await?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to warehouse: {}:{}/{} (dialect={:?}, pool_size={})",
            config.host, config.port, config.database, config.dialect, config.max_connections
        );

        Ok(Self {
            pool,
            dialect: config.dialect,
        })
    }

    /// Check a connection out of the pool.
    pub async fn client(&self) -> Result<Object> {
        Ok(self.pool.get().await?)
    }

    /// The engine dialect this pool is connected to.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}
