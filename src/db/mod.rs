mod error;
#[cfg(feature = "database-mysql")]
pub mod mysql;
pub mod query;
pub mod repos;
#[cfg(feature = "database-sqlite")]
pub mod sqlite;

#[cfg(all(test, feature = "database-sqlite"))]
pub mod tests;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::config::DatabaseConfig;
#[cfg(any(feature = "database-sqlite", feature = "database-mysql"))]
use crate::db::query::TableNames;

enum PoolStorage {
    #[cfg(feature = "database-sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(feature = "database-mysql")]
    MySql(sqlx::MySqlPool),
    #[cfg(not(any(feature = "database-sqlite", feature = "database-mysql")))]
    _None(std::convert::Infallible),
}

/// Database pool supporting both SQLite and MySQL.
///
/// The record repository is created once at construction time.
pub struct DbPool {
    inner: PoolStorage,
    records: Arc<dyn RecordRepo>,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    #[cfg(feature = "database-sqlite")]
    pub fn from_sqlite(pool: sqlx::SqlitePool, names: TableNames) -> Self {
        DbPool {
            records: Arc::new(sqlite::SqliteRecordRepo::new(pool.clone(), names)),
            inner: PoolStorage::Sqlite(pool),
        }
    }

    /// Create a DbPool from an existing MySQL pool.
    #[cfg(feature = "database-mysql")]
    pub fn from_mysql(pool: sqlx::MySqlPool, names: TableNames) -> Self {
        DbPool {
            records: Arc::new(mysql::MySqlRecordRepo::new(pool.clone(), names)),
            inner: PoolStorage::MySql(pool),
        }
    }

    /// Create a database pool from configuration
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        match config {
            DatabaseConfig::None => Err(DbError::NotConfigured),
            #[cfg(feature = "database-sqlite")]
            DatabaseConfig::Sqlite(cfg) => {
                let names = TableNames::new(cfg.table_prefix.clone())?;
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .connect_with(
                        sqlx::sqlite::SqliteConnectOptions::new()
                            .filename(&cfg.path)
                            .create_if_missing(cfg.create_if_missing)
                            .busy_timeout(std::time::Duration::from_millis(cfg.busy_timeout_ms)),
                    )
                    .await?;

                tracing::debug!(path = %cfg.path, prefix = names.prefix(), "Connected to SQLite");
                Ok(Self::from_sqlite(pool, names))
            }
            #[cfg(feature = "database-mysql")]
            DatabaseConfig::Mysql(cfg) => {
                let names = TableNames::new(cfg.table_prefix.clone())?;
                let pool = sqlx::mysql::MySqlPoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .acquire_timeout(std::time::Duration::from_secs(cfg.connect_timeout_secs))
                    .connect(&cfg.url)
                    .await?;

                tracing::debug!(prefix = names.prefix(), "Connected to MySQL");
                Ok(Self::from_mysql(pool, names))
            }
        }
    }

    /// Get record repository
    pub fn records(&self) -> Arc<dyn RecordRepo> {
        Arc::clone(&self.records)
    }

    /// Health check for database connectivity
    pub async fn health_check(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            #[cfg(feature = "database-mysql")]
            PoolStorage::MySql(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            #[cfg(not(any(feature = "database-sqlite", feature = "database-mysql")))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => pool.close().await,
            #[cfg(feature = "database-mysql")]
            PoolStorage::MySql(pool) => pool.close().await,
            #[cfg(not(any(feature = "database-sqlite", feature = "database-mysql")))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }
}
