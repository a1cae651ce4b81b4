//! Database connection handling
//!
//! This module provides functionality to establish and manage database connections.

use sqlx::{
    mysql::MySqlPoolOptions, postgres::PgPoolOptions, sqlite::SqlitePoolOptions, MySql, Pool,
    Postgres, Sqlite,
};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::schema::types::EngineKind;

/// Enumeration of supported database types
#[derive(Debug, Clone)]
pub enum DatabaseConnection {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
    Sqlite(Pool<Sqlite>),
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool_size = config.pool_size.unwrap_or(10);
        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(30));

        let connection = match EngineKind::from_name(&config.driver) {
            Some(EngineKind::Postgres) => {
                let pool = PgPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                DatabaseConnection::Postgres(pool)
            }
            Some(EngineKind::MySql) => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                DatabaseConnection::MySql(pool)
            }
            Some(EngineKind::Sqlite) => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                DatabaseConnection::Sqlite(pool)
            }
            Some(EngineKind::Firebird | EngineKind::RedDatabase) => {
                return Err(Error::DatabaseError(format!(
                    "No live driver for {}; compare it through object files",
                    config.driver
                )))
            }
            None => {
                return Err(Error::DatabaseError(format!(
                    "Unsupported database driver: {}",
                    config.driver
                )))
            }
        };

        tracing::info!(driver = %config.driver, pool_size = pool_size, "Connected to database");
        Ok(connection)
    }

    pub fn engine_kind(&self) -> EngineKind {
        match self {
            DatabaseConnection::Postgres(_) => EngineKind::Postgres,
            DatabaseConnection::MySql(_) => EngineKind::MySql,
            DatabaseConnection::Sqlite(_) => EngineKind::Sqlite,
        }
    }

    /// Execute a SQL statement, returning the number of affected rows
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let rows = match self {
            DatabaseConnection::Postgres(pool) => sqlx::query(sql).execute(pool).await?.rows_affected(),
            DatabaseConnection::MySql(pool) => sqlx::query(sql).execute(pool).await?.rows_affected(),
            DatabaseConnection::Sqlite(pool) => sqlx::query(sql).execute(pool).await?.rows_affected(),
        };
        Ok(rows)
    }

    pub async fn close(&self) {
        match self {
            DatabaseConnection::Postgres(pool) => pool.close().await,
            DatabaseConnection::MySql(pool) => pool.close().await,
            DatabaseConnection::Sqlite(pool) => pool.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            DatabaseConnection::Postgres(pool) => pool.is_closed(),
            DatabaseConnection::MySql(pool) => pool.is_closed(),
            DatabaseConnection::Sqlite(pool) => pool.is_closed(),
        }
    }
}
