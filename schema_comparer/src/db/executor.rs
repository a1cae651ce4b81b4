//! SQL executor
//!
//! This module sends statements to a live database and applies generated
//! scripts. Statements run in the order given; nothing is rolled back on
//! failure, the caller decides between commit and rollback.

use async_trait::async_trait;
use chrono::Local;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::config::ApplyConfig;
use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::script::Script;

/// Statement execution against one connection
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute one statement, returning the number of affected rows.
    ///
    /// With `auto_commit` off the statement joins the open transaction,
    /// starting one when needed.
    async fn execute(&self, sql: &str, auto_commit: bool) -> Result<u64>;

    /// Commit the open transaction, if any
    async fn commit(&self) -> Result<()>;

    /// Roll back the open transaction, if any
    async fn rollback(&self) -> Result<()>;
}

enum OpenTransaction {
    Postgres(Transaction<'static, Postgres>),
    MySql(Transaction<'static, MySql>),
    Sqlite(Transaction<'static, Sqlite>),
}

/// SQL executor for running statements through a connection pool
pub struct SqlExecutor {
    connection: DatabaseConnection,
    transaction: Mutex<Option<OpenTransaction>>,
}

impl SqlExecutor {
    /// Create a new SQL executor
    pub fn new(connection: DatabaseConnection) -> Self {
        Self {
            connection,
            transaction: Mutex::new(None),
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    async fn begin(&self) -> Result<OpenTransaction> {
        Ok(match &self.connection {
            DatabaseConnection::Postgres(pool) => OpenTransaction::Postgres(pool.begin().await?),
            DatabaseConnection::MySql(pool) => OpenTransaction::MySql(pool.begin().await?),
            DatabaseConnection::Sqlite(pool) => OpenTransaction::Sqlite(pool.begin().await?),
        })
    }
}

#[async_trait]
impl StatementExecutor for SqlExecutor {
    async fn execute(&self, sql: &str, auto_commit: bool) -> Result<u64> {
        tracing::debug!(sql = sql, auto_commit = auto_commit, "Executing statement");
        if auto_commit {
            return self.connection.execute(sql).await;
        }

        let mut guard = self.transaction.lock().await;
        if guard.is_none() {
            *guard = Some(self.begin().await?);
        }
        let rows = match guard.as_mut() {
            Some(OpenTransaction::Postgres(tx)) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
            Some(OpenTransaction::MySql(tx)) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
            Some(OpenTransaction::Sqlite(tx)) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
            None => 0,
        };
        Ok(rows)
    }

    async fn commit(&self) -> Result<()> {
        match self.transaction.lock().await.take() {
            Some(OpenTransaction::Postgres(tx)) => tx.commit().await?,
            Some(OpenTransaction::MySql(tx)) => tx.commit().await?,
            Some(OpenTransaction::Sqlite(tx)) => tx.commit().await?,
            None => {}
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        match self.transaction.lock().await.take() {
            Some(OpenTransaction::Postgres(tx)) => tx.rollback().await?,
            Some(OpenTransaction::MySql(tx)) => tx.rollback().await?,
            Some(OpenTransaction::Sqlite(tx)) => tx.rollback().await?,
            None => {}
        }
        Ok(())
    }
}

/// Execute statements in order, then commit when not in auto-commit mode.
///
/// Returns the number of statements executed. On failure the error tells
/// how many statements had already been sent.
pub async fn execute_statements(
    executor: &dyn StatementExecutor,
    statements: &[String],
    auto_commit: bool,
) -> Result<usize> {
    for (executed, statement) in statements.iter().enumerate() {
        if let Err(e) = executor.execute(statement, auto_commit).await {
            tracing::error!(executed = executed, statement = %statement, error = %e, "Statement failed");
            return Err(Error::ApplyError {
                executed,
                statement: statement.clone(),
                message: e.to_string(),
            });
        }
    }

    if !auto_commit {
        executor.commit().await.map_err(|e| Error::ApplyError {
            executed: statements.len(),
            statement: "COMMIT".to_string(),
            message: e.to_string(),
        })?;
    }

    Ok(statements.len())
}

/// Outcome of [`apply_script`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    /// Script file written before execution, if an output directory is configured
    pub script_file: Option<PathBuf>,
    pub executed: usize,
    pub dry_run: bool,
}

/// Write the script to the output directory, then execute it unless this is a dry run
pub async fn apply_script(
    executor: &dyn StatementExecutor,
    script: &Script,
    config: &ApplyConfig,
) -> Result<ApplyReport> {
    let script_file = match &config.output_directory {
        Some(directory) => Some(write_script_file(Path::new(directory), script)?),
        None => None,
    };
    let statements = script.executable_statements();

    if config.dry_run {
        for (i, statement) in statements.iter().enumerate() {
            tracing::info!(statement_number = i + 1, sql = %statement, "Statement (dry run)");
        }
        return Ok(ApplyReport {
            script_file,
            executed: 0,
            dry_run: true,
        });
    }

    let executed = execute_statements(executor, &statements, config.auto_commit).await?;
    tracing::info!(executed = executed, "Script applied");

    Ok(ApplyReport {
        script_file,
        executed,
        dry_run: false,
    })
}

/// Write a script to a timestamped `.sql` file in `directory`
pub fn write_script_file(directory: &Path, script: &Script) -> Result<PathBuf> {
    fs::create_dir_all(directory)?;
    let filename = format!("schema_compare_{}.sql", Local::now().format("%Y%m%d%H%M%S%3f"));
    let path = directory.join(filename);
    fs::write(&path, script.to_string())?;

    tracing::info!(path = %path.display(), "Script written");
    Ok(path)
}
