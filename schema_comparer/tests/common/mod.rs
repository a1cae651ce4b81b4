//! Test doubles shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use schema_comparer::db::source::{MetadataSource, TableInfo};
use schema_comparer::db::StatementExecutor;
use schema_comparer::schema::constraints::{CheckConstraintRow, ConstraintRow, IndexRow};
use schema_comparer::schema::types::{
    Column, ConstraintKind, Engine, EngineKind, Procedure, Trigger, View,
};
use schema_comparer::{Error, Result};

/// In-memory metadata source that counts fetches and can be switched to fail
#[derive(Default)]
pub struct FakeSource {
    pub engine: Engine,
    pub tables: Vec<String>,
    pub columns: HashMap<String, Vec<Column>>,
    pub constraint_rows: HashMap<String, Vec<ConstraintRow>>,
    pub checks: HashMap<String, Vec<CheckConstraintRow>>,
    pub column_fetches: AtomicUsize,
    pub constraint_fetches: AtomicUsize,
    pub row_count_calls: AtomicUsize,
    /// Delay of the first row count request
    pub first_row_count_delay: Option<Duration>,
    pub fail: AtomicBool,
}

impl FakeSource {
    pub fn firebird() -> Self {
        Self {
            engine: Engine::new(EngineKind::Firebird, 3),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, name: &str, columns: Vec<Column>) -> Self {
        self.tables.push(name.to_string());
        self.columns.insert(name.to_string(), columns);
        self
    }

    pub fn with_constraint_row(mut self, row: ConstraintRow) -> Self {
        self.constraint_rows
            .entry(row.table_name.clone())
            .or_default()
            .push(row);
        self
    }

    pub fn with_check(mut self, row: CheckConstraintRow) -> Self {
        self.checks.entry(row.table_name.clone()).or_default().push(row);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn column_fetches(&self) -> usize {
        self.column_fetches.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::DatabaseError("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

pub fn key_row(name: &str, kind: ConstraintKind, table: &str, column: &str) -> ConstraintRow {
    ConstraintRow {
        name: name.to_string(),
        kind,
        table_name: table.to_string(),
        column_name: column.to_string(),
        referenced_table: None,
        referenced_catalog: None,
        referenced_schema: None,
        referenced_column: None,
        update_rule: None,
        delete_rule: None,
    }
}

#[async_trait]
impl MetadataSource for FakeSource {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.check_failure()?;
        Ok(self.tables.clone())
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        self.column_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    async fn constraint_rows(&self, table: &str) -> Result<Vec<ConstraintRow>> {
        self.constraint_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.constraint_rows.get(table).cloned().unwrap_or_default())
    }

    async fn table_info(&self, table: &str) -> Result<TableInfo> {
        self.check_failure()?;
        Ok(TableInfo {
            checks: self.checks.get(table).cloned().unwrap_or_default(),
            ..TableInfo::default()
        })
    }

    async fn index_rows(&self, _table: &str) -> Result<Vec<IndexRow>> {
        self.check_failure()?;
        Ok(Vec::new())
    }

    async fn table_triggers(&self, _table: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn views(&self) -> Result<Vec<View>> {
        Ok(Vec::new())
    }

    async fn procedures(&self) -> Result<Vec<Procedure>> {
        Ok(Vec::new())
    }

    async fn triggers(&self) -> Result<Vec<Trigger>> {
        Ok(Vec::new())
    }

    async fn row_count(&self, _table: &str) -> Result<u64> {
        let call = self.row_count_calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            if let Some(delay) = self.first_row_count_delay {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(call as u64 + 1)
    }
}

/// Executor that records statements instead of touching a database
#[derive(Default)]
pub struct RecordingExecutor {
    pub executed: Mutex<Vec<String>>,
    pub commits: AtomicUsize,
    /// Reject every statement, like a closed connection
    pub closed: bool,
    /// Reject statements containing this text
    pub fail_on: Option<String>,
}

impl RecordingExecutor {
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Default::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str, _auto_commit: bool) -> Result<u64> {
        if self.closed {
            return Err(Error::DatabaseError("attempted to acquire a connection on a closed pool".to_string()));
        }
        if let Some(marker) = &self.fail_on {
            if sql.contains(marker.as_str()) {
                return Err(Error::DatabaseError(format!("statement rejected: {}", sql)));
            }
        }
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(0)
    }

    async fn commit(&self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }
}
