//! Metadata source abstraction
//!
//! A [`MetadataSource`] answers the catalog questions the comparer asks about
//! one schema. Live databases implement it through
//! [`DatabaseIntrospector`](crate::db::introspect::DatabaseIntrospector);
//! object files through [`FileSource`](crate::db::files::FileSource).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::constraints::{CheckConstraintRow, ConstraintRow, IndexRow};
use crate::schema::types::{Column, Engine, Procedure, SqlSecurity, Trigger, View};

/// Table-level attributes plus the check constraints discovered for the table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub sql_security: Option<SqlSecurity>,
    #[serde(default)]
    pub external_file: Option<String>,
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub tablespace: Option<String>,
    /// Check constraints, found through their system triggers on the Firebird family
    #[serde(default)]
    pub checks: Vec<CheckConstraintRow>,
}

/// Catalog queries the comparer needs from one schema
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Engine the metadata was read from
    fn engine(&self) -> Engine;

    /// Names of user tables, in catalog order
    async fn table_names(&self) -> Result<Vec<String>>;

    /// Columns of a table in definition order
    async fn columns(&self, table: &str) -> Result<Vec<Column>>;

    /// One row per (constraint, column) pair
    async fn constraint_rows(&self, table: &str) -> Result<Vec<ConstraintRow>>;

    async fn table_info(&self, table: &str) -> Result<TableInfo>;

    /// One row per (index, column) pair, grouped by index name
    async fn index_rows(&self, table: &str) -> Result<Vec<IndexRow>>;

    /// Names of the user triggers attached to a table
    async fn table_triggers(&self, table: &str) -> Result<Vec<String>>;

    async fn views(&self) -> Result<Vec<View>>;

    async fn procedures(&self) -> Result<Vec<Procedure>>;

    async fn triggers(&self) -> Result<Vec<Trigger>>;

    async fn row_count(&self, table: &str) -> Result<u64>;
}
