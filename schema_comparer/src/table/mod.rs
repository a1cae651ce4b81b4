//! Live table handle
//!
//! A [`DatabaseTable`] loads a table's structure from a [`MetadataSource`] on
//! demand and keeps each part in its own cache until [`DatabaseTable::reset`].
//! It also records structural edits and applies them to the database.

pub mod edits;
pub mod loaded;
pub mod request;

use std::sync::Arc;

use crate::db::executor::{execute_statements, StatementExecutor};
use crate::db::source::{MetadataSource, TableInfo};
use crate::error::{Error, Result};
use crate::schema::constraints::{collect_constraints, collect_indexes};
use crate::schema::diff::ColumnChange;
use crate::schema::generator::DdlGenerator;
use crate::schema::script::split_statements;
use crate::schema::types::{Column, ColumnConstraint, Index, TableDefinition};

pub use edits::{EditStatus, PendingEdits};
pub use loaded::{CacheCell, Loaded};
pub use request::{RequestGate, Ticket};

/// A table of a live schema with lazily loaded metadata
pub struct DatabaseTable {
    name: String,
    source: Arc<dyn MetadataSource>,
    generator: DdlGenerator,
    columns: CacheCell<Vec<Column>>,
    constraints: CacheCell<Vec<ColumnConstraint>>,
    indexes: CacheCell<Vec<Index>>,
    triggers: CacheCell<Vec<String>>,
    info: CacheCell<TableInfo>,
    edits: PendingEdits,
    row_count_requests: RequestGate,
}

impl DatabaseTable {
    pub fn new(name: &str, source: Arc<dyn MetadataSource>) -> Self {
        let generator = DdlGenerator::new(source.engine());
        Self {
            name: name.to_string(),
            source,
            generator,
            columns: CacheCell::new(),
            constraints: CacheCell::new(),
            indexes: CacheCell::new(),
            triggers: CacheCell::new(),
            info: CacheCell::new(),
            edits: PendingEdits::default(),
            row_count_requests: RequestGate::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn columns(&self) -> Result<Vec<Column>> {
        self.columns
            .get_or_fetch(&self.name, "columns", self.source.columns(&self.name))
            .await
    }

    /// Constraints sorted by name, one entry per constraint
    pub async fn constraints(&self) -> Result<Vec<ColumnConstraint>> {
        self.constraints
            .get_or_fetch(&self.name, "constraints", async {
                let columns = self.columns().await?;
                let info = self.info().await?;
                let rows = self.source.constraint_rows(&self.name).await?;
                Ok::<_, Error>(collect_constraints(&columns, &rows, &info.checks))
            })
            .await
    }

    pub async fn indexes(&self) -> Result<Vec<Index>> {
        self.indexes
            .get_or_fetch(&self.name, "indexes", async {
                let rows = self.source.index_rows(&self.name).await?;
                Ok::<_, Error>(collect_indexes(&rows))
            })
            .await
    }

    /// Names of the user triggers attached to the table
    pub async fn triggers(&self) -> Result<Vec<String>> {
        self.triggers
            .get_or_fetch(&self.name, "triggers", self.source.table_triggers(&self.name))
            .await
    }

    pub async fn info(&self) -> Result<TableInfo> {
        self.info
            .get_or_fetch(&self.name, "info", self.source.table_info(&self.name))
            .await
    }

    /// Fully loaded structure, as used in snapshots
    pub async fn definition(&self) -> Result<TableDefinition> {
        let info = self.info().await?;
        Ok(TableDefinition {
            name: self.name.clone(),
            catalog: info.catalog,
            schema: info.schema,
            columns: self.columns().await?,
            constraints: self.constraints().await?,
            indexes: self.indexes().await?,
            triggers: self.triggers().await?,
            external_file: info.external_file,
            adapter: info.adapter,
            tablespace: info.tablespace,
            sql_security: info.sql_security,
            remarks: info.remarks,
        })
    }

    /// Mark every cache for reload; the next read fetches from the source
    pub async fn reset(&self) {
        self.columns.invalidate().await;
        self.constraints.invalidate().await;
        self.indexes.invalidate().await;
        self.triggers.invalidate().await;
        self.info.invalidate().await;
    }

    /// Cache states, for callers that show loading progress or failures
    pub async fn cache_states(&self) -> (Loaded<Vec<Column>>, Loaded<Vec<ColumnConstraint>>, Loaded<Vec<Index>>) {
        (
            self.columns.state().await,
            self.constraints.state().await,
            self.indexes.state().await,
        )
    }

    /// Current number of rows.
    ///
    /// Returns `None` when a newer request for this table started while this
    /// one was in flight; the newer request's result is the one to use.
    pub async fn row_count(&self) -> Result<Option<u64>> {
        let ticket = self.row_count_requests.begin();
        let result = self.source.row_count(&self.name).await;

        if !self.row_count_requests.is_current(ticket) {
            tracing::debug!(table = %self.name, "Superseded row count discarded");
            return Ok(None);
        }
        result.map(Some).map_err(|e| {
            Error::MetadataFetchError(format!("Failed to count rows of {}: {}", self.name, e))
        })
    }

    pub async fn create_sql(&self) -> Result<String> {
        self.generator.render_create_table(&self.definition().await?)
    }

    pub fn drop_sql(&self) -> String {
        self.generator.render_drop_table(&TableDefinition::new(&self.name))
    }

    pub async fn insert_template(&self) -> Result<String> {
        Ok(self.generator.render_insert(&self.template_definition().await?))
    }

    pub async fn update_template(&self) -> Result<String> {
        Ok(self.generator.render_update(&self.template_definition().await?))
    }

    pub async fn select_template(&self) -> Result<String> {
        Ok(self.generator.render_select(&self.template_definition().await?))
    }

    async fn template_definition(&self) -> Result<TableDefinition> {
        let mut table = TableDefinition::new(&self.name);
        table.columns = self.columns().await?;
        table.constraints = self.constraints().await?;
        Ok(table)
    }

    pub fn status(&self) -> EditStatus {
        self.edits.status()
    }

    pub fn pending_edits(&self) -> &PendingEdits {
        &self.edits
    }

    pub fn mark_column_new(&mut self, column: Column) {
        self.edits.add_column(column);
    }

    pub fn mark_column_altered(&mut self, column: Column) {
        self.edits.alter_column(column);
    }

    pub fn mark_column_deleted(&mut self, name: &str) {
        self.edits.delete_column(name);
    }

    pub fn mark_constraint_new(&mut self, constraint: ColumnConstraint) {
        self.edits.add_constraint(constraint);
    }

    pub fn mark_constraint_deleted(&mut self, name: &str) {
        self.edits.delete_constraint(name);
    }

    /// Replace the generated statements with free-form SQL
    pub fn set_modified_sql(&mut self, sql: &str) {
        self.edits.set_modified_sql(sql);
    }

    /// `ALTER TABLE` dropping the constraints marked deleted, or `""`
    pub fn dropped_constraints_sql(&self) -> String {
        self.generator
            .render_drop_constraints(&self.name, &self.edits.deleted_constraints)
    }

    /// `ALTER TABLE` dropping the columns marked deleted, or `""`
    pub fn dropped_columns_sql(&self) -> String {
        self.generator
            .render_drop_columns(&self.name, &self.edits.deleted_columns)
    }

    /// SQL that applies the pending edits: the free-form override when set,
    /// otherwise the generated statements
    pub async fn modified_sql(&self) -> Result<String> {
        if let Some(sql) = &self.edits.modified_sql {
            return Ok(sql.clone());
        }

        let mut statements = vec![self.dropped_constraints_sql(), self.dropped_columns_sql()];

        for column in &self.edits.new_columns {
            statements.push(self.generator.render_add_column(&self.name, column));
        }

        if !self.edits.altered_columns.is_empty() {
            let current = self.columns().await?;
            for column in &self.edits.altered_columns {
                let from = current
                    .iter()
                    .find(|c| c.name == column.name)
                    .ok_or_else(|| {
                        Error::InvalidArgumentError(format!(
                            "column {} does not exist in table {}",
                            column.name, self.name
                        ))
                    })?;
                let change = ColumnChange {
                    column_name: column.name.clone(),
                    from: from.clone(),
                    to: column.clone(),
                };
                if from.is_computed() && column.is_computed() {
                    if change.computed_changed() {
                        statements.push(self.generator.render_computed_column(&self.name, column, true)?);
                    }
                } else {
                    statements.extend(self.generator.render_alter_column(&self.name, &change)?);
                }
            }
        }

        for constraint in &self.edits.new_constraints {
            statements.push(self.generator.render_add_constraint(constraint)?);
        }

        statements.retain(|s| !s.is_empty());
        Ok(statements.join("\n"))
    }

    /// Execute the pending edits, then reset every cache.
    ///
    /// On failure the edits stay pending and the table stays
    /// [`EditStatus::Modified`].
    pub async fn apply_changes(&mut self, executor: &dyn StatementExecutor, auto_commit: bool) -> Result<usize> {
        if self.status() == EditStatus::Clean {
            return Ok(0);
        }

        let statements = split_statements(&self.modified_sql().await?);
        let executed = execute_statements(executor, &statements, auto_commit).await?;

        tracing::info!(table = %self.name, executed = executed, "Table changes applied");
        self.edits.clear();
        self.reset().await;
        Ok(executed)
    }

    /// Discard pending edits without executing anything
    pub fn revert(&mut self) {
        self.edits.clear();
    }
}
