//! Object definition files
//!
//! A [`FileSource`] reads schema objects from YAML, JSON or TOML documents
//! and serves them through [`MetadataSource`], so a directory of definitions
//! can be compared against a live database or against another directory.
//!
//! Every document holds a list of tagged objects:
//!
//! ```yaml
//! objects:
//!   - type: table
//!     name: CUSTOMERS
//!     columns:
//!       - { name: ID, data_type: INTEGER, nullable: false }
//!   - type: view
//!     name: V_CUSTOMERS
//!     source: SELECT ID FROM CUSTOMERS
//! ```

use async_trait::async_trait;
use glob::Pattern;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::FilesConfig;
use crate::db::source::{MetadataSource, TableInfo};
use crate::error::{Error, Result};
use crate::schema::constraints::{CheckConstraintRow, ConstraintRow, IndexRow};
use crate::schema::types::{
    Column, ConstraintKind, DatabaseObject, Engine, Procedure, TableDefinition, Trigger, View,
};

const DEFAULT_EXTENSIONS: [&str; 5] = ["yaml", "yml", "json", "toml", "tml"];

/// Contents of one definition file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectDocument {
    #[serde(default)]
    pub objects: Vec<DatabaseObject>,
}

impl ObjectDocument {
    /// Parse a document, choosing the format by file extension
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let document = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            "toml" | "tml" => toml::from_str(content)?,
            _ => {
                return Err(Error::ConfigError(format!(
                    "Unsupported definition file: {}",
                    path.display()
                )))
            }
        };
        Ok(document)
    }
}

/// Metadata source over objects loaded from definition files
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    engine: Engine,
    tables: IndexMap<String, TableDefinition>,
    views: Vec<View>,
    procedures: Vec<Procedure>,
    triggers: Vec<Trigger>,
}

impl FileSource {
    /// Scan the configured directory and load every matching document
    pub fn load(config: &FilesConfig, engine: Engine) -> Result<Self> {
        let files = scan_files(config)?;
        let mut objects = Vec::new();

        for path in &files {
            let content = fs::read_to_string(path)?;
            let document = ObjectDocument::parse(path, &content).map_err(|e| {
                Error::ConfigError(format!("Failed to load {}: {}", path.display(), e))
            })?;
            tracing::debug!(path = %path.display(), objects = document.objects.len(), "Loaded definition file");
            objects.extend(document.objects);
        }

        tracing::info!(
            path = %config.path,
            files = files.len(),
            objects = objects.len(),
            "Definition files loaded"
        );
        Self::from_objects(engine, objects)
    }

    /// Build a source from objects already in memory.
    ///
    /// Object names must be unique per object type.
    pub fn from_objects<I>(engine: Engine, objects: I) -> Result<Self>
    where
        I: IntoIterator<Item = DatabaseObject>,
    {
        let mut source = FileSource {
            engine,
            ..Default::default()
        };

        for object in objects {
            let name = object.name().trim().to_string();
            if name.is_empty() {
                return Err(Error::InvalidArgumentError(format!(
                    "{} without a name",
                    object.object_type()
                )));
            }
            let object_type = object.object_type();
            if let DatabaseObject::Table(table) = &object {
                check_constraint_columns(table)?;
            }
            let duplicate = match object {
                DatabaseObject::Table(table) => source.tables.insert(name.clone(), table).is_some(),
                DatabaseObject::View(view) => push_unique(&mut source.views, view, |v| &v.name),
                DatabaseObject::Procedure(procedure) => {
                    push_unique(&mut source.procedures, procedure, |p| &p.name)
                }
                DatabaseObject::Trigger(trigger) => push_unique(&mut source.triggers, trigger, |t| &t.name),
            };
            if duplicate {
                return Err(Error::InvalidArgumentError(format!(
                    "duplicate {} name: {}",
                    object_type, name
                )));
            }
        }

        Ok(source)
    }

    fn table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::MetadataFetchError(format!("Table {} is not defined", name)))
    }
}

/// Key columns must be columns of the table itself
fn check_constraint_columns(table: &TableDefinition) -> Result<()> {
    for constraint in &table.constraints {
        if let Some(missing) = constraint
            .columns
            .iter()
            .find(|column| table.column(column.trim()).is_none())
        {
            return Err(Error::InvalidArgumentError(format!(
                "constraint {} of table {} names unknown column {}",
                constraint.name, table.name, missing
            )));
        }
    }
    Ok(())
}

/// Push `item` unless an element with the same name exists; returns true on a duplicate
fn push_unique<T>(items: &mut Vec<T>, item: T, name: impl Fn(&T) -> &String) -> bool {
    if items.iter().any(|existing| name(existing) == name(&item)) {
        return true;
    }
    items.push(item);
    false
}

/// Definition files under the configured path, sorted for a stable load order
fn scan_files(config: &FilesConfig) -> Result<Vec<PathBuf>> {
    let base_path = Path::new(&config.path);
    if !base_path.exists() {
        return Err(Error::ConfigError(format!(
            "Path does not exist: {}",
            config.path
        )));
    }

    let pattern = config
        .pattern
        .as_deref()
        .map(Pattern::new)
        .transpose()
        .map_err(|e| Error::ConfigError(format!("Invalid file pattern: {}", e)))?;

    let max_depth = if config.recursive_scan { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(base_path)
        .follow_links(true)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| matches_file(path, pattern.as_ref()))
        .collect();

    files.sort();
    Ok(files)
}

fn matches_file(path: &Path, pattern: Option<&Pattern>) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    match pattern {
        Some(pattern) => pattern.matches(file_name),
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| DEFAULT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false),
    }
}

/// Split a constraint back into one row per column, pairing foreign key
/// columns with referenced columns by position
fn constraint_rows(table: &TableDefinition) -> Vec<ConstraintRow> {
    let mut rows = Vec::new();
    for constraint in &table.constraints {
        if constraint.kind == ConstraintKind::Check {
            continue;
        }
        for (position, column) in constraint.columns.iter().enumerate() {
            let reference = constraint.references.as_ref();
            rows.push(ConstraintRow {
                name: constraint.name.clone(),
                kind: constraint.kind,
                table_name: table.name.clone(),
                column_name: column.clone(),
                referenced_table: reference.map(|r| r.table.clone()),
                referenced_catalog: reference.and_then(|r| r.catalog.clone()),
                referenced_schema: reference.and_then(|r| r.schema.clone()),
                referenced_column: reference.and_then(|r| r.columns.get(position).cloned()),
                update_rule: reference.and_then(|r| r.on_update.clone()),
                delete_rule: reference.and_then(|r| r.on_delete.clone()),
            });
        }
    }
    rows
}

fn index_rows(table: &TableDefinition) -> Vec<IndexRow> {
    let mut rows = Vec::new();
    for index in &table.indexes {
        let row = |column_name: Option<String>| IndexRow {
            name: index.name.clone(),
            table_name: table.name.clone(),
            non_unique: index.non_unique,
            column_name,
            expression: index.expression.clone(),
            descending: index.descending,
            constraint_type: index.constraint_type,
        };
        if index.expression.is_some() || index.columns.is_empty() {
            rows.push(row(None));
        } else {
            rows.extend(index.columns.iter().cloned().map(|c| row(Some(c))));
        }
    }
    rows
}

#[async_trait]
impl MetadataSource for FileSource {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn constraint_rows(&self, table: &str) -> Result<Vec<ConstraintRow>> {
        Ok(constraint_rows(self.table(table)?))
    }

    async fn table_info(&self, table: &str) -> Result<TableInfo> {
        let definition = self.table(table)?;
        let checks = definition
            .check_constraints()
            .map(|c| CheckConstraintRow {
                name: c.name.clone(),
                table_name: definition.name.clone(),
                source: c.check_source.clone(),
            })
            .collect();

        Ok(TableInfo {
            catalog: definition.catalog.clone(),
            schema: definition.schema.clone(),
            remarks: definition.remarks.clone(),
            sql_security: definition.sql_security,
            external_file: definition.external_file.clone(),
            adapter: definition.adapter.clone(),
            tablespace: definition.tablespace.clone(),
            checks,
        })
    }

    async fn index_rows(&self, table: &str) -> Result<Vec<IndexRow>> {
        Ok(index_rows(self.table(table)?))
    }

    async fn table_triggers(&self, table: &str) -> Result<Vec<String>> {
        let mut names = self.table(table)?.triggers.clone();
        for trigger in &self.triggers {
            if trigger.table_name.as_deref() == Some(table) && !names.contains(&trigger.name) {
                names.push(trigger.name.clone());
            }
        }
        Ok(names)
    }

    async fn views(&self) -> Result<Vec<View>> {
        Ok(self.views.clone())
    }

    async fn procedures(&self) -> Result<Vec<Procedure>> {
        Ok(self.procedures.clone())
    }

    async fn triggers(&self) -> Result<Vec<Trigger>> {
        Ok(self.triggers.clone())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        self.table(table)?;
        Err(Error::MetadataFetchError(format!(
            "Definition files hold no rows for {}",
            table
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::constraints::collect_constraints;
    use crate::schema::types::ColumnConstraint;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const ORDERS_YAML: &str = r#"
objects:
  - type: table
    name: ORDERS
    columns:
      - { name: ID, data_type: INTEGER, nullable: false }
      - { name: CUSTOMER_ID, data_type: INTEGER, nullable: false }
    constraints:
      - name: PK_ORDERS
        kind: primary
        table_name: ORDERS
        columns: [ID]
      - name: CHK_ID
        kind: check
        table_name: ORDERS
        check_source: ID > 0
  - type: view
    name: V_ORDERS
    source: SELECT ID FROM ORDERS
"#;

    const CUSTOMERS_JSON: &str = r#"{
  "objects": [
    {
      "type": "table",
      "name": "CUSTOMERS",
      "columns": [{ "name": "ID", "data_type": "INTEGER", "nullable": false }]
    }
  ]
}"#;

    #[tokio::test]
    async fn test_load_scans_matching_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("orders.yaml"), ORDERS_YAML).unwrap();
        fs::write(dir.path().join("customers.json"), CUSTOMERS_JSON).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a definition").unwrap();

        let config = FilesConfig {
            path: dir.path().to_string_lossy().to_string(),
            pattern: None,
            recursive_scan: true,
        };
        let source = FileSource::load(&config, Engine::default()).unwrap();

        // sorted by path: customers.json before orders.yaml
        assert_eq!(
            source.table_names().await.unwrap(),
            vec!["CUSTOMERS".to_string(), "ORDERS".to_string()]
        );
        assert_eq!(source.views().await.unwrap().len(), 1);

        let info = source.table_info("ORDERS").await.unwrap();
        assert_eq!(info.checks.len(), 1);
        assert_eq!(info.checks[0].source.as_deref(), Some("ID > 0"));
    }

    #[test]
    fn test_pattern_and_depth_limit_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("orders.yaml"), ORDERS_YAML).unwrap();
        fs::write(dir.path().join("nested").join("more.yaml"), "objects: []").unwrap();
        fs::write(dir.path().join("customers.json"), CUSTOMERS_JSON).unwrap();

        let config = FilesConfig {
            path: dir.path().to_string_lossy().to_string(),
            pattern: Some("*.yaml".to_string()),
            recursive_scan: false,
        };
        let files = scan_files(&config).unwrap();
        assert_eq!(files, vec![dir.path().join("orders.yaml")]);
    }

    #[test]
    fn test_missing_path_is_a_config_error() {
        let config = FilesConfig {
            path: "/definitely/not/here".to_string(),
            pattern: None,
            recursive_scan: true,
        };
        assert!(matches!(FileSource::load(&config, Engine::default()), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let objects = vec![
            DatabaseObject::Table(TableDefinition::new("T")),
            DatabaseObject::Table(TableDefinition::new("T")),
        ];
        assert!(matches!(
            FileSource::from_objects(Engine::default(), objects),
            Err(Error::InvalidArgumentError(_))
        ));
    }

    #[test]
    fn test_constraint_on_unknown_column_is_rejected() {
        let mut table = TableDefinition::new("T");
        table.add_column(Column::new("ID", "INTEGER"));
        table.add_constraint(ColumnConstraint::foreign_key("FK_T_U", "T", &["U_IDD"], "U", &["ID"]));

        let err = FileSource::from_objects(Engine::default(), vec![DatabaseObject::Table(table)])
            .err()
            .unwrap();

        match err {
            Error::InvalidArgumentError(message) => {
                assert!(message.contains("FK_T_U"));
                assert!(message.contains("U_IDD"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constraint_rows_reassemble() {
        let mut table = TableDefinition::new("ORDER_LINES");
        table.add_column(Column::new("ORDER_ID", "INTEGER"));
        table.add_column(Column::new("LINE_NO", "INTEGER"));
        table.add_constraint(ColumnConstraint::foreign_key(
            "FK_LINES_ORDER",
            "ORDER_LINES",
            &["ORDER_ID", "LINE_NO"],
            "ORDERS",
            &["ID", "LINE"],
        ));

        let rows = constraint_rows(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].referenced_column.as_deref(), Some("LINE"));

        let constraints = collect_constraints(&table.columns, &rows, &[]);
        assert_eq!(constraints, table.constraints);
    }

    #[test]
    fn test_toml_document() {
        let content = r#"
[[objects]]
type = "procedure"
name = "P_TOUCH"
source = "AS BEGIN END"
"#;
        let document = ObjectDocument::parse(Path::new("procs.toml"), content).unwrap();
        assert_eq!(document.objects.len(), 1);
        assert_eq!(document.objects[0].name(), "P_TOUCH");
    }
}
