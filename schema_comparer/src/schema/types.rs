//! Type definitions for database schema objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Database engine family a script is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Firebird,
    RedDatabase,
    Postgres,
    MySql,
    Sqlite,
}

impl EngineKind {
    /// Parse a driver or product name as used in configuration files
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "firebird" | "interbase" => Some(EngineKind::Firebird),
            "red_database" | "reddatabase" => Some(EngineKind::RedDatabase),
            "postgres" | "postgresql" => Some(EngineKind::Postgres),
            "mysql" => Some(EngineKind::MySql),
            "sqlite" => Some(EngineKind::Sqlite),
            _ => None,
        }
    }
}

/// Target engine plus server major version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engine {
    pub kind: EngineKind,
    #[serde(default = "default_major_version")]
    pub major_version: u32,
}

fn default_major_version() -> u32 {
    3
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineKind::Firebird, default_major_version())
    }
}

impl Engine {
    pub fn new(kind: EngineKind, major_version: u32) -> Self {
        Self { kind, major_version }
    }

    /// Firebird and its Red Database fork share DDL syntax and system tables
    pub fn is_firebird_family(&self) -> bool {
        matches!(self.kind, EngineKind::Firebird | EngineKind::RedDatabase)
    }

    pub fn supports_sql_security(&self) -> bool {
        self.is_firebird_family() && self.major_version >= 3
    }

    pub fn supports_external_file(&self) -> bool {
        self.is_firebird_family()
    }

    pub fn supports_adapter(&self) -> bool {
        self.kind == EngineKind::RedDatabase
    }

    pub fn supports_tablespace(&self) -> bool {
        self.kind == EngineKind::RedDatabase && self.major_version >= 4
    }

    /// CHECK constraints are stored as system triggers on the Firebird family
    pub fn checks_via_triggers(&self) -> bool {
        self.is_firebird_family()
    }
}

/// Kind of a named schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Table,
    View,
    Procedure,
    Trigger,
    Index,
    Constraint,
}

impl ObjectType {
    /// Object types that live directly in a schema and can be snapshotted
    pub fn is_top_level(&self) -> bool {
        matches!(
            self,
            ObjectType::Table | ObjectType::View | ObjectType::Procedure | ObjectType::Trigger
        )
    }

    /// Keyword used in DDL
    pub fn keyword(&self) -> &'static str {
        match self {
            ObjectType::Table => "TABLE",
            ObjectType::View => "VIEW",
            ObjectType::Procedure => "PROCEDURE",
            ObjectType::Trigger => "TRIGGER",
            ObjectType::Index => "INDEX",
            ObjectType::Constraint => "CONSTRAINT",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A named schema object.
///
/// Identity is `(object_type, name)` within one schema scope; names are
/// compared exactly, without case folding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatabaseObject {
    Table(TableDefinition),
    View(View),
    Procedure(Procedure),
    Trigger(Trigger),
}

impl DatabaseObject {
    pub fn name(&self) -> &str {
        match self {
            DatabaseObject::Table(table) => &table.name,
            DatabaseObject::View(view) => &view.name,
            DatabaseObject::Procedure(procedure) => &procedure.name,
            DatabaseObject::Trigger(trigger) => &trigger.name,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            DatabaseObject::Table(_) => ObjectType::Table,
            DatabaseObject::View(_) => ObjectType::View,
            DatabaseObject::Procedure(_) => ObjectType::Procedure,
            DatabaseObject::Trigger(_) => ObjectType::Trigger,
        }
    }

    pub fn as_table(&self) -> Option<&TableDefinition> {
        match self {
            DatabaseObject::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Names of other objects this object references through foreign keys
    pub fn foreign_key_targets(&self) -> Vec<&str> {
        match self {
            DatabaseObject::Table(table) => table
                .foreign_keys()
                .filter_map(|fk| fk.references.as_ref())
                .map(|reference| reference.table.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// SQL SECURITY clause of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlSecurity {
    Definer,
    Invoker,
}

impl SqlSecurity {
    pub fn keyword(&self) -> &'static str {
        match self {
            SqlSecurity::Definer => "DEFINER",
            SqlSecurity::Invoker => "INVOKER",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "DEFINER" => Some(SqlSecurity::Definer),
            "INVOKER" => Some(SqlSecurity::Invoker),
            _ => None,
        }
    }
}

/// Represents a database table with its fully loaded structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Sorted by name, one entry per constraint
    #[serde(default)]
    pub constraints: Vec<ColumnConstraint>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Names of user triggers attached to the table
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub external_file: Option<String>,
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub tablespace: Option<String>,
    #[serde(default)]
    pub sql_security: Option<SqlSecurity>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl TableDefinition {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Add a constraint, keeping the list sorted by name
    pub fn add_constraint(&mut self, constraint: ColumnConstraint) {
        self.constraints.push(constraint);
        self.constraints.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Add an index to the table
    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn constraint(&self, name: &str) -> Option<&ColumnConstraint> {
        self.constraints.iter().find(|constraint| constraint.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnConstraint> {
        self.constraints_of(ConstraintKind::Primary)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ColumnConstraint> {
        self.constraints_of(ConstraintKind::Foreign)
    }

    pub fn unique_keys(&self) -> impl Iterator<Item = &ColumnConstraint> {
        self.constraints_of(ConstraintKind::Unique)
    }

    pub fn check_constraints(&self) -> impl Iterator<Item = &ColumnConstraint> {
        self.constraints_of(ConstraintKind::Check)
    }

    fn constraints_of(&self, kind: ConstraintKind) -> impl Iterator<Item = &ColumnConstraint> {
        self.constraints.iter().filter(move |constraint| constraint.kind == kind)
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_keys().next().is_some()
    }

    pub fn has_foreign_key(&self) -> bool {
        self.foreign_keys().next().is_some()
    }

    pub fn primary_key_column_names(&self) -> Vec<&str> {
        self.primary_keys()
            .flat_map(|pk| pk.columns.iter().map(String::as_str))
            .collect()
    }

    pub fn foreign_key_column_names(&self) -> Vec<&str> {
        self.foreign_keys()
            .flat_map(|fk| fk.columns.iter().map(String::as_str))
            .collect()
    }

    /// Whether any foreign key of this table points at `other`
    pub fn has_reference_to(&self, other: &TableDefinition) -> bool {
        self.foreign_keys().any(|fk| {
            fk.references
                .as_ref()
                .map_or(false, |reference| reference.table == other.name)
        })
    }
}

/// Represents a table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Formatted type, e.g. `VARCHAR(50)`
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    /// Expression of a `COMPUTED BY` column
    #[serde(default)]
    pub computed_by: Option<String>,
    #[serde(default)]
    pub identity: bool,
    #[serde(default)]
    pub remarks: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Create a new nullable column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            default: None,
            computed_by: None,
            identity: false,
            remarks: None,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark the column NOT NULL
    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    /// Set a default value for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Turn the column into a computed column
    pub fn computed_by(mut self, expression: &str) -> Self {
        self.computed_by = Some(expression.to_string());
        self
    }

    pub fn is_computed(&self) -> bool {
        self.computed_by.is_some()
    }

    /// Default expression without a leading `DEFAULT` keyword, as some
    /// catalogs store the full clause
    pub fn default_expression(&self) -> Option<&str> {
        let default = self.default.as_deref()?.trim();
        if default.is_empty() {
            return None;
        }
        let stripped = match default.get(..8) {
            Some(prefix) if prefix.eq_ignore_ascii_case("DEFAULT ") => default[8..].trim(),
            _ => default,
        };
        Some(stripped)
    }
}

/// Classification of a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Primary,
    Foreign,
    Unique,
    Check,
}

impl ConstraintKind {
    /// Parse the type names used by catalogs (`PRIMARY KEY`, `FOREIGN`, `CHECK`, `p`, ...)
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "PRIMARY" | "PRIMARY KEY" | "P" => Some(ConstraintKind::Primary),
            "FOREIGN" | "FOREIGN KEY" | "F" => Some(ConstraintKind::Foreign),
            "UNIQUE" | "UNIQUE KEY" | "U" => Some(ConstraintKind::Unique),
            "CHECK" | "C" => Some(ConstraintKind::Check),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ConstraintKind::Primary => "PRIMARY",
            ConstraintKind::Foreign => "FOREIGN",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::Check => "CHECK",
        }
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForeignKeyReference {
    pub table: String,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub on_update: Option<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
}

/// A primary, foreign, unique or check constraint of one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConstraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub table_name: String,
    /// Constrained columns in key order; empty for table-level checks
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub references: Option<ForeignKeyReference>,
    /// Source of a check constraint, usually `CHECK (...)`
    #[serde(default)]
    pub check_source: Option<String>,
}

impl ColumnConstraint {
    pub fn new(name: &str, kind: ConstraintKind, table_name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            table_name: table_name.to_string(),
            columns: Vec::new(),
            references: None,
            check_source: None,
        }
    }

    pub fn primary_key(name: &str, table_name: &str, columns: &[&str]) -> Self {
        Self::new(name, ConstraintKind::Primary, table_name).with_columns(columns)
    }

    pub fn unique(name: &str, table_name: &str, columns: &[&str]) -> Self {
        Self::new(name, ConstraintKind::Unique, table_name).with_columns(columns)
    }

    pub fn foreign_key(
        name: &str,
        table_name: &str,
        columns: &[&str],
        referenced_table: &str,
        referenced_columns: &[&str],
    ) -> Self {
        let mut constraint = Self::new(name, ConstraintKind::Foreign, table_name).with_columns(columns);
        constraint.references = Some(ForeignKeyReference {
            table: referenced_table.to_string(),
            columns: referenced_columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        });
        constraint
    }

    pub fn check(name: &str, table_name: &str, source: &str) -> Self {
        let mut constraint = Self::new(name, ConstraintKind::Check, table_name);
        constraint.check_source = Some(source.to_string());
        constraint
    }

    fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.kind == ConstraintKind::Primary
    }

    pub fn is_foreign_key(&self) -> bool {
        self.kind == ConstraintKind::Foreign
    }

    pub fn is_unique_key(&self) -> bool {
        self.kind == ConstraintKind::Unique
    }

    /// First constrained column, the one a single-column constraint is shown under
    pub fn column_name(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    /// Structural equality ignoring whitespace differences in check sources
    pub fn same_definition(&self, other: &ColumnConstraint) -> bool {
        self.kind == other.kind
            && self.columns == other.columns
            && self.references == other.references
            && normalize_source(self.check_source.as_deref())
                == normalize_source(other.check_source.as_deref())
    }
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub non_unique: bool,
    /// Indexed columns; empty when `expression` is set
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub descending: bool,
    /// Set when the index backs a constraint rather than being a plain index
    #[serde(default)]
    pub constraint_type: Option<ConstraintKind>,
}

impl Index {
    pub fn new(name: &str, table_name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            table_name: table_name.to_string(),
            non_unique: true,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            expression: None,
            descending: false,
            constraint_type: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.non_unique = false;
        self
    }

    /// Replace the column list with a computed expression
    pub fn with_expression(mut self, expression: &str) -> Self {
        self.columns.clear();
        self.expression = Some(expression.to_string());
        self
    }

    pub fn is_unique(&self) -> bool {
        !self.non_unique
    }

    /// Plain indexes are managed by index DDL; constraint indexes follow their constraint
    pub fn is_plain(&self) -> bool {
        self.constraint_type.is_none()
    }
}

/// Represents a database view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Select statement following `AS`
    pub source: String,
}

/// Represents a stored procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    /// Everything after the procedure name: parameters, RETURNS and body
    pub source: String,
}

/// Represents a user trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    #[serde(default)]
    pub table_name: Option<String>,
    /// Firing moment and events, e.g. `BEFORE INSERT OR UPDATE`
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    pub source: String,
}

fn default_active() -> bool {
    true
}

/// Collapse runs of whitespace so that reformatted sources compare equal
pub fn normalize_source(source: Option<&str>) -> Option<String> {
    source.map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_features_by_version() {
        let fb2 = Engine::new(EngineKind::Firebird, 2);
        let fb3 = Engine::new(EngineKind::Firebird, 3);
        let rdb3 = Engine::new(EngineKind::RedDatabase, 3);
        let rdb5 = Engine::new(EngineKind::RedDatabase, 5);
        let pg = Engine::new(EngineKind::Postgres, 16);

        assert!(!fb2.supports_sql_security());
        assert!(fb3.supports_sql_security());
        assert!(!fb3.supports_adapter());
        assert!(rdb3.supports_adapter());
        assert!(!rdb3.supports_tablespace());
        assert!(rdb5.supports_tablespace());
        assert!(!pg.supports_external_file());
        assert!(!pg.checks_via_triggers());
    }

    #[test]
    fn test_default_expression_strips_keyword() {
        assert_eq!(Column::new("A", "INTEGER").default("DEFAULT 0").default_expression(), Some("0"));
        assert_eq!(Column::new("A", "INTEGER").default("'x'").default_expression(), Some("'x'"));
        assert_eq!(Column::new("A", "INTEGER").default("  ").default_expression(), None);
    }

    #[test]
    fn test_has_reference_to() {
        let mut orders = TableDefinition::new("ORDERS");
        orders.add_constraint(ColumnConstraint::foreign_key(
            "FK_ORDERS_CUSTOMER",
            "ORDERS",
            &["CUSTOMER_ID"],
            "CUSTOMERS",
            &["ID"],
        ));
        let customers = TableDefinition::new("CUSTOMERS");

        assert!(orders.has_reference_to(&customers));
        assert!(!customers.has_reference_to(&orders));
        assert_eq!(orders.foreign_key_column_names(), vec!["CUSTOMER_ID"]);
    }

    #[test]
    fn test_constraint_definition_ignores_whitespace() {
        let a = ColumnConstraint::check("CHK_QTY", "ITEMS", "CHECK (QTY > 0)");
        let b = ColumnConstraint::check("CHK_QTY", "ITEMS", "CHECK  (QTY >\n 0)");
        assert!(a.same_definition(&b));
    }
}
