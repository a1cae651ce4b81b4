//! DDL generator
//!
//! Renders CREATE/ALTER/DROP statements and row-editing templates for one
//! target [`Engine`]. Every identifier goes through
//! [`quote_identifier`](crate::utils::quote_identifier) before interpolation.

use crate::error::{Error, Result};
use crate::schema::diff::{ColumnChange, TableAttributeChange};
use crate::schema::types::{
    Column, ColumnConstraint, ConstraintKind, Engine, EngineKind, Index, Procedure,
    TableDefinition, Trigger, View,
};
use crate::utils::{parameter_name, quote_identifier, quote_list, quote_literal};

/// Statement terminator used inside `SET TERM` blocks
const PSQL_TERMINATOR: &str = "^";
const MYSQL_DELIMITER: &str = "//";

/// SQL generator for one target engine
#[derive(Debug, Clone, Copy)]
pub struct DdlGenerator {
    engine: Engine,
}

impl DdlGenerator {
    /// Create a new generator for `engine`
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn quote(&self, name: &str) -> String {
        quote_identifier(name, &self.engine)
    }

    fn quote_all<S: AsRef<str>>(&self, names: &[S]) -> String {
        quote_list(names, &self.engine)
    }

    /// Render the complete CREATE TABLE statement, with inline constraints
    /// and trailing comments
    pub fn render_create_table(&self, table: &TableDefinition) -> Result<String> {
        self.create_table(table, true)
    }

    /// Render CREATE TABLE with stored columns only.
    ///
    /// Scripts add constraints and computed columns in later sections.
    pub fn render_create_table_body(&self, table: &TableDefinition) -> Result<String> {
        self.create_table(table, false)
    }

    fn create_table(&self, table: &TableDefinition, complete: bool) -> Result<String> {
        let columns: Vec<&Column> = table
            .columns
            .iter()
            .filter(|column| complete || !column.is_computed())
            .collect();
        if columns.is_empty() {
            return Err(Error::synthesis(&table.name, "table has no stored columns"));
        }

        let mut sql = format!("CREATE TABLE {}", self.quote(&table.name));

        if self.engine.supports_external_file() {
            if let Some(file) = non_blank(&table.external_file) {
                sql.push_str(&format!(" EXTERNAL FILE {}", quote_literal(file)));
                if self.engine.supports_adapter() {
                    if let Some(adapter) = non_blank(&table.adapter) {
                        sql.push_str(&format!(" ADAPTER {}", quote_literal(adapter)));
                    }
                }
            }
        }

        let mut definitions = Vec::new();
        for column in columns {
            definitions.push(format!("    {}", self.column_definition(column)));
        }
        if complete {
            for constraint in &table.constraints {
                definitions.push(format!("    {}", self.constraint_clause(constraint)?));
            }
        }

        sql.push_str(" (\n");
        sql.push_str(&definitions.join(",\n"));
        sql.push_str("\n)");

        if let Some(security) = table.sql_security {
            if self.engine.supports_sql_security() {
                sql.push_str(&format!("\nSQL SECURITY {}", security.keyword()));
            }
        }
        if self.engine.supports_tablespace() {
            if let Some(tablespace) = non_blank(&table.tablespace) {
                sql.push_str(&format!("\nTABLESPACE {}", self.quote(tablespace)));
            }
        }
        if self.engine.kind == EngineKind::MySql {
            if let Some(remarks) = non_blank(&table.remarks) {
                sql.push_str(&format!(" COMMENT={}", quote_literal(remarks)));
            }
        }
        sql.push(';');

        for comment in self.comment_statements(table) {
            sql.push('\n');
            sql.push_str(&comment);
        }

        Ok(sql)
    }

    /// Column definition as used in CREATE TABLE and ADD
    pub fn column_definition(&self, column: &Column) -> String {
        let name = self.quote(&column.name);

        if let Some(expression) = &column.computed_by {
            return match self.engine.kind {
                EngineKind::Firebird | EngineKind::RedDatabase => {
                    format!("{} COMPUTED BY {}", name, parenthesize(expression))
                }
                _ => format!(
                    "{} {} GENERATED ALWAYS AS {} STORED",
                    name,
                    column.data_type,
                    parenthesize(expression)
                ),
            };
        }

        let mut sql = format!("{} {}", name, column.data_type);
        if let Some(default) = column.default_expression() {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.engine.kind == EngineKind::MySql {
            if let Some(remarks) = non_blank(&column.remarks) {
                sql.push_str(&format!(" COMMENT {}", quote_literal(remarks)));
            }
        }
        sql
    }

    /// `COMMENT ON` statements for the table and its columns
    fn comment_statements(&self, table: &TableDefinition) -> Vec<String> {
        if !self.supports_comment_on() {
            return Vec::new();
        }

        let table_name = self.quote(&table.name);
        let mut statements = Vec::new();
        if let Some(remarks) = non_blank(&table.remarks) {
            statements.push(format!(
                "COMMENT ON TABLE {} IS {};",
                table_name,
                quote_literal(remarks)
            ));
        }
        for column in &table.columns {
            if let Some(remarks) = non_blank(&column.remarks) {
                statements.push(format!(
                    "COMMENT ON COLUMN {}.{} IS {};",
                    table_name,
                    self.quote(&column.name),
                    quote_literal(remarks)
                ));
            }
        }
        statements
    }

    fn supports_comment_on(&self) -> bool {
        self.engine.is_firebird_family() || self.engine.kind == EngineKind::Postgres
    }

    /// `CONSTRAINT name ...` clause, shared by CREATE TABLE and ADD CONSTRAINT
    pub fn constraint_clause(&self, constraint: &ColumnConstraint) -> Result<String> {
        let prefix = if constraint.name.trim().is_empty() {
            String::new()
        } else {
            format!("CONSTRAINT {} ", self.quote(&constraint.name))
        };
        let fail = |message: &str| {
            Error::synthesis_constraint(&constraint.table_name, &constraint.name, message)
        };

        let body = match constraint.kind {
            ConstraintKind::Primary | ConstraintKind::Unique => {
                if constraint.columns.is_empty() {
                    return Err(fail("key has no columns"));
                }
                let keyword = if constraint.is_primary_key() {
                    "PRIMARY KEY"
                } else {
                    "UNIQUE"
                };
                format!("{} ({})", keyword, self.quote_all(&constraint.columns))
            }
            ConstraintKind::Foreign => {
                let reference = constraint
                    .references
                    .as_ref()
                    .ok_or_else(|| fail("foreign key has no referenced table"))?;
                if reference.table.trim().is_empty() {
                    return Err(fail("foreign key has no referenced table"));
                }
                if constraint.columns.is_empty() {
                    return Err(fail("foreign key has no columns"));
                }
                if reference.columns.is_empty() {
                    return Err(fail("foreign key has no referenced columns"));
                }
                if reference.columns.len() != constraint.columns.len() {
                    return Err(fail(&format!(
                        "foreign key has {} columns but references {}",
                        constraint.columns.len(),
                        reference.columns.len()
                    )));
                }

                let mut clause = format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.quote_all(&constraint.columns),
                    self.quote(&reference.table),
                    self.quote_all(&reference.columns)
                );
                if let Some(rule) = referential_rule(&reference.on_update) {
                    clause.push_str(&format!(" ON UPDATE {}", rule));
                }
                if let Some(rule) = referential_rule(&reference.on_delete) {
                    clause.push_str(&format!(" ON DELETE {}", rule));
                }
                clause
            }
            ConstraintKind::Check => {
                let source = constraint
                    .check_source
                    .as_deref()
                    .map(str::trim)
                    .filter(|source| !source.is_empty())
                    .ok_or_else(|| fail("check constraint has no source"))?;
                if starts_with_keyword(source, "CHECK") {
                    source.to_string()
                } else {
                    format!("CHECK {}", parenthesize(source))
                }
            }
        };

        Ok(format!("{}{}", prefix, body))
    }

    /// Render `DROP TABLE`
    pub fn render_drop_table(&self, table: &TableDefinition) -> String {
        format!("DROP TABLE {};", self.quote(&table.name))
    }

    /// One ALTER TABLE dropping every named constraint, or `""` when there are none
    pub fn render_drop_constraints<S: AsRef<str>>(&self, table_name: &str, names: &[S]) -> String {
        let clauses: Vec<String> = names
            .iter()
            .map(|name| format!("DROP CONSTRAINT {}", self.quote(name.as_ref())))
            .collect();
        self.alter_table_clauses(table_name, &clauses)
    }

    /// One ALTER TABLE dropping every named column, or `""` when there are none
    pub fn render_drop_columns<S: AsRef<str>>(&self, table_name: &str, names: &[S]) -> String {
        let keyword = if self.engine.is_firebird_family() {
            "DROP"
        } else {
            "DROP COLUMN"
        };
        let clauses: Vec<String> = names
            .iter()
            .map(|name| format!("{} {}", keyword, self.quote(name.as_ref())))
            .collect();
        self.alter_table_clauses(table_name, &clauses)
    }

    fn alter_table_clauses(&self, table_name: &str, clauses: &[String]) -> String {
        if clauses.is_empty() {
            return String::new();
        }
        format!(
            "ALTER TABLE {}\n{};",
            self.quote(table_name),
            clauses.join(",\n")
        )
    }

    /// Render `ALTER TABLE ... ADD CONSTRAINT`
    pub fn render_add_constraint(&self, constraint: &ColumnConstraint) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD {};",
            self.quote(&constraint.table_name),
            self.constraint_clause(constraint)?
        ))
    }

    /// Render `ALTER TABLE ... ADD` for a new column
    pub fn render_add_column(&self, table_name: &str, column: &Column) -> String {
        let keyword = if self.engine.is_firebird_family() {
            "ADD"
        } else {
            "ADD COLUMN"
        };
        format!(
            "ALTER TABLE {} {} {};",
            self.quote(table_name),
            keyword,
            self.column_definition(column)
        )
    }

    /// Statements changing a stored column's type, nullability, default and remarks
    pub fn render_alter_column(&self, table_name: &str, change: &ColumnChange) -> Result<Vec<String>> {
        if change.from.is_computed() != change.to.is_computed() {
            return Err(Error::synthesis(
                table_name,
                format!(
                    "column {} cannot switch between computed and stored",
                    change.column_name
                ),
            ));
        }

        let table = self.quote(table_name);
        let column = self.quote(&change.column_name);
        let mut statements = Vec::new();

        match self.engine.kind {
            EngineKind::Firebird | EngineKind::RedDatabase | EngineKind::Postgres => {
                let alter = if self.engine.kind == EngineKind::Postgres {
                    "ALTER COLUMN"
                } else {
                    "ALTER"
                };
                if change.type_changed() {
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                        table, column, change.to.data_type
                    ));
                }
                if change.nullability_changed() && !change.to.is_computed() {
                    let action = if change.to.nullable { "DROP" } else { "SET" };
                    statements.push(format!(
                        "ALTER TABLE {} {} {} {} NOT NULL;",
                        table, alter, column, action
                    ));
                }
                if change.default_changed() {
                    statements.push(match change.to.default_expression() {
                        Some(default) => format!(
                            "ALTER TABLE {} {} {} SET DEFAULT {};",
                            table, alter, column, default
                        ),
                        None => format!("ALTER TABLE {} {} {} DROP DEFAULT;", table, alter, column),
                    });
                }
                if change.remarks_changed() {
                    let remarks = non_blank(&change.to.remarks)
                        .map(quote_literal)
                        .unwrap_or_else(|| "NULL".to_string());
                    statements.push(format!(
                        "COMMENT ON COLUMN {}.{} IS {};",
                        table, column, remarks
                    ));
                }
            }
            EngineKind::MySql => {
                if change.type_changed()
                    || change.nullability_changed()
                    || change.default_changed()
                    || change.remarks_changed()
                {
                    statements.push(format!(
                        "ALTER TABLE {} MODIFY COLUMN {};",
                        table,
                        self.column_definition(&change.to)
                    ));
                }
            }
            EngineKind::Sqlite => {
                if change.type_changed()
                    || change.nullability_changed()
                    || change.default_changed()
                {
                    return Err(Error::synthesis(
                        table_name,
                        format!(
                            "SQLite cannot alter column {}; the table must be rebuilt",
                            change.column_name
                        ),
                    ));
                }
            }
        }

        Ok(statements)
    }

    /// Add or redefine a computed column
    pub fn render_computed_column(&self, table_name: &str, column: &Column, exists: bool) -> Result<String> {
        let expression = column.computed_by.as_deref().ok_or_else(|| {
            Error::synthesis(table_name, format!("column {} is not computed", column.name))
        })?;

        if !exists {
            return Ok(self.render_add_column(table_name, column));
        }
        if !self.engine.is_firebird_family() {
            return Err(Error::synthesis(
                table_name,
                format!(
                    "expression of generated column {} cannot be altered in place",
                    column.name
                ),
            ));
        }
        Ok(format!(
            "ALTER TABLE {} ALTER {} COMPUTED BY {};",
            self.quote(table_name),
            self.quote(&column.name),
            parenthesize(expression)
        ))
    }

    /// Statements for table-level attribute changes.
    ///
    /// Attributes the engine does not support are skipped.
    pub fn render_alter_attributes(
        &self,
        table_name: &str,
        changes: &[TableAttributeChange],
    ) -> Result<Vec<String>> {
        let table = self.quote(table_name);
        let mut statements = Vec::new();

        for change in changes {
            match change {
                TableAttributeChange::SqlSecurity(security) => {
                    if !self.engine.supports_sql_security() {
                        continue;
                    }
                    statements.push(match security {
                        Some(security) => {
                            format!("ALTER TABLE {} ALTER SQL SECURITY {};", table, security.keyword())
                        }
                        None => format!("ALTER TABLE {} DROP SQL SECURITY;", table),
                    });
                }
                TableAttributeChange::Remarks(remarks) => {
                    let literal = remarks
                        .as_deref()
                        .filter(|r| !r.trim().is_empty())
                        .map(quote_literal);
                    if self.supports_comment_on() {
                        statements.push(format!(
                            "COMMENT ON TABLE {} IS {};",
                            table,
                            literal.unwrap_or_else(|| "NULL".to_string())
                        ));
                    } else if self.engine.kind == EngineKind::MySql {
                        statements.push(format!(
                            "ALTER TABLE {} COMMENT = {};",
                            table,
                            literal.unwrap_or_else(|| "''".to_string())
                        ));
                    }
                }
                TableAttributeChange::Tablespace(tablespace) => {
                    if !self.engine.supports_tablespace() {
                        continue;
                    }
                    let target = tablespace
                        .as_deref()
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| self.quote(t))
                        .unwrap_or_else(|| "PRIMARY".to_string());
                    statements.push(format!("ALTER TABLE {} SET TABLESPACE TO {};", table, target));
                }
                TableAttributeChange::ExternalFile(_) => {
                    if self.engine.supports_external_file() {
                        return Err(Error::synthesis(
                            table_name,
                            "external file of an existing table cannot be changed",
                        ));
                    }
                }
                TableAttributeChange::Adapter(_) => {
                    if self.engine.supports_adapter() {
                        return Err(Error::synthesis(
                            table_name,
                            "adapter of an existing table cannot be changed",
                        ));
                    }
                }
            }
        }

        Ok(statements)
    }

    /// Render `CREATE INDEX`
    pub fn render_create_index(&self, index: &Index) -> Result<String> {
        let unique = if index.is_unique() { "UNIQUE " } else { "" };
        let name = self.quote(&index.name);
        let table = self.quote(&index.table_name);

        let target = match (&index.expression, index.columns.is_empty()) {
            (Some(expression), _) => match self.engine.kind {
                EngineKind::Firebird | EngineKind::RedDatabase => {
                    format!("COMPUTED BY {}", parenthesize(expression))
                }
                EngineKind::Sqlite => parenthesize(expression),
                EngineKind::Postgres | EngineKind::MySql => {
                    format!("({})", parenthesize(expression))
                }
            },
            (None, false) => {
                if index.descending && !self.engine.is_firebird_family() {
                    let columns: Vec<String> = index
                        .columns
                        .iter()
                        .map(|c| format!("{} DESC", self.quote(c)))
                        .collect();
                    format!("({})", columns.join(", "))
                } else {
                    format!("({})", self.quote_all(&index.columns))
                }
            }
            (None, true) => {
                return Err(Error::synthesis(
                    &index.table_name,
                    format!("index {} has neither columns nor an expression", index.name),
                ))
            }
        };

        let descending = if index.descending && self.engine.is_firebird_family() {
            "DESCENDING "
        } else {
            ""
        };

        Ok(format!(
            "CREATE {}{}INDEX {} ON {} {};",
            unique, descending, name, table, target
        ))
    }

    /// Render `DROP INDEX`
    pub fn render_drop_index(&self, index: &Index) -> String {
        match self.engine.kind {
            EngineKind::MySql => format!(
                "DROP INDEX {} ON {};",
                self.quote(&index.name),
                self.quote(&index.table_name)
            ),
            _ => format!("DROP INDEX {};", self.quote(&index.name)),
        }
    }

    /// Render a view definition; `replace` selects the create-or-replace form
    pub fn render_create_view(&self, view: &View, replace: bool) -> Result<String> {
        let source = strip_terminator(&view.source);
        if source.is_empty() {
            return Err(Error::synthesis(&view.name, "view has no source"));
        }

        let verb = match (self.engine.kind, replace) {
            (_, false) | (EngineKind::Sqlite, true) => "CREATE",
            (EngineKind::Firebird | EngineKind::RedDatabase, true) => "CREATE OR ALTER",
            (EngineKind::Postgres | EngineKind::MySql, true) => "CREATE OR REPLACE",
        };
        let columns = if view.columns.is_empty() {
            String::new()
        } else {
            format!(" ({})", self.quote_all(&view.columns))
        };

        Ok(format!(
            "{} VIEW {}{} AS\n{};",
            verb,
            self.quote(&view.name),
            columns,
            source
        ))
    }

    /// Statements replacing an existing view
    pub fn render_alter_view(&self, view: &View) -> Result<Vec<String>> {
        if self.engine.kind == EngineKind::Sqlite {
            return Ok(vec![
                self.render_drop_view(view),
                self.render_create_view(view, false)?,
            ]);
        }
        Ok(vec![self.render_create_view(view, true)?])
    }

    pub fn render_drop_view(&self, view: &View) -> String {
        format!("DROP VIEW {};", self.quote(&view.name))
    }

    /// Render a procedure; PSQL bodies are wrapped in `SET TERM`
    pub fn render_create_procedure(&self, procedure: &Procedure, replace: bool) -> Result<String> {
        let source = procedure.source.trim();
        if source.is_empty() {
            return Err(Error::synthesis(&procedure.name, "procedure has no source"));
        }
        let name = self.quote(&procedure.name);

        match self.engine.kind {
            EngineKind::Firebird | EngineKind::RedDatabase => {
                let verb = if replace { "CREATE OR ALTER" } else { "CREATE" };
                Ok(set_term_block(&format!(
                    "{} PROCEDURE {} {}",
                    verb,
                    name,
                    strip_terminator(source)
                )))
            }
            EngineKind::Postgres => {
                let verb = if replace { "CREATE OR REPLACE" } else { "CREATE" };
                Ok(format!("{} PROCEDURE {} {};", verb, name, strip_terminator(source)))
            }
            EngineKind::MySql => Ok(delimiter_block(&format!(
                "CREATE PROCEDURE {} {}",
                name,
                strip_terminator(source)
            ))),
            EngineKind::Sqlite => Err(Error::synthesis(
                &procedure.name,
                "SQLite has no stored procedures",
            )),
        }
    }

    /// Statements replacing an existing procedure
    pub fn render_alter_procedure(&self, procedure: &Procedure) -> Result<Vec<String>> {
        if self.engine.kind == EngineKind::MySql {
            return Ok(vec![
                self.render_drop_procedure(procedure),
                self.render_create_procedure(procedure, false)?,
            ]);
        }
        Ok(vec![self.render_create_procedure(procedure, true)?])
    }

    pub fn render_drop_procedure(&self, procedure: &Procedure) -> String {
        format!("DROP PROCEDURE {};", self.quote(&procedure.name))
    }

    /// Render a trigger; PSQL bodies are wrapped in `SET TERM`
    pub fn render_create_trigger(&self, trigger: &Trigger, replace: bool) -> Result<String> {
        let source = trigger.source.trim();
        if source.is_empty() {
            return Err(Error::synthesis(&trigger.name, "trigger has no source"));
        }
        if trigger.event.trim().is_empty() {
            return Err(Error::synthesis(&trigger.name, "trigger has no event"));
        }
        let name = self.quote(&trigger.name);

        if self.engine.is_firebird_family() {
            let verb = if replace { "CREATE OR ALTER" } else { "CREATE" };
            let target = trigger
                .table_name
                .as_deref()
                .map(|table| format!(" FOR {}", self.quote(table)))
                .unwrap_or_default();
            let state = if trigger.active { "ACTIVE" } else { "INACTIVE" };
            return Ok(set_term_block(&format!(
                "{} TRIGGER {}{}\n{} {} POSITION {}\n{}",
                verb,
                name,
                target,
                state,
                trigger.event.trim(),
                trigger.position,
                strip_terminator(source)
            )));
        }

        let table = trigger.table_name.as_deref().ok_or_else(|| {
            Error::synthesis(&trigger.name, "only table triggers are supported on this engine")
        })?;
        let statement = format!(
            "CREATE TRIGGER {} {} ON {} FOR EACH ROW {}",
            name,
            trigger.event.trim(),
            self.quote(table),
            strip_terminator(source)
        );
        if self.engine.kind == EngineKind::MySql {
            return Ok(delimiter_block(&statement));
        }
        Ok(format!("{};", statement))
    }

    /// Statements replacing an existing trigger
    pub fn render_alter_trigger(&self, old: &Trigger, new: &Trigger) -> Result<Vec<String>> {
        if self.engine.is_firebird_family() && old.table_name == new.table_name {
            return Ok(vec![self.render_create_trigger(new, true)?]);
        }
        Ok(vec![
            self.render_drop_trigger(old),
            self.render_create_trigger(new, false)?,
        ])
    }

    pub fn render_drop_trigger(&self, trigger: &Trigger) -> String {
        match (self.engine.kind, trigger.table_name.as_deref()) {
            (EngineKind::Postgres, Some(table)) => format!(
                "DROP TRIGGER {} ON {};",
                self.quote(&trigger.name),
                self.quote(table)
            ),
            _ => format!("DROP TRIGGER {};", self.quote(&trigger.name)),
        }
    }

    /// Insert template with one named parameter per stored column
    pub fn render_insert(&self, table: &TableDefinition) -> String {
        let columns: Vec<&Column> = table.columns.iter().filter(|c| !c.is_computed()).collect();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let values: Vec<String> = columns.iter().map(|c| parameter_name(&c.name)).collect();

        format!(
            "INSERT INTO {} ({})\nVALUES ({});",
            self.quote(&table.name),
            self.quote_all(&names),
            values.join(", ")
        )
    }

    /// Update template; filters on the primary key when there is one
    pub fn render_update(&self, table: &TableDefinition) -> String {
        let settings: Vec<String> = table
            .columns
            .iter()
            .filter(|c| !c.is_computed())
            .map(|c| format!("{} = {}", self.quote(&c.name), parameter_name(&c.name)))
            .collect();

        let mut sql = format!(
            "UPDATE {}\nSET {}",
            self.quote(&table.name),
            settings.join(",\n    ")
        );
        let keys = table.primary_key_column_names();
        if !keys.is_empty() {
            let conditions: Vec<String> = keys
                .iter()
                .map(|k| format!("{} = {}", self.quote(k), parameter_name(k)))
                .collect();
            sql.push_str(&format!("\nWHERE {}", conditions.join(" AND ")));
        }
        sql.push(';');
        sql
    }

    /// Select template listing every column
    pub fn render_select(&self, table: &TableDefinition) -> String {
        let names = table.column_names();
        let fields = if names.is_empty() {
            "*".to_string()
        } else {
            self.quote_all(&names)
        };
        format!("SELECT {}\nFROM {};", fields, self.quote(&table.name))
    }

    /// Positional update of the given columns, keyed on the primary key
    pub fn render_update_by_key<S: AsRef<str>>(&self, table: &TableDefinition, columns: &[S]) -> Result<String> {
        let conditions = self.key_conditions(table)?;
        if columns.is_empty() {
            return Err(Error::synthesis(&table.name, "no columns to update"));
        }
        let settings: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = ?", self.quote(c.as_ref())))
            .collect();
        Ok(format!(
            "UPDATE {} SET {} WHERE {}",
            self.quote(&table.name),
            settings.join(", "),
            conditions
        ))
    }

    /// Positional delete keyed on the primary key
    pub fn render_delete_by_key(&self, table: &TableDefinition) -> Result<String> {
        let conditions = self.key_conditions(table)?;
        Ok(format!(
            "DELETE FROM {} WHERE {}",
            self.quote(&table.name),
            conditions
        ))
    }

    fn key_conditions(&self, table: &TableDefinition) -> Result<String> {
        let keys = table.primary_key_column_names();
        if keys.is_empty() {
            return Err(Error::synthesis(&table.name, "table has no primary key"));
        }
        Ok(keys
            .iter()
            .map(|k| format!("{} = ?", self.quote(k)))
            .collect::<Vec<_>>()
            .join(" AND "))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn referential_rule(rule: &Option<String>) -> Option<String> {
    let rule = non_blank(rule)?.to_uppercase();
    (rule != "RESTRICT" && rule != "NO ACTION").then_some(rule)
}

fn starts_with_keyword(source: &str, keyword: &str) -> bool {
    source
        .get(..keyword.len())
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(keyword))
        && source[keyword.len()..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c == '(')
}

/// Wrap `expression` in parentheses unless one pair already encloses all of it
fn parenthesize(expression: &str) -> String {
    let expression = expression.trim();
    if enclosed_in_parens(expression) {
        expression.to_string()
    } else {
        format!("({})", expression)
    }
}

fn enclosed_in_parens(expression: &str) -> bool {
    if !expression.starts_with('(') || !expression.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    let mut in_literal = false;
    for (i, c) in expression.char_indices() {
        match c {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != expression.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn strip_terminator(source: &str) -> &str {
    source
        .trim()
        .trim_end_matches(|c: char| c == ';' || c == '^' || c.is_whitespace())
}

fn set_term_block(statement: &str) -> String {
    format!(
        "SET TERM {t} ;\n{}{t}\nSET TERM ; {t}",
        statement,
        t = PSQL_TERMINATOR
    )
}

/// MySQL compound statements need a client delimiter other than `;`
fn delimiter_block(statement: &str) -> String {
    format!(
        "DELIMITER {d}\n{}{d}\nDELIMITER ;",
        statement,
        d = MYSQL_DELIMITER
    )
}
