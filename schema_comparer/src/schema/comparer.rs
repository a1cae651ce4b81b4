//! Schema comparer
//!
//! Runs one [`SchemaDiff`] per configured object type and assembles the
//! rendered statements into a [`Script`]. Across all types the phases are:
//! drop constraints and indexes, drop objects, create objects, alter
//! objects, create constraints, create indexes, computed fields.

use futures::future::try_join;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ComparerConfig;
use crate::db::source::MetadataSource;
use crate::error::Result;
use crate::schema::diff::{ObjectAlteration, SchemaDiff, TableChanges};
use crate::schema::generator::DdlGenerator;
use crate::schema::script::Script;
use crate::schema::snapshot::Snapshot;
use crate::schema::types::{
    ColumnConstraint, ConstraintKind, DatabaseObject, Engine, Index, ObjectType, TableDefinition,
};

/// Compares schemas and renders the statements that migrate old into new
pub struct Comparer {
    generator: DdlGenerator,
    config: ComparerConfig,
}

impl Comparer {
    pub fn new(engine: Engine, config: ComparerConfig) -> Self {
        Self {
            generator: DdlGenerator::new(engine),
            config,
        }
    }

    pub fn generator(&self) -> &DdlGenerator {
        &self.generator
    }

    /// Snapshot both sources for every configured type and render the script
    pub async fn compare_sources(
        &self,
        old: Arc<dyn MetadataSource>,
        new: Arc<dyn MetadataSource>,
    ) -> Result<Script> {
        let mut diffs = Vec::new();
        for &object_type in &self.config.object_types {
            let (old_snapshot, new_snapshot) = try_join(
                Snapshot::from_source(Arc::clone(&old), object_type),
                Snapshot::from_source(Arc::clone(&new), object_type),
            )
            .await?;
            diffs.push(SchemaDiff::compare(&old_snapshot, &new_snapshot, object_type)?);
        }
        self.render(&diffs)
    }

    /// Compare two in-memory collections, such as edited models
    pub fn compare_objects(
        &self,
        old: &[DatabaseObject],
        new: &[DatabaseObject],
    ) -> Result<Script> {
        let mut diffs = Vec::new();
        for &object_type in &self.config.object_types {
            let old_snapshot = Snapshot::from_objects(object_type, old.iter().cloned())?;
            let new_snapshot = Snapshot::from_objects(object_type, new.iter().cloned())?;
            diffs.push(SchemaDiff::compare(&old_snapshot, &new_snapshot, object_type)?);
        }
        self.render(&diffs)
    }

    /// Render already computed diffs, in the given type order
    pub fn render(&self, diffs: &[SchemaDiff]) -> Result<Script> {
        for diff in diffs {
            tracing::info!(
                object_type = %diff.object_type,
                creates = diff.creates.len(),
                drops = diff.drops.len(),
                alters = diff.alters.len(),
                "Schema diff computed"
            );
        }

        let mut script = Script::new();
        self.drop_constraints(diffs, &mut script);
        if self.config.drop_objects {
            self.drop_objects(diffs, &mut script);
        }
        self.create_objects(diffs, &mut script)?;
        self.alter_objects(diffs, &mut script)?;
        self.create_constraints(diffs, &mut script)?;
        if self.config.include_indexes {
            self.create_indexes(diffs, &mut script)?;
        }
        if self.config.include_computed_fields {
            self.create_computed_fields(diffs, &mut script)?;
        }
        Ok(script)
    }

    fn drop_constraints(&self, diffs: &[SchemaDiff], script: &mut Script) {
        let mut constraints = Vec::new();
        let mut indexes = Vec::new();

        // foreign keys of dropped tables go first so that mutually
        // referencing tables can be dropped in any order
        if self.config.drop_constraints && self.config.drop_objects {
            for table in dropped_tables(diffs) {
                let names: Vec<&str> = table.foreign_keys().map(|c| c.name.as_str()).collect();
                constraints.push(self.generator.render_drop_constraints(&table.name, &names));
            }
        }

        for (table, changes) in altered_tables(diffs) {
            if self.config.drop_constraints {
                let names: Vec<&str> = changes
                    .dropped_constraints
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect();
                constraints.push(self.generator.render_drop_constraints(&table.name, &names));
            }
            if self.config.include_indexes {
                indexes.extend(
                    changes
                        .dropped_indexes
                        .iter()
                        .map(|index| self.generator.render_drop_index(index)),
                );
            }
        }

        script.push_section("Drop constraints", constraints);
        script.push_section("Drop indexes", indexes);
    }

    fn drop_objects(&self, diffs: &[SchemaDiff], script: &mut Script) {
        for diff in diffs.iter().rev() {
            let statements: Vec<String> = diff
                .drops
                .iter()
                .map(|object| match object {
                    DatabaseObject::Table(table) => self.generator.render_drop_table(table),
                    DatabaseObject::View(view) => self.generator.render_drop_view(view),
                    DatabaseObject::Procedure(procedure) => {
                        self.generator.render_drop_procedure(procedure)
                    }
                    DatabaseObject::Trigger(trigger) => self.generator.render_drop_trigger(trigger),
                })
                .collect();
            script.push_section(&section_title("Drop", diff.object_type), statements);
        }
    }

    fn create_objects(&self, diffs: &[SchemaDiff], script: &mut Script) -> Result<()> {
        for diff in diffs {
            let mut statements = Vec::with_capacity(diff.creates.len());
            for object in &diff.creates {
                statements.push(match object {
                    DatabaseObject::Table(table) => self.generator.render_create_table_body(table)?,
                    DatabaseObject::View(view) => self.generator.render_create_view(view, false)?,
                    DatabaseObject::Procedure(procedure) => {
                        self.generator.render_create_procedure(procedure, false)?
                    }
                    DatabaseObject::Trigger(trigger) => {
                        self.generator.render_create_trigger(trigger, false)?
                    }
                });
            }
            script.push_section(&section_title("Create", diff.object_type), statements);
        }
        Ok(())
    }

    fn alter_objects(&self, diffs: &[SchemaDiff], script: &mut Script) -> Result<()> {
        for diff in diffs {
            let mut statements = Vec::new();
            for alteration in &diff.alters {
                statements.extend(self.render_alteration(alteration)?);
            }
            script.push_section(&section_title("Alter", diff.object_type), statements);
        }
        Ok(())
    }

    /// Structural statements for one altered object; constraints, indexes
    /// and computed columns are handled by later phases
    fn render_alteration(&self, alteration: &ObjectAlteration) -> Result<Vec<String>> {
        match (&alteration.old, &alteration.new, &alteration.table_changes) {
            (DatabaseObject::Table(_), DatabaseObject::Table(table), Some(changes)) => {
                self.render_table_changes(table, changes)
            }
            (_, DatabaseObject::View(view), _) => self.generator.render_alter_view(view),
            (_, DatabaseObject::Procedure(procedure), _) => {
                self.generator.render_alter_procedure(procedure)
            }
            (DatabaseObject::Trigger(old), DatabaseObject::Trigger(new), _) => {
                self.generator.render_alter_trigger(old, new)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn render_table_changes(
        &self,
        table: &TableDefinition,
        changes: &TableChanges,
    ) -> Result<Vec<String>> {
        let mut statements = vec![self
            .generator
            .render_drop_columns(&table.name, &changes.dropped_columns)];

        for column in changes.added_columns.iter().filter(|c| !c.is_computed()) {
            statements.push(self.generator.render_add_column(&table.name, column));
        }
        // computed to computed is redefined in the computed fields phase;
        // a switch between computed and stored fails in render_alter_column
        for change in changes
            .altered_columns
            .iter()
            .filter(|c| !(c.from.is_computed() && c.to.is_computed()))
        {
            statements.extend(self.generator.render_alter_column(&table.name, change)?);
        }
        statements.extend(
            self.generator
                .render_alter_attributes(&table.name, &changes.attribute_changes)?,
        );

        Ok(statements)
    }

    fn create_constraints(&self, diffs: &[SchemaDiff], script: &mut Script) -> Result<()> {
        let mut by_kind: BTreeMap<u8, Vec<String>> = BTreeMap::new();

        let created = created_tables(diffs).flat_map(|table| table.constraints.iter());
        let added = altered_tables(diffs).flat_map(|(table, changes)| {
            changes
                .added_constraints
                .iter()
                .filter(move |constraint| self.can_add(table, changes, constraint))
        });
        for constraint in created.chain(added) {
            by_kind
                .entry(kind_order(constraint))
                .or_default()
                .push(self.generator.render_add_constraint(constraint)?);
        }

        for (order, statements) in by_kind {
            script.push_section(KIND_TITLES[order as usize], statements);
        }
        Ok(())
    }

    /// A redefined constraint is only re-added when its old version is dropped
    fn can_add(&self, table: &TableDefinition, changes: &TableChanges, constraint: &ColumnConstraint) -> bool {
        if self.config.drop_constraints
            || !changes.dropped_constraints.iter().any(|c| c.name == constraint.name)
        {
            return true;
        }
        tracing::warn!(
            table = %table.name,
            constraint = %constraint.name,
            "Redefined constraint skipped because constraint drops are disabled"
        );
        false
    }

    fn create_indexes(&self, diffs: &[SchemaDiff], script: &mut Script) -> Result<()> {
        let created = created_tables(diffs).flat_map(|table| table.indexes.iter().filter(|i| i.is_plain()));
        let added = altered_tables(diffs).flat_map(|(_, changes)| changes.added_indexes.iter());

        let statements = created
            .chain(added)
            .map(|index: &Index| self.generator.render_create_index(index))
            .collect::<Result<Vec<_>>>()?;
        script.push_section("Indexes", statements);
        Ok(())
    }

    fn create_computed_fields(&self, diffs: &[SchemaDiff], script: &mut Script) -> Result<()> {
        let mut statements = Vec::new();

        for table in created_tables(diffs) {
            for column in table.columns.iter().filter(|c| c.is_computed()) {
                statements.push(self.generator.render_computed_column(&table.name, column, false)?);
            }
        }
        for (table, changes) in altered_tables(diffs) {
            for column in changes.added_columns.iter().filter(|c| c.is_computed()) {
                statements.push(self.generator.render_computed_column(&table.name, column, false)?);
            }
            for change in &changes.altered_columns {
                if change.from.is_computed() && change.to.is_computed() && change.computed_changed() {
                    statements.push(self.generator.render_computed_column(&table.name, &change.to, true)?);
                }
            }
        }

        script.push_section("Computed fields", statements);
        Ok(())
    }
}

const KIND_TITLES: [&str; 4] = ["Primary keys", "Unique keys", "Foreign keys", "Check constraints"];

fn kind_order(constraint: &ColumnConstraint) -> u8 {
    match constraint.kind {
        ConstraintKind::Primary => 0,
        ConstraintKind::Unique => 1,
        ConstraintKind::Foreign => 2,
        ConstraintKind::Check => 3,
    }
}

fn section_title(verb: &str, object_type: ObjectType) -> String {
    let noun = match object_type {
        ObjectType::Table => "tables",
        ObjectType::View => "views",
        ObjectType::Procedure => "procedures",
        ObjectType::Trigger => "triggers",
        ObjectType::Index => "indexes",
        ObjectType::Constraint => "constraints",
    };
    format!("{} {}", verb, noun)
}

fn created_tables(diffs: &[SchemaDiff]) -> impl Iterator<Item = &TableDefinition> {
    diffs
        .iter()
        .flat_map(|diff| diff.creates.iter())
        .filter_map(DatabaseObject::as_table)
}

fn dropped_tables(diffs: &[SchemaDiff]) -> impl Iterator<Item = &TableDefinition> {
    diffs
        .iter()
        .flat_map(|diff| diff.drops.iter())
        .filter_map(DatabaseObject::as_table)
}

fn altered_tables(diffs: &[SchemaDiff]) -> impl Iterator<Item = (&TableDefinition, &TableChanges)> {
    diffs
        .iter()
        .flat_map(|diff| diff.alters.iter())
        .filter_map(|alteration| {
            let table = alteration.new.as_table()?;
            let changes = alteration.table_changes.as_ref()?;
            Some((table, changes))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::types::{Column, EngineKind};
    use pretty_assertions::assert_eq;

    fn comparer() -> Comparer {
        Comparer::new(Engine::new(EngineKind::Firebird, 3), ComparerConfig::default())
    }

    fn titles(script: &Script) -> Vec<&str> {
        script.sections().iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn test_identical_objects_give_empty_script() {
        let mut table = TableDefinition::new("T");
        table.add_column(Column::new("ID", "INTEGER"));
        let objects = vec![DatabaseObject::Table(table)];

        let script = comparer().compare_objects(&objects, &objects).unwrap();

        assert!(script.is_empty());
    }

    #[test]
    fn test_phase_order() {
        let mut old_t = TableDefinition::new("T");
        old_t.add_column(Column::new("ID", "INTEGER").not_null());
        old_t.add_column(Column::new("OLD_COL", "INTEGER"));
        old_t.add_constraint(ColumnConstraint::unique("UQ_T_OLD", "T", &["OLD_COL"]));
        let mut gone = TableDefinition::new("GONE");
        gone.add_column(Column::new("ID", "INTEGER"));

        let mut new_t = TableDefinition::new("T");
        new_t.add_column(Column::new("ID", "INTEGER").not_null());
        new_t.add_column(Column::new("TWICE", "INTEGER").computed_by("ID * 2"));
        new_t.add_constraint(ColumnConstraint::primary_key("PK_T", "T", &["ID"]));
        let mut u = TableDefinition::new("U");
        u.add_column(Column::new("T_ID", "INTEGER"));
        u.add_constraint(ColumnConstraint::foreign_key("FK_U_T", "U", &["T_ID"], "T", &["ID"]));

        let script = comparer()
            .compare_objects(
                &[DatabaseObject::Table(old_t), DatabaseObject::Table(gone)],
                &[DatabaseObject::Table(new_t), DatabaseObject::Table(u)],
            )
            .unwrap();

        assert_eq!(
            titles(&script),
            vec![
                "Drop constraints",
                "Drop tables",
                "Create tables",
                "Alter tables",
                "Primary keys",
                "Foreign keys",
                "Computed fields",
            ]
        );
        assert_eq!(
            script.sections()[0].statements,
            vec!["ALTER TABLE T\nDROP CONSTRAINT UQ_T_OLD;".to_string()]
        );
        assert_eq!(
            script.sections()[6].statements,
            vec!["ALTER TABLE T ADD TWICE COMPUTED BY (ID * 2);".to_string()]
        );
    }

    #[test]
    fn test_stored_column_cannot_become_computed() {
        let mut old_t = TableDefinition::new("T");
        old_t.add_column(Column::new("ID", "INTEGER"));
        old_t.add_column(Column::new("X", "INTEGER"));
        let mut new_t = TableDefinition::new("T");
        new_t.add_column(Column::new("ID", "INTEGER"));
        new_t.add_column(Column::new("X", "INTEGER").computed_by("ID * 2"));

        let err = comparer()
            .compare_objects(&[DatabaseObject::Table(old_t)], &[DatabaseObject::Table(new_t)])
            .unwrap_err();

        assert!(matches!(err, Error::SynthesisError { ref object, .. } if object == "T"));
    }

    #[test]
    fn test_computed_expression_change_is_redefined() {
        let mut old_t = TableDefinition::new("T");
        old_t.add_column(Column::new("ID", "INTEGER"));
        old_t.add_column(Column::new("X", "INTEGER").computed_by("ID * 2"));
        let mut new_t = TableDefinition::new("T");
        new_t.add_column(Column::new("ID", "INTEGER"));
        new_t.add_column(Column::new("X", "INTEGER").computed_by("ID * 3"));

        let script = comparer()
            .compare_objects(&[DatabaseObject::Table(old_t)], &[DatabaseObject::Table(new_t)])
            .unwrap();

        assert_eq!(
            script.to_string(),
            "-- Computed fields\nALTER TABLE T ALTER X COMPUTED BY (ID * 3);\n"
        );
    }

    #[test]
    fn test_mutually_referencing_tables_drop_foreign_keys_first() {
        let mut p = TableDefinition::new("P");
        p.add_column(Column::new("ID", "INTEGER"));
        p.add_column(Column::new("Q_ID", "INTEGER"));
        p.add_constraint(ColumnConstraint::foreign_key("FK_P_Q", "P", &["Q_ID"], "Q", &["ID"]));
        let mut q = TableDefinition::new("Q");
        q.add_column(Column::new("ID", "INTEGER"));
        q.add_column(Column::new("P_ID", "INTEGER"));
        q.add_constraint(ColumnConstraint::foreign_key("FK_Q_P", "Q", &["P_ID"], "P", &["ID"]));

        let script = comparer()
            .compare_objects(&[DatabaseObject::Table(p), DatabaseObject::Table(q)], &[])
            .unwrap();

        assert_eq!(titles(&script), vec!["Drop constraints", "Drop tables"]);
        let mut dropped = script.sections()[0].statements.clone();
        dropped.sort();
        assert_eq!(
            dropped,
            vec![
                "ALTER TABLE P\nDROP CONSTRAINT FK_P_Q;".to_string(),
                "ALTER TABLE Q\nDROP CONSTRAINT FK_Q_P;".to_string(),
            ]
        );
        assert_eq!(script.sections()[1].statements.len(), 2);
    }

    #[test]
    fn test_redefined_constraint_is_kept_when_drops_are_disabled() {
        let mut old_t = TableDefinition::new("T");
        old_t.add_column(Column::new("A", "INTEGER"));
        old_t.add_column(Column::new("B", "INTEGER"));
        old_t.add_constraint(ColumnConstraint::unique("UQ_T", "T", &["A"]));
        let mut new_t = old_t.clone();
        new_t.constraints.clear();
        new_t.add_constraint(ColumnConstraint::unique("UQ_T", "T", &["A", "B"]));
        new_t.add_constraint(ColumnConstraint::unique("UQ_T_B", "T", &["B"]));
        let config = ComparerConfig {
            drop_constraints: false,
            ..ComparerConfig::default()
        };

        let script = Comparer::new(Engine::new(EngineKind::Firebird, 3), config)
            .compare_objects(&[DatabaseObject::Table(old_t)], &[DatabaseObject::Table(new_t)])
            .unwrap();

        assert_eq!(
            script.to_string(),
            "-- Unique keys\nALTER TABLE T ADD CONSTRAINT UQ_T_B UNIQUE (B);\n"
        );
    }

    #[test]
    fn test_drop_objects_can_be_disabled() {
        let mut gone = TableDefinition::new("GONE");
        gone.add_column(Column::new("ID", "INTEGER"));
        let config = ComparerConfig {
            drop_objects: false,
            ..ComparerConfig::default()
        };

        let script = Comparer::new(Engine::default(), config)
            .compare_objects(&[DatabaseObject::Table(gone)], &[])
            .unwrap();

        assert!(script.is_empty());
    }
}
