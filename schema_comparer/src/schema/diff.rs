//! Schema difference calculator
//!
//! This module compares two snapshots of the same object type and calculates
//! which objects must be created, dropped or altered.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::schema::dependency::{sort_for_create, sort_for_drop};
use crate::schema::snapshot::Snapshot;
use crate::schema::types::{
    normalize_source, Column, ColumnConstraint, DatabaseObject, Index, ObjectType, SqlSecurity,
    TableDefinition,
};

/// Changes needed to turn the old snapshot into the new one
#[derive(Debug, Clone)]
pub struct SchemaDiff {
    pub object_type: ObjectType,
    /// Objects only in the new snapshot, dependencies first
    pub creates: Vec<DatabaseObject>,
    /// Objects only in the old snapshot, dependents first
    pub drops: Vec<DatabaseObject>,
    /// Objects in both snapshots that differ, in new-snapshot order
    pub alters: Vec<ObjectAlteration>,
}

/// An object present in both snapshots with a structural difference
#[derive(Debug, Clone)]
pub struct ObjectAlteration {
    pub old: DatabaseObject,
    pub new: DatabaseObject,
    /// Detailed changes when the object is a table
    pub table_changes: Option<TableChanges>,
}

impl ObjectAlteration {
    pub fn name(&self) -> &str {
        self.new.name()
    }
}

/// Represents a column change
#[derive(Debug, Clone)]
pub struct ColumnChange {
    pub column_name: String,
    pub from: Column,
    pub to: Column,
}

impl ColumnChange {
    pub fn type_changed(&self) -> bool {
        !self.from.is_computed()
            && !self.to.is_computed()
            && normalize_type(&self.from.data_type) != normalize_type(&self.to.data_type)
    }

    pub fn nullability_changed(&self) -> bool {
        self.from.nullable != self.to.nullable
    }

    pub fn default_changed(&self) -> bool {
        self.from.default_expression() != self.to.default_expression()
    }

    pub fn computed_changed(&self) -> bool {
        normalize_source(self.from.computed_by.as_deref())
            != normalize_source(self.to.computed_by.as_deref())
    }

    pub fn remarks_changed(&self) -> bool {
        self.from.remarks != self.to.remarks
    }

    fn is_empty(&self) -> bool {
        !(self.type_changed()
            || self.nullability_changed()
            || self.default_changed()
            || self.computed_changed()
            || self.remarks_changed())
    }
}

/// Table-level attribute that changed
#[derive(Debug, Clone, PartialEq)]
pub enum TableAttributeChange {
    SqlSecurity(Option<SqlSecurity>),
    Remarks(Option<String>),
    Tablespace(Option<String>),
    ExternalFile(Option<String>),
    Adapter(Option<String>),
}

/// Detailed differences between two versions of one table
#[derive(Debug, Clone, Default)]
pub struct TableChanges {
    pub added_columns: Vec<Column>,
    pub dropped_columns: Vec<String>,
    pub altered_columns: Vec<ColumnChange>,
    /// New constraints and new versions of redefined ones
    pub added_constraints: Vec<ColumnConstraint>,
    /// Removed constraints and old versions of redefined ones
    pub dropped_constraints: Vec<ColumnConstraint>,
    pub added_indexes: Vec<Index>,
    pub dropped_indexes: Vec<Index>,
    pub attribute_changes: Vec<TableAttributeChange>,
}

impl TableChanges {
    /// Compare two versions of a table
    pub fn between(old: &TableDefinition, new: &TableDefinition) -> Self {
        let mut changes = TableChanges::default();

        for column in &new.columns {
            match old.column(&column.name) {
                None => changes.added_columns.push(column.clone()),
                Some(current) => {
                    let change = ColumnChange {
                        column_name: column.name.clone(),
                        from: current.clone(),
                        to: column.clone(),
                    };
                    if !change.is_empty() {
                        changes.altered_columns.push(change);
                    }
                }
            }
        }

        changes.dropped_columns = old
            .columns
            .iter()
            .filter(|column| new.column(&column.name).is_none())
            .map(|column| column.name.clone())
            .collect();

        for constraint in &old.constraints {
            match new.constraint(&constraint.name) {
                Some(target) if target.same_definition(constraint) => {}
                _ => changes.dropped_constraints.push(constraint.clone()),
            }
        }
        for constraint in &new.constraints {
            match old.constraint(&constraint.name) {
                Some(current) if current.same_definition(constraint) => {}
                _ => changes.added_constraints.push(constraint.clone()),
            }
        }

        let old_indexes: Vec<&Index> = old.indexes.iter().filter(|i| i.is_plain()).collect();
        let new_indexes: Vec<&Index> = new.indexes.iter().filter(|i| i.is_plain()).collect();
        for index in &old_indexes {
            match new_indexes.iter().find(|i| i.name == index.name) {
                Some(target) if same_index(index, target) => {}
                _ => changes.dropped_indexes.push((*index).clone()),
            }
        }
        for index in &new_indexes {
            match old_indexes.iter().find(|i| i.name == index.name) {
                Some(current) if same_index(current, index) => {}
                _ => changes.added_indexes.push((*index).clone()),
            }
        }

        if old.sql_security != new.sql_security {
            changes
                .attribute_changes
                .push(TableAttributeChange::SqlSecurity(new.sql_security));
        }
        if old.remarks != new.remarks {
            changes
                .attribute_changes
                .push(TableAttributeChange::Remarks(new.remarks.clone()));
        }
        if old.tablespace != new.tablespace {
            changes
                .attribute_changes
                .push(TableAttributeChange::Tablespace(new.tablespace.clone()));
        }
        if old.external_file != new.external_file {
            changes
                .attribute_changes
                .push(TableAttributeChange::ExternalFile(new.external_file.clone()));
        }
        if old.adapter != new.adapter {
            changes
                .attribute_changes
                .push(TableAttributeChange::Adapter(new.adapter.clone()));
        }

        changes
    }

    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.dropped_columns.is_empty()
            && self.altered_columns.is_empty()
            && self.added_constraints.is_empty()
            && self.dropped_constraints.is_empty()
            && self.added_indexes.is_empty()
            && self.dropped_indexes.is_empty()
            && self.attribute_changes.is_empty()
    }
}

fn normalize_type(data_type: &str) -> String {
    data_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn same_index(a: &Index, b: &Index) -> bool {
    a.non_unique == b.non_unique
        && a.descending == b.descending
        && a.columns == b.columns
        && normalize_source(a.expression.as_deref()) == normalize_source(b.expression.as_deref())
}

impl SchemaDiff {
    /// Compare two snapshots of `object_type`.
    ///
    /// Objects are paired by exact name only. Both snapshots must hold
    /// `object_type`; anything else is an invalid argument.
    pub fn compare(old: &Snapshot, new: &Snapshot, object_type: ObjectType) -> Result<Self> {
        for (side, snapshot) in [("old", old), ("new", new)] {
            if snapshot.object_type() != object_type {
                return Err(Error::InvalidArgumentError(format!(
                    "{} snapshot holds {} objects, expected {}",
                    side,
                    snapshot.object_type(),
                    object_type
                )));
            }
        }

        let creates: Vec<DatabaseObject> = new
            .objects()
            .filter(|object| !old.contains(object.name()))
            .cloned()
            .collect();

        let drops: Vec<DatabaseObject> = old
            .objects()
            .filter(|object| !new.contains(object.name()))
            .cloned()
            .collect();

        let mut alters = Vec::new();
        for target in new.objects() {
            if let Some(current) = old.get(target.name()) {
                if let Some(alteration) = Self::alteration(current, target)? {
                    alters.push(alteration);
                }
            }
        }

        Ok(Self {
            object_type,
            creates: sort_for_create(creates),
            drops: sort_for_drop(drops),
            alters,
        })
    }

    fn alteration(old: &DatabaseObject, new: &DatabaseObject) -> Result<Option<ObjectAlteration>> {
        let (changed, table_changes) = match (old, new) {
            (DatabaseObject::Table(a), DatabaseObject::Table(b)) => {
                let changes = TableChanges::between(a, b);
                (!changes.is_empty(), Some(changes))
            }
            (DatabaseObject::View(a), DatabaseObject::View(b)) => (
                a.columns != b.columns
                    || normalize_source(Some(&a.source)) != normalize_source(Some(&b.source)),
                None,
            ),
            (DatabaseObject::Procedure(a), DatabaseObject::Procedure(b)) => (
                normalize_source(Some(&a.source)) != normalize_source(Some(&b.source)),
                None,
            ),
            (DatabaseObject::Trigger(a), DatabaseObject::Trigger(b)) => (
                a.table_name != b.table_name
                    || !a.event.trim().eq_ignore_ascii_case(b.event.trim())
                    || a.position != b.position
                    || a.active != b.active
                    || normalize_source(Some(&a.source)) != normalize_source(Some(&b.source)),
                None,
            ),
            _ => {
                return Err(Error::InvalidArgumentError(format!(
                    "cannot pair {} {} with {} {}",
                    old.object_type(),
                    old.name(),
                    new.object_type(),
                    new.name()
                )))
            }
        };

        Ok(changed.then(|| ObjectAlteration {
            old: old.clone(),
            new: new.clone(),
            table_changes,
        }))
    }

    /// Names of all objects touched by this diff
    pub fn touched_names(&self) -> HashSet<&str> {
        self.creates
            .iter()
            .chain(self.drops.iter())
            .map(DatabaseObject::name)
            .chain(self.alters.iter().map(ObjectAlteration::name))
            .collect()
    }

    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.drops.is_empty() && self.alters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{ConstraintKind, View};
    use pretty_assertions::assert_eq;

    fn customers() -> TableDefinition {
        let mut table = TableDefinition::new("CUSTOMERS");
        table.add_column(Column::new("ID", "INTEGER").not_null());
        table.add_column(Column::new("NAME", "VARCHAR(50)"));
        table.add_constraint(ColumnConstraint::primary_key("PK_CUSTOMERS", "CUSTOMERS", &["ID"]));
        table
    }

    #[test]
    fn test_table_changes_detect_columns() {
        let old = customers();
        let mut new = customers();
        new.columns[1] = Column::new("NAME", "VARCHAR(100)").not_null();
        new.add_column(Column::new("EMAIL", "VARCHAR(255)"));

        let changes = TableChanges::between(&old, &new);

        assert_eq!(changes.added_columns.len(), 1);
        assert_eq!(changes.altered_columns.len(), 1);
        assert!(changes.altered_columns[0].type_changed());
        assert!(changes.altered_columns[0].nullability_changed());
        assert!(!changes.altered_columns[0].default_changed());
        assert!(changes.dropped_columns.is_empty());
    }

    #[test]
    fn test_redefined_constraint_is_dropped_and_added() {
        let old = customers();
        let mut new = customers();
        new.constraints[0].columns = vec!["ID".to_string(), "NAME".to_string()];

        let changes = TableChanges::between(&old, &new);

        assert_eq!(changes.dropped_constraints.len(), 1);
        assert_eq!(changes.added_constraints.len(), 1);
        assert_eq!(changes.added_constraints[0].kind, ConstraintKind::Primary);
    }

    #[test]
    fn test_type_case_does_not_count() {
        let old = customers();
        let mut new = customers();
        new.columns[1].data_type = "varchar(50)".to_string();

        assert!(TableChanges::between(&old, &new).is_empty());
    }

    #[test]
    fn test_mismatched_snapshot_is_invalid() {
        let tables = Snapshot::from_objects(ObjectType::Table, vec![]).unwrap();
        let views = Snapshot::from_objects(
            ObjectType::View,
            vec![DatabaseObject::View(View {
                name: "V".to_string(),
                columns: vec![],
                source: "SELECT 1".to_string(),
            })],
        )
        .unwrap();

        let result = SchemaDiff::compare(&tables, &views, ObjectType::Table);
        assert!(matches!(result, Err(Error::InvalidArgumentError(_))));
    }
}
