//! Pending structural edits of a live table

use crate::schema::types::{Column, ColumnConstraint};

/// Whether a table has edits waiting to be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    Clean,
    Modified,
}

/// Edits recorded against a table since it was last applied, reverted or loaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingEdits {
    pub new_columns: Vec<Column>,
    /// New definitions of existing columns, matched by name
    pub altered_columns: Vec<Column>,
    pub deleted_columns: Vec<String>,
    pub new_constraints: Vec<ColumnConstraint>,
    pub deleted_constraints: Vec<String>,
    /// Free-form SQL replacing the generated statements
    pub modified_sql: Option<String>,
}

impl PendingEdits {
    pub fn status(&self) -> EditStatus {
        if *self == PendingEdits::default() {
            EditStatus::Clean
        } else {
            EditStatus::Modified
        }
    }

    pub fn add_column(&mut self, column: Column) {
        self.new_columns.retain(|c| c.name != column.name);
        self.new_columns.push(column);
    }

    /// Record a changed column; editing a column added in this session updates it in place
    pub fn alter_column(&mut self, column: Column) {
        if let Some(existing) = self.new_columns.iter_mut().find(|c| c.name == column.name) {
            *existing = column;
            return;
        }
        self.altered_columns.retain(|c| c.name != column.name);
        self.altered_columns.push(column);
    }

    /// Record a deleted column; deleting a column added in this session just forgets it
    pub fn delete_column(&mut self, name: &str) {
        let before = self.new_columns.len();
        self.new_columns.retain(|c| c.name != name);
        if self.new_columns.len() != before {
            return;
        }
        self.altered_columns.retain(|c| c.name != name);
        if !self.deleted_columns.iter().any(|c| c == name) {
            self.deleted_columns.push(name.to_string());
        }
    }

    pub fn add_constraint(&mut self, constraint: ColumnConstraint) {
        self.new_constraints.retain(|c| c.name != constraint.name);
        self.new_constraints.push(constraint);
    }

    pub fn delete_constraint(&mut self, name: &str) {
        let before = self.new_constraints.len();
        self.new_constraints.retain(|c| c.name != name);
        if self.new_constraints.len() != before {
            return;
        }
        if !self.deleted_constraints.iter().any(|c| c == name) {
            self.deleted_constraints.push(name.to_string());
        }
    }

    pub fn set_modified_sql(&mut self, sql: &str) {
        self.modified_sql = Some(sql.to_string()).filter(|s| !s.trim().is_empty());
    }

    pub fn clear(&mut self) {
        *self = PendingEdits::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edits_switch_status() {
        let mut edits = PendingEdits::default();
        assert_eq!(edits.status(), EditStatus::Clean);

        edits.add_column(Column::new("EMAIL", "VARCHAR(255)"));
        assert_eq!(edits.status(), EditStatus::Modified);

        edits.delete_column("EMAIL");
        assert_eq!(edits.status(), EditStatus::Clean);

        edits.delete_column("NAME");
        assert_eq!(edits.deleted_columns, vec!["NAME".to_string()]);

        edits.clear();
        assert_eq!(edits.status(), EditStatus::Clean);
    }

    #[test]
    fn test_blank_sql_is_not_an_edit() {
        let mut edits = PendingEdits::default();
        edits.set_modified_sql("   ");
        assert_eq!(edits.status(), EditStatus::Clean);
    }
}
