//! Aggregation of raw metadata rows into constraints and indexes
//!
//! Catalog queries return one row per (constraint, column) pair and one row
//! per (index, column) pair. The functions here fold those rows into one
//! object per name, in a deterministic order, no matter how many rows the
//! source produced.

use serde::{Deserialize, Serialize};

use crate::schema::types::{Column, ColumnConstraint, ConstraintKind, ForeignKeyReference, Index};

/// One constraint row as returned by a metadata source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRow {
    pub name: String,
    pub kind: ConstraintKind,
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub referenced_table: Option<String>,
    #[serde(default)]
    pub referenced_catalog: Option<String>,
    #[serde(default)]
    pub referenced_schema: Option<String>,
    #[serde(default)]
    pub referenced_column: Option<String>,
    #[serde(default)]
    pub update_rule: Option<String>,
    #[serde(default)]
    pub delete_rule: Option<String>,
}

/// A check constraint discovered through the trigger implementing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraintRow {
    pub name: String,
    pub table_name: String,
    /// Trigger source, usually `CHECK (...)`
    #[serde(default)]
    pub source: Option<String>,
}

/// One index row as returned by a metadata source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub name: String,
    pub table_name: String,
    pub non_unique: bool,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub constraint_type: Option<ConstraintKind>,
}

impl ConstraintRow {
    fn into_constraint(self) -> ColumnConstraint {
        let references = match self.kind {
            ConstraintKind::Foreign => Some(ForeignKeyReference {
                table: self.referenced_table.map(|t| t.trim().to_string()).unwrap_or_default(),
                catalog: self.referenced_catalog,
                schema: self.referenced_schema,
                columns: self
                    .referenced_column
                    .map(|c| vec![c.trim().to_string()])
                    .unwrap_or_default(),
                on_update: self.update_rule,
                on_delete: self.delete_rule,
            }),
            _ => None,
        };

        ColumnConstraint {
            name: self.name.trim().to_string(),
            kind: self.kind,
            table_name: self.table_name.trim().to_string(),
            columns: vec![self.column_name.trim().to_string()],
            references,
            check_source: None,
        }
    }
}

/// Fold per-column constraint rows and trigger-backed check rows into one
/// constraint per name, sorted by name.
///
/// Columns are walked in definition order and each column's rows in the order
/// given. A row whose name is already known adds its column (and referenced
/// column for foreign keys) to the existing constraint. Check rows are merged
/// afterwards and skipped when a constraint of that name already exists.
/// Rows whose column is not among `columns` are folded in after the column
/// walk rather than lost.
/// Names are trimmed but never case folded; rows with a blank name are dropped.
pub fn collect_constraints(
    columns: &[Column],
    rows: &[ConstraintRow],
    checks: &[CheckConstraintRow],
) -> Vec<ColumnConstraint> {
    let mut constraints: Vec<ColumnConstraint> = Vec::new();

    for column in columns {
        let column_rows = rows
            .iter()
            .filter(|row| row.column_name.trim() == column.name);

        for row in column_rows {
            let name = row.name.trim();
            if name.is_empty() {
                continue;
            }

            match constraints.iter_mut().find(|c| c.name == name) {
                Some(existing) => merge_row(existing, row),
                None => constraints.push(row.clone().into_constraint()),
            }
        }
    }

    // rows naming a column the table does not have are kept, in row order
    let orphans = rows.iter().filter(|row| {
        let column = row.column_name.trim();
        !columns.iter().any(|c| c.name == column)
    });
    for row in orphans {
        let name = row.name.trim();
        if name.is_empty() {
            continue;
        }
        tracing::warn!(
            table = %row.table_name.trim(),
            constraint = %name,
            column = %row.column_name.trim(),
            "Constraint row names an unknown column"
        );
        match constraints.iter_mut().find(|c| c.name == name) {
            Some(existing) => merge_row(existing, row),
            None => constraints.push(row.clone().into_constraint()),
        }
    }

    for check in checks {
        let name = check.name.trim();
        if name.is_empty() || constraints.iter().any(|c| c.name == name) {
            continue;
        }

        let mut constraint =
            ColumnConstraint::new(name, ConstraintKind::Check, check.table_name.trim());
        constraint.check_source = check.source.as_ref().map(|s| s.trim().to_string());
        constraints.push(constraint);
    }

    constraints.sort_by(|a, b| a.name.cmp(&b.name));
    constraints
}

fn merge_row(existing: &mut ColumnConstraint, row: &ConstraintRow) {
    let column = row.column_name.trim().to_string();
    if existing.columns.contains(&column) {
        return;
    }
    existing.columns.push(column);

    if existing.kind == ConstraintKind::Foreign {
        if let (Some(reference), Some(referenced)) =
            (existing.references.as_mut(), row.referenced_column.as_ref())
        {
            reference.columns.push(referenced.trim().to_string());
        }
    }
}

/// Group consecutive index rows by name into indexes.
///
/// Rows with a blank name are skipped. An index whose rows carry an
/// expression is an expression index and keeps no column list.
pub fn collect_indexes(rows: &[IndexRow]) -> Vec<Index> {
    let mut indexes: Vec<Index> = Vec::new();

    for row in rows {
        let name = row.name.trim();
        if name.is_empty() {
            continue;
        }

        let continues_last = indexes.last().map_or(false, |last| last.name == name);
        if !continues_last {
            indexes.push(Index {
                name: name.to_string(),
                table_name: row.table_name.trim().to_string(),
                non_unique: row.non_unique,
                columns: Vec::new(),
                expression: None,
                descending: row.descending,
                constraint_type: row.constraint_type,
            });
        }

        if let Some(index) = indexes.last_mut() {
            if let Some(expression) = row.expression.as_ref().filter(|e| !e.trim().is_empty()) {
                index.columns.clear();
                index.expression = Some(expression.trim().to_string());
            } else if index.expression.is_none() {
                if let Some(column) = row.column_name.as_ref() {
                    index.columns.push(column.trim().to_string());
                }
            }
        }
    }

    indexes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(name: &str, kind: ConstraintKind, column: &str) -> ConstraintRow {
        ConstraintRow {
            name: name.to_string(),
            kind,
            table_name: "ORDER_LINES".to_string(),
            column_name: column.to_string(),
            referenced_table: None,
            referenced_catalog: None,
            referenced_schema: None,
            referenced_column: None,
            update_rule: None,
            delete_rule: None,
        }
    }

    fn fk_row(name: &str, column: &str, ref_table: &str, ref_column: &str) -> ConstraintRow {
        ConstraintRow {
            referenced_table: Some(ref_table.to_string()),
            referenced_column: Some(ref_column.to_string()),
            ..row(name, ConstraintKind::Foreign, column)
        }
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("ORDER_ID", "INTEGER").not_null(),
            Column::new("LINE_NO", "INTEGER").not_null(),
            Column::new("QTY", "INTEGER"),
        ]
    }

    #[test]
    fn test_multi_column_constraints_are_merged() {
        let rows = vec![
            row("PK_ORDER_LINES", ConstraintKind::Primary, "ORDER_ID"),
            fk_row("FK_LINES_ORDER", "ORDER_ID", "ORDERS", "ID"),
            row("PK_ORDER_LINES", ConstraintKind::Primary, "LINE_NO"),
            fk_row("FK_LINES_ORDER", "LINE_NO", "ORDERS", "VERSION"),
        ];

        let constraints = collect_constraints(&columns(), &rows, &[]);

        assert_eq!(constraints.len(), 2);
        assert_eq!(constraints[0].name, "FK_LINES_ORDER");
        assert_eq!(constraints[0].columns, vec!["ORDER_ID", "LINE_NO"]);
        let reference = constraints[0].references.as_ref().unwrap();
        assert_eq!(reference.table, "ORDERS");
        assert_eq!(reference.columns, vec!["ID", "VERSION"]);
        assert_eq!(constraints[1].name, "PK_ORDER_LINES");
        assert_eq!(constraints[1].columns, vec!["ORDER_ID", "LINE_NO"]);
    }

    #[test]
    fn test_check_rows_merge_by_name() {
        let rows = vec![row("CHK_QTY", ConstraintKind::Check, "QTY")];
        let checks = vec![
            CheckConstraintRow {
                name: "CHK_QTY ".to_string(),
                table_name: "ORDER_LINES".to_string(),
                source: Some("CHECK (QTY > 0)".to_string()),
            },
            CheckConstraintRow {
                name: "CHK_LINE".to_string(),
                table_name: "ORDER_LINES".to_string(),
                source: Some("CHECK (LINE_NO > 0)".to_string()),
            },
        ];

        let constraints = collect_constraints(&columns(), &rows, &checks);
        let names: Vec<_> = constraints.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["CHK_LINE", "CHK_QTY"]);
        assert_eq!(constraints[0].check_source.as_deref(), Some("CHECK (LINE_NO > 0)"));
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let rows = vec![
            row("UQ_B", ConstraintKind::Unique, "QTY"),
            row("PK_A", ConstraintKind::Primary, "ORDER_ID"),
            row("", ConstraintKind::Unique, "LINE_NO"),
        ];

        let first = collect_constraints(&columns(), &rows, &[]);
        let second = collect_constraints(&columns(), &rows, &[]);

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let rows = vec![
            row("pk_lines", ConstraintKind::Primary, "ORDER_ID"),
            row("PK_LINES", ConstraintKind::Unique, "LINE_NO"),
        ];

        let constraints = collect_constraints(&columns(), &rows, &[]);
        let names: Vec<_> = constraints.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["PK_LINES", "pk_lines"]);
    }

    #[test]
    fn test_rows_on_unknown_columns_are_kept() {
        let rows = vec![
            fk_row("FK_LINES_PRODUCT", "PRODUCT_IDD", "PRODUCTS", "ID"),
            row("PK_ORDER_LINES", ConstraintKind::Primary, "ORDER_ID"),
        ];

        let constraints = collect_constraints(&columns(), &rows, &[]);

        assert_eq!(constraints.len(), 2);
        assert_eq!(constraints[0].name, "FK_LINES_PRODUCT");
        assert_eq!(constraints[0].columns, vec!["PRODUCT_IDD"]);
        assert_eq!(constraints[1].name, "PK_ORDER_LINES");
    }

    #[test]
    fn test_collect_indexes_groups_rows() {
        let index_row = |name: &str, column: Option<&str>, expression: Option<&str>| IndexRow {
            name: name.to_string(),
            table_name: "ORDERS".to_string(),
            non_unique: true,
            column_name: column.map(str::to_string),
            expression: expression.map(str::to_string),
            descending: false,
            constraint_type: None,
        };

        let rows = vec![
            index_row("IX_ORDERS_DATE", Some("CREATED"), None),
            index_row("IX_ORDERS_DATE", Some("ID"), None),
            index_row(" ", Some("ID"), None),
            index_row("IX_ORDERS_UPPER", Some("CODE"), Some("UPPER(CODE)")),
        ];

        let indexes = collect_indexes(&rows);

        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].columns, vec!["CREATED", "ID"]);
        assert!(indexes[1].columns.is_empty());
        assert_eq!(indexes[1].expression.as_deref(), Some("UPPER(CODE)"));
    }
}
