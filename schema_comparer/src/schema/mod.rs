//! Schema module for the schema comparer
//!
//! This module handles the object model, schema comparison, and DDL generation.

pub mod comparer;
pub mod constraints;
pub mod dependency;
pub mod diff;
pub mod generator;
pub mod script;
pub mod snapshot;
pub mod types;

// Re-export key types
pub use comparer::Comparer;
pub use diff::{ColumnChange, ObjectAlteration, SchemaDiff, TableAttributeChange, TableChanges};
pub use generator::DdlGenerator;
pub use script::{split_statements, Script, ScriptSection};
pub use snapshot::Snapshot;
pub use types::{
    Column, ColumnConstraint, ConstraintKind, DatabaseObject, Engine, EngineKind,
    ForeignKeyReference, Index, ObjectType, Procedure, SqlSecurity, TableDefinition, Trigger,
    View,
};
