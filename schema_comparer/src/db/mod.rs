//! Database module for the schema comparer
//!
//! This module handles connections, metadata sources and statement execution.

pub mod connection;
pub mod executor;
pub mod files;
pub mod introspect;
pub mod source;

// Re-export key types
pub use connection::DatabaseConnection;
pub use executor::{apply_script, ApplyReport, SqlExecutor, StatementExecutor};
pub use files::FileSource;
pub use introspect::DatabaseIntrospector;
pub use source::{MetadataSource, TableInfo};
