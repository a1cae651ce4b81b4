//! Schema comparer: diffs two database schemas and synthesizes the DDL script
//! that migrates the old one into the new one.
//!
//! Either side of a comparison is a live database (read through its system
//! catalogs) or a directory of object definition files. The generated script
//! is dependency ordered and can be applied back to the live side.

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod table;
pub mod utils;

use std::sync::Arc;

// Re-export main types for easier access
pub use config::{Config, PreferenceChange};
pub use db::connection::DatabaseConnection;
pub use db::executor::{ApplyReport, SqlExecutor, StatementExecutor};
pub use db::files::FileSource;
pub use db::introspect::DatabaseIntrospector;
pub use db::source::MetadataSource;
pub use error::{Error, Result};
pub use schema::comparer::Comparer;
pub use schema::diff::SchemaDiff;
pub use schema::generator::DdlGenerator;
pub use schema::script::Script;
pub use table::DatabaseTable;

use config::SourceConfig;
use schema::types::Engine;

/// Initialize a comparer client with the specified configuration file
pub async fn init(config_path: &str) -> Result<ComparerClient> {
    let config = config::load_from_file(config_path)?;
    ComparerClient::new(config).await
}

/// The main client: owns both sides of the comparison
pub struct ComparerClient {
    config: Config,
    source: Arc<dyn MetadataSource>,
    target: Arc<dyn MetadataSource>,
    /// Live connection of the source side; scripts are applied through it
    source_connection: Option<DatabaseConnection>,
    comparer: Comparer,
}

impl ComparerClient {
    /// Open both sides described by the configuration
    pub async fn new(config: Config) -> Result<Self> {
        let (source, source_connection) = open_side(&config.source, config.engine).await?;
        let (target, _) = open_side(&config.target, config.engine).await?;
        let comparer = Comparer::new(config.engine, config.comparer.clone());

        Ok(Self {
            config,
            source,
            target,
            source_connection,
            comparer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Live table handle on the source side
    pub fn table(&self, name: &str) -> DatabaseTable {
        DatabaseTable::new(name, Arc::clone(&self.source))
    }

    /// Compare source against target and render the migration script
    pub async fn compare(&self) -> Result<Script> {
        self.comparer
            .compare_sources(Arc::clone(&self.source), Arc::clone(&self.target))
            .await
    }

    /// Apply a script to the source database
    pub async fn apply(&self, script: &Script) -> Result<ApplyReport> {
        let connection = self.source_connection.clone().ok_or_else(|| {
            Error::DatabaseError("Scripts can only be applied to a database source".to_string())
        })?;
        let executor = SqlExecutor::new(connection);
        db::executor::apply_script(&executor, script, &self.config.apply).await
    }

    /// Complete workflow: compare, then apply unless already in sync
    pub async fn sync_database(&self) -> Result<Option<ApplyReport>> {
        let script = self.compare().await?;
        if script.is_empty() {
            tracing::info!("Source schema is already in sync with target");
            return Ok(None);
        }
        self.apply(&script).await.map(Some)
    }

    pub async fn close(&self) {
        if let Some(connection) = &self.source_connection {
            connection.close().await;
        }
    }
}

/// Build the metadata source for one side of the comparison
async fn open_side(
    config: &SourceConfig,
    engine: Engine,
) -> Result<(Arc<dyn MetadataSource>, Option<DatabaseConnection>)> {
    match config {
        SourceConfig::Database(database) => {
            let connection = DatabaseConnection::connect(database).await?;
            let introspector = DatabaseIntrospector::new(
                connection.clone(),
                database.schema.clone(),
                engine.major_version,
            );
            Ok((Arc::new(introspector), Some(connection)))
        }
        SourceConfig::Files(files) => Ok((Arc::new(FileSource::load(files, engine)?), None)),
    }
}
