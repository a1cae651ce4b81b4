mod common;

use pretty_assertions::assert_eq;
use std::fs;
use std::sync::atomic::Ordering;
use tempfile::tempdir;

use schema_comparer::config::{self, ApplyConfig, SourceConfig};
use schema_comparer::db::executor::{apply_script, execute_statements};
use schema_comparer::schema::Script;
use schema_comparer::Error;

use common::RecordingExecutor;

fn two_statement_script() -> Script {
    let mut script = Script::new();
    script.push_section("Create tables", ["CREATE TABLE T (\n    ID INTEGER\n);"]);
    script.push_section("Primary keys", ["ALTER TABLE T ADD CONSTRAINT PK_T PRIMARY KEY (ID);"]);
    script
}

#[tokio::test]
async fn test_apply_writes_script_file_then_executes() {
    let dir = tempdir().unwrap();
    let config = ApplyConfig {
        auto_commit: false,
        dry_run: false,
        output_directory: Some(dir.path().to_string_lossy().to_string()),
    };
    let executor = RecordingExecutor::default();

    let report = apply_script(&executor, &two_statement_script(), &config)
        .await
        .unwrap();

    assert_eq!(report.executed, 2);
    assert!(!report.dry_run);
    let file = report.script_file.unwrap();
    assert!(file.file_name().unwrap().to_string_lossy().ends_with(".sql"));
    assert!(fs::read_to_string(&file).unwrap().starts_with("-- Create tables\n"));
    assert_eq!(executor.commits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dry_run_executes_nothing() {
    let config = ApplyConfig {
        dry_run: true,
        ..ApplyConfig::default()
    };
    let executor = RecordingExecutor::default();

    let report = apply_script(&executor, &two_statement_script(), &config)
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.executed, 0);
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn test_failed_statement_reports_progress() {
    let executor = RecordingExecutor {
        fail_on: Some("PK_T".to_string()),
        ..Default::default()
    };
    let statements = two_statement_script().executable_statements();

    let err = execute_statements(&executor, &statements, true).await.unwrap_err();

    match err {
        Error::ApplyError { executed, statement, .. } => {
            assert_eq!(executed, 1);
            assert!(statement.contains("PK_T"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(executor.commits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("comparer.toml");
    fs::write(
        &path,
        r#"
[engine]
kind = "firebird"
major_version = 4

[source]
kind = "files"
path = "./live"

[target]
kind = "files"
path = "./model"
recursive_scan = false

[apply]
dry_run = true
"#,
    )
    .unwrap();

    let mut config = config::load_from_file(&path.to_string_lossy()).unwrap();
    assert!(config.apply.dry_run);
    assert!(config.logging.is_none());
    assert!(matches!(config.target, SourceConfig::Files(ref f) if !f.recursive_scan));

    let change = config.apply_preference("comparer.include_indexes", "false").unwrap();
    assert!(!change.restart_required);
    assert!(!config.comparer.include_indexes);

    let change = config.apply_preference("logging.level", "debug").unwrap();
    assert!(change.restart_required);
    assert_eq!(config.logging.unwrap().level, "debug");
}

#[test]
fn test_missing_config_file() {
    let err = config::load_from_file("/no/such/comparer.toml").unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
}
