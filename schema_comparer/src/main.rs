use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use schema_comparer::config::{self, PreferenceChange};
use schema_comparer::utils::logging::init_logging;
use schema_comparer::ComparerClient;

/// Compare two database schemas and print the migration script
#[derive(Parser, Debug)]
#[command(name = "schema_comparer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dependency-ordered DDL scripts from schema differences")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare source against target
    Compare {
        /// Path to the TOML configuration file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Apply the script to the source database
        #[arg(long)]
        apply: bool,

        /// Override a preference, e.g. `--set comparer.drop_objects=false`
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    match cli.command {
        Commands::Compare {
            config,
            apply,
            overrides,
        } => {
            let path = config.to_string_lossy();
            let mut config = config::load_from_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path))?;
            init_logging(&config.logging)?;

            for entry in &overrides {
                let (key, value) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Expected KEY=VALUE, got {}", entry))?;
                let change = config.apply_preference(key.trim(), value)?;
                report_restart(&change);
            }

            let client = ComparerClient::new(config).await?;
            let script = client.compare().await?;

            let output = if script.is_empty() {
                String::new()
            } else {
                script.to_string()
            };
            if apply && !script.is_empty() {
                let report = client.apply(&script).await?;
                if let Some(file) = &report.script_file {
                    eprintln!("Script written to {}", file.display());
                }
                if report.dry_run {
                    eprintln!("Dry run: nothing executed");
                } else {
                    eprintln!("Executed {} statements", report.executed);
                }
            }
            client.close().await;

            if script.is_empty() {
                eprintln!("Schemas are identical");
            }
            Ok(output)
        }
    }
}

fn report_restart(change: &PreferenceChange) {
    if change.restart_required {
        eprintln!(
            "Preference {} takes effect after the program restarts",
            change.key
        );
    }
}
