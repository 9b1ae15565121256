use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::application::{MigrationRunner, RunReport, StartupReport, TierOutcome, bootstrap, load_statements};
use crate::config::Config;
use crate::io::discover;
use crate::storage::Database;

/// fintrack - schema migrations for the personal finance backend
#[derive(Parser)]
#[command(name = "fintrack")]
#[command(about = "Apply the finance tracker's numbered SQL migrations")]
#[command(version)]
pub struct Cli {
    /// Database URL (postgres://... or sqlite:...), defaults to a local SQLite file
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory of NNNN_name.sql files (defaults to migrations/<backend>)
    #[arg(short, long, global = true, env = "MIGRATIONS_DIR")]
    pub migrations_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the report as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Apply every migration in order (the default)
    Migrate,

    /// Show the migrations that would run, without touching the database
    List,

    /// Run the full startup sequence: baseline, migrations, fallback, column repair, default user
    Bootstrap,
}

/// One row of `list` output
#[derive(Serialize)]
struct PlannedMigration {
    sequence_number: u64,
    name: String,
    description: String,
    statements: usize,
}

impl Cli {
    /// Install the stderr log subscriber. `RUST_LOG` takes precedence over `--verbose`.
    pub fn init_tracing(&self) {
        let default_level = if self.verbose {
            "fintrack=debug"
        } else {
            "fintrack=info"
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    pub async fn run(self) -> Result<()> {
        let config = Config::resolve(self.database_url.clone(), self.migrations_dir.clone())
            .context("Invalid configuration")?;

        match self.command.unwrap_or(Commands::Migrate) {
            Commands::List => self.list(&config),

            Commands::Migrate => {
                let mut database = connect(&config).await?;
                let result = MigrationRunner::new(&config.migrations_dir, &mut database)
                    .run()
                    .await;
                database.close().await;
                let report = result.context("Migration failed")?;
                self.print_run(&report)
            }

            Commands::Bootstrap => {
                let mut database = connect(&config).await?;
                let result = bootstrap(&mut database, &config.migrations_dir).await;
                database.close().await;
                let report = result.context("Startup schema bootstrap failed")?;
                self.print_startup(&report)
            }
        }
    }

    fn list(&self, config: &Config) -> Result<()> {
        let files = discover(&config.migrations_dir)?;
        let mut planned = Vec::with_capacity(files.len());
        for file in &files {
            planned.push(PlannedMigration {
                sequence_number: file.sequence_number,
                name: file.name.clone(),
                description: file.description().to_string(),
                statements: load_statements(file)?.len(),
            });
        }

        if self.json {
            return print_json(&planned);
        }
        if planned.is_empty() {
            println!("No migrations found in {}", config.migrations_dir.display());
            return Ok(());
        }
        println!(
            "{:<8} {:<32} {:<24} {:>10}",
            "SEQ", "FILE", "DESCRIPTION", "STATEMENTS"
        );
        println!("{}", "-".repeat(77));
        for migration in &planned {
            println!(
                "{:<8} {:<32} {:<24} {:>10}",
                migration.sequence_number,
                migration.name,
                migration.description,
                migration.statements
            );
        }
        Ok(())
    }

    fn print_run(&self, report: &RunReport) -> Result<()> {
        if self.json {
            return print_json(report);
        }
        for file in &report.files {
            if file.skipped {
                println!("[SKIP]  {} (no statements)", file.name);
            } else {
                println!("[APPLY] {} ({} statements)", file.name, file.statements);
            }
        }
        println!(
            "Done: {} applied, {} skipped",
            report.applied_count(),
            report.skipped_count()
        );
        Ok(())
    }

    fn print_startup(&self, report: &StartupReport) -> Result<()> {
        if self.json {
            return print_json(report);
        }
        println!("Backend:        {}", report.backend);
        println!("Baseline:       {}", describe(&report.baseline));
        println!("Migrations:     {}", describe(&report.migrations));
        println!("Fallback:       {}", describe(&report.fallback));
        println!("Columns added:  {}", report.columns_added());
        println!(
            "Default user:   {}",
            if report.default_user_created {
                "created"
            } else {
                "present"
            }
        );
        Ok(())
    }
}

async fn connect(config: &Config) -> Result<Database> {
    info!(backend = %config.backend, "Connecting to database");
    Database::connect(&config.database_url, config.backend).await
}

fn describe(outcome: &TierOutcome) -> String {
    match outcome {
        TierOutcome::Applied => "applied".to_string(),
        TierOutcome::Skipped => "skipped".to_string(),
        TierOutcome::Unavailable { reason } => format!("unavailable ({})", reason),
        TierOutcome::Failed { reason } => format!("failed ({})", reason),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
