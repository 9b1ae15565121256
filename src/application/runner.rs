use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{MigrationFile, split_statements};
use crate::io::discover;
use crate::storage::SchemaConnection;

use super::MigrateError;

/// Outcome of applying one migration file
#[derive(Debug, Clone, Serialize)]
pub struct AppliedFile {
    pub sequence_number: u64,
    pub name: String,
    pub statements: usize,
    /// The file held no statements, so no transaction was opened
    pub skipped: bool,
}

/// Summary of a full run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub directory: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<AppliedFile>,
}

impl RunReport {
    pub fn applied_count(&self) -> usize {
        self.files.iter().filter(|f| !f.skipped).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.files.iter().filter(|f| f.skipped).count()
    }

    pub fn statement_count(&self) -> usize {
        self.files.iter().map(|f| f.statements).sum()
    }
}

/// Applies the numbered SQL files of one directory against one connection.
///
/// No record of applied migrations is kept: every run executes every file, and
/// repeat runs are harmless only because the SQL guards itself with `IF NOT EXISTS`.
pub struct MigrationRunner<'c, C: SchemaConnection + ?Sized> {
    directory: PathBuf,
    files: Vec<MigrationFile>,
    connection: &'c mut C,
}

impl<'c, C: SchemaConnection + ?Sized> MigrationRunner<'c, C> {
    pub fn new(directory: impl Into<PathBuf>, connection: &'c mut C) -> Self {
        Self {
            directory: directory.into(),
            files: Vec::new(),
            connection,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Files found by the last [`discover`](Self::discover) call.
    pub fn files(&self) -> &[MigrationFile] {
        &self.files
    }

    /// Scan the directory and remember the ordered file list.
    pub fn discover(&mut self) -> Result<&[MigrationFile], MigrateError> {
        self.files = discover(&self.directory)?;
        debug!(
            directory = %self.directory.display(),
            count = self.files.len(),
            "Discovered migrations"
        );
        Ok(&self.files)
    }

    /// Apply a single file as one transaction.
    pub async fn apply(&mut self, file: &MigrationFile) -> Result<AppliedFile, MigrateError> {
        let statements = load_statements(file)?;
        if statements.is_empty() {
            info!(file = %file.name, "Skipping migration with no statements");
        } else {
            info!(file = %file.name, statements = statements.len(), "Applying migration");
            apply_statements(&mut *self.connection, &file.name, &statements).await?;
        }

        Ok(AppliedFile {
            sequence_number: file.sequence_number,
            name: file.name.clone(),
            statements: statements.len(),
            skipped: statements.is_empty(),
        })
    }

    /// Discover and apply every file in order, stopping at the first failure.
    /// Files committed before the failure stay committed.
    pub async fn run(&mut self) -> Result<RunReport, MigrateError> {
        let started_at = Utc::now();
        let files = self.discover()?.to_vec();
        if files.is_empty() {
            info!(directory = %self.directory.display(), "No migration files found");
        }

        let mut applied = Vec::with_capacity(files.len());
        for file in &files {
            applied.push(self.apply(file).await?);
        }

        let report = RunReport {
            directory: self.directory.clone(),
            started_at,
            finished_at: Utc::now(),
            files: applied,
        };
        info!(
            applied = report.applied_count(),
            skipped = report.skipped_count(),
            statements = report.statement_count(),
            "Migrations applied successfully"
        );
        Ok(report)
    }
}

/// Read a migration file and split it into statements.
pub fn load_statements(file: &MigrationFile) -> Result<Vec<String>, MigrateError> {
    let contents = fs::read_to_string(&file.path).map_err(|source| MigrateError::Read {
        file: file.name.clone(),
        source,
    })?;
    split_statements(&contents).map_err(|source| MigrateError::StatementParse {
        file: file.name.clone(),
        source,
    })
}

/// Execute `statements` inside one transaction labelled `file`.
///
/// Any failure returns before `commit`, and dropping the transaction guard rolls
/// back whatever already ran.
pub(crate) async fn apply_statements<C: SchemaConnection + ?Sized>(
    connection: &mut C,
    file: &str,
    statements: &[String],
) -> Result<(), MigrateError> {
    let mut tx = connection
        .begin()
        .await
        .map_err(|source| MigrateError::Begin {
            file: file.to_string(),
            source,
        })?;

    for (index, statement) in statements.iter().enumerate() {
        debug!(file, statement = index + 1, "Executing statement");
        if let Err(source) = tx.execute(statement).await {
            return Err(MigrateError::Execution {
                file: file.to_string(),
                statement_number: index + 1,
                statement: statement.clone(),
                source,
            });
        }
    }

    tx.commit().await.map_err(|source| MigrateError::Commit {
        file: file.to_string(),
        source,
    })
}
