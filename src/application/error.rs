use std::path::PathBuf;

use thiserror::Error;

use crate::domain::StatementParseError;

/// The migrations directory could not be turned into an ordered file list.
/// Raised before any database I/O.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Migrations directory not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Migrations path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Migrations directory is not readable: {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migrations {first} and {second} share sequence number {sequence_number}")]
    DuplicateSequence {
        sequence_number: u64,
        first: String,
        second: String,
    },
}

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to read migration {file}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to split migration {file} into statements")]
    StatementParse {
        file: String,
        #[source]
        source: StatementParseError,
    },

    #[error("Failed to begin transaction for migration {file}")]
    Begin {
        file: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration {file} failed at statement {statement_number}, rolled back")]
    Execution {
        file: String,
        statement_number: usize,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to commit migration {file}")]
    Commit {
        file: String,
        #[source]
        source: sqlx::Error,
    },
}

impl MigrateError {
    /// Name of the migration the error belongs to, if it got that far.
    pub fn file(&self) -> Option<&str> {
        match self {
            MigrateError::Discovery(_) => None,
            MigrateError::Read { file, .. }
            | MigrateError::StatementParse { file, .. }
            | MigrateError::Begin { file, .. }
            | MigrateError::Execution { file, .. }
            | MigrateError::Commit { file, .. } => Some(file),
        }
    }
}

/// Failures of the last startup tier and of the default-user step.
/// Earlier tiers only log warnings.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to inspect column {table}.{column}")]
    ColumnCheck {
        table: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to add column {table}.{column}")]
    ColumnPatch {
        table: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to ensure default user {email}")]
    DefaultUser {
        email: String,
        #[source]
        source: sqlx::Error,
    },
}
