// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use fintrack::Backend;
use fintrack::config::normalize_database_url;
use fintrack::storage::Database;
use tempfile::TempDir;

/// Helper to open a SQLite database file inside a fresh temporary directory
pub async fn test_database() -> Result<(Database, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("finance.db");
    // Four slashes: an absolute path in the SQLAlchemy form
    let (url, backend) = normalize_database_url(&format!("sqlite:///{}", db_path.display()))?;
    assert_eq!(backend, Backend::Sqlite);
    let database = Database::connect(&url, backend).await?;
    Ok((database, temp_dir))
}

/// Helper to create an empty migrations directory under `root`
pub fn migrations_dir(root: &Path) -> Result<PathBuf> {
    let dir = root.join("migrations");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn write_migration(dir: &Path, name: &str, sql: &str) -> Result<()> {
    fs::write(dir.join(name), sql)?;
    Ok(())
}

/// The SQLite migrations shipped with the repository
pub fn shipped_migrations() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations/sqlite")
}

pub async fn table_names(db: &Database) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(db.pool())
    .await?;
    Ok(names)
}

pub async fn index_names(db: &Database) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(db.pool())
    .await?;
    Ok(names)
}

/// Every schema object with its defining SQL, for before/after comparisons
pub async fn schema_snapshot(db: &Database) -> Result<Vec<String>> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT type || ':' || name || ':' || COALESCE(sql, '') FROM sqlite_master ORDER BY type, name",
    )
    .fetch_all(db.pool())
    .await?;
    Ok(rows)
}
