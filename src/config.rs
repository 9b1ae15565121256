//! Configuration resolution. The binary loads `.env` and clap reads
//! `DATABASE_URL` and `MIGRATIONS_DIR`; this module fills in defaults.

use std::path::PathBuf;

use crate::domain::Backend;

/// Used when `DATABASE_URL` is unset or empty: a SQLite file in the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///./finance.db";

/// Root of the per-backend migration directories.
pub const DEFAULT_MIGRATIONS_ROOT: &str = "migrations";

#[derive(Debug, Clone)]
pub struct Config {
    /// Connection URL in the form sqlx expects
    pub database_url: String,
    pub backend: Backend,
    pub migrations_dir: PathBuf,
}

impl Config {
    /// Build a configuration from optional raw values, filling in defaults.
    pub fn resolve(
        database_url: Option<String>,
        migrations_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let raw = database_url.unwrap_or_default();
        let (database_url, backend) = normalize_database_url(&raw)?;
        let migrations_dir = migrations_dir
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| default_migrations_dir(backend));
        Ok(Self {
            database_url,
            backend,
            migrations_dir,
        })
    }
}

pub fn default_migrations_dir(backend: Backend) -> PathBuf {
    PathBuf::from(DEFAULT_MIGRATIONS_ROOT).join(backend.as_str())
}

/// Turn a configured database URL into one sqlx accepts, and detect its backend.
///
/// Accepts SQLAlchemy-style URLs as well: a `+driver` suffix on the scheme is
/// dropped (`postgresql+psycopg://` -> `postgres://`) and `sqlite:///path` means
/// the relative path `path`. SQLite file URLs without options gain `?mode=rwc`
/// so the file is created on first use.
///
/// Example: "sqlite:///./finance.db" -> ("sqlite:./finance.db?mode=rwc", Sqlite)
pub fn normalize_database_url(raw: &str) -> Result<(String, Backend), ConfigError> {
    let raw = raw.trim();
    let raw = if raw.is_empty() {
        DEFAULT_DATABASE_URL
    } else {
        raw
    };

    let (scheme, rest) = raw
        .split_once(':')
        .ok_or_else(|| ConfigError::Invalid("DATABASE_URL", "missing URL scheme"))?;
    let backend =
        Backend::from_scheme(scheme).ok_or_else(|| ConfigError::UnsupportedScheme(scheme.to_string()))?;

    let url = match backend {
        Backend::Postgres => {
            if !rest.starts_with("//") {
                return Err(ConfigError::Invalid(
                    "DATABASE_URL",
                    "PostgreSQL URLs must look like postgres://user@host/db",
                ));
            }
            format!("postgres:{}", rest)
        }
        Backend::Sqlite => normalize_sqlite(rest),
    };
    Ok((url, backend))
}

fn normalize_sqlite(rest: &str) -> String {
    let path = rest
        .strip_prefix("///")
        .or_else(|| rest.strip_prefix("//"))
        .unwrap_or(rest);

    if path.is_empty() || path.starts_with(":memory:") {
        return "sqlite::memory:".to_string();
    }
    if path.contains('?') {
        format!("sqlite:{}", path)
    } else {
        format!("sqlite:{}?mode=rwc", path)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported database URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
