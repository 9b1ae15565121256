mod connection;
mod database;
#[cfg(test)]
pub(crate) mod fake;

pub use connection::*;
pub use database::*;

use crate::domain::Backend;

/// SQL for the baseline tables created before the migration runner, SQLite dialect
pub const BASELINE_SQLITE: &str = include_str!("sql/baseline_sqlite.sql");

/// SQL for the baseline tables created before the migration runner, PostgreSQL dialect
pub const BASELINE_POSTGRES: &str = include_str!("sql/baseline_postgres.sql");

/// A migration compiled into the binary, used when the migrations directory is unavailable.
#[derive(Debug, Clone, Copy)]
pub struct BundledMigration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub const SQLITE_MIGRATIONS: &[BundledMigration] = &[
    BundledMigration {
        name: "0001_init.sql",
        sql: include_str!("../../migrations/sqlite/0001_init.sql"),
    },
    BundledMigration {
        name: "0002_indexes.sql",
        sql: include_str!("../../migrations/sqlite/0002_indexes.sql"),
    },
];

pub const POSTGRES_MIGRATIONS: &[BundledMigration] = &[
    BundledMigration {
        name: "0001_init.sql",
        sql: include_str!("../../migrations/postgres/0001_init.sql"),
    },
    BundledMigration {
        name: "0002_indexes.sql",
        sql: include_str!("../../migrations/postgres/0002_indexes.sql"),
    },
];

pub fn baseline_schema(backend: Backend) -> &'static str {
    match backend {
        Backend::Sqlite => BASELINE_SQLITE,
        Backend::Postgres => BASELINE_POSTGRES,
    }
}

pub fn bundled_migrations(backend: Backend) -> &'static [BundledMigration] {
    match backend {
        Backend::Sqlite => SQLITE_MIGRATIONS,
        Backend::Postgres => POSTGRES_MIGRATIONS,
    }
}
