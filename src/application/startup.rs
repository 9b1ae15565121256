//! Startup integration: bring any database, including ones created by early
//! releases, up to the current schema before the host application serves requests.
//!
//! Tiers run in order and each is idempotent:
//!
//! 1. baseline tables (legacy shape)
//! 2. the migration runner over the migrations directory
//! 3. bundled migrations compiled into the binary, only if tier 2 did not succeed
//! 4. legacy column repair, which is a no-op on a complete schema
//!
//! Failures of tiers 1-3 are logged as warnings. Tier 4 and the default user
//! step propagate their errors.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    Backend, ColumnPatch, DEFAULT_USER_EMAIL, DEFAULT_USER_ID, LEGACY_COLUMNS, split_statements,
};
use crate::storage::{SchemaConnection, baseline_schema, bundled_migrations};

use super::runner::apply_statements;
use super::{DiscoveryError, MigrateError, MigrationRunner, RunReport, StartupError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TierOutcome {
    Applied,
    /// Not attempted because an earlier tier succeeded
    Skipped,
    /// The tier's input does not exist (for example no migrations directory)
    Unavailable { reason: String },
    Failed { reason: String },
}

impl TierOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, TierOutcome::Applied)
    }

    fn from_error(err: &MigrateError) -> Self {
        let reason = error_chain(err);
        match err {
            MigrateError::Discovery(DiscoveryError::Missing(_)) => {
                TierOutcome::Unavailable { reason }
            }
            _ => TierOutcome::Failed { reason },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub backend: Backend,
    pub baseline: TierOutcome,
    pub migrations: TierOutcome,
    pub run: Option<RunReport>,
    pub fallback: TierOutcome,
    pub column_patches: Vec<ColumnPatch>,
    pub default_user_created: bool,
}

impl StartupReport {
    pub fn used_fallback(&self) -> bool {
        !matches!(self.fallback, TierOutcome::Skipped)
    }

    pub fn columns_added(&self) -> usize {
        self.column_patches.iter().filter(|p| !p.is_noop()).count()
    }
}

/// Run every startup tier against `connection` and ensure the default user exists.
pub async fn bootstrap<C: SchemaConnection + ?Sized>(
    connection: &mut C,
    migrations_dir: &Path,
) -> Result<StartupReport, StartupError> {
    let backend = connection.backend();
    info!(%backend, migrations_dir = %migrations_dir.display(), "Bootstrapping database schema");

    let baseline = match ensure_baseline(connection).await {
        Ok(()) => TierOutcome::Applied,
        Err(err) => {
            warn!(error = %error_chain(&err), "Baseline schema creation failed, continuing");
            TierOutcome::from_error(&err)
        }
    };

    let (migrations, run) = match MigrationRunner::new(migrations_dir, &mut *connection)
        .run()
        .await
    {
        Ok(report) => (TierOutcome::Applied, Some(report)),
        Err(err) => {
            warn!(error = %error_chain(&err), "Migration runner did not complete, using bundled schema");
            (TierOutcome::from_error(&err), None)
        }
    };

    let fallback = if migrations.succeeded() {
        TierOutcome::Skipped
    } else {
        match apply_inline_fallback(connection).await {
            Ok(count) => {
                info!(files = count, "Bundled schema applied");
                TierOutcome::Applied
            }
            Err(err) => {
                warn!(error = %error_chain(&err), "Bundled schema failed, continuing");
                TierOutcome::from_error(&err)
            }
        }
    };

    let column_patches = reconcile_columns(connection).await?;
    let default_user_created = ensure_default_user(connection).await?;

    Ok(StartupReport {
        backend,
        baseline,
        migrations,
        run,
        fallback,
        column_patches,
        default_user_created,
    })
}

/// Create the baseline tables in one transaction.
pub async fn ensure_baseline<C: SchemaConnection + ?Sized>(
    connection: &mut C,
) -> Result<(), MigrateError> {
    let label = "baseline schema";
    let statements = split_statements(baseline_schema(connection.backend())).map_err(|source| {
        MigrateError::StatementParse {
            file: label.to_string(),
            source,
        }
    })?;
    apply_statements(connection, label, &statements).await
}

/// Apply the migrations compiled into the binary for the connection's backend,
/// one transaction per file. Returns the number of files applied.
pub async fn apply_inline_fallback<C: SchemaConnection + ?Sized>(
    connection: &mut C,
) -> Result<usize, MigrateError> {
    let bundled = bundled_migrations(connection.backend());
    for migration in bundled {
        let statements =
            split_statements(migration.sql).map_err(|source| MigrateError::StatementParse {
                file: migration.name.to_string(),
                source,
            })?;
        apply_statements(connection, migration.name, &statements).await?;
    }
    Ok(bundled.len())
}

/// Add any column that legacy databases are missing.
///
/// A failed `ALTER TABLE` is forgiven when a re-check finds the column present,
/// which happens when another process added it first.
pub async fn reconcile_columns<C: SchemaConnection + ?Sized>(
    connection: &mut C,
) -> Result<Vec<ColumnPatch>, StartupError> {
    let mut patches = Vec::with_capacity(LEGACY_COLUMNS.len());
    for expected in LEGACY_COLUMNS {
        let check_failed = |source| StartupError::ColumnCheck {
            table: expected.table.to_string(),
            column: expected.column.to_string(),
            source,
        };

        let present = connection
            .has_column(expected.table, expected.column)
            .await
            .map_err(check_failed)?;
        let mut patch = ColumnPatch::plan(expected, present);

        if let Some(sql) = patch.sql() {
            if let Err(source) = connection.execute(&sql).await {
                let added_concurrently = connection
                    .has_column(expected.table, expected.column)
                    .await
                    .map_err(check_failed)?;
                if !added_concurrently {
                    return Err(StartupError::ColumnPatch {
                        table: expected.table.to_string(),
                        column: expected.column.to_string(),
                        source,
                    });
                }
                patch = ColumnPatch::plan(expected, true);
            } else {
                info!(
                    table = expected.table,
                    column = expected.column,
                    "Added missing column"
                );
            }
        }
        patches.push(patch);
    }
    Ok(patches)
}

/// Make sure the single-user-mode row exists. Returns whether it was created.
///
/// The insert leaves newer nullable columns out, so it works on legacy tables too.
pub async fn ensure_default_user<C: SchemaConnection + ?Sized>(
    connection: &mut C,
) -> Result<bool, StartupError> {
    let failed = |source| StartupError::DefaultUser {
        email: DEFAULT_USER_EMAIL.to_string(),
        source,
    };

    if default_user_exists(connection).await.map_err(failed)? {
        return Ok(false);
    }

    let insert = format!(
        "INSERT INTO users (id, email, created_at, updated_at) \
         VALUES ({}, '{}', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        DEFAULT_USER_ID, DEFAULT_USER_EMAIL
    );
    if let Err(source) = connection.execute(&insert).await {
        if default_user_exists(connection).await.map_err(failed)? {
            return Ok(false);
        }
        return Err(failed(source));
    }

    // Explicit ids do not advance a SERIAL sequence.
    if connection.backend() == Backend::Postgres {
        connection
            .execute(
                "SELECT setval(pg_get_serial_sequence('users', 'id'), \
                 (SELECT MAX(id) FROM users))",
            )
            .await
            .map_err(failed)?;
    }

    info!(email = DEFAULT_USER_EMAIL, "Created default user");
    Ok(true)
}

async fn default_user_exists<C: SchemaConnection + ?Sized>(
    connection: &mut C,
) -> Result<bool, sqlx::Error> {
    let by_id = connection
        .count(&format!(
            "SELECT COUNT(*) FROM users WHERE id = {}",
            DEFAULT_USER_ID
        ))
        .await?;
    if by_id > 0 {
        return Ok(true);
    }
    let by_email = connection
        .count(&format!(
            "SELECT COUNT(*) FROM users WHERE email = '{}'",
            DEFAULT_USER_EMAIL
        ))
        .await?;
    Ok(by_email > 0)
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
