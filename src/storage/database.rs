use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::{Any, AnyPool, Row, Transaction};

use crate::domain::{Backend, is_identifier};

use super::{SchemaConnection, SchemaTransaction};

/// Schema connection backed by a sqlx pool that speaks either SQLite or PostgreSQL.
pub struct Database {
    pool: AnyPool,
    backend: Backend,
}

impl Database {
    /// Create a database handle from an existing pool.
    pub fn new(pool: AnyPool, backend: Backend) -> Self {
        Self { pool, backend }
    }

    /// Connect to a normalized database URL (see [`crate::config::normalize_database_url`]).
    ///
    /// The pool holds a single long-lived connection: migrations run one statement
    /// at a time, and `sqlite::memory:` databases live only as long as their connection.
    pub async fn connect(database_url: &str, backend: Backend) -> Result<Self> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to {} database", backend))?;
        Ok(Self::new(pool, backend))
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    fn column_count_query(&self, table: &str, column: &str) -> String {
        match self.backend {
            Backend::Sqlite => format!(
                "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = '{}'",
                table, column
            ),
            Backend::Postgres => format!(
                "SELECT COUNT(*) FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = '{}' AND column_name = '{}'",
                table, column
            ),
        }
    }
}

#[async_trait]
impl SchemaConnection for Database {
    fn backend(&self) -> Backend {
        self.backend
    }

    async fn begin<'a>(&'a mut self) -> Result<Box<dyn SchemaTransaction + 'a>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PooledTransaction(tx)))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn has_column(&mut self, table: &str, column: &str) -> Result<bool, sqlx::Error> {
        if !is_identifier(table) || !is_identifier(column) {
            return Err(sqlx::Error::Protocol(format!(
                "refusing to inspect non-identifier {}.{}",
                table, column
            )));
        }
        let query = self.column_count_query(&table.to_lowercase(), &column.to_lowercase());
        Ok(self.count(&query).await? > 0)
    }

    async fn count(&mut self, sql: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(sql).fetch_one(&self.pool).await?;
        row.try_get::<i64, _>(0)
    }
}

struct PooledTransaction(Transaction<'static, Any>);

#[async_trait]
impl SchemaTransaction for PooledTransaction {
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::query(sql).execute(&mut *self.0).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.0.commit().await
    }
}
