use async_trait::async_trait;

use crate::domain::Backend;

/// The database operations the runner and startup integration need.
///
/// Implemented by [`crate::storage::Database`] over a sqlx pool; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait SchemaConnection: Send {
    fn backend(&self) -> Backend;

    /// Open a transaction. Dropping the returned guard without calling
    /// [`SchemaTransaction::commit`] rolls it back.
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn SchemaTransaction + 'a>, sqlx::Error>;

    /// Execute a single statement outside any explicit transaction.
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error>;

    /// Whether `table` currently has a column named `column`.
    async fn has_column(&mut self, table: &str, column: &str) -> Result<bool, sqlx::Error>;

    /// Run a query returning a single integer, such as `SELECT COUNT(*) ...`.
    async fn count(&mut self, sql: &str) -> Result<i64, sqlx::Error>;
}

/// An open transaction scope.
#[async_trait]
pub trait SchemaTransaction: Send {
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error>;

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error>;
}
