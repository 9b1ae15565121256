//! In-memory connection that records what would have been executed.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::Backend;

use super::{SchemaConnection, SchemaTransaction};

#[derive(Debug, Default)]
pub struct FakeConnection {
    /// Statements executed inside transactions that committed
    pub committed: Vec<String>,
    /// Statements executed inside transactions that were dropped
    pub rolled_back: Vec<String>,
    /// Statements executed outside a transaction
    pub autocommitted: Vec<String>,
    pub transactions_opened: usize,
    /// Any statement containing one of these fragments fails
    pub fail_on: Vec<String>,
    /// Known `(table, column)` pairs; `ADD COLUMN` statements extend it
    pub columns: HashSet<(String, String)>,
    /// Value returned by every `count` call
    pub count_result: i64,
    pub fail_count: bool,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: vec![fragment.to_string()],
            ..Self::default()
        }
    }

    pub fn with_column(mut self, table: &str, column: &str) -> Self {
        self.columns.insert((table.to_string(), column.to_string()));
        self
    }

    fn check(&self, sql: &str) -> Result<(), sqlx::Error> {
        match self.fail_on.iter().find(|fragment| sql.contains(fragment.as_str())) {
            Some(fragment) => Err(sqlx::Error::Protocol(format!(
                "injected failure on '{}'",
                fragment
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SchemaConnection for FakeConnection {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn begin<'a>(&'a mut self) -> Result<Box<dyn SchemaTransaction + 'a>, sqlx::Error> {
        self.transactions_opened += 1;
        Ok(Box::new(FakeTransaction {
            conn: self,
            pending: Vec::new(),
            committed: false,
        }))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        self.check(sql)?;
        if let Some((table, rest)) = sql
            .strip_prefix("ALTER TABLE ")
            .and_then(|s| s.split_once(" ADD COLUMN "))
        {
            let column = rest.split_whitespace().next().unwrap_or_default();
            self.columns.insert((table.to_string(), column.to_string()));
        }
        if sql.starts_with("INSERT INTO users") {
            self.count_result += 1;
        }
        self.autocommitted.push(sql.to_string());
        Ok(())
    }

    async fn has_column(&mut self, table: &str, column: &str) -> Result<bool, sqlx::Error> {
        Ok(self
            .columns
            .contains(&(table.to_string(), column.to_string())))
    }

    async fn count(&mut self, _sql: &str) -> Result<i64, sqlx::Error> {
        if self.fail_count {
            return Err(sqlx::Error::Protocol("injected count failure".to_string()));
        }
        Ok(self.count_result)
    }
}

struct FakeTransaction<'a> {
    conn: &'a mut FakeConnection,
    pending: Vec<String>,
    committed: bool,
}

#[async_trait]
impl<'a> SchemaTransaction for FakeTransaction<'a> {
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        self.pending.push(sql.to_string());
        self.conn.check(sql)
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        let mut this = self;
        let pending = std::mem::take(&mut this.pending);
        this.conn.committed.extend(pending);
        this.committed = true;
        Ok(())
    }
}

impl Drop for FakeTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let pending = std::mem::take(&mut self.pending);
            self.conn.rolled_back.extend(pending);
        }
    }
}
