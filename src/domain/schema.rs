use serde::Serialize;

/// Tables owned by the finance schema, in creation order.
pub const TABLES: [&str; 4] = ["users", "transactions", "budgets", "goals"];

/// Single-user mode relies on this row existing.
pub const DEFAULT_USER_ID: i64 = 1;
pub const DEFAULT_USER_EMAIL: &str = "demo@user";

/// A column that databases created by early releases may lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedColumn {
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
}

/// Columns added after the first schema shipped. Each one is portable across backends
/// and nullable, so adding it never rewrites existing rows.
pub const LEGACY_COLUMNS: &[ExpectedColumn] = &[ExpectedColumn {
    table: "users",
    column: "password_hash",
    definition: "VARCHAR(255)",
}];

/// Outcome of checking an expected column against the live schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ColumnPatch {
    AddColumn {
        table: String,
        column: String,
        definition: String,
    },
    NoOp {
        table: String,
        column: String,
    },
}

impl ColumnPatch {
    /// Decide what to do given whether the column is already present.
    pub fn plan(expected: &ExpectedColumn, present: bool) -> Self {
        if present {
            ColumnPatch::NoOp {
                table: expected.table.to_string(),
                column: expected.column.to_string(),
            }
        } else {
            ColumnPatch::AddColumn {
                table: expected.table.to_string(),
                column: expected.column.to_string(),
                definition: expected.definition.to_string(),
            }
        }
    }

    /// The DDL to run, if any.
    pub fn sql(&self) -> Option<String> {
        match self {
            ColumnPatch::AddColumn {
                table,
                column,
                definition,
            } => Some(format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table, column, definition
            )),
            ColumnPatch::NoOp { .. } => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, ColumnPatch::NoOp { .. })
    }
}

/// True for plain unquoted SQL identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
/// Introspection queries interpolate table and column names, so only these are accepted.
pub fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() || first == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
