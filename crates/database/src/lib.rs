//! Embedded analytical database
//!
//! The [`Database`] trait is the collaborator the SQL tools talk to;
//! [`SqliteDatabase`] is the in-process implementation backed by rusqlite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod analytics;
pub mod csv_import;
pub mod sqlite;

pub use analytics::{categories, summary, Summary};
pub use sqlite::SqliteDatabase;

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("only read-only statements are allowed")]
    ReadOnly,

    #[error("only one statement per query is allowed")]
    MultipleStatements,

    #[error("no SQL statement to execute")]
    EmptyStatement,

    #[error("statement interrupted")]
    Interrupted,

    #[error("csv import failed: {0}")]
    Csv(String),

    #[error("unexpected result shape: {0}")]
    Shape(String),

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("database task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Result set of one statement, rows in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell by row index and column name
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Rows as `{column: value}` records
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Keep at most `limit` rows; returns whether anything was dropped
    pub fn truncate(&mut self, limit: usize) -> bool {
        if self.rows.len() > limit {
            self.rows.truncate(limit);
            true
        } else {
            false
        }
    }
}

/// First rows of a result set together with the full row count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CappedRows {
    pub rows: QueryRows,
    pub total_rows: usize,
}

impl CappedRows {
    pub fn truncated(&self) -> bool {
        self.total_rows > self.rows.len()
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub column_type: String,
}

/// Table name to ordered columns
pub type TableSchema = BTreeMap<String, Vec<ColumnInfo>>;

/// Render a schema as the plain-text block used in prompts
pub fn schema_to_text(schema: &TableSchema) -> String {
    if schema.is_empty() {
        return "No tables available.".to_string();
    }

    schema
        .iter()
        .map(|(table, columns)| {
            let lines: Vec<String> = columns
                .iter()
                .map(|c| format!("  {} {}", c.column_name, c.column_type))
                .collect();
            format!("Table '{}':\n{}", table, lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The database collaborator
#[async_trait]
pub trait Database: Send + Sync {
    /// Run one statement and return its rows
    async fn execute(&self, sql: &str) -> Result<QueryRows>;

    /// Run one statement keeping at most `limit` rows; the rest are only counted
    async fn execute_capped(&self, sql: &str, limit: usize) -> Result<CappedRows> {
        let mut rows = self.execute(sql).await?;
        let total_rows = rows.len();
        rows.truncate(limit);
        Ok(CappedRows { rows, total_rows })
    }

    /// Enumerate tables and their columns
    async fn describe_schema(&self) -> Result<TableSchema>;
}
