//! SQLite-backed [`Database`]

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, ErrorCode, InterruptHandle, Statement};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    csv_import, quote_ident, CappedRows, ColumnInfo, Database, DatabaseError, QueryRows, Result,
    TableSchema,
};

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const ABANDONED: u8 = 3;

/// A single shared connection; every call runs on the blocking pool.
///
/// A call whose future is dropped (a timed-out or aborted tool) interrupts
/// its statement if it is running, or is skipped if it has not started yet,
/// so the connection lock is released promptly.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
    read_only: bool,
}

/// Interrupts the owning call's statement when dropped mid-flight
struct InterruptOnDrop {
    state: Arc<AtomicU8>,
    interrupt: Arc<InterruptHandle>,
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.state.swap(ABANDONED, Ordering::SeqCst) == RUNNING {
            warn!("database call abandoned while running, interrupting statement");
            self.interrupt.interrupt();
        }
    }
}

impl SqliteDatabase {
    /// Fresh in-memory database
    pub fn open_in_memory(read_only: bool) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, read_only))
    }

    /// Database file on disk
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!("opened database at {:?}", path);
        Ok(Self::from_connection(conn, read_only))
    }

    fn from_connection(conn: Connection, read_only: bool) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
            read_only,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Import a CSV file as `table`, replacing any previous contents
    pub async fn load_csv(&self, path: impl Into<PathBuf>, table: &str) -> Result<usize> {
        let path = path.into();
        let table = table.to_string();
        self.with_conn(move |conn| csv_import::load_csv(conn, &path, &table))
            .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(QUEUED));
        let _guard = InterruptOnDrop {
            state: Arc::clone(&state),
            interrupt: Arc::clone(&self.interrupt),
        };

        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| DatabaseError::Poisoned)?;
            if state
                .compare_exchange(QUEUED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                debug!("skipping abandoned database call");
                return Err(DatabaseError::Interrupted);
            }
            let result = f(&mut *guard);
            state.store(FINISHED, Ordering::SeqCst);
            result
        })
        .await
        .map_err(|e| DatabaseError::Task(e.to_string()))?;

        match result {
            Err(DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == ErrorCode::OperationInterrupted =>
            {
                Err(DatabaseError::Interrupted)
            }
            other => other,
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn execute(&self, sql: &str) -> Result<QueryRows> {
        let sql = sql.to_string();
        let read_only = self.read_only;
        debug!("executing: {}", sql);
        self.with_conn(move |conn| run_statement(conn, &sql, read_only, usize::MAX))
            .await
            .map(|capped| capped.rows)
    }

    async fn execute_capped(&self, sql: &str, limit: usize) -> Result<CappedRows> {
        let sql = sql.to_string();
        let read_only = self.read_only;
        debug!("executing (max {} rows): {}", limit, sql);
        self.with_conn(move |conn| run_statement(conn, &sql, read_only, limit))
            .await
    }

    async fn describe_schema(&self) -> Result<TableSchema> {
        self.with_conn(|conn| read_schema(conn)).await
    }
}

/// Prepare exactly one statement; anything but whitespace or comments after it is rejected
fn prepare_single<'conn>(conn: &'conn Connection, sql: &str) -> Result<Statement<'conn>> {
    let mut batch = Batch::new(conn, sql);
    let stmt = batch.next()?.ok_or(DatabaseError::EmptyStatement)?;
    match batch.next() {
        Ok(None) => Ok(stmt),
        _ => Err(DatabaseError::MultipleStatements),
    }
}

/// Rows past `limit` are stepped through and counted but never converted
fn run_statement(conn: &Connection, sql: &str, read_only: bool, limit: usize) -> Result<CappedRows> {
    let mut stmt = prepare_single(conn, sql)?;
    if read_only && !stmt.readonly() {
        return Err(DatabaseError::ReadOnly);
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    let mut total_rows = 0usize;
    while let Some(row) = rows.next()? {
        total_rows += 1;
        if out.len() >= limit {
            continue;
        }
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(cell_to_json(row.get_ref(i)?));
        }
        out.push(cells);
    }

    Ok(CappedRows {
        rows: QueryRows { columns, rows: out },
        total_rows,
    })
}

fn read_schema(conn: &Connection) -> Result<TableSchema> {
    let mut tables_stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )?;
    let tables = tables_stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut schema = TableSchema::new();
    for table in tables {
        let mut info = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(&table)))?;
        let columns = info
            .query_map([], |row| {
                Ok(ColumnInfo {
                    column_name: row.get(1)?,
                    column_type: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        schema.insert(table, columns);
    }

    Ok(schema)
}

/// Map a SQLite cell to JSON. Non-finite reals become null, blobs become hex.
pub(crate) fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::from(v),
        ValueRef::Real(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
    }
}
