use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use tracing::{error, info, warn};

use crate::{ExecOutcome, Result, Row, SqlValue, StoreError};

/// Embedded file-backed store. rusqlite is synchronous, so every call runs
/// on the blocking pool; the connection itself is serialized behind a mutex.
pub(crate) struct EmbeddedStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl EmbeddedStore {
    /// Open (or create) the database file. A failed open leaves the store in
    /// place with every later operation reporting it unavailable.
    pub(crate) fn open(path: &Path) -> Self {
        let conn = match Connection::open(path) {
            Ok(conn) => {
                // WAL mode for concurrent reads
                if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
                    warn!("could not enable WAL journal mode: {}", e);
                }
                info!("sqlite database opened at {}", path.display());
                Some(conn)
            }
            Err(e) => {
                error!("failed to open sqlite database at {}: {}", path.display(), e);
                None
            }
        };
        Self { conn: Arc::new(Mutex::new(conn)) }
    }

    pub(crate) async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let conn = self.conn.clone();
        let sql = sql.to_owned();
        let params = params.to_vec();

        run_blocking(move || {
            let guard = lock(&conn)?;
            let conn = open_conn(&guard)?;

            let mut stmt = conn.prepare(&sql).map_err(map_err)?;
            let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

            let mut rows = stmt
                .query(rusqlite::params_from_iter(params.iter().map(to_sqlite)))
                .map_err(map_err)?;

            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(map_err)? {
                let mut columns = Vec::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    let value = from_sqlite(row.get_ref(i).map_err(map_err)?);
                    columns.push((name.clone(), value));
                }
                out.push(Row::from_columns(columns));
            }
            Ok(out)
        })
        .await
    }

    pub(crate) async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecOutcome> {
        let conn = self.conn.clone();
        let sql = sql.to_owned();
        let params = params.to_vec();

        run_blocking(move || {
            let guard = lock(&conn)?;
            let conn = open_conn(&guard)?;

            let changed = conn
                .execute(&sql, rusqlite::params_from_iter(params.iter().map(to_sqlite)))
                .map_err(map_err)?;
            Ok(ExecOutcome { rows_affected: changed as u64 })
        })
        .await
    }

    /// Multi-statement DDL; only the schema initializer uses this.
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.clone();
        let sql = sql.to_owned();

        run_blocking(move || {
            let guard = lock(&conn)?;
            let conn = open_conn(&guard)?;
            conn.execute_batch(&sql).map_err(map_err)
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Internal(format!("blocking task failed: {e}")))?
}

fn lock(conn: &Arc<Mutex<Option<Connection>>>) -> Result<std::sync::MutexGuard<'_, Option<Connection>>> {
    conn.lock()
        .map_err(|_| StoreError::Internal("sqlite connection lock poisoned".into()))
}

fn open_conn<'a>(guard: &'a std::sync::MutexGuard<'_, Option<Connection>>) -> Result<&'a Connection> {
    guard
        .as_ref()
        .ok_or_else(|| StoreError::Unavailable("sqlite database was never opened".into()))
}

fn map_err(e: rusqlite::Error) -> StoreError {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => StoreError::Constraint,
        _ => StoreError::Sqlite(e),
    }
}

fn to_sqlite(value: &SqlValue) -> rusqlite::types::Value {
    match value {
        SqlValue::Null => rusqlite::types::Value::Null,
        SqlValue::Integer(v) => rusqlite::types::Value::Integer(*v),
        SqlValue::Real(v) => rusqlite::types::Value::Real(*v),
        SqlValue::Text(v) => rusqlite::types::Value::Text(v.clone()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
    }
}
