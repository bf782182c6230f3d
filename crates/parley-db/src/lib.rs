pub mod models;
mod postgres;
mod queries;
mod schema;
mod sqlite;

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

/// Where the store lives. `database_url` wins when set; otherwise the
/// embedded file at `sqlite_path` is used.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A UNIQUE (or other) constraint rejected the statement.
    #[error("constraint violated")]
    Constraint,

    /// The backend could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A result row did not have the expected shape.
    #[error("row decode failed: {0}")]
    Decode(String),

    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("postgres error: {0}")]
    Postgres(sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A positional query parameter, backend-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<Option<&str>> for SqlValue {
    fn from(v: Option<&str>) -> Self {
        match v {
            Some(s) => Self::Text(s.to_owned()),
            None => Self::Null,
        }
    }
}

/// One result row: column name -> value, in select-list order.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub(crate) fn from_columns(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn i64(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(SqlValue::Integer(v)) => Ok(*v),
            other => Err(StoreError::Decode(format!(
                "column {name}: expected integer, got {other:?}"
            ))),
        }
    }

    pub fn text(&self, name: &str) -> Result<String> {
        match self.get(name) {
            Some(SqlValue::Text(v)) => Ok(v.clone()),
            other => Err(StoreError::Decode(format!(
                "column {name}: expected text, got {other:?}"
            ))),
        }
    }

    pub fn opt_text(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            Some(SqlValue::Text(v)) => Ok(Some(v.clone())),
            Some(SqlValue::Null) => Ok(None),
            other => Err(StoreError::Decode(format!(
                "column {name}: expected text or null, got {other:?}"
            ))),
        }
    }
}

/// Result of a mutating statement.
#[derive(Debug, Clone, Copy)]
pub struct ExecOutcome {
    pub rows_affected: u64,
}

enum Backend {
    Embedded(sqlite::EmbeddedStore),
    Networked(postgres::NetworkedStore),
}

/// The store handle shared across all request handlers. Which backend sits
/// behind it is decided exactly once, in [`Store::connect`]; callers never
/// branch on it again.
pub struct Store {
    backend: Backend,
}

impl Store {
    /// Select and construct the active backend. Connection problems are
    /// logged, not fatal: a broken backend fails each operation
    /// individually rather than aborting startup.
    pub async fn connect(config: &StoreConfig) -> Self {
        let backend = match &config.database_url {
            Some(url) => {
                info!("store backend: networked postgres");
                Backend::Networked(postgres::NetworkedStore::connect(url).await)
            }
            None => {
                info!("store backend: embedded sqlite at {}", config.sqlite_path.display());
                Backend::Embedded(sqlite::EmbeddedStore::open(&config.sqlite_path))
            }
        };
        Self { backend }
    }

    /// Run a read. Callers write sequential `?` placeholders; each backend
    /// adapts them to its own syntax. Zero matching rows is `Ok(vec![])`.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        match &self.backend {
            Backend::Embedded(s) => s.query(sql, params).await,
            Backend::Networked(s) => s.query(sql, params).await,
        }
    }

    /// Run a mutation with the same placeholder contract as [`Store::query`].
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecOutcome> {
        match &self.backend {
            Backend::Embedded(s) => s.execute(sql, params).await,
            Backend::Networked(s) => s.execute(sql, params).await,
        }
    }

    /// Create the `users` and `messages` tables if they do not exist yet.
    /// Must complete before the first handler query; safe to run on every
    /// startup.
    pub async fn init_schema(&self) -> Result<()> {
        match &self.backend {
            Backend::Embedded(s) => s.execute_batch(schema::SQLITE_SCHEMA).await?,
            Backend::Networked(s) => {
                for statement in schema::POSTGRES_SCHEMA {
                    s.execute(statement, &[]).await?;
                }
            }
        }
        info!("database schema ready");
        Ok(())
    }
}
