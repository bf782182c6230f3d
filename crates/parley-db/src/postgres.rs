use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row as _, TypeInfo};
use tracing::{error, info, warn};

use crate::{ExecOutcome, Result, Row, SqlValue, StoreError};

/// Networked store reached through a connection pool. sqlx is natively
/// async; the pool handles reconnects, so a failed startup probe is only a
/// warning.
pub(crate) struct NetworkedStore {
    pool: Option<PgPool>,
}

impl NetworkedStore {
    pub(crate) async fn connect(url: &str) -> Self {
        let pool = match PgPoolOptions::new().max_connections(5).connect_lazy(url) {
            Ok(pool) => {
                match sqlx::query("SELECT 1").execute(&pool).await {
                    Ok(_) => info!("postgres connectivity probe ok"),
                    Err(e) => warn!("postgres connectivity probe failed: {}", e),
                }
                Some(pool)
            }
            Err(e) => {
                error!("invalid postgres connection string: {}", e);
                None
            }
        };
        Self { pool }
    }

    fn pool(&self) -> Result<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("postgres pool was never constructed".into()))
    }

    pub(crate) async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let sql = numbered_placeholders(sql);
        let mut query = sqlx::query(&sql);
        for value in params {
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(self.pool()?).await.map_err(map_err)?;
        rows.iter().map(decode_row).collect()
    }

    pub(crate) async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecOutcome> {
        let sql = numbered_placeholders(sql);
        let mut query = sqlx::query(&sql);
        for value in params {
            query = bind_value(query, value);
        }

        let result = query.execute(self.pool()?).await.map_err(map_err)?;
        Ok(ExecOutcome { rows_affected: result.rows_affected() })
    }
}

/// Rewrite sequential `?` placeholders into the `$1, $2, ...` form postgres
/// expects. `?` inside single-quoted literals is left alone.
fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0usize;
    let mut in_string = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                out.push(ch);
            }
            '?' if !in_string => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &SqlValue,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Real(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
    }
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.columns().len());

    for (i, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT2" => row
                .try_get::<Option<i16>, _>(i)
                .map_err(map_err)?
                .map(|v| SqlValue::Integer(v as i64)),
            "INT4" => row
                .try_get::<Option<i32>, _>(i)
                .map_err(map_err)?
                .map(|v| SqlValue::Integer(v as i64)),
            "INT8" => row
                .try_get::<Option<i64>, _>(i)
                .map_err(map_err)?
                .map(SqlValue::Integer),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(i)
                .map_err(map_err)?
                .map(|v| SqlValue::Real(v as f64)),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(i)
                .map_err(map_err)?
                .map(SqlValue::Real),
            "BOOL" => row
                .try_get::<Option<bool>, _>(i)
                .map_err(map_err)?
                .map(|v| SqlValue::Integer(v as i64)),
            "TIMESTAMPTZ" => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)
                .map_err(map_err)?
                .map(|v| SqlValue::Text(v.to_rfc3339())),
            "TIMESTAMP" => row
                .try_get::<Option<chrono::NaiveDateTime>, _>(i)
                .map_err(map_err)?
                .map(|v| SqlValue::Text(v.format("%Y-%m-%d %H:%M:%S").to_string())),
            _ => row
                .try_get::<Option<String>, _>(i)
                .map_err(map_err)?
                .map(SqlValue::Text),
        };

        columns.push((column.name().to_string(), value.unwrap_or(SqlValue::Null)));
    }

    Ok(Row::from_columns(columns))
}

fn map_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => StoreError::Constraint,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Postgres(e),
    }
}

#[cfg(test)]
mod tests {
    use super::numbered_placeholders;

    #[test]
    fn rewrites_each_placeholder_in_order() {
        assert_eq!(
            numbered_placeholders("INSERT INTO users (username, password) VALUES (?, ?)"),
            "INSERT INTO users (username, password) VALUES ($1, $2)"
        );
    }

    #[test]
    fn leaves_quoted_question_marks_alone() {
        assert_eq!(
            numbered_placeholders("SELECT * FROM messages WHERE message = '?' AND sender = ?"),
            "SELECT * FROM messages WHERE message = '?' AND sender = $1"
        );
    }

    #[test]
    fn passes_through_sql_without_placeholders() {
        assert_eq!(numbered_placeholders("SELECT 1"), "SELECT 1");
    }
}
