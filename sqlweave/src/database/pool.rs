//! Backend connection pools
//!
//! [`DbPool`] is the only place that talks to sqlx. It binds [`RowValue`]
//! parameters, decodes result rows back into [`RowValue`] and reports raw
//! sqlx errors; classification into [`crate::Error`] happens in the caller,
//! which knows the operation and target.

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::{Column, Either, Executor, Row, TypeInfo, ValueRef};
use tokio::sync::mpsc;

use crate::config::{ConnectionConfig, DialectKind, ManagerSettings};
use crate::database::traits::Statement;
use crate::schema::ExecuteResult;
use crate::value::RowValue;
use crate::{Error, Result};

#[cfg(feature = "mysql")]
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlQueryResult, MySqlRow};
#[cfg(feature = "postgres")]
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgQueryResult, PgRow};
#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteQueryResult, SqliteRow};

/// Rows of a single result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names; empty when no row came back
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RowValue>>,
}

/// Everything a raw SQL text produced, across all of its statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutcome {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RowValue>>,
    pub affected_rows: u64,
    /// Reading stopped because the row cap was exceeded
    pub truncated: bool,
}

/// Connection pool for one of the supported backends
#[derive(Debug, Clone)]
pub enum DbPool {
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    #[cfg(feature = "mysql")]
    MySql(MySqlPool),
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePool),
}

/// Bind every parameter of a statement onto a sqlx query
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for value in $params {
            query = match value {
                RowValue::Null => query.bind(None::<String>),
                RowValue::Integer(integer) => query.bind(*integer),
                RowValue::Float(float) => query.bind(*float),
                RowValue::Text(text) => query.bind(text.clone()),
                RowValue::Boolean(flag) => query.bind(*flag),
                RowValue::Binary(bytes) => query.bind(bytes.clone()),
                RowValue::Timestamp(timestamp) => query.bind(*timestamp),
            };
        }
        query
    }};
}

impl DbPool {
    /// Open a pool for `config`; the pool connects lazily except for the first connection
    pub async fn connect(config: &ConnectionConfig, settings: &ManagerSettings) -> Result<Self> {
        let failed = |error: sqlx::Error| Error::ConnectionFailed(error.to_string());

        match config.dialect {
            #[cfg(feature = "postgres")]
            DialectKind::Postgres => {
                let mut options = PgConnectOptions::new().host(&config.host).username(&config.user);
                if let Some(port) = config.port_or_default() {
                    options = options.port(port);
                }
                if let Some(password) = &config.password {
                    options = options.password(password);
                }
                if let Some(database) = &config.database {
                    options = options.database(database);
                }

                let pool = PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.acquire_timeout())
                    .connect_with(options)
                    .await
                    .map_err(failed)?;
                Ok(DbPool::Postgres(pool))
            }
            #[cfg(feature = "mysql")]
            DialectKind::Mysql => {
                let mut options = MySqlConnectOptions::new().host(&config.host).username(&config.user);
                if let Some(port) = config.port_or_default() {
                    options = options.port(port);
                }
                if let Some(password) = &config.password {
                    options = options.password(password);
                }
                if let Some(database) = &config.database {
                    options = options.database(database);
                }

                let pool = MySqlPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.acquire_timeout())
                    .connect_with(options)
                    .await
                    .map_err(failed)?;
                Ok(DbPool::MySql(pool))
            }
            #[cfg(feature = "sqlite")]
            DialectKind::Sqlite => {
                let path = config.database.as_deref().unwrap_or(":memory:");
                let pool_options = SqlitePoolOptions::new().acquire_timeout(settings.acquire_timeout());

                let pool = if path == ":memory:" {
                    // Every in-memory connection is its own database; keep exactly one alive
                    let options: SqliteConnectOptions = "sqlite::memory:".parse().map_err(failed)?;
                    pool_options
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                        .connect_with(options)
                        .await
                        .map_err(failed)?
                } else {
                    let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
                    pool_options
                        .max_connections(settings.max_connections)
                        .connect_with(options)
                        .await
                        .map_err(failed)?
                };
                Ok(DbPool::Sqlite(pool))
            }
            #[allow(unreachable_patterns)]
            other => Err(Error::UnsupportedDialect(other.to_string())),
        }
    }

    /// Round trip `SELECT 1`
    pub async fn ping(&self) -> sqlx::Result<()> {
        match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        }
    }

    /// Stop handing out connections and wait for checked-out ones to return
    pub async fn close(&self) {
        match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => pool.close().await,
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => pool.close().await,
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => pool.is_closed(),
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => pool.is_closed(),
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => pool.is_closed(),
        }
    }

    /// Run a row-returning statement and decode every row
    #[tracing::instrument(skip_all, fields(sql_preview = %preview(&statement.sql)))]
    pub async fn fetch(&self, statement: &Statement) -> sqlx::Result<RowSet> {
        let row_set = match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => {
                let rows = bind_params!(sqlx::query(&statement.sql), &statement.params)
                    .fetch_all(pool)
                    .await?;
                collect_rows(&rows, postgres_value)?
            }
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => {
                let rows = bind_params!(sqlx::query(&statement.sql), &statement.params)
                    .fetch_all(pool)
                    .await?;
                collect_rows(&rows, mysql_value)?
            }
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => {
                let rows = bind_params!(sqlx::query(&statement.sql), &statement.params)
                    .fetch_all(pool)
                    .await?;
                collect_rows(&rows, sqlite_value)?
            }
        };
        tracing::debug!(row_count = row_set.rows.len(), "query executed");
        Ok(row_set)
    }

    /// Run a statement for its effect
    ///
    /// Statements without parameters go through the text protocol, which
    /// accepts commands (such as MySQL `USE`) the prepared protocol rejects.
    #[tracing::instrument(skip_all, fields(sql_preview = %preview(&statement.sql)))]
    pub async fn execute(&self, statement: &Statement) -> sqlx::Result<ExecuteResult> {
        let raw = statement.params.is_empty();
        let result = match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => {
                let done = if raw {
                    sqlx::raw_sql(&statement.sql).execute(pool).await?
                } else {
                    bind_params!(sqlx::query(&statement.sql), &statement.params)
                        .execute(pool)
                        .await?
                };
                ExecuteResult {
                    affected_rows: done.rows_affected(),
                    last_insert_id: None,
                }
            }
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => {
                let done = if raw {
                    sqlx::raw_sql(&statement.sql).execute(pool).await?
                } else {
                    bind_params!(sqlx::query(&statement.sql), &statement.params)
                        .execute(pool)
                        .await?
                };
                ExecuteResult {
                    affected_rows: done.rows_affected(),
                    last_insert_id: match done.last_insert_id() {
                        0 => None,
                        id => i64::try_from(id).ok(),
                    },
                }
            }
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => {
                let done = if raw {
                    sqlx::raw_sql(&statement.sql).execute(pool).await?
                } else {
                    bind_params!(sqlx::query(&statement.sql), &statement.params)
                        .execute(pool)
                        .await?
                };
                ExecuteResult {
                    affected_rows: done.rows_affected(),
                    last_insert_id: Some(done.last_insert_rowid()).filter(|id| *id != 0),
                }
            }
        };
        tracing::debug!(affected_rows = result.affected_rows, "statement executed");
        Ok(result)
    }

    /// Run caller-supplied SQL text on one pinned connection
    ///
    /// `context` (the dialect's database switch) runs first on the same
    /// connection. The text may hold several statements; rows of every
    /// result set are collected until `max_rows` is exceeded.
    #[tracing::instrument(skip_all, fields(sql_preview = %preview(sql)))]
    pub async fn run_raw(&self, context: Option<&Statement>, sql: &str, max_rows: u64) -> sqlx::Result<RawOutcome> {
        match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => {
                let mut connection = pool.acquire().await?;
                raw_on_postgres(&mut connection, context, sql, max_rows).await
            }
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => {
                let mut connection = pool.acquire().await?;
                raw_on_mysql(&mut connection, context, sql, max_rows).await
            }
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => {
                let mut connection = pool.acquire().await?;
                raw_on_sqlite(&mut connection, context, sql, max_rows).await
            }
        }
    }

    /// Run `statements` in order on one connection, stopping at the first failure
    ///
    /// `prelude` runs first on that connection. On failure the error carries
    /// the index of the statement that failed; a failing prelude or acquire
    /// reports index 0.
    #[tracing::instrument(skip_all, fields(statements = statements.len()))]
    pub async fn execute_sequence(
        &self,
        prelude: Option<&Statement>,
        statements: &[&Statement],
    ) -> std::result::Result<(), (usize, sqlx::Error)> {
        match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => {
                let mut connection = pool.acquire().await.map_err(|error| (0, error))?;
                sequence_on_postgres(&mut connection, prelude, statements).await
            }
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => {
                let mut connection = pool.acquire().await.map_err(|error| (0, error))?;
                sequence_on_mysql(&mut connection, prelude, statements).await
            }
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => {
                let mut connection = pool.acquire().await.map_err(|error| (0, error))?;
                sequence_on_sqlite(&mut connection, prelude, statements).await
            }
        }
    }

    /// Stream decoded rows of `statement` into `sender` until exhausted or the receiver is dropped
    pub async fn stream_into(&self, statement: &Statement, sender: &mpsc::Sender<Result<Vec<RowValue>>>) -> sqlx::Result<()> {
        match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => {
                let rows = bind_params!(sqlx::query(&statement.sql), &statement.params).fetch(pool);
                forward_rows(rows, postgres_value, sender).await
            }
            #[cfg(feature = "mysql")]
            DbPool::MySql(pool) => {
                let rows = bind_params!(sqlx::query(&statement.sql), &statement.params).fetch(pool);
                forward_rows(rows, mysql_value, sender).await
            }
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => {
                let rows = bind_params!(sqlx::query(&statement.sql), &statement.params).fetch(pool);
                forward_rows(rows, sqlite_value, sender).await
            }
        }
    }
}

fn preview(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ").chars().take(100).collect()
}

/// Per-backend work on a checked-out connection
///
/// These take the concrete connection type with a named lifetime so the
/// returned futures stay `Send`.
macro_rules! connection_work {
    ($feature:literal, $raw:ident, $sequence:ident, $connection:ty, $done:ty, $decode:ident) => {
        #[cfg(feature = $feature)]
        async fn $raw<'c>(
            connection: &'c mut $connection,
            context: Option<&'c Statement>,
            sql: &'c str,
            max_rows: u64,
        ) -> sqlx::Result<RawOutcome> {
            if let Some(context) = context {
                (&mut *connection).execute(sqlx::raw_sql(&context.sql)).await?;
            }
            let stream = (&mut *connection).fetch_many(sqlx::raw_sql(sql));
            collect_raw(stream, |done: &$done| done.rows_affected(), $decode, max_rows).await
        }

        #[cfg(feature = $feature)]
        async fn $sequence<'c>(
            connection: &'c mut $connection,
            prelude: Option<&'c Statement>,
            statements: &'c [&'c Statement],
        ) -> std::result::Result<(), (usize, sqlx::Error)> {
            if let Some(prelude) = prelude {
                (&mut *connection)
                    .execute(bind_params!(sqlx::query(&prelude.sql), &prelude.params))
                    .await
                    .map_err(|error| (0, error))?;
            }
            for (index, statement) in statements.iter().enumerate() {
                let done = if statement.params.is_empty() {
                    (&mut *connection).execute(sqlx::raw_sql(&statement.sql)).await
                } else {
                    (&mut *connection)
                        .execute(bind_params!(sqlx::query(&statement.sql), &statement.params))
                        .await
                };
                done.map_err(|error| (index, error))?;
            }
            Ok(())
        }
    };
}

connection_work!("postgres", raw_on_postgres, sequence_on_postgres, PgConnection, PgQueryResult, postgres_value);
connection_work!("mysql", raw_on_mysql, sequence_on_mysql, MySqlConnection, MySqlQueryResult, mysql_value);
connection_work!("sqlite", raw_on_sqlite, sequence_on_sqlite, SqliteConnection, SqliteQueryResult, sqlite_value);

type DecodeValue<R> = fn(&R, usize) -> sqlx::Result<RowValue>;

fn decode_row<R: Row>(row: &R, decode_value: DecodeValue<R>) -> sqlx::Result<Vec<RowValue>> {
    (0..row.len()).map(|index| decode_value(row, index)).collect()
}

fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|column| column.name().to_string()).collect()
}

fn collect_rows<R: Row>(rows: &[R], decode_value: DecodeValue<R>) -> sqlx::Result<RowSet> {
    Ok(RowSet {
        columns: rows.first().map(column_names).unwrap_or_default(),
        rows: rows
            .iter()
            .map(|row| decode_row(row, decode_value))
            .collect::<sqlx::Result<Vec<_>>>()?,
    })
}

async fn collect_raw<R: Row, Q>(
    mut stream: BoxStream<'_, sqlx::Result<Either<Q, R>>>,
    rows_affected: fn(&Q) -> u64,
    decode_value: DecodeValue<R>,
    max_rows: u64,
) -> sqlx::Result<RawOutcome> {
    let mut outcome = RawOutcome::default();

    while let Some(item) = stream.next().await {
        match item? {
            Either::Left(done) => outcome.affected_rows += rows_affected(&done),
            Either::Right(row) => {
                if outcome.rows.len() as u64 >= max_rows {
                    outcome.truncated = true;
                    break;
                }
                if outcome.columns.is_empty() {
                    outcome.columns = column_names(&row);
                }
                outcome.rows.push(decode_row(&row, decode_value)?);
            }
        }
    }

    Ok(outcome)
}

async fn forward_rows<R: Row>(
    mut rows: BoxStream<'_, sqlx::Result<R>>,
    decode_value: DecodeValue<R>,
    sender: &mpsc::Sender<Result<Vec<RowValue>>>,
) -> sqlx::Result<()> {
    while let Some(row) = rows.try_next().await? {
        let values = decode_row(&row, decode_value)?;
        if sender.send(Ok(values)).await.is_err() {
            tracing::debug!("row consumer went away, stopping stream");
            break;
        }
    }
    Ok(())
}

/// Text for bytes that are valid UTF-8, binary otherwise
fn text_or_binary(bytes: Vec<u8>) -> RowValue {
    match String::from_utf8(bytes) {
        Ok(text) => RowValue::Text(text),
        Err(error) => RowValue::Binary(error.into_bytes()),
    }
}

fn unsigned(value: u64) -> RowValue {
    i64::try_from(value)
        .map(RowValue::Integer)
        .unwrap_or_else(|_| RowValue::Text(value.to_string()))
}

fn json_text<T: serde::Serialize>(value: &T) -> Option<RowValue> {
    serde_json::to_string(value).ok().map(RowValue::Text)
}

#[cfg(feature = "postgres")]
fn postgres_value(row: &PgRow, index: usize) -> sqlx::Result<RowValue> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::types::{Decimal, JsonValue, Uuid};

    if row.try_get_raw(index)?.is_null() {
        return Ok(RowValue::Null);
    }

    let decoded = match row.column(index).type_info().name() {
        "BOOL" => row.try_get::<bool, _>(index).ok().map(RowValue::Boolean),
        "INT2" => row.try_get::<i16, _>(index).ok().map(|value| RowValue::Integer(value.into())),
        "INT4" => row.try_get::<i32, _>(index).ok().map(|value| RowValue::Integer(value.into())),
        "INT8" => row.try_get::<i64, _>(index).ok().map(RowValue::Integer),
        "OID" => row
            .try_get::<sqlx::postgres::types::Oid, _>(index)
            .ok()
            .map(|oid| RowValue::Integer(oid.0.into())),
        "FLOAT4" => row.try_get::<f32, _>(index).ok().map(|value| RowValue::Float(value.into())),
        "FLOAT8" => row.try_get::<f64, _>(index).ok().map(RowValue::Float),
        // String form keeps the exact digits
        "NUMERIC" => row.try_get::<Decimal, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "CITEXT" | "UNKNOWN" => {
            row.try_get::<String, _>(index).ok().map(RowValue::Text)
        }
        "BYTEA" => row.try_get::<Vec<u8>, _>(index).ok().map(RowValue::Binary),
        "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(index).ok().map(RowValue::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .ok()
            .map(|value| RowValue::Text(value.to_rfc3339())),
        "DATE" => row.try_get::<NaiveDate, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "TIME" => row.try_get::<NaiveTime, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "UUID" => row.try_get::<Uuid, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "JSON" | "JSONB" => row.try_get::<JsonValue, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" => row.try_get::<Vec<String>, _>(index).ok().and_then(|value| json_text(&value)),
        "INT4[]" => row.try_get::<Vec<i32>, _>(index).ok().and_then(|value| json_text(&value)),
        "INT8[]" => row.try_get::<Vec<i64>, _>(index).ok().and_then(|value| json_text(&value)),
        "BOOL[]" => row.try_get::<Vec<bool>, _>(index).ok().and_then(|value| json_text(&value)),
        _ => None,
    };

    match decoded {
        Some(value) => Ok(value),
        // Enums and other user types arrive as their label bytes
        None => Ok(text_or_binary(row.try_get_unchecked::<Vec<u8>, _>(index)?)),
    }
}

#[cfg(feature = "mysql")]
fn mysql_value(row: &MySqlRow, index: usize) -> sqlx::Result<RowValue> {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use sqlx::types::{Decimal, JsonValue};

    if row.try_get_raw(index)?.is_null() {
        return Ok(RowValue::Null);
    }

    let type_name = row.column(index).type_info().name();
    let decoded = match type_name {
        "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(RowValue::Boolean),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(index).ok().map(RowValue::Integer)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED" | "BIGINT UNSIGNED" => {
            row.try_get::<u64, _>(index).ok().map(unsigned)
        }
        "YEAR" => row
            .try_get_unchecked::<u16, _>(index)
            .ok()
            .map(|value| RowValue::Integer(value.into())),
        "FLOAT" => row.try_get::<f32, _>(index).ok().map(|value| RowValue::Float(value.into())),
        "DOUBLE" => row.try_get::<f64, _>(index).ok().map(RowValue::Float),
        "DECIMAL" => row.try_get::<Decimal, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "DATETIME" | "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(index).ok().map(RowValue::Timestamp),
        "DATE" => row.try_get::<NaiveDate, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "TIME" => row.try_get::<NaiveTime, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "JSON" => row.try_get::<JsonValue, _>(index).ok().map(|value| RowValue::Text(value.to_string())),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            row.try_get::<Vec<u8>, _>(index).ok().map(RowValue::Binary)
        }
        "VARCHAR" | "CHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            row.try_get::<String, _>(index).ok().map(RowValue::Text)
        }
        _ => row.try_get::<String, _>(index).ok().map(RowValue::Text),
    };

    match decoded {
        Some(value) => Ok(value),
        None => Ok(text_or_binary(row.try_get_unchecked::<Vec<u8>, _>(index)?)),
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_value(row: &SqliteRow, index: usize) -> sqlx::Result<RowValue> {
    use chrono::NaiveDateTime;

    if row.try_get_raw(index)?.is_null() {
        return Ok(RowValue::Null);
    }

    // SQLite reports declared affinities; the stored value may still differ
    let decoded = match row.column(index).type_info().name() {
        "INTEGER" => row.try_get::<i64, _>(index).ok().map(RowValue::Integer),
        "REAL" => row.try_get::<f64, _>(index).ok().map(RowValue::Float),
        "TEXT" => row.try_get::<String, _>(index).ok().map(RowValue::Text),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).ok().map(RowValue::Binary),
        "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(RowValue::Boolean),
        "DATETIME" => row.try_get::<NaiveDateTime, _>(index).ok().map(RowValue::Timestamp),
        _ => None,
    };
    if let Some(value) = decoded {
        return Ok(value);
    }

    // Fallback: try common storage classes in order
    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Ok(RowValue::Integer(value));
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return Ok(RowValue::Float(value));
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return Ok(RowValue::Text(value));
    }
    Ok(text_or_binary(row.try_get_unchecked::<Vec<u8>, _>(index)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_preview_collapses_whitespace() {
        assert_eq!(preview("SELECT *\n    FROM  users"), "SELECT * FROM users");
        assert_eq!(preview(&"x".repeat(500)).len(), 100);
    }

    #[test]
    fn test_text_or_binary() {
        assert_eq!(text_or_binary(b"plain".to_vec()), RowValue::Text("plain".into()));
        assert_eq!(text_or_binary(vec![0xff, 0x00]), RowValue::Binary(vec![0xff, 0x00]));
        assert_eq!(unsigned(u64::MAX), RowValue::Text(u64::MAX.to_string()));
        assert_eq!(unsigned(7), RowValue::Integer(7));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_values_round_trip() {
        let pool = DbPool::connect(
            &ConnectionConfig::new(DialectKind::Sqlite),
            &ManagerSettings::default(),
        )
        .await
        .unwrap();

        pool.execute(&Statement::new(
            "CREATE TABLE samples (id INTEGER PRIMARY KEY, label TEXT, ratio REAL, payload BLOB, flag BOOLEAN, seen DATETIME)",
        ))
        .await
        .unwrap();

        let timestamp = test_support::timestamp("2024-03-01 12:30:00");
        let insert = Statement::with_params(
            "INSERT INTO samples (label, ratio, payload, flag, seen) VALUES (?, ?, ?, ?, ?)",
            vec![
                RowValue::Text("héllo\u{1F600}".into()),
                RowValue::Float(0.25),
                RowValue::Binary(vec![0, 159, 146, 150, 255]),
                RowValue::Boolean(true),
                RowValue::Timestamp(timestamp),
            ],
        );
        let result = pool.execute(&insert).await.unwrap();
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.last_insert_id, Some(1));

        pool.execute(&Statement::new("INSERT INTO samples DEFAULT VALUES"))
            .await
            .unwrap();

        let row_set = pool
            .fetch(&Statement::new("SELECT * FROM samples ORDER BY id"))
            .await
            .unwrap();
        assert_eq!(row_set.columns, vec!["id", "label", "ratio", "payload", "flag", "seen"]);
        assert_eq!(
            row_set.rows[0],
            vec![
                RowValue::Integer(1),
                RowValue::Text("héllo\u{1F600}".into()),
                RowValue::Float(0.25),
                RowValue::Binary(vec![0, 159, 146, 150, 255]),
                RowValue::Boolean(true),
                RowValue::Timestamp(timestamp),
            ]
        );
        assert!(row_set.rows[1][1..].iter().all(RowValue::is_null));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_run_raw_sums_affected_rows_and_caps_rows() {
        let pool = DbPool::connect(
            &ConnectionConfig::new(DialectKind::Sqlite),
            &ManagerSettings::default(),
        )
        .await
        .unwrap();

        let outcome = pool
            .run_raw(
                None,
                "CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (1), (2), (3); UPDATE t SET n = n + 1;",
                100,
            )
            .await
            .unwrap();
        assert_eq!(outcome.affected_rows, 6);
        assert!(outcome.rows.is_empty());

        let capped = pool.run_raw(None, "SELECT n FROM t ORDER BY n", 2).await.unwrap();
        assert!(capped.truncated);
        assert_eq!(capped.rows.len(), 2);
        assert_eq!(capped.columns, vec!["n"]);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_execute_sequence_reports_failing_index() {
        let pool = DbPool::connect(
            &ConnectionConfig::new(DialectKind::Sqlite),
            &ManagerSettings::default(),
        )
        .await
        .unwrap();

        let create = Statement::new("CREATE TABLE t (n INTEGER)");
        let insert = Statement::with_params("INSERT INTO t VALUES (?)", vec![RowValue::Integer(1)]);
        let broken = Statement::new("INSERT INTO missing VALUES (1)");
        let prelude = Statement::new("SELECT COUNT(*) FROM sqlite_master");

        let (index, _) = pool
            .execute_sequence(Some(&prelude), &[&create, &insert, &broken, &insert])
            .await
            .unwrap_err();
        assert_eq!(index, 2);

        let row_set = pool.fetch(&Statement::new("SELECT n FROM t")).await.unwrap();
        assert_eq!(row_set.rows, vec![vec![RowValue::Integer(1)]]);
    }
}
