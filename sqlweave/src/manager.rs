//! Connection lifecycle
//!
//! A [`ConnectionManager`] owns at most one [`ActiveConnection`]. Queries
//! clone the `Arc` out of the state and release the lock immediately, so a
//! long query never blocks a reconnect and a reconnect never tears a pool out
//! from under a running query: the old pool is closed only after the swap,
//! and closing waits for checked-out connections to come back.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::{ConnectionConfig, DialectKind, ManagerSettings};
use crate::database::pool::DbPool;
use crate::database::registry;
use crate::database::traits::{SqlDialect, Statement};
use crate::export::RowCursor;
use crate::schema::{
    ColumnInfo, DatabaseInfo, DatabaseSchema, ExecuteResult, QueryResult, TableAlteration, TableDataRequest,
    TableDataResponse, TableDetails, TableInfo,
};
use crate::value::{RowData, RowValue};
use crate::{Error, Result};

/// Lifecycle state of a [`ConnectionManager`]
#[derive(Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(Arc<ActiveConnection>),
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected(_) => "connected",
        }
    }
}

/// An open pool together with the dialect that speaks to it
pub struct ActiveConnection {
    dialect: &'static dyn SqlDialect,
    pool: DbPool,
    settings: ManagerSettings,
    target: String,
    /// Context applied to raw SQL calls
    current_database: RwLock<Option<String>>,
}

impl ActiveConnection {
    /// Resolve the dialect, open the pool and prove it answers
    pub async fn open(config: &ConnectionConfig, settings: ManagerSettings) -> Result<Self> {
        let dialect = registry::dialect_for(config.dialect)?;
        let pool = DbPool::connect(config, &settings).await?;

        if let Err(error) = pool.ping().await {
            pool.close().await;
            return Err(Error::ConnectionFailed(error.to_string()));
        }

        let current_database = match config.dialect {
            DialectKind::Mysql => config.database.clone().filter(|name| !name.is_empty()),
            DialectKind::Postgres => None,
            DialectKind::Sqlite => Some("main".to_string()),
        };

        Ok(Self {
            dialect,
            pool,
            settings,
            target: config.target(),
            current_database: RwLock::new(current_database),
        })
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    pub fn kind(&self) -> DialectKind {
        self.dialect.kind()
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Connection target without credentials
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn current_database(&self) -> Option<String> {
        self.current_database
            .read()
            .map(|current| current.clone())
            .unwrap_or_default()
    }

    pub async fn ping(&self) -> Result<()> {
        self.pool
            .ping()
            .await
            .map_err(|error| Error::ConnectionFailed(error.to_string()))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) async fn fetch(
        &self,
        statement: &Statement,
        operation: &'static str,
        target: &str,
    ) -> Result<crate::database::pool::RowSet> {
        self.pool
            .fetch(statement)
            .await
            .map_err(|error| Error::from_sqlx(error, operation, target))
    }

    pub(crate) async fn execute(
        &self,
        statement: &Statement,
        operation: &'static str,
        target: &str,
    ) -> Result<ExecuteResult> {
        self.pool
            .execute(statement)
            .await
            .map_err(|error| Error::from_sqlx(error, operation, target))
    }

    /// Statement that puts a fresh connection into the current database context
    fn context_statement(&self) -> Result<Option<Statement>> {
        match self.current_database() {
            Some(database) => self.dialect.use_database(&database),
            None => Ok(None),
        }
    }

    /// Run raw SQL and return its rows, capped at `max_result_rows`
    pub async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            return Err(Error::InvalidRequest("query text is empty".to_string()));
        }

        let context = self.context_statement()?;
        let max_rows = self.settings.max_result_rows;
        let started = Instant::now();
        let outcome = self
            .pool
            .run_raw(context.as_ref(), sql, max_rows)
            .await
            .map_err(|error| Error::from_sqlx(error, "query", self.target.as_str()))?;

        if outcome.truncated {
            return Err(Error::TooManyRows(max_rows));
        }

        Ok(QueryResult {
            columns: outcome.columns,
            rows: outcome.rows,
            affected_rows: outcome.affected_rows,
            execution_time_milliseconds: started.elapsed().as_millis() as u64,
        })
    }

    /// Run raw SQL for its effect
    pub async fn execute_statement(&self, sql: &str) -> Result<ExecuteResult> {
        if sql.trim().is_empty() {
            return Err(Error::InvalidRequest("statement text is empty".to_string()));
        }

        let context = self.context_statement()?;
        let outcome = self
            .pool
            .run_raw(context.as_ref(), sql, u64::MAX)
            .await
            .map_err(|error| Error::from_sqlx(error, "statement", self.target.as_str()))?;

        Ok(ExecuteResult {
            affected_rows: outcome.affected_rows,
            last_insert_id: None,
        })
    }

    /// Validate `database` by switching to it, then keep it as the raw-SQL context
    pub async fn use_database(&self, database: &str) -> Result<()> {
        let switch = self.dialect.use_database(database)?;

        // PostgreSQL accepts any search_path, so existence comes from the catalog
        let known = self.get_databases().await?;
        if !known.iter().any(|info| info.name == database) {
            return Err(Error::NotFound(format!("database {database}")));
        }
        if let Some(statement) = switch {
            self.execute(&statement, "use database", database).await?;
        }

        if let Ok(mut current) = self.current_database.write() {
            *current = Some(database.to_string());
        }
        tracing::info!(database = %database, "switched database context");
        Ok(())
    }
}

/// Owner of the single active connection
///
/// All methods take `&self`; share the manager behind an `Arc`.
pub struct ConnectionManager {
    state: RwLock<ConnectionState>,
    /// Serialises connect/disconnect; queries never take it
    transition: tokio::sync::Mutex<()>,
    settings: ManagerSettings,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_settings(ManagerSettings::default())
    }

    pub fn with_settings(settings: ManagerSettings) -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            transition: tokio::sync::Mutex::new(()),
            settings,
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    fn set_state(&self, next: ConnectionState) -> ConnectionState {
        match self.state.write() {
            Ok(mut state) => std::mem::replace(&mut *state, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }

    /// Name of the current state
    pub fn state_name(&self) -> &'static str {
        self.state.read().map(|state| state.name()).unwrap_or("disconnected")
    }

    /// The current connection, or `NotConnected`
    pub fn active(&self) -> Result<Arc<ActiveConnection>> {
        match &*self.state.read().map_err(|_| Error::NotConnected)? {
            ConnectionState::Connected(connection) => Ok(Arc::clone(connection)),
            _ => Err(Error::NotConnected),
        }
    }

    /// Open a connection for `config`, replacing any existing one
    pub async fn connect(&self, config: ConnectionConfig) -> Result<()> {
        self.settings.validate()?;
        let _transition = self.transition.lock().await;
        tracing::info!(target_database = %config.target(), "connecting");

        let previous = self.set_state(ConnectionState::Connecting);
        let opened = tokio::time::timeout(
            self.settings.acquire_timeout(),
            ActiveConnection::open(&config, self.settings.clone()),
        )
        .await
        .unwrap_or(Err(Error::Timeout));

        match opened {
            Ok(connection) => {
                self.set_state(ConnectionState::Connected(Arc::new(connection)));
                if let ConnectionState::Connected(old) = previous {
                    old.close().await;
                }
                tracing::info!(target_database = %config.target(), dialect = %config.dialect, "connected");
                Ok(())
            }
            Err(error) => {
                self.set_state(ConnectionState::Disconnected);
                if let ConnectionState::Connected(old) = previous {
                    old.close().await;
                }
                tracing::warn!(target_database = %config.target(), error = %error, "connection failed");
                Err(match error {
                    Error::UnsupportedDialect(_) | Error::ConnectionFailed(_) => error,
                    other => Error::ConnectionFailed(other.to_string()),
                })
            }
        }
    }

    /// Close the active connection; calling it while disconnected is a no-op
    pub async fn disconnect(&self) -> Result<()> {
        let _transition = self.transition.lock().await;
        if let ConnectionState::Connected(connection) = self.set_state(ConnectionState::Disconnected) {
            connection.close().await;
            tracing::info!(target_database = %connection.target(), "disconnected");
        }
        Ok(())
    }

    /// Open a throwaway pool for `config`, ping it and close it
    pub async fn test_connection(&self, config: ConnectionConfig) -> Result<bool> {
        self.settings.validate()?;
        let throwaway = tokio::time::timeout(
            self.settings.acquire_timeout(),
            ActiveConnection::open(&config, self.settings.clone()),
        )
        .await
        .unwrap_or(Err(Error::Timeout))?;
        throwaway.close().await;
        tracing::debug!(target_database = %config.target(), "test connection succeeded");
        Ok(true)
    }

    /// Whether a connection is published; does not ping the backend
    pub fn is_connected(&self) -> bool {
        self.state
            .read()
            .map(|state| matches!(*state, ConnectionState::Connected(_)))
            .unwrap_or(false)
    }

    /// Ping the active connection
    pub async fn health(&self) -> Result<()> {
        self.run(|connection| async move { connection.ping().await }).await
    }

    /// Run `operation` against the active connection, bounded by the query timeout
    ///
    /// A timeout abandons the future. For DDL the outcome is then unknown:
    /// the backend may still complete the statement. A connection-level
    /// failure moves the manager to `Disconnected` once the pool stops
    /// answering.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<ActiveConnection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let connection = self.active()?;
        let timeout = connection.settings().query_timeout();
        let result = match tokio::time::timeout(timeout, operation(Arc::clone(&connection))).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_milliseconds = timeout.as_millis() as u64, "operation timed out");
                Err(Error::Timeout)
            }
        };

        if let Err(Error::ConnectionFailed(_) | Error::NotConnected) = &result {
            self.drop_if_unreachable(&connection).await;
        }
        result
    }

    /// Publish `Disconnected` if `failed` is still the active connection and no longer answers
    async fn drop_if_unreachable(&self, failed: &Arc<ActiveConnection>) {
        if !failed.pool().is_closed() && failed.ping().await.is_ok() {
            return;
        }

        let _transition = self.transition.lock().await;
        let is_current = self
            .state
            .read()
            .map(|state| matches!(&*state, ConnectionState::Connected(active) if Arc::ptr_eq(active, failed)))
            .unwrap_or(false);
        if !is_current {
            return;
        }

        self.set_state(ConnectionState::Disconnected);
        failed.close().await;
        tracing::warn!(target_database = %failed.target(), "connection lost, now disconnected");
    }

    /// [`ConnectionManager::run`], abandoned early when `token` is cancelled
    pub async fn run_cancellable<T, F, Fut>(&self, token: &CancellationToken, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<ActiveConnection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("operation cancelled by caller");
                Err(Error::Cancelled)
            }
            result = self.run(operation) => result,
        }
    }

    // ---------------------------------------------------------------------
    // Raw SQL
    // ---------------------------------------------------------------------

    pub async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.run(|connection| async move { connection.execute_query(sql).await })
            .await
    }

    pub async fn execute_query_with_cancel(&self, sql: &str, token: &CancellationToken) -> Result<QueryResult> {
        self.run_cancellable(token, |connection| async move { connection.execute_query(sql).await })
            .await
    }

    pub async fn execute_statement(&self, sql: &str) -> Result<ExecuteResult> {
        self.run(|connection| async move { connection.execute_statement(sql).await })
            .await
    }

    pub async fn use_database(&self, database: &str) -> Result<()> {
        self.run(|connection| async move { connection.use_database(database).await })
            .await
    }

    // ---------------------------------------------------------------------
    // Schema
    // ---------------------------------------------------------------------

    pub async fn get_databases(&self) -> Result<Vec<DatabaseInfo>> {
        self.run(|connection| async move { connection.get_databases().await })
            .await
    }

    pub async fn get_tables(&self, database: &str) -> Result<Vec<TableInfo>> {
        self.run(|connection| async move { connection.get_tables(database).await })
            .await
    }

    pub async fn get_columns(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        self.run(|connection| async move { connection.get_columns(database, table).await })
            .await
    }

    pub async fn get_table_info(&self, database: &str, table: &str) -> Result<TableDetails> {
        self.run(|connection| async move { connection.get_table_info(database, table).await })
            .await
    }

    pub async fn get_database_schema(&self, database: &str) -> Result<DatabaseSchema> {
        self.run(|connection| async move { connection.get_database_schema(database).await })
            .await
    }

    pub async fn get_database_schema_per_table(&self, database: &str) -> Result<DatabaseSchema> {
        self.run(|connection| async move { connection.get_database_schema_per_table(database).await })
            .await
    }

    // ---------------------------------------------------------------------
    // Rows and tables
    // ---------------------------------------------------------------------

    pub async fn get_table_data(&self, request: &TableDataRequest) -> Result<TableDataResponse> {
        self.run(|connection| async move { connection.get_table_data(request).await })
            .await
    }

    pub async fn get_table_data_with_cancel(
        &self,
        request: &TableDataRequest,
        token: &CancellationToken,
    ) -> Result<TableDataResponse> {
        self.run_cancellable(token, |connection| async move { connection.get_table_data(request).await })
            .await
    }

    pub async fn insert_row(&self, database: &str, table: &str, data: &RowData) -> Result<ExecuteResult> {
        self.run(|connection| async move { connection.insert_row(database, table, data).await })
            .await
    }

    pub async fn update_row(
        &self,
        database: &str,
        table: &str,
        key_column: &str,
        key_value: &RowValue,
        data: &RowData,
    ) -> Result<ExecuteResult> {
        self.run(|connection| async move {
            connection
                .update_row(database, table, key_column, key_value, data)
                .await
        })
        .await
    }

    pub async fn delete_row(
        &self,
        database: &str,
        table: &str,
        key_column: &str,
        key_value: &RowValue,
    ) -> Result<ExecuteResult> {
        self.run(|connection| async move { connection.delete_row(database, table, key_column, key_value).await })
            .await
    }

    pub async fn delete_rows(
        &self,
        database: &str,
        table: &str,
        key_column: &str,
        key_values: &[RowValue],
    ) -> Result<ExecuteResult> {
        self.run(|connection| async move { connection.delete_rows(database, table, key_column, key_values).await })
            .await
    }

    pub async fn alter_table(&self, database: &str, table: &str, alteration: &TableAlteration) -> Result<()> {
        self.run(|connection| async move { connection.alter_table(database, table, alteration).await })
            .await
    }

    pub async fn truncate_table(&self, database: &str, table: &str) -> Result<()> {
        self.run(|connection| async move { connection.truncate_table(database, table).await })
            .await
    }

    pub async fn drop_table(&self, database: &str, table: &str) -> Result<()> {
        self.run(|connection| async move { connection.drop_table(database, table).await })
            .await
    }

    /// Start streaming every row of a table
    ///
    /// Only opening the cursor is bounded by the query timeout; reading it is paced by the consumer.
    pub async fn export_table(&self, database: &str, table: &str) -> Result<RowCursor> {
        self.run(|connection| async move { connection.export_table(database, table).await })
            .await
    }
}
