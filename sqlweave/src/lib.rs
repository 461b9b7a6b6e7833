//! # sqlweave
//!
//! Dialect-neutral schema browsing, paging and row editing for MySQL,
//! PostgreSQL and SQLite.
//!
//! ## Features
//!
//! - One [`ConnectionManager`] per backend connection, with connect, disconnect, test and health
//! - Catalog introspection (databases, tables, columns, keys, indexes)
//! - Paginated, filtered and sorted table reads with an advisory total count
//! - Insert, update and delete by primary key; batch delete with a single `IN (...)`
//! - Ordered table alterations, truncate and drop
//! - Streaming row cursor for export encoders
//! - An axum router exposing all of the above as JSON endpoints
//!
//! ## Security Warning
//!
//! The HTTP layer has no authentication and allows raw SQL execution. Mount it
//! only on trusted interfaces.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqlweave::{ConnectionConfig, ConnectionManager, DialectKind, TableDataRequest};
//!
//! # async fn example() -> sqlweave::Result<()> {
//! let manager = Arc::new(ConnectionManager::new());
//! manager
//!     .connect(ConnectionConfig::new(DialectKind::Sqlite).with_database("./data/app.db"))
//!     .await?;
//!
//! let page = manager
//!     .get_table_data(&TableDataRequest::new("main", "users").with_limit(10))
//!     .await?;
//! println!("{} of {:?} rows", page.rows.len(), page.total);
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(feature = "sqlite", feature = "postgres", feature = "mysql")))]
compile_error!("enable at least one of the `sqlite`, `postgres` or `mysql` features");

// Public modules
pub mod api;
pub mod config;
pub mod database;
pub mod engine;
pub mod export;
pub mod introspect;
pub mod layer;
pub mod manager;
pub mod pagination;
pub mod schema;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

// Public exports
pub use config::{ConnectionConfig, DialectKind, ManagerSettings};
pub use export::RowCursor;
pub use layer::SqlWeaveLayer;
pub use manager::{ActiveConnection, ConnectionManager, ConnectionState};
pub use schema::{
    AlterOperation, ColumnDefinition, ColumnFilter, ColumnInfo, DatabaseInfo, DatabaseSchema,
    ExecuteResult, FilterOperator, ForeignKey, IndexInfo, QueryResult, SchemaWarning, SortOrder, SortSpec,
    TableAlteration, TableDataRequest, TableDataResponse, TableDetails, TableInfo,
};
pub use value::{RowData, RowValue};

// Re-export the dialect contract
pub use database::traits::{SqlDialect, Statement};

// Error type
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not connected to a database")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid column '{column}' for table '{table}'")]
    InvalidColumn { table: String, column: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation during {operation} on {target}: {message}")]
    ConstraintViolation {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("{operation} on {target} failed: {message}")]
    Query {
        operation: &'static str,
        target: String,
        message: String,
    },

    #[error("Alteration step {index} ({operation}) failed after {committed} committed step(s): {message}")]
    AlterFailed {
        index: usize,
        operation: String,
        committed: usize,
        message: String,
    },

    #[error("Schema fetch skipped {} table(s): {}", skipped.len(), skipped.join(", "))]
    SchemaFetchPartial { skipped: Vec<String> },

    #[error("Result set too large (max {0} rows)")]
    TooManyRows(u64),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classify a sqlx error raised while running `operation` against `target`
    pub(crate) fn from_sqlx(error: sqlx::Error, operation: &'static str, target: impl Into<String>) -> Self {
        match error {
            sqlx::Error::PoolClosed => Error::NotConnected,
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => Error::ConnectionFailed(error.to_string()),
            sqlx::Error::Database(ref database_error) if is_constraint(database_error.kind()) => {
                Error::ConstraintViolation {
                    operation,
                    target: target.into(),
                    message: database_error.message().to_string(),
                }
            }
            other => Error::Query {
                operation,
                target: target.into(),
                message: other.to_string(),
            },
        }
    }

    /// Short machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotConnected => "notConnected",
            Error::ConnectionFailed(_) => "connectionFailed",
            Error::UnsupportedDialect(_) => "unsupportedDialect",
            Error::InvalidIdentifier(_) => "invalidIdentifier",
            Error::InvalidColumn { .. } => "invalidColumn",
            Error::InvalidRequest(_) => "invalidRequest",
            Error::NotFound(_) => "notFound",
            Error::ConstraintViolation { .. } => "constraintViolation",
            Error::Query { .. } => "queryError",
            Error::AlterFailed { .. } => "alterFailed",
            Error::SchemaFetchPartial { .. } => "schemaFetchPartial",
            Error::TooManyRows(_) => "tooManyRows",
            Error::Unsupported(_) => "unsupported",
            Error::Timeout => "timeout",
            Error::Cancelled => "cancelled",
            Error::Serialization(_) => "serialization",
        }
    }
}

fn is_constraint(kind: sqlx::error::ErrorKind) -> bool {
    matches!(
        kind,
        sqlx::error::ErrorKind::UniqueViolation
            | sqlx::error::ErrorKind::ForeignKeyViolation
            | sqlx::error::ErrorKind::NotNullViolation
            | sqlx::error::ErrorKind::CheckViolation
    )
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_closed_maps_to_not_connected() {
        let error = Error::from_sqlx(sqlx::Error::PoolClosed, "select", "main.users");
        assert!(matches!(error, Error::NotConnected));
    }

    #[test]
    fn test_row_not_found_maps_to_query_error_with_context() {
        let error = Error::from_sqlx(sqlx::Error::RowNotFound, "update", "main.users");
        match error {
            Error::Query { operation, target, .. } => {
                assert_eq!(operation, "update");
                assert_eq!(target, "main.users");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_partial_schema_message_lists_tables() {
        let error = Error::SchemaFetchPartial {
            skipped: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(error.to_string(), "Schema fetch skipped 2 table(s): a, b");
        assert_eq!(error.kind(), "schemaFetchPartial");
    }
}
