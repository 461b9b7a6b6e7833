//! REST API endpoints
//!
//! Every handler takes the shared [`ConnectionManager`] from router state and
//! answers with JSON. Failures use one body shape,
//! `{"error": message, "kind": variant}`, with the status picked by variant.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;

use crate::manager::ConnectionManager;
use crate::Error;

pub mod connection;
pub mod query;
pub mod rows;
pub mod tables;

// Re-export handlers for convenience
pub use connection::{connect_handler, disconnect_handler, status_handler, test_connection_handler};
pub use query::{execute_query_handler, execute_statement_handler, use_database_handler};
pub use rows::{delete_rows_handler, get_table_data_handler, insert_row_handler, update_row_handler};
pub use tables::{
    alter_table_handler, drop_table_handler, get_columns_handler, get_database_schema_handler,
    get_databases_handler, get_table_info_handler, get_tables_handler, truncate_table_handler,
};

/// Router state shared by all handlers
pub type SharedManager = Arc<ConnectionManager>;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotConnected => StatusCode::CONFLICT,
            Error::ConnectionFailed(_) => StatusCode::BAD_GATEWAY,
            Error::UnsupportedDialect(_)
            | Error::InvalidIdentifier(_)
            | Error::InvalidColumn { .. }
            | Error::InvalidRequest(_)
            | Error::Query { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ConstraintViolation { .. } => StatusCode::CONFLICT,
            Error::AlterFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::TooManyRows(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Error::Timeout => StatusCode::REQUEST_TIMEOUT,
            Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Error::SchemaFetchPartial { .. } | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "request rejected");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.to_string(),
                "kind": self.kind(),
            })),
        )
            .into_response()
    }
}

/// `200` with the value as JSON, or the error response
pub(crate) fn respond<T: Serialize>(result: crate::Result<T>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// `204` on success
pub(crate) fn respond_empty(result: crate::Result<()>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_by_variant() {
        assert_eq!(Error::NotConnected.status_code(), StatusCode::CONFLICT);
        assert_eq!(Error::NotFound("users".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::InvalidColumn {
                table: "users".into(),
                column: "x".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::Unsupported("modify".into()).status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(Error::Timeout.status_code(), StatusCode::REQUEST_TIMEOUT);
    }
}
