//! Raw SQL execution endpoints

use axum::{
    extract::{Path, State},
    response::{Json, Response},
};
use serde::Deserialize;

use super::{respond, respond_empty, SharedManager};

/// Request body for raw SQL
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlRequest {
    pub sql: String,
}

/// Handler for POST /api/query
///
/// # Security Warning
///
/// This endpoint executes ANY SQL statement, including writes and DDL.
///
/// Request body:
/// ```json
/// { "sql": "SELECT * FROM users LIMIT 10" }
/// ```
///
/// Results beyond the configured row cap are rejected rather than truncated.
pub async fn execute_query_handler(
    State(manager): State<SharedManager>,
    Json(request): Json<SqlRequest>,
) -> Response {
    respond(manager.execute_query(&request.sql).await)
}

/// Handler for POST /api/statement
///
/// Same as `/query` but only reports the affected row count.
pub async fn execute_statement_handler(
    State(manager): State<SharedManager>,
    Json(request): Json<SqlRequest>,
) -> Response {
    respond(manager.execute_statement(&request.sql).await)
}

/// Handler for POST /api/databases/{db}/use
pub async fn use_database_handler(State(manager): State<SharedManager>, Path(database): Path<String>) -> Response {
    respond_empty(manager.use_database(&database).await)
}
