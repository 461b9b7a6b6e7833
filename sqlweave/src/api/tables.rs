//! Catalog and table-level endpoints

use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use serde::Deserialize;

use super::{respond, respond_empty, SharedManager};
use crate::schema::TableAlteration;

/// Query string of the schema endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaQuery {
    /// Skip the batched catalog query and read one table at a time
    #[serde(default)]
    pub per_table: bool,

    /// Fail instead of returning warnings for skipped tables
    #[serde(default)]
    pub strict: bool,
}

/// Handler for GET /api/databases
pub async fn get_databases_handler(State(manager): State<SharedManager>) -> Response {
    respond(manager.get_databases().await)
}

/// Handler for GET /api/databases/{db}/tables
pub async fn get_tables_handler(State(manager): State<SharedManager>, Path(database): Path<String>) -> Response {
    respond(manager.get_tables(&database).await)
}

/// Handler for GET /api/databases/{db}/schema
///
/// Returns `{"tables": {name: [columns]}, "warnings": [...]}`; with
/// `?strict=true` a partial result becomes an error and only the map is returned.
pub async fn get_database_schema_handler(
    State(manager): State<SharedManager>,
    Path(database): Path<String>,
    Query(query): Query<SchemaQuery>,
) -> Response {
    let schema = if query.per_table {
        manager.get_database_schema_per_table(&database).await
    } else {
        manager.get_database_schema(&database).await
    };

    if query.strict {
        respond(schema.and_then(|schema| schema.into_complete()))
    } else {
        respond(schema)
    }
}

/// Handler for GET /api/databases/{db}/tables/{table}
pub async fn get_table_info_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
) -> Response {
    respond(manager.get_table_info(&database, &table).await)
}

/// Handler for GET /api/databases/{db}/tables/{table}/columns
pub async fn get_columns_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
) -> Response {
    respond(manager.get_columns(&database, &table).await)
}

/// Handler for PATCH /api/databases/{db}/tables/{table}
///
/// Request body:
/// ```json
/// { "operations": [{ "action": "addColumn", "column": { "name": "note", "dataType": "TEXT" } }] }
/// ```
pub async fn alter_table_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
    Json(alteration): Json<TableAlteration>,
) -> Response {
    respond_empty(manager.alter_table(&database, &table, &alteration).await)
}

/// Handler for POST /api/databases/{db}/tables/{table}/truncate
pub async fn truncate_table_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
) -> Response {
    respond_empty(manager.truncate_table(&database, &table).await)
}

/// Handler for DELETE /api/databases/{db}/tables/{table}
pub async fn drop_table_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
) -> Response {
    respond_empty(manager.drop_table(&database, &table).await)
}
