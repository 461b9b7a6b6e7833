//! Row endpoints: paging, insert, update and delete

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

use super::{respond, SharedManager};
use crate::schema::{ColumnFilter, SortSpec, TableDataRequest};
use crate::value::{self, RowData, RowValue};
use crate::Error;

/// Body of the data endpoint; database and table come from the path
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub offset: Option<u64>,

    #[serde(default)]
    pub limit: Option<u64>,

    /// 1-based page number; overrides `offset` when present
    #[serde(default)]
    pub page: Option<u64>,

    #[serde(default)]
    pub filters: Vec<ColumnFilter>,

    #[serde(default)]
    pub sort: Option<SortSpec>,
}

impl PageRequest {
    fn into_request(self, database: String, table: String) -> TableDataRequest {
        let mut request = TableDataRequest::new(database, table);
        if let Some(limit) = self.limit {
            request.limit = limit;
        }
        request.offset = match self.page {
            Some(page) => page.saturating_sub(1).saturating_mul(request.limit),
            None => self.offset.unwrap_or(0),
        };
        request.filters = self.filters;
        request.sort = self.sort;
        request
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRequest {
    #[serde(deserialize_with = "value::plain::deserialize_row")]
    pub data: RowData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub key_column: String,

    #[serde(deserialize_with = "value::plain::deserialize")]
    pub key_value: RowValue,

    #[serde(deserialize_with = "value::plain::deserialize_row")]
    pub data: RowData,
}

/// Delete by one key (`keyValue`) or several (`keyValues`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub key_column: String,

    #[serde(default, deserialize_with = "deserialize_optional_value")]
    pub key_value: Option<RowValue>,

    #[serde(default, deserialize_with = "value::plain::deserialize_list")]
    pub key_values: Vec<RowValue>,
}

fn deserialize_optional_value<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<RowValue>, D::Error> {
    value::plain::deserialize(deserializer).map(Some)
}

/// Handler for POST /api/databases/{db}/tables/{table}/data
///
/// Request body (all fields optional):
/// ```json
/// {
///   "offset": 0,
///   "limit": 50,
///   "filters": [{ "column": "age", "operator": "gte", "value": 30 }],
///   "sort": { "column": "id", "order": "desc" }
/// }
/// ```
pub async fn get_table_data_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
    Json(body): Json<PageRequest>,
) -> Response {
    let request = body.into_request(database, table);
    respond(manager.get_table_data(&request).await)
}

/// Handler for POST /api/databases/{db}/tables/{table}/rows
pub async fn insert_row_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
    Json(body): Json<InsertRequest>,
) -> Response {
    respond(manager.insert_row(&database, &table, &body.data).await)
}

/// Handler for PUT /api/databases/{db}/tables/{table}/rows
pub async fn update_row_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
    Json(body): Json<UpdateRequest>,
) -> Response {
    respond(
        manager
            .update_row(&database, &table, &body.key_column, &body.key_value, &body.data)
            .await,
    )
}

/// Handler for DELETE /api/databases/{db}/tables/{table}/rows
pub async fn delete_rows_handler(
    State(manager): State<SharedManager>,
    Path((database, table)): Path<(String, String)>,
    Json(body): Json<DeleteRequest>,
) -> Response {
    match (body.key_value, body.key_values.is_empty()) {
        (Some(key_value), true) => respond(manager.delete_row(&database, &table, &body.key_column, &key_value).await),
        (None, _) => respond(
            manager
                .delete_rows(&database, &table, &body.key_column, &body.key_values)
                .await,
        ),
        (Some(_), false) => {
            Error::InvalidRequest("send either keyValue or keyValues, not both".to_string()).into_response()
        }
    }
}
