//! SqlWeaveLayer - Axum integration layer
//!
//! Mounts the JSON API for one [`ConnectionManager`] under a base path.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::{
    alter_table_handler, connect_handler, delete_rows_handler, disconnect_handler, drop_table_handler,
    execute_query_handler, execute_statement_handler, get_columns_handler, get_database_schema_handler,
    get_databases_handler, get_table_data_handler, get_table_info_handler, get_tables_handler, insert_row_handler,
    status_handler, test_connection_handler, truncate_table_handler, update_row_handler, use_database_handler,
};
use crate::manager::ConnectionManager;

/// Main layer for exposing a [`ConnectionManager`] over HTTP
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use sqlweave::{ConnectionManager, SqlWeaveLayer};
/// use std::sync::Arc;
///
/// let manager = Arc::new(ConnectionManager::new());
/// let app: Router = Router::new().merge(SqlWeaveLayer::new("/sql", manager).into_router());
/// ```
pub struct SqlWeaveLayer {
    base_path: String,
    manager: Arc<ConnectionManager>,
}

impl SqlWeaveLayer {
    /// Create a layer mounted at `base_path` (e.g. "/sql"; empty for the root)
    pub fn new(base_path: impl Into<String>, manager: Arc<ConnectionManager>) -> Self {
        Self {
            base_path: base_path.into().trim_end_matches('/').to_string(),
            manager,
        }
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// All endpoints live under `{base_path}/api`, with permissive CORS.
    pub fn into_router(self) -> Router {
        // Axum 0.8 uses {param} syntax instead of :param
        let api_router = Router::new()
            .route("/connect", post(connect_handler))
            .route("/disconnect", post(disconnect_handler))
            .route("/test-connection", post(test_connection_handler))
            .route("/status", get(status_handler))
            .route("/query", post(execute_query_handler))
            .route("/statement", post(execute_statement_handler))
            .route("/databases", get(get_databases_handler))
            .route("/databases/{db}/use", post(use_database_handler))
            .route("/databases/{db}/schema", get(get_database_schema_handler))
            .route("/databases/{db}/tables", get(get_tables_handler))
            .route(
                "/databases/{db}/tables/{table}",
                get(get_table_info_handler)
                    .patch(alter_table_handler)
                    .delete(drop_table_handler),
            )
            .route("/databases/{db}/tables/{table}/columns", get(get_columns_handler))
            .route("/databases/{db}/tables/{table}/data", post(get_table_data_handler))
            .route(
                "/databases/{db}/tables/{table}/rows",
                post(insert_row_handler)
                    .put(update_row_handler)
                    .delete(delete_rows_handler),
            )
            .route("/databases/{db}/tables/{table}/truncate", post(truncate_table_handler))
            .with_state(self.manager);

        Router::new()
            .nest(&format!("{}/api", self.base_path), api_router)
            .layer(CorsLayer::permissive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_disconnected_requests_report_kind() {
        let router = SqlWeaveLayer::new("/sql", Arc::new(ConnectionManager::new())).into_router();

        let (status, body) = call(&router, Method::GET, "/sql/api/databases", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "notConnected");

        let (status, body) = call(&router, Method::GET, "/sql/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], false);
        assert_eq!(body["state"], "disconnected");
    }

    #[tokio::test]
    async fn test_connect_over_http() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("http.db");
        let router = SqlWeaveLayer::new("", Arc::new(ConnectionManager::new())).into_router();

        let (status, _) = call(
            &router,
            Method::POST,
            "/api/connect",
            Some(json!({ "dialect": "sqlite", "database": path.to_string_lossy() })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(&router, Method::GET, "/api/status", None).await;
        assert_eq!(body["connected"], true);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["dialect"], "sqlite");
        assert!(body["availableDialects"].as_array().unwrap().contains(&json!("sqlite")));

        let (status, _) = call(&router, Method::POST, "/api/disconnect", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_merged_router_sends_one_cors_header() {
        let app = Router::new()
            .route("/health", axum::routing::get(|| async { "ok" }))
            .merge(SqlWeaveLayer::new("/sql", Arc::new(ConnectionManager::new())).into_router());

        let request = Request::builder()
            .uri("/sql/api/status")
            .header("origin", "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get_all("access-control-allow-origin").iter().count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_dialect_is_reported_by_kind() {
        let router = SqlWeaveLayer::new("", Arc::new(ConnectionManager::new())).into_router();

        let (status, body) = call(
            &router,
            Method::POST,
            "/api/connect",
            Some(json!({ "dialect": "oracle", "host": "db.internal" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "unsupportedDialect");

        let (status, body) = call(
            &router,
            Method::POST,
            "/api/test-connection",
            Some(json!({ "type": "mssql" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "unsupportedDialect");
    }

    #[tokio::test]
    async fn test_row_lifecycle_over_http() {
        let (manager, _directory) = test_support::seeded_manager(3).await;
        let router = SqlWeaveLayer::new("/sql/", Arc::new(manager)).into_router();
        let rows = "/sql/api/databases/main/tables/users/rows";

        let (status, body) = call(
            &router,
            Method::POST,
            rows,
            Some(json!({ "data": { "name": "Ada", "email": "ada@example.com", "age": 36 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["affectedRows"], 1);

        let (status, body) = call(
            &router,
            Method::PUT,
            rows,
            Some(json!({ "keyColumn": "id", "keyValue": 4, "data": { "age": 37 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["affectedRows"], 1);

        let (status, body) = call(
            &router,
            Method::POST,
            "/sql/api/databases/main/tables/users/data",
            Some(json!({ "filters": [{ "column": "email", "value": "ada@example.com" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["rows"][0][3], json!({ "type": "integer", "value": 37 }));

        let (status, body) = call(
            &router,
            Method::DELETE,
            rows,
            Some(json!({ "keyColumn": "id", "keyValues": [1, 2, 99] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["affectedRows"], 2);

        let (status, body) = call(
            &router,
            Method::POST,
            rows,
            Some(json!({ "data": { "nickname": "x" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalidColumn");
    }

    #[tokio::test]
    async fn test_table_endpoints() {
        let (manager, _directory) = test_support::seeded_manager(2).await;
        let router = SqlWeaveLayer::new("", Arc::new(manager)).into_router();

        let (_, body) = call(&router, Method::GET, "/api/databases/main/tables", None).await;
        assert_eq!(body, json!([{ "name": "users", "tableType": "table" }]));

        let (_, body) = call(&router, Method::GET, "/api/databases/main/schema?perTable=true", None).await;
        assert_eq!(body["tables"]["users"], json!(["id", "name", "email", "age"]));

        let (status, _) = call(
            &router,
            Method::PATCH,
            "/api/databases/main/tables/users",
            Some(json!({ "operations": [{ "action": "addColumn", "column": { "name": "note", "dataType": "TEXT" } }] })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(&router, Method::GET, "/api/databases/main/tables/users", None).await;
        assert_eq!(body["primaryKey"], json!(["id"]));
        assert_eq!(body["columns"][4]["name"], "note");

        let (status, _) = call(&router, Method::POST, "/api/databases/main/tables/users/truncate", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&router, Method::DELETE, "/api/databases/main/tables/users", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&router, Method::GET, "/api/databases/main/tables/users", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "notFound");
    }

    #[tokio::test]
    async fn test_raw_query_endpoint() {
        let (manager, _directory) = test_support::seeded_manager(2).await;
        let router = SqlWeaveLayer::new("", Arc::new(manager)).into_router();

        let (status, body) = call(
            &router,
            Method::POST,
            "/api/query",
            Some(json!({ "sql": "SELECT COUNT(*) AS n FROM users" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["columns"], json!(["n"]));
        assert_eq!(body["rows"][0][0]["value"], 2);

        let (status, body) = call(&router, Method::POST, "/api/query", Some(json!({ "sql": "SELEC 1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "queryError");
    }
}
