//! Connection lifecycle endpoints

use axum::{
    extract::State,
    response::{Json, Response},
};
use serde::Serialize;
use serde_json::Value;

use super::{respond, respond_empty, SharedManager};
use crate::config::{ConnectionConfig, DialectKind};
use crate::database::registry;
use crate::{Error, Result};

/// Response body of `GET /api/status`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub state: &'static str,
    pub connected: bool,

    /// Dialect of the active connection
    pub dialect: Option<DialectKind>,

    /// Dialects compiled into this build
    pub available_dialects: Vec<DialectKind>,

    /// Ping result; absent while disconnected
    pub healthy: Option<bool>,

    /// Ping failure message, if the ping failed
    pub error: Option<String>,
}

/// Decode a connection body
///
/// The dialect name is checked first so an unknown backend reports
/// `unsupportedDialect` rather than a generic body rejection.
fn connection_config(body: Value) -> Result<ConnectionConfig> {
    for field in ["dialect", "type", "driver"] {
        if let Some(name) = body.get(field).and_then(Value::as_str) {
            name.parse::<DialectKind>()?;
        }
    }
    serde_json::from_value(body).map_err(|error| Error::InvalidRequest(error.to_string()))
}

/// Handler for POST /api/connect
///
/// Replaces any current connection. The password in the body is never echoed or logged.
pub async fn connect_handler(State(manager): State<SharedManager>, Json(body): Json<Value>) -> Response {
    match connection_config(body) {
        Ok(config) => respond_empty(manager.connect(config).await),
        Err(error) => respond_empty(Err(error)),
    }
}

/// Handler for POST /api/disconnect
pub async fn disconnect_handler(State(manager): State<SharedManager>) -> Response {
    respond_empty(manager.disconnect().await)
}

/// Handler for POST /api/test-connection
///
/// Opens and pings the given target without touching the current connection.
pub async fn test_connection_handler(State(manager): State<SharedManager>, Json(body): Json<Value>) -> Response {
    let tested = match connection_config(body) {
        Ok(config) => manager.test_connection(config).await,
        Err(error) => Err(error),
    };
    respond(tested.map(|ok| serde_json::json!({ "ok": ok })))
}

/// Handler for GET /api/status
pub async fn status_handler(State(manager): State<SharedManager>) -> Json<StatusResponse> {
    let connected = manager.is_connected();
    let (healthy, error) = if connected {
        match manager.health().await {
            Ok(()) => (Some(true), None),
            Err(error) => (Some(false), Some(error.to_string())),
        }
    } else {
        (None, None)
    };

    // A failed ping may have dropped the connection
    Json(StatusResponse {
        state: manager.state_name(),
        connected: manager.is_connected(),
        dialect: manager.active().ok().map(|connection| connection.kind()),
        available_dialects: registry::available(),
        healthy,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_body_reports_unknown_dialect() {
        assert!(matches!(
            connection_config(json!({ "dialect": "oracle", "host": "db" })),
            Err(Error::UnsupportedDialect(name)) if name == "oracle"
        ));
        assert!(matches!(
            connection_config(json!({ "type": "db2" })),
            Err(Error::UnsupportedDialect(_))
        ));
        assert!(matches!(
            connection_config(json!({ "dialect": "sqlite", "port": "not a port" })),
            Err(Error::InvalidRequest(_))
        ));

        let config = connection_config(json!({ "driver": "PostgreSQL", "database": "app" })).unwrap();
        assert_eq!(config.dialect, DialectKind::Postgres);
    }
}
