use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use sqlweave::{ConnectionManager, SqlWeaveLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod database;

use config::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sqlweave=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    if let Some(parent) = config
        .connection
        .database
        .as_deref()
        .filter(|_| config.seed)
        .and_then(|path| std::path::Path::new(path).parent())
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)?;
    }

    let manager = Arc::new(ConnectionManager::with_settings(config.settings.clone()));
    manager.connect(config.connection.clone()).await?;
    if config.seed {
        database::setup(&manager).await?;
    }

    // SqlWeaveLayer returns a stateless Router with its own CORS layer, so merge it after with_state()
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(manager.clone())
        .merge(SqlWeaveLayer::new(config.base_path.clone(), manager).into_router());

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(
        address = %config.bind,
        api = %format!("{}/api", config.base_path),
        target_database = %config.connection.target(),
        "server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> &'static str {
    "sqlweave demo server"
}

async fn health_handler(State(manager): State<Arc<ConnectionManager>>) -> Result<(StatusCode, &'static str), StatusCode> {
    manager
        .health()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok((StatusCode::OK, "Server is healthy"))
}
