//! Server settings from `SQLWEAVE_*` environment variables

use std::net::SocketAddr;

use sqlweave::{ConnectionConfig, DialectKind, ManagerSettings};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("invalid settings: {0}")]
    Settings(#[from] sqlweave::Error),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,

    /// Mount point of the API, e.g. "/sql"
    pub base_path: String,

    pub connection: ConnectionConfig,

    /// Create and fill the demo tables; only honoured for SQLite
    pub seed: bool,

    pub settings: ManagerSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset variables take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = parse(&lookup, "SQLWEAVE_BIND", "127.0.0.1:3000".parse().ok())?;
        let dialect: DialectKind = parse(&lookup, "SQLWEAVE_DIALECT", Some(DialectKind::Sqlite))?;

        let mut connection = ConnectionConfig::new(dialect);
        if let Some(host) = lookup("SQLWEAVE_HOST") {
            connection = connection.with_host(host);
        }
        if lookup("SQLWEAVE_PORT").is_some() {
            connection = connection.with_port(parse(&lookup, "SQLWEAVE_PORT", None)?);
        }
        if let Some(user) = lookup("SQLWEAVE_USER") {
            connection = connection.with_credentials(user, lookup("SQLWEAVE_PASSWORD").unwrap_or_default());
        }
        match lookup("SQLWEAVE_DATABASE") {
            Some(database) => connection = connection.with_database(database),
            None if dialect == DialectKind::Sqlite => connection = connection.with_database("./data/demo.db"),
            None => {}
        }

        let settings = ManagerSettings {
            max_page_size: parse(&lookup, "SQLWEAVE_MAX_PAGE_SIZE", Some(ManagerSettings::default().max_page_size))?,
            query_timeout_milliseconds: parse(
                &lookup,
                "SQLWEAVE_QUERY_TIMEOUT_MS",
                Some(ManagerSettings::default().query_timeout_milliseconds),
            )?,
            ..ManagerSettings::default()
        };

        settings.validate()?;

        Ok(Self {
            bind,
            base_path: lookup("SQLWEAVE_BASE_PATH").unwrap_or_else(|| "/sql".to_string()),
            seed: dialect == DialectKind::Sqlite && parse(&lookup, "SQLWEAVE_SEED", Some(true))?,
            connection,
            settings,
        })
    }
}

/// Parse variable `name`, or fall back to `default` when it is unset
fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => default.ok_or(ConfigError::Invalid {
            name,
            value: String::new(),
        }),
    }
}
