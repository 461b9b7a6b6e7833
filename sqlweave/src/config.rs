//! Connection targets and manager tuning

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

/// The closed set of SQL backends this crate can speak to
///
/// Deserializes through [`FromStr`], so the aliases and the
/// `UnsupportedDialect` error are the same everywhere a name is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DialectKind {
    Mysql,
    Postgres,
    Sqlite,
}

impl DialectKind {
    pub const ALL: [DialectKind; 3] = [DialectKind::Mysql, DialectKind::Postgres, DialectKind::Sqlite];

    pub fn name(self) -> &'static str {
        match self {
            DialectKind::Mysql => "mysql",
            DialectKind::Postgres => "postgres",
            DialectKind::Sqlite => "sqlite",
        }
    }

    /// Port used when the config leaves it unset
    pub fn default_port(self) -> Option<u16> {
        match self {
            DialectKind::Mysql => Some(3306),
            DialectKind::Postgres => Some(5432),
            DialectKind::Sqlite => None,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DialectKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DialectKind::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            other => Err(Error::UnsupportedDialect(other.to_string())),
        }
    }
}

impl TryFrom<String> for DialectKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Credentials and target for one backend
///
/// For SQLite, `database` is the file path (or `:memory:`); host, port and
/// credentials are ignored.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(alias = "type", alias = "driver")]
    pub dialect: DialectKind,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: String,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default)]
    pub database: Option<String>,
}

impl ConnectionConfig {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            host: "localhost".to_string(),
            port: None,
            user: String::new(),
            password: None,
            database: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn port_or_default(&self) -> Option<u16> {
        self.port.or_else(|| self.dialect.default_port())
    }

    /// Human-readable target without credentials, safe to log
    pub fn target(&self) -> String {
        match self.dialect {
            DialectKind::Sqlite => format!(
                "sqlite:{}",
                self.database.as_deref().unwrap_or(":memory:")
            ),
            dialect => format!(
                "{}://{}@{}:{}/{}",
                dialect,
                self.user,
                self.host,
                self.port_or_default().unwrap_or_default(),
                self.database.as_deref().unwrap_or("")
            ),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

/// Pool sizing and per-operation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerSettings {
    pub max_connections: u32,

    /// Wait for a free pooled connection; also bounds opening a connection
    pub acquire_timeout_milliseconds: u64,

    /// Upper bound on any single operation
    pub query_timeout_milliseconds: u64,

    /// Page sizes above this are clamped
    pub max_page_size: u64,

    /// Raw queries returning more rows than this fail with `TooManyRows`
    pub max_result_rows: u64,

    /// Rows buffered between the export reader task and its consumer
    pub export_buffer_rows: usize,
}

impl ManagerSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_milliseconds)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_milliseconds)
    }

    /// Reject values that would make every operation fail or hang
    pub fn validate(&self) -> Result<(), Error> {
        let zero = [
            ("maxConnections", self.max_connections == 0),
            ("acquireTimeoutMilliseconds", self.acquire_timeout_milliseconds == 0),
            ("queryTimeoutMilliseconds", self.query_timeout_milliseconds == 0),
            ("maxPageSize", self.max_page_size == 0),
            ("exportBufferRows", self.export_buffer_rows == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(Error::InvalidRequest(format!("{name} must be greater than zero"))),
            None => Ok(()),
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout_milliseconds: 3_000,
            query_timeout_milliseconds: 30_000,
            max_page_size: 500,
            max_result_rows: 10_000,
            export_buffer_rows: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_kind_parsing_accepts_aliases() {
        assert_eq!("MariaDB".parse::<DialectKind>().unwrap(), DialectKind::Mysql);
        assert_eq!("postgresql".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert_eq!(" sqlite3 ".parse::<DialectKind>().unwrap(), DialectKind::Sqlite);
        assert!(matches!(
            "oracle".parse::<DialectKind>(),
            Err(Error::UnsupportedDialect(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_password_is_redacted_from_debug_and_serialization() {
        let config = ConnectionConfig::new(DialectKind::Postgres)
            .with_credentials("admin", "hunter2")
            .with_database("app");

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!config.target().contains("hunter2"));
    }

    #[test]
    fn test_config_deserializes_from_camel_case() {
        let config: ConnectionConfig = serde_json::from_value(serde_json::json!({
            "type": "mysql",
            "host": "db.internal",
            "user": "root",
            "password": "secret",
            "database": "shop"
        }))
        .unwrap();

        assert_eq!(config.dialect, DialectKind::Mysql);
        assert_eq!(config.port_or_default(), Some(3306));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.target(), "mysql://root@db.internal:3306/shop");
    }

    #[test]
    fn test_settings_fill_missing_fields_with_defaults() {
        let settings: ManagerSettings =
            serde_json::from_value(serde_json::json!({ "maxPageSize": 50 })).unwrap();
        assert_eq!(settings.max_page_size, 50);
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.query_timeout(), Duration::from_secs(30));
        settings.validate().unwrap();
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let settings = ManagerSettings {
            query_timeout_milliseconds: 0,
            ..ManagerSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(Error::InvalidRequest(message)) if message.contains("queryTimeoutMilliseconds")
        ));

        let settings: ManagerSettings =
            serde_json::from_value(serde_json::json!({ "exportBufferRows": 0 })).unwrap();
        assert!(settings.validate().is_err());

        let fast: ManagerSettings =
            serde_json::from_value(serde_json::json!({ "queryTimeoutMilliseconds": 250 })).unwrap();
        assert_eq!(fast.query_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_dialect_in_json_is_unsupported() {
        let error = serde_json::from_value::<ConnectionConfig>(serde_json::json!({
            "dialect": "oracle",
            "database": "x"
        }))
        .unwrap_err();
        assert!(error.to_string().contains("oracle"));

        let config: ConnectionConfig =
            serde_json::from_value(serde_json::json!({ "dialect": "MariaDB", "user": "root" })).unwrap();
        assert_eq!(config.dialect, DialectKind::Mysql);
        assert_eq!(serde_json::to_value(DialectKind::Postgres).unwrap(), serde_json::json!("postgres"));
    }
}
