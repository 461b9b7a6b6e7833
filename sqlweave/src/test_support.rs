//! Shared fixtures for the SQLite-backed tests

use chrono::NaiveDateTime;
use tempfile::TempDir;

use crate::config::{ConnectionConfig, DialectKind, ManagerSettings};
use crate::manager::ConnectionManager;

/// Manager connected to a fresh database file; keep the directory alive for the test's duration
pub(crate) async fn sqlite_manager() -> (ConnectionManager, TempDir) {
    sqlite_manager_with(ManagerSettings::default()).await
}

pub(crate) async fn sqlite_manager_with(settings: ManagerSettings) -> (ConnectionManager, TempDir) {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("test.db");

    let manager = ConnectionManager::with_settings(settings);
    manager
        .connect(ConnectionConfig::new(DialectKind::Sqlite).with_database(path.to_string_lossy()))
        .await
        .unwrap();
    (manager, directory)
}

/// Manager with a `users` table holding `count` rows
pub(crate) async fn seeded_manager(count: usize) -> (ConnectionManager, TempDir) {
    let (manager, directory) = sqlite_manager().await;
    seed_users(&manager, count).await;
    (manager, directory)
}

/// Create `users` and insert rows `1..=count`: `userN@example.com`, age `20 + N`
pub(crate) async fn seed_users(manager: &ConnectionManager, count: usize) {
    manager
        .execute_statement(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE,
                age INTEGER
            )
            "#,
        )
        .await
        .unwrap();

    if count == 0 {
        return;
    }
    let values: Vec<String> = (1..=count)
        .map(|n| format!("('User {n}', 'user{n}@example.com', {})", 20 + n))
        .collect();
    manager
        .execute_statement(&format!(
            "INSERT INTO users (name, email, age) VALUES {}",
            values.join(", ")
        ))
        .await
        .unwrap();
}

pub(crate) fn timestamp(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}
