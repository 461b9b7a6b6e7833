//! Streaming row cursor for export encoders
//!
//! Rows are produced by a background task and handed over through a bounded
//! channel, so an encoder that stalls applies backpressure to the database
//! read instead of letting rows pile up in memory.

use futures::Stream;
use tokio::sync::mpsc;

use crate::manager::ActiveConnection;
use crate::value::RowValue;
use crate::{Error, Result};

/// Ordered rows of one table, with NULLs kept as [`RowValue::Null`]
#[derive(Debug)]
pub struct RowCursor {
    columns: Vec<String>,
    receiver: mpsc::Receiver<Result<Vec<RowValue>>>,
}

impl RowCursor {
    pub(crate) fn new(columns: Vec<String>, receiver: mpsc::Receiver<Result<Vec<RowValue>>>) -> Self {
        Self { columns, receiver }
    }

    /// Column names, aligned with every row
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Next row, or `None` once the table is exhausted
    ///
    /// An error ends the cursor; nothing follows it.
    pub async fn next_row(&mut self) -> Option<Result<Vec<RowValue>>> {
        self.receiver.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<RowValue>>> + Send + 'static {
        futures::stream::unfold(self.receiver, |mut receiver| async move {
            receiver.recv().await.map(|row| (row, receiver))
        })
    }
}

impl ActiveConnection {
    /// Open a cursor over every row of `table` in column order
    ///
    /// Dropping the cursor stops the background read at its next row.
    pub async fn export_table(&self, database: &str, table: &str) -> Result<RowCursor> {
        let columns = self.require_columns(database, table).await?;
        let statement = self.dialect().build_select_all(database, table, &columns)?;
        let names: Vec<String> = columns.into_iter().map(|column| column.name).collect();

        let (sender, receiver) = mpsc::channel(self.settings().export_buffer_rows.max(1));
        let pool = self.pool().clone();
        let target = format!("{database}.{table}");
        tokio::spawn(async move {
            tracing::debug!(table = %target, "export started");
            if let Err(error) = pool.stream_into(&statement, &sender).await {
                tracing::warn!(table = %target, error = %error, "export aborted");
                let _ = sender.send(Err(Error::from_sqlx(error, "export", target))).await;
            }
        });

        Ok(RowCursor::new(names, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerSettings;
    use crate::test_support;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_cursor_reads_every_row_in_order() {
        let settings = ManagerSettings {
            export_buffer_rows: 2,
            ..ManagerSettings::default()
        };
        let (manager, _directory) = test_support::sqlite_manager_with(settings).await;
        test_support::seed_users(&manager, 7).await;
        manager
            .execute_statement("UPDATE users SET age = NULL WHERE id = 3")
            .await
            .unwrap();

        let mut cursor = manager.export_table("main", "users").await.unwrap();
        assert_eq!(cursor.columns(), ["id", "name", "email", "age"]);

        let mut rows = Vec::new();
        while let Some(row) = cursor.next_row().await {
            rows.push(row.unwrap());
        }
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[2][3], RowValue::Null);
        assert_eq!(rows[6][2], RowValue::Text("user7@example.com".into()));
    }

    #[tokio::test]
    async fn test_cursor_as_stream() {
        let (manager, _directory) = test_support::seeded_manager(4).await;

        let ids: Vec<RowValue> = manager
            .export_table("main", "users")
            .await
            .unwrap()
            .into_stream()
            .map(|row| row.unwrap().remove(0))
            .collect()
            .await;
        assert_eq!(ids, (1..=4).map(RowValue::Integer).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_missing_table_fails_before_streaming() {
        let (manager, _directory) = test_support::sqlite_manager().await;
        assert!(matches!(
            manager.export_table("main", "ghost").await,
            Err(Error::NotFound(_))
        ));
    }
}
