//! Row and table mutations
//!
//! Every row operation validates its column names against the live catalog
//! and then issues exactly one parameterized statement.

use crate::database::traits::{SqlDialect, Statement};
use crate::manager::ActiveConnection;
use crate::schema::{ColumnInfo, ExecuteResult, TableAlteration};
use crate::value::{RowData, RowValue};
use crate::{Error, Result};

/// Catalog spelling of `name` if it is a column of `table`
///
/// Names may arrive already quoted; they are compared unquoted, the way
/// table and database names are.
pub(crate) fn resolve_column(
    dialect: &dyn SqlDialect,
    table: &str,
    columns: &[ColumnInfo],
    name: &str,
) -> Result<String> {
    let bare = dialect.catalog_name(name)?;
    if columns.iter().any(|column| column.name == bare) {
        Ok(bare)
    } else {
        Err(Error::InvalidColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
    }
}

/// `data` keyed by catalog column names
fn resolve_row(dialect: &dyn SqlDialect, table: &str, columns: &[ColumnInfo], data: &RowData) -> Result<RowData> {
    let mut resolved = RowData::with_capacity(data.len());
    for (name, value) in data {
        let column = resolve_column(dialect, table, columns, name)?;
        if resolved.insert(column, value.clone()).is_some() {
            return Err(Error::InvalidRequest(format!("column {name} is given more than once")));
        }
    }
    Ok(resolved)
}

impl ActiveConnection {
    pub async fn insert_row(&self, database: &str, table: &str, data: &RowData) -> Result<ExecuteResult> {
        let columns = self.require_columns(database, table).await?;
        let data = resolve_row(self.dialect(), table, &columns, data)?;

        let statement = self.dialect().build_insert(database, table, &columns, &data)?;
        let result = self.execute(&statement, "insert", &format!("{database}.{table}")).await?;
        tracing::debug!(database = %database, table = %table, last_insert_id = ?result.last_insert_id, "inserted row");
        Ok(result)
    }

    pub async fn update_row(
        &self,
        database: &str,
        table: &str,
        key_column: &str,
        key_value: &RowValue,
        data: &RowData,
    ) -> Result<ExecuteResult> {
        let columns = self.require_columns(database, table).await?;
        let key_column = resolve_column(self.dialect(), table, &columns, key_column)?;
        let data = resolve_row(self.dialect(), table, &columns, data)?;

        let statement = self
            .dialect()
            .build_update(database, table, &columns, &key_column, key_value, &data)?;
        self.execute(&statement, "update", &format!("{database}.{table}")).await
    }

    pub async fn delete_row(
        &self,
        database: &str,
        table: &str,
        key_column: &str,
        key_value: &RowValue,
    ) -> Result<ExecuteResult> {
        self.delete_rows(database, table, key_column, std::slice::from_ref(key_value))
            .await
    }

    /// Delete every row whose key is in `key_values` with a single statement
    ///
    /// Keys that match nothing are not an error; compare `affected_rows` with
    /// the number of keys to detect them.
    pub async fn delete_rows(
        &self,
        database: &str,
        table: &str,
        key_column: &str,
        key_values: &[RowValue],
    ) -> Result<ExecuteResult> {
        let columns = self.require_columns(database, table).await?;
        let key_column = resolve_column(self.dialect(), table, &columns, key_column)?;
        if key_values.is_empty() {
            return Ok(ExecuteResult::default());
        }

        let statement = self
            .dialect()
            .build_delete(database, table, &columns, &key_column, key_values)?;
        let result = self.execute(&statement, "delete", &format!("{database}.{table}")).await?;
        tracing::debug!(
            database = %database,
            table = %table,
            requested = key_values.len(),
            deleted = result.affected_rows,
            "deleted rows"
        );
        Ok(result)
    }

    /// Apply `alteration` one statement at a time on a single connection,
    /// stopping at the first failure
    ///
    /// Steps before the failing one stay applied; backends that commit DDL
    /// implicitly cannot roll them back.
    pub async fn alter_table(&self, database: &str, table: &str, alteration: &TableAlteration) -> Result<()> {
        if alteration.is_empty() {
            return Ok(());
        }

        let steps = self.dialect().build_alter(database, table, alteration)?;
        let refresh = self.dialect().schema_refresh(database)?;
        let statements: Vec<&Statement> = steps.iter().map(|step| &step.statement).collect();
        let target = format!("{database}.{table}");

        if let Err((failed, error)) = self.pool().execute_sequence(refresh.as_ref(), &statements).await {
            let error = Error::from_sqlx(error, "alter", &target);
            let index = steps.get(failed).map(|step| step.operation_index).unwrap_or_default();
            let operation = alteration
                .operations
                .get(index)
                .map(ToString::to_string)
                .unwrap_or_default();
            tracing::warn!(
                table = %target,
                index,
                operation = %operation,
                error = %error,
                "alteration aborted"
            );
            return Err(Error::AlterFailed {
                index,
                operation,
                committed: index,
                message: error.to_string(),
            });
        }

        tracing::info!(table = %target, operations = alteration.operations.len(), "altered table");
        Ok(())
    }

    pub async fn truncate_table(&self, database: &str, table: &str) -> Result<()> {
        let statement = self.dialect().build_truncate(database, table)?;
        self.execute(&statement, "truncate", &format!("{database}.{table}")).await?;
        tracing::info!(database = %database, table = %table, "truncated table");
        Ok(())
    }

    pub async fn drop_table(&self, database: &str, table: &str) -> Result<()> {
        let statement = self.dialect().build_drop(database, table)?;
        self.execute(&statement, "drop", &format!("{database}.{table}")).await?;
        tracing::info!(database = %database, table = %table, "dropped table");
        Ok(())
    }
}
