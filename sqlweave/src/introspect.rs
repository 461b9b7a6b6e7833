//! Schema introspection
//!
//! Catalog statements come from the dialect and return rows in a fixed
//! column order, so everything here is dialect-neutral. Nothing is cached;
//! every call reads the catalog again.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::database::pool::RowSet;
use crate::manager::ActiveConnection;
use crate::schema::{
    ColumnInfo, DatabaseInfo, DatabaseSchema, ForeignKey, IndexInfo, SchemaWarning, TableDetails, TableInfo,
};
use crate::value::RowValue;
use crate::{Error, Result};

/// Minimal catalog access needed to assemble a [`DatabaseSchema`]
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// `(table, column)` pairs ordered by table then ordinal position, or
    /// `None` when there is no single-query path
    async fn batched_columns(&self, database: &str) -> Result<Option<Vec<(String, String)>>>;

    async fn table_names(&self, database: &str) -> Result<Vec<String>>;

    async fn column_names(&self, database: &str, table: &str) -> Result<Vec<String>>;
}

/// Build a table to column-names map for `database`
///
/// Uses the batched path unless it is missing or `per_table` is set. The
/// per-table path costs one round trip per table; a table whose columns
/// cannot be read is recorded as a warning and left out.
pub async fn collect_schema(source: &dyn CatalogSource, database: &str, per_table: bool) -> Result<DatabaseSchema> {
    if !per_table {
        if let Some(pairs) = source.batched_columns(database).await? {
            let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (table, column) in pairs {
                tables.entry(table).or_default().push(column);
            }
            return Ok(DatabaseSchema {
                tables,
                warnings: Vec::new(),
            });
        }
    }

    let mut schema = DatabaseSchema::default();
    for table in source.table_names(database).await? {
        match source.column_names(database, &table).await {
            Ok(columns) => {
                schema.tables.insert(table, columns);
            }
            Err(error) => {
                tracing::warn!(database = %database, table = %table, error = %error, "skipping table in schema fetch");
                schema.warnings.push(SchemaWarning {
                    table,
                    message: error.to_string(),
                });
            }
        }
    }
    Ok(schema)
}

fn text_at(row: &[RowValue], index: usize) -> Option<String> {
    match row.get(index)? {
        RowValue::Null => None,
        RowValue::Text(text) => Some(text.clone()),
        RowValue::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        other => Some(other.to_string()),
    }
}

fn required_text_at(row: &[RowValue], index: usize, what: &str) -> Result<String> {
    text_at(row, index).ok_or_else(|| Error::Query {
        operation: "introspect",
        target: what.to_string(),
        message: format!("catalog returned no value in column {index}"),
    })
}

/// Catalog booleans arrive as booleans, integers or YES/NO text depending on the backend
fn flag_at(row: &[RowValue], index: usize) -> bool {
    match row.get(index) {
        Some(RowValue::Boolean(flag)) => *flag,
        Some(RowValue::Integer(value)) => *value != 0,
        Some(RowValue::Text(text)) => matches!(text.trim().to_ascii_lowercase().as_str(), "yes" | "true" | "t" | "1"),
        _ => false,
    }
}

fn position_at(row: &[RowValue], index: usize) -> u32 {
    match row.get(index) {
        Some(RowValue::Integer(value)) => u32::try_from(*value).unwrap_or_default(),
        Some(RowValue::Text(text)) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

fn first_column(rows: RowSet, what: &str) -> Result<Vec<String>> {
    rows.rows
        .iter()
        .map(|row| required_text_at(row, 0, what))
        .collect()
}

impl ActiveConnection {
    pub async fn get_databases(&self) -> Result<Vec<DatabaseInfo>> {
        let statement = self.dialect().list_databases();
        let rows = self.fetch(&statement, "list databases", self.target()).await?;
        Ok(first_column(rows, "databases")?
            .into_iter()
            .map(|name| DatabaseInfo { name })
            .collect())
    }

    pub async fn get_tables(&self, database: &str) -> Result<Vec<TableInfo>> {
        let statement = self.dialect().list_tables(database)?;
        let rows = self.fetch(&statement, "list tables", database).await?;
        rows.rows
            .iter()
            .map(|row| {
                Ok(TableInfo {
                    name: required_text_at(row, 0, database)?,
                    table_type: text_at(row, 1),
                })
            })
            .collect()
    }

    /// Columns in ordinal order; empty when the table does not exist
    pub async fn get_columns(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let target = format!("{database}.{table}");
        let statement = self.dialect().list_columns(database, table)?;
        let rows = self.fetch(&statement, "list columns", &target).await?;

        let mut columns = rows
            .rows
            .iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: required_text_at(row, 0, &target)?,
                    ordinal_position: position_at(row, 1),
                    data_type: text_at(row, 2).unwrap_or_default(),
                    nullable: flag_at(row, 3),
                    default_value: text_at(row, 4),
                    is_primary_key: flag_at(row, 5),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        columns.sort_by_key(|column| column.ordinal_position);
        Ok(columns)
    }

    /// Columns of an existing table, or `NotFound`
    pub(crate) async fn require_columns(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let columns = self.get_columns(database, table).await?;
        if columns.is_empty() {
            return Err(Error::NotFound(format!("table {database}.{table}")));
        }
        Ok(columns)
    }

    pub async fn get_table_info(&self, database: &str, table: &str) -> Result<TableDetails> {
        let target = format!("{database}.{table}");
        let columns = self.require_columns(database, table).await?;

        let statement = self.dialect().list_primary_key(database, table)?;
        let primary_key = first_column(self.fetch(&statement, "list primary key", &target).await?, &target)?;

        let statement = self.dialect().list_indexes(database, table)?;
        let index_rows = self.fetch(&statement, "list indexes", &target).await?;
        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in &index_rows.rows {
            let name = required_text_at(row, 0, &target)?;
            let column = required_text_at(row, 1, &target)?;
            match indexes.last_mut() {
                Some(index) if index.name == name => index.columns.push(column),
                _ => indexes.push(IndexInfo {
                    name,
                    columns: vec![column],
                    unique: flag_at(row, 2),
                }),
            }
        }

        let statement = self.dialect().list_foreign_keys(database, table)?;
        let foreign_keys = self
            .fetch(&statement, "list foreign keys", &target)
            .await?
            .rows
            .iter()
            .map(|row| {
                Ok(ForeignKey {
                    column: required_text_at(row, 0, &target)?,
                    references_table: required_text_at(row, 1, &target)?,
                    references_column: text_at(row, 2).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TableDetails {
            database: database.to_string(),
            name: table.to_string(),
            columns,
            primary_key: (!primary_key.is_empty()).then_some(primary_key),
            indexes,
            foreign_keys,
        })
    }

    pub async fn get_database_schema(&self, database: &str) -> Result<DatabaseSchema> {
        collect_schema(self, database, false).await
    }

    /// Same as [`ActiveConnection::get_database_schema`], always one query per table
    pub async fn get_database_schema_per_table(&self, database: &str) -> Result<DatabaseSchema> {
        collect_schema(self, database, true).await
    }
}

#[async_trait]
impl CatalogSource for ActiveConnection {
    async fn batched_columns(&self, database: &str) -> Result<Option<Vec<(String, String)>>> {
        let Some(statement) = self.dialect().batched_schema(database) else {
            return Ok(None);
        };
        let rows = self.fetch(&statement, "read schema", database).await?;
        rows.rows
            .iter()
            .map(|row| Ok((required_text_at(row, 0, database)?, required_text_at(row, 1, database)?)))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    async fn table_names(&self, database: &str) -> Result<Vec<String>> {
        Ok(self.get_tables(database).await?.into_iter().map(|table| table.name).collect())
    }

    async fn column_names(&self, database: &str, table: &str) -> Result<Vec<String>> {
        Ok(self
            .get_columns(database, table)
            .await?
            .into_iter()
            .map(|column| column.name)
            .collect())
    }
}
