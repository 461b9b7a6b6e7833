//! SQL dialect trait
//!
//! A dialect turns dialect-neutral intents into SQL text plus bound
//! parameters. It never touches a connection.

use crate::config::DialectKind;
use crate::database::identifier::{self, validate_fragment};
use crate::schema::{AlterOperation, ColumnDefinition, ColumnFilter, ColumnInfo, FilterOperator, SortSpec, TableAlteration};
use crate::value::{RowData, RowValue};
use crate::{Error, Result};

/// SQL text with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<RowValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<RowValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn bind(mut self, value: impl Into<RowValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// One DDL statement produced for the alteration step at `operation_index`
#[derive(Debug, Clone, PartialEq)]
pub struct AlterStep {
    pub operation_index: usize,
    pub statement: Statement,
}

/// Collects parameters and hands out dialect placeholders for them
pub struct Binder<'a, D: SqlDialect + ?Sized> {
    dialect: &'a D,
    params: Vec<RowValue>,
}

impl<'a, D: SqlDialect + ?Sized> Binder<'a, D> {
    pub fn new(dialect: &'a D) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    /// Register `value` and return the placeholder text, cast to `declared_type` where the dialect needs it
    pub fn push(&mut self, value: RowValue, declared_type: Option<&str>) -> String {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.dialect.cast_parameter(placeholder, declared_type)
    }

    pub fn finish(self, sql: String) -> Statement {
        Statement::with_params(sql, self.params)
    }
}

fn declared_type<'c>(columns: &'c [ColumnInfo], name: &str) -> Option<&'c str> {
    columns
        .iter()
        .find(|column| column.name == name)
        .map(|column| column.data_type.as_str())
}

/// ` WHERE ...` (or empty) for `filters`, with every value bound
pub fn where_clause<D: SqlDialect + ?Sized>(
    dialect: &D,
    binder: &mut Binder<'_, D>,
    columns: &[ColumnInfo],
    filters: &[ColumnFilter],
) -> Result<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut conditions = Vec::with_capacity(filters.len());
    for filter in filters {
        let quoted_column = dialect.quote_identifier(&filter.column)?;
        let condition = match (filter.operator, &filter.value) {
            (operator, _) if operator.is_unary() => format!("{} {}", quoted_column, operator.sql()),
            (FilterOperator::Eq, RowValue::Null) => format!("{quoted_column} IS NULL"),
            (FilterOperator::NotEq, RowValue::Null) => format!("{quoted_column} IS NOT NULL"),
            (FilterOperator::Like, value) => {
                let pattern = match value {
                    RowValue::Text(text) => RowValue::Text(text.clone()),
                    other => RowValue::Text(other.to_string()),
                };
                format!(
                    "{} LIKE {}",
                    dialect.text_expression(&quoted_column),
                    binder.push(pattern, None)
                )
            }
            (operator, value) => format!(
                "{} {} {}",
                quoted_column,
                operator.sql(),
                binder.push(value.clone(), declared_type(columns, &filter.column))
            ),
        };
        conditions.push(condition);
    }

    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}

/// Per-backend SQL generation
///
/// Catalog statements return rows in a fixed column order, documented on each
/// method, so the introspector can read them without knowing the dialect.
pub trait SqlDialect: Send + Sync + 'static {
    fn kind(&self) -> DialectKind;

    /// Character used to delimit identifiers
    fn quote_char(&self) -> char;

    /// Placeholder for the 1-based parameter `index`
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Wrap a placeholder so the bound value coerces to the target column type
    fn cast_parameter(&self, placeholder: String, _declared_type: Option<&str>) -> String {
        placeholder
    }

    /// Expression rendering a quoted column as text, for LIKE comparisons
    fn text_expression(&self, quoted_column: &str) -> String {
        quoted_column.to_string()
    }

    fn quote_identifier(&self, name: &str) -> Result<String> {
        identifier::quote_with(name, self.quote_char())
    }

    /// Validated raw name for binding into catalog queries
    fn catalog_name(&self, name: &str) -> Result<String> {
        self.quote_identifier(name)?;
        Ok(identifier::unquote(name, self.quote_char()))
    }

    /// `database.table`, both parts quoted
    fn qualify(&self, database: &str, table: &str) -> Result<String> {
        Ok(format!(
            "{}.{}",
            self.quote_identifier(database)?,
            self.quote_identifier(table)?
        ))
    }

    // ---------------------------------------------------------------------
    // Catalog
    // ---------------------------------------------------------------------

    /// Rows: `(name)`
    fn list_databases(&self) -> Statement;

    /// Rows: `(name, table_type)`
    fn list_tables(&self, database: &str) -> Result<Statement>;

    /// Rows: `(name, ordinal_position, data_type, nullable, default_value, is_primary_key)`
    fn list_columns(&self, database: &str, table: &str) -> Result<Statement>;

    /// Rows: `(column_name)` in key order
    fn list_primary_key(&self, database: &str, table: &str) -> Result<Statement>;

    /// Rows: `(index_name, column_name, is_unique)`, grouped by index in column order; excludes the primary key
    fn list_indexes(&self, database: &str, table: &str) -> Result<Statement>;

    /// Rows: `(column_name, references_table, references_column)`
    fn list_foreign_keys(&self, database: &str, table: &str) -> Result<Statement>;

    /// One query for every table's columns. Rows: `(table_name, column_name)`
    /// ordered by table then ordinal position. `None` when the dialect has
    /// no such catalog path.
    fn batched_schema(&self, _database: &str) -> Option<Statement> {
        None
    }

    /// Catalog read that makes a pooled session notice schema changes made
    /// by other sessions; runs before DDL on the same connection
    fn schema_refresh(&self, _database: &str) -> Result<Option<Statement>> {
        Ok(None)
    }

    /// Statement switching the default database/schema of a session; `None`
    /// when the dialect addresses everything by qualified name only
    fn use_database(&self, database: &str) -> Result<Option<Statement>>;

    // ---------------------------------------------------------------------
    // Data
    // ---------------------------------------------------------------------

    /// ` ORDER BY ...` (or empty)
    fn order_clause(&self, sort: Option<&SortSpec>) -> Result<String> {
        match sort {
            Some(sort) => Ok(format!(
                " ORDER BY {} {}",
                self.quote_identifier(&sort.column)?,
                sort.order.keyword()
            )),
            None => Ok(String::new()),
        }
    }

    /// Bounded SELECT over one table
    #[allow(clippy::too_many_arguments)]
    fn build_select(
        &self,
        database: &str,
        table: &str,
        columns: &[ColumnInfo],
        filters: &[ColumnFilter],
        sort: Option<&SortSpec>,
        offset: u64,
        limit: u64,
    ) -> Result<Statement> {
        let mut binder = Binder::new(self);
        let filter_sql = where_clause(self, &mut binder, columns, filters)?;
        let sql = format!(
            "SELECT * FROM {}{}{} LIMIT {} OFFSET {}",
            self.qualify(database, table)?,
            filter_sql,
            self.order_clause(sort)?,
            limit,
            offset
        );
        Ok(binder.finish(sql))
    }

    /// COUNT(*) with the same filters as [`SqlDialect::build_select`]
    fn build_count(&self, database: &str, table: &str, columns: &[ColumnInfo], filters: &[ColumnFilter]) -> Result<Statement> {
        let mut binder = Binder::new(self);
        let filter_sql = where_clause(self, &mut binder, columns, filters)?;
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {}{}",
            self.qualify(database, table)?,
            filter_sql
        );
        Ok(binder.finish(sql))
    }

    /// Unbounded SELECT of the named columns, for export
    fn build_select_all(&self, database: &str, table: &str, columns: &[ColumnInfo]) -> Result<Statement> {
        let column_list = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|column| self.quote_identifier(&column.name))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };
        Ok(Statement::new(format!(
            "SELECT {} FROM {}",
            column_list,
            self.qualify(database, table)?
        )))
    }

    fn build_insert(&self, database: &str, table: &str, columns: &[ColumnInfo], data: &RowData) -> Result<Statement> {
        let target = self.qualify(database, table)?;
        if data.is_empty() {
            return Ok(Statement::new(self.insert_defaults(&target)));
        }

        let mut binder = Binder::new(self);
        let mut names = Vec::with_capacity(data.len());
        let mut placeholders = Vec::with_capacity(data.len());
        for (column, value) in data {
            names.push(self.quote_identifier(column)?);
            placeholders.push(binder.push(value.clone(), declared_type(columns, column)));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target,
            names.join(", "),
            placeholders.join(", ")
        );
        Ok(binder.finish(sql))
    }

    /// INSERT for a row made entirely of column defaults
    fn insert_defaults(&self, target: &str) -> String {
        format!("INSERT INTO {target} DEFAULT VALUES")
    }

    #[allow(clippy::too_many_arguments)]
    fn build_update(
        &self,
        database: &str,
        table: &str,
        columns: &[ColumnInfo],
        key_column: &str,
        key_value: &RowValue,
        data: &RowData,
    ) -> Result<Statement> {
        if data.is_empty() {
            return Err(Error::InvalidRequest("update needs at least one column".to_string()));
        }

        let mut binder = Binder::new(self);
        let mut assignments = Vec::with_capacity(data.len());
        for (column, value) in data {
            assignments.push(format!(
                "{} = {}",
                self.quote_identifier(column)?,
                binder.push(value.clone(), declared_type(columns, column))
            ));
        }

        let key_placeholder = binder.push(key_value.clone(), declared_type(columns, key_column));
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.qualify(database, table)?,
            assignments.join(", "),
            self.quote_identifier(key_column)?,
            key_placeholder
        );
        Ok(binder.finish(sql))
    }

    /// DELETE by key; several keys become one `IN (...)` list
    fn build_delete(
        &self,
        database: &str,
        table: &str,
        columns: &[ColumnInfo],
        key_column: &str,
        key_values: &[RowValue],
    ) -> Result<Statement> {
        if key_values.is_empty() {
            return Err(Error::InvalidRequest("delete needs at least one key value".to_string()));
        }

        let key_type = declared_type(columns, key_column);
        let mut binder = Binder::new(self);
        let predicate = if let [single] = key_values {
            format!("= {}", binder.push(single.clone(), key_type))
        } else {
            let placeholders: Vec<String> = key_values
                .iter()
                .map(|value| binder.push(value.clone(), key_type))
                .collect();
            format!("IN ({})", placeholders.join(", "))
        };

        let sql = format!(
            "DELETE FROM {} WHERE {} {}",
            self.qualify(database, table)?,
            self.quote_identifier(key_column)?,
            predicate
        );
        Ok(binder.finish(sql))
    }

    // ---------------------------------------------------------------------
    // DDL
    // ---------------------------------------------------------------------

    /// `name TYPE [NOT NULL] [DEFAULT expr]`
    fn column_definition(&self, column: &ColumnDefinition) -> Result<String> {
        validate_fragment("column type", &column.data_type)?;
        let mut definition = format!("{} {}", self.quote_identifier(&column.name)?, column.data_type.trim());
        if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        if let Some(default_value) = &column.default_value {
            validate_fragment("default expression", default_value)?;
            definition.push_str(" DEFAULT ");
            definition.push_str(default_value.trim());
        }
        Ok(definition)
    }

    /// Statements for a single alteration step against an already-qualified table
    fn alter_operation(&self, qualified_table: &str, operation: &AlterOperation) -> Result<Vec<Statement>>;

    /// Ordered statements for a whole alteration, each tagged with its step
    fn build_alter(&self, database: &str, table: &str, alteration: &TableAlteration) -> Result<Vec<AlterStep>> {
        let qualified_table = self.qualify(database, table)?;
        let mut steps = Vec::new();
        for (operation_index, operation) in alteration.operations.iter().enumerate() {
            for statement in self.alter_operation(&qualified_table, operation)? {
                steps.push(AlterStep {
                    operation_index,
                    statement,
                });
            }
        }
        Ok(steps)
    }

    fn build_truncate(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(format!("TRUNCATE TABLE {}", self.qualify(database, table)?)))
    }

    fn build_drop(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(format!("DROP TABLE {}", self.qualify(database, table)?)))
    }
}
