//! Schema and request/response types
//!
//! These types describe catalog metadata discovered at runtime and the
//! request/response shapes of the data operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::value::{self, RowValue};
use crate::{Error, Result};

/// A database (MySQL), schema (PostgreSQL) or attached database (SQLite)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub name: String,
}

/// Information about a table (for listing)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    /// Table name
    pub name: String,

    /// Catalog table type (e.g. "BASE TABLE", "VIEW", "table")
    pub table_type: Option<String>,
}

/// Information about a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    /// Column name
    pub name: String,

    /// 1-based position reported by the catalog
    pub ordinal_position: u32,

    /// Declared SQL type (e.g. "int(11)", "character varying(255)", "TEXT")
    pub data_type: String,

    /// Whether the column allows NULL values
    pub nullable: bool,

    /// Default value expression (if any)
    pub default_value: Option<String>,

    /// Whether this column is part of the primary key
    pub is_primary_key: bool,
}

/// Foreign key constraint information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    /// Column name in this table
    pub column: String,

    /// Referenced table name
    pub references_table: String,

    /// Referenced column name
    pub references_column: String,
}

/// Index information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    /// Index name
    pub name: String,

    /// Columns included in the index, in index order
    pub columns: Vec<String>,

    /// Whether the index enforces uniqueness
    pub unique: bool,
}

/// Complete description of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDetails {
    pub database: String,

    pub name: String,

    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,

    /// Primary key column names in key order; `None` when the table has no key
    pub primary_key: Option<Vec<String>>,

    pub indexes: Vec<IndexInfo>,

    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDetails {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// A table skipped while collecting a database schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaWarning {
    pub table: String,
    pub message: String,
}

/// Table name to ordered column names for a whole database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchema {
    pub tables: BTreeMap<String, Vec<String>>,

    /// Tables whose columns could not be read; they are absent from `tables`
    pub warnings: Vec<SchemaWarning>,
}

impl DatabaseSchema {
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Reject a partial result instead of carrying warnings
    pub fn into_complete(self) -> Result<BTreeMap<String, Vec<String>>> {
        if self.warnings.is_empty() {
            Ok(self.tables)
        } else {
            Err(Error::SchemaFetchPartial {
                skipped: self.warnings.into_iter().map(|warning| warning.table).collect(),
            })
        }
    }
}

/// Sort order for row queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "asc", alias = "ASC")]
    Ascending,
    #[serde(alias = "desc", alias = "DESC")]
    Descending,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Comparison applied by a [`ColumnFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Eq,
    NotEq,
    Like,
    Lt,
    Lte,
    Gt,
    Gte,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    /// Operators that take no right-hand value
    pub fn is_unary(self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }

    pub fn sql(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "<>",
            FilterOperator::Like => "LIKE",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// One predicate of a table data request; the value is always bound, never inlined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFilter {
    pub column: String,

    #[serde(default = "default_operator")]
    pub operator: FilterOperator,

    #[serde(default = "null_value", deserialize_with = "value::plain::deserialize")]
    pub value: RowValue,
}

fn default_operator() -> FilterOperator {
    FilterOperator::Eq
}

fn null_value() -> RowValue {
    RowValue::Null
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<RowValue>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<RowValue>) -> Self {
        Self::new(column, FilterOperator::Eq, value)
    }
}

/// Sort key of a table data request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub column: String,

    #[serde(default)]
    pub order: SortOrder,
}

/// Query parameters for fetching one page of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDataRequest {
    pub database: String,

    pub table: String,

    /// Starting offset for pagination
    #[serde(default)]
    pub offset: u64,

    /// Maximum number of rows to return; must be positive
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Predicates combined with AND
    #[serde(default)]
    pub filters: Vec<ColumnFilter>,

    pub sort: Option<SortSpec>,
}

fn default_limit() -> u64 {
    100
}

impl TableDataRequest {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            offset: 0,
            limit: default_limit(),
            filters: Vec::new(),
            sort: None,
        }
    }

    /// Build a request from 1-based page numbering
    pub fn page(database: impl Into<String>, table: impl Into<String>, page: u64, page_size: u64) -> Self {
        Self::new(database, table)
            .with_limit(page_size)
            .with_offset(page.saturating_sub(1).saturating_mul(page_size))
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filter(mut self, filter: ColumnFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(SortSpec {
            column: column.into(),
            order,
        });
        self
    }
}

/// One page of table rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDataResponse {
    /// Column names in result order
    pub columns: Vec<String>,

    /// Rows, each aligned with `columns`
    pub rows: Vec<Vec<RowValue>>,

    /// Advisory total matching the filters; `None` when the count failed
    pub total: Option<u64>,

    pub offset: u64,

    /// Limit actually applied after clamping
    pub limit: u64,

    /// Whether there are more rows available
    pub has_more: bool,
}

/// Result from executing a raw query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Column names in the result
    pub columns: Vec<String>,

    /// Rows returned (empty for statements that return none)
    pub rows: Vec<Vec<RowValue>>,

    /// Number of rows affected, summed over every statement in the text
    pub affected_rows: u64,

    /// Query execution time in milliseconds
    pub execution_time_milliseconds: u64,
}

/// Outcome of a mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub affected_rows: u64,

    /// Auto-generated key of the inserted row, where the backend reports one
    pub last_insert_id: Option<i64>,
}

impl ExecuteResult {
    /// Treat zero affected rows as `NotFound`
    pub fn require_affected(self, what: impl Into<String>) -> Result<Self> {
        if self.affected_rows == 0 {
            Err(Error::NotFound(what.into()))
        } else {
            Ok(self)
        }
    }
}

/// Column shape used by add and modify alterations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,

    /// SQL type text, passed through to DDL (e.g. "VARCHAR(255)")
    pub data_type: String,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Default expression, passed through verbatim
    #[serde(default)]
    pub default_value: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default_value: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default_value = Some(expression.into());
        self
    }
}

/// One step of a table alteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AlterOperation {
    AddColumn { column: ColumnDefinition },
    DropColumn { name: String },
    /// Change type, nullability or default of an existing column
    ModifyColumn { column: ColumnDefinition },
    RenameColumn { from: String, to: String },
}

impl fmt::Display for AlterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlterOperation::AddColumn { column } => write!(f, "add column {}", column.name),
            AlterOperation::DropColumn { name } => write!(f, "drop column {name}"),
            AlterOperation::ModifyColumn { column } => write!(f, "modify column {}", column.name),
            AlterOperation::RenameColumn { from, to } => write!(f, "rename column {from} to {to}"),
        }
    }
}

/// Ordered list of schema changes for one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAlteration {
    pub operations: Vec<AlterOperation>,
}

impl TableAlteration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_column(mut self, column: ColumnDefinition) -> Self {
        self.operations.push(AlterOperation::AddColumn { column });
        self
    }

    pub fn drop_column(mut self, name: impl Into<String>) -> Self {
        self.operations.push(AlterOperation::DropColumn { name: name.into() });
        self
    }

    pub fn modify_column(mut self, column: ColumnDefinition) -> Self {
        self.operations.push(AlterOperation::ModifyColumn { column });
        self
    }

    pub fn rename_column(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.operations.push(AlterOperation::RenameColumn {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
