//! SQLite dialect
//!
//! Catalog reads use the pragma table-valued functions so they can take
//! bound parameters. The "database" operand is an attached schema name,
//! normally `main`.

use crate::config::DialectKind;
use crate::database::traits::{SqlDialect, Statement};
use crate::schema::AlterOperation;
use crate::{Error, Result};

/// SQLite dialect: double-quote quoting, `?` placeholders, pragma catalog
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn list_databases(&self) -> Statement {
        Statement::new("SELECT name FROM pragma_database_list ORDER BY seq")
    }

    fn list_tables(&self, database: &str) -> Result<Statement> {
        Ok(Statement::new(format!(
            r#"
            SELECT name, type
            FROM {}.sqlite_master
            WHERE type IN ('table', 'view')
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#,
            self.quote_identifier(database)?
        )))
    }

    fn list_columns(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT name, cid + 1, type, "notnull" = 0, dflt_value, pk > 0
            FROM pragma_table_info(?, ?)
            ORDER BY cid
        "#,
        )
        .bind(self.catalog_name(table)?)
        .bind(self.catalog_name(database)?))
    }

    fn list_primary_key(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT name
            FROM pragma_table_info(?, ?)
            WHERE pk > 0
            ORDER BY pk
        "#,
        )
        .bind(self.catalog_name(table)?)
        .bind(self.catalog_name(database)?))
    }

    fn list_indexes(&self, database: &str, table: &str) -> Result<Statement> {
        let database = self.catalog_name(database)?;
        Ok(Statement::new(
            r#"
            SELECT il.name, ii.name, il."unique"
            FROM pragma_index_list(?, ?) AS il
            JOIN pragma_index_info(il.name, ?) AS ii
            WHERE il.origin <> 'pk'
              AND ii.name IS NOT NULL
            ORDER BY il.name, ii.seqno
        "#,
        )
        .bind(self.catalog_name(table)?)
        .bind(database.clone())
        .bind(database))
    }

    fn list_foreign_keys(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT "from", "table", COALESCE("to", '')
            FROM pragma_foreign_key_list(?, ?)
            ORDER BY id, seq
        "#,
        )
        .bind(self.catalog_name(table)?)
        .bind(self.catalog_name(database)?))
    }

    /// A connection keeps its parsed schema until it reads the catalog, and
    /// `DROP COLUMN` is checked against that copy
    fn schema_refresh(&self, database: &str) -> Result<Option<Statement>> {
        Ok(Some(Statement::new(format!(
            "SELECT COUNT(*) FROM {}.sqlite_master",
            self.quote_identifier(database)?
        ))))
    }

    /// Attached databases are addressed by qualified name; there is nothing to switch
    fn use_database(&self, database: &str) -> Result<Option<Statement>> {
        self.quote_identifier(database)?;
        Ok(None)
    }

    fn alter_operation(&self, qualified_table: &str, operation: &AlterOperation) -> Result<Vec<Statement>> {
        let sql = match operation {
            AlterOperation::AddColumn { column } => {
                format!("ALTER TABLE {} ADD COLUMN {}", qualified_table, self.column_definition(column)?)
            }
            AlterOperation::DropColumn { name } => {
                format!("ALTER TABLE {} DROP COLUMN {}", qualified_table, self.quote_identifier(name)?)
            }
            AlterOperation::ModifyColumn { column } => {
                return Err(Error::Unsupported(format!(
                    "SQLite cannot modify column {} in place",
                    column.name
                )));
            }
            AlterOperation::RenameColumn { from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                qualified_table,
                self.quote_identifier(from)?,
                self.quote_identifier(to)?
            ),
        };
        Ok(vec![Statement::new(sql)])
    }

    fn build_truncate(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(format!("DELETE FROM {}", self.qualify(database, table)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, TableAlteration};
    use crate::value::{RowData, RowValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(SqliteDialect.quote_identifier("users").unwrap(), "\"users\"");
        assert_eq!(
            SqliteDialect.quote_identifier("table\"\"name").unwrap(),
            "\"table\"\"name\""
        );
        assert!(SqliteDialect.quote_identifier("table\"name").is_err());
    }

    #[test]
    fn test_truncate_is_delete() {
        assert_eq!(
            SqliteDialect.build_truncate("main", "logs").unwrap().sql,
            "DELETE FROM \"main\".\"logs\""
        );
        assert_eq!(
            SqliteDialect.build_drop("main", "logs").unwrap().sql,
            "DROP TABLE \"main\".\"logs\""
        );
    }

    #[test]
    fn test_modify_column_is_unsupported() {
        let alteration = TableAlteration::new()
            .add_column(ColumnDefinition::new("note", "TEXT"))
            .modify_column(ColumnDefinition::new("note", "BLOB"));
        assert!(matches!(
            SqliteDialect.build_alter("main", "users", &alteration),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_default_values_insert() {
        let statement = SqliteDialect.build_insert("main", "events", &[], &RowData::new()).unwrap();
        assert_eq!(statement.sql, "INSERT INTO \"main\".\"events\" DEFAULT VALUES");
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_catalog_has_no_batched_path() {
        assert!(SqliteDialect.batched_schema("main").is_none());
        assert!(SqliteDialect.use_database("main").unwrap().is_none());
        assert!(SqliteDialect.use_database("").is_err());
        assert_eq!(
            SqliteDialect.schema_refresh("main").unwrap().unwrap().sql,
            "SELECT COUNT(*) FROM \"main\".sqlite_master"
        );

        let statement = SqliteDialect.list_indexes("main", "users").unwrap();
        assert_eq!(
            statement.params,
            vec![
                RowValue::Text("users".into()),
                RowValue::Text("main".into()),
                RowValue::Text("main".into())
            ]
        );
    }

    #[test]
    fn test_rejects_injected_column_type() {
        let alteration =
            TableAlteration::new().add_column(ColumnDefinition::new("x", "INTEGER); DROP TABLE users; --"));
        assert!(matches!(
            SqliteDialect.build_alter("main", "users", &alteration),
            Err(Error::InvalidRequest(_))
        ));
    }
}
