//! MySQL / MariaDB dialect

use crate::config::DialectKind;
use crate::database::traits::{SqlDialect, Statement};
use crate::schema::AlterOperation;
use crate::Result;

/// MySQL dialect: backtick quoting, `?` placeholders, information_schema catalog
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn list_databases(&self) -> Statement {
        Statement::new(
            r#"
            SELECT SCHEMA_NAME
            FROM information_schema.SCHEMATA
            ORDER BY SCHEMA_NAME
        "#,
        )
    }

    fn list_tables(&self, database: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT TABLE_NAME, TABLE_TYPE
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ?
            ORDER BY TABLE_NAME
        "#,
        )
        .bind(self.catalog_name(database)?))
    }

    fn list_columns(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT
                COLUMN_NAME,
                ORDINAL_POSITION,
                COLUMN_TYPE,
                IS_NULLABLE = 'YES',
                COLUMN_DEFAULT,
                COLUMN_KEY = 'PRI'
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ?
              AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#,
        )
        .bind(self.catalog_name(database)?)
        .bind(self.catalog_name(table)?))
    }

    fn list_primary_key(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ?
              AND TABLE_NAME = ?
              AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#,
        )
        .bind(self.catalog_name(database)?)
        .bind(self.catalog_name(table)?))
    }

    fn list_indexes(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT INDEX_NAME, COLUMN_NAME, NON_UNIQUE = 0
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = ?
              AND TABLE_NAME = ?
              AND INDEX_NAME <> 'PRIMARY'
              AND COLUMN_NAME IS NOT NULL
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
        "#,
        )
        .bind(self.catalog_name(database)?)
        .bind(self.catalog_name(table)?))
    }

    fn list_foreign_keys(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ?
              AND TABLE_NAME = ?
              AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#,
        )
        .bind(self.catalog_name(database)?)
        .bind(self.catalog_name(table)?))
    }

    fn batched_schema(&self, database: &str) -> Option<Statement> {
        let database = self.catalog_name(database).ok()?;
        Some(
            Statement::new(
                r#"
            SELECT TABLE_NAME, COLUMN_NAME
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ?
            ORDER BY TABLE_NAME, ORDINAL_POSITION
        "#,
            )
            .bind(database),
        )
    }

    fn use_database(&self, database: &str) -> Result<Option<Statement>> {
        Ok(Some(Statement::new(format!("USE {}", self.quote_identifier(database)?))))
    }

    fn insert_defaults(&self, target: &str) -> String {
        format!("INSERT INTO {target} () VALUES ()")
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
                format!("ALTER TABLE {} MODIFY COLUMN {}", qualified_table, self.column_definition(column)?)
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
}
