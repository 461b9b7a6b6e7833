//! PostgreSQL dialect
//!
//! The "database" operand of every call is a schema of the connected
//! database. Parameters are cast to the declared column type because sqlx
//! binds text and NULL as `TEXT`, which PostgreSQL will not assign to typed
//! columns implicitly.

use crate::config::DialectKind;
use crate::database::traits::{SqlDialect, Statement};
use crate::schema::AlterOperation;
use crate::Result;

/// PostgreSQL dialect: double-quote quoting, `$n` placeholders, pg_catalog metadata
pub struct PostgresDialect;

/// Strip type modifiers so a cast target accepts any length or precision
///
/// `character(n)` must not collapse to `character`, which means `character(1)`
/// and would truncate; the blank-padded base type is `bpchar`. The same holds
/// for `bit(n)`.
fn cast_target(declared_type: &str) -> String {
    let mut base = String::with_capacity(declared_type.len());
    let mut depth = 0usize;
    for character in declared_type.chars() {
        match character {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => base.push(character),
            _ => {}
        }
    }

    let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
    let (element, array_suffix) = match base.find('[') {
        Some(position) => (base[..position].trim_end(), &base[position..]),
        None => (base.as_str(), ""),
    };
    let element = match element {
        "character" => "bpchar",
        "bit" => "bit varying",
        other => other,
    };
    format!("{element}{array_suffix}")
}

impl SqlDialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn cast_parameter(&self, placeholder: String, declared_type: Option<&str>) -> String {
        match declared_type.map(cast_target) {
            Some(target) if !target.is_empty() => format!("CAST({placeholder} AS {target})"),
            _ => placeholder,
        }
    }

    fn text_expression(&self, quoted_column: &str) -> String {
        format!("CAST({quoted_column} AS TEXT)")
    }

    fn list_databases(&self) -> Statement {
        Statement::new(
            r#"
            SELECT schema_name::text
            FROM information_schema.schemata
            WHERE schema_name !~ '^pg_'
              AND schema_name <> 'information_schema'
            ORDER BY schema_name
        "#,
        )
    }

    fn list_tables(&self, database: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT table_name::text, table_type::text
            FROM information_schema.tables
            WHERE table_schema = $1
            ORDER BY table_name
        "#,
        )
        .bind(self.catalog_name(database)?))
    }

    fn list_columns(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT
                a.attname::text,
                a.attnum::int4,
                format_type(a.atttypid, a.atttypmod),
                NOT a.attnotnull,
                pg_get_expr(d.adbin, d.adrelid),
                EXISTS (
                    SELECT 1
                    FROM pg_index i
                    WHERE i.indrelid = c.oid
                      AND i.indisprimary
                      AND a.attnum = ANY(i.indkey)
                )
            FROM pg_attribute a
            JOIN pg_class c ON c.oid = a.attrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
            WHERE n.nspname = $1
              AND c.relname = $2
              AND a.attnum > 0
              AND NOT a.attisdropped
            ORDER BY a.attnum
        "#,
        )
        .bind(self.catalog_name(database)?)
        .bind(self.catalog_name(table)?))
    }

    fn list_primary_key(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT a.attname::text
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, position)
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1
              AND c.relname = $2
              AND i.indisprimary
            ORDER BY k.position
        "#,
        )
        .bind(self.catalog_name(database)?)
        .bind(self.catalog_name(table)?))
    }

    fn list_indexes(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT ic.relname::text, a.attname::text, i.indisunique
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_class ic ON ic.oid = i.indexrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, position)
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1
              AND c.relname = $2
              AND NOT i.indisprimary
            ORDER BY ic.relname, k.position
        "#,
        )
        .bind(self.catalog_name(database)?)
        .bind(self.catalog_name(table)?))
    }

    fn list_foreign_keys(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(
            r#"
            SELECT
                kcu.column_name::text,
                ccu.table_name::text AS references_table,
                ccu.column_name::text AS references_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
              AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
              AND ccu.table_schema = tc.table_schema
            WHERE tc.table_schema = $1
              AND tc.table_name = $2
              AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY tc.constraint_name, kcu.ordinal_position
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
            SELECT table_name::text, column_name::text
            FROM information_schema.columns
            WHERE table_schema = $1
            ORDER BY table_name, ordinal_position
        "#,
            )
            .bind(database),
        )
    }

    fn use_database(&self, database: &str) -> Result<Option<Statement>> {
        Ok(Some(Statement::new(format!(
            "SET search_path TO {}",
            self.quote_identifier(database)?
        ))))
    }

    fn alter_operation(&self, qualified_table: &str, operation: &AlterOperation) -> Result<Vec<Statement>> {
        let statements = match operation {
            AlterOperation::AddColumn { column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                qualified_table,
                self.column_definition(column)?
            )],
            AlterOperation::DropColumn { name } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                qualified_table,
                self.quote_identifier(name)?
            )],
            AlterOperation::ModifyColumn { column } => {
                // Type, nullability and default are separate clauses here
                self.column_definition(column)?;
                let name = self.quote_identifier(&column.name)?;
                let nullability = if column.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
                let default_clause = match &column.default_value {
                    Some(expression) => format!("SET DEFAULT {}", expression.trim()),
                    None => "DROP DEFAULT".to_string(),
                };
                vec![
                    format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                        qualified_table,
                        name,
                        column.data_type.trim()
                    ),
                    format!("ALTER TABLE {qualified_table} ALTER COLUMN {name} {nullability}"),
                    format!("ALTER TABLE {qualified_table} ALTER COLUMN {name} {default_clause}"),
                ]
            }
            AlterOperation::RenameColumn { from, to } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                qualified_table,
                self.quote_identifier(from)?,
                self.quote_identifier(to)?
            )],
        };
        Ok(statements.into_iter().map(Statement::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, ColumnFilter, ColumnInfo, FilterOperator, TableAlteration};
    use crate::value::{RowData, RowValue};
    use pretty_assertions::assert_eq;

    fn column(name: &str, data_type: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            ordinal_position: 1,
            data_type: data_type.to_string(),
            nullable: true,
            default_value: None,
            is_primary_key: false,
        }
    }

    #[test]
    fn test_cast_target_strips_modifiers() {
        assert_eq!(cast_target("character varying(255)"), "character varying");
        assert_eq!(cast_target("numeric(10,2)"), "numeric");
        assert_eq!(cast_target("timestamp(3) without time zone"), "timestamp without time zone");
        assert_eq!(cast_target("character(10)"), "bpchar");
        assert_eq!(cast_target("character(10)[]"), "bpchar[]");
        assert_eq!(cast_target("bit(8)"), "bit varying");
        assert_eq!(cast_target("integer"), "integer");
    }

    #[test]
    fn test_build_insert_casts_to_declared_types() {
        let columns = vec![column("age", "integer"), column("name", "character varying(64)")];
        let mut data = RowData::new();
        data.insert("name".to_string(), RowValue::Text("Ada".into()));
        data.insert("age".to_string(), RowValue::Text("36".into()));
        data.insert("note".to_string(), RowValue::Null);

        let statement = PostgresDialect.build_insert("public", "users", &columns, &data).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"public\".\"users\" (\"name\", \"age\", \"note\") \
             VALUES (CAST($1 AS character varying), CAST($2 AS integer), $3)"
        );
    }

    #[test]
    fn test_build_count_numbers_placeholders() {
        let columns = vec![column("age", "integer")];
        let filters = vec![
            ColumnFilter::new("age", FilterOperator::Gte, 18),
            ColumnFilter::new("name", FilterOperator::Like, "%son"),
            ColumnFilter::new("email", FilterOperator::IsNotNull, RowValue::Null),
        ];

        let statement = PostgresDialect.build_count("public", "users", &columns, &filters).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) AS count FROM \"public\".\"users\" \
             WHERE \"age\" >= CAST($1 AS integer) AND CAST(\"name\" AS TEXT) LIKE $2 AND \"email\" IS NOT NULL"
        );
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_build_delete_single_key() {
        let statement = PostgresDialect
            .build_delete("public", "users", &[column("id", "bigint")], "id", &[RowValue::Integer(9)])
            .unwrap();
        assert_eq!(
            statement.sql,
            "DELETE FROM \"public\".\"users\" WHERE \"id\" = CAST($1 AS bigint)"
        );
    }

    #[test]
    fn test_modify_column_expands_to_clauses() {
        let alteration = TableAlteration::new()
            .modify_column(ColumnDefinition::new("age", "bigint").not_null().with_default("0"));
        let steps = PostgresDialect.build_alter("public", "users", &alteration).unwrap();

        let sql: Vec<&str> = steps.iter().map(|step| step.statement.sql.as_str()).collect();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"public\".\"users\" ALTER COLUMN \"age\" TYPE bigint",
                "ALTER TABLE \"public\".\"users\" ALTER COLUMN \"age\" SET NOT NULL",
                "ALTER TABLE \"public\".\"users\" ALTER COLUMN \"age\" SET DEFAULT 0",
            ]
        );
        assert!(steps.iter().all(|step| step.operation_index == 0));
    }

    #[test]
    fn test_use_database_sets_search_path() {
        assert_eq!(
            PostgresDialect.use_database("audit").unwrap().unwrap().sql,
            "SET search_path TO \"audit\""
        );
        assert!(PostgresDialect.use_database("bad\"schema").is_err());
    }
}
