//! DDL for dynamic record tables: create/drop table, add/drop/alter column.
//! Identifier checks mirror the DML builders; column types come from the
//! fixed declared-type mapping.

use crate::error::EngineResult;
use crate::naming::ensure_safe_ident;
use crate::sql::{qualified, quoted};

/// Built-in columns every record table carries besides its parameters.
pub const BUILTIN_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "user_id",
    "photos_names",
    "document_names",
];

fn check_table(schema: &str, table: &str) -> EngineResult<String> {
    ensure_safe_ident(schema)?;
    ensure_safe_ident(table)?;
    Ok(qualified(schema, table))
}

/// CREATE TABLE with the built-in columns only; parameters add columns later.
pub fn create_record_table(schema: &str, table: &str) -> EngineResult<String> {
    let table = check_table(schema, table)?;
    Ok(format!(
        "CREATE TABLE {} (\n  \
         {} BIGSERIAL PRIMARY KEY,\n  \
         {} TEXT NOT NULL,\n  \
         {} TEXT,\n  \
         {} BIGINT NOT NULL,\n  \
         {} TEXT,\n  \
         {} TEXT\n)",
        table,
        quoted("id"),
        quoted("name"),
        quoted("description"),
        quoted("user_id"),
        quoted("photos_names"),
        quoted("document_names")
    ))
}

pub fn drop_table(schema: &str, table: &str) -> EngineResult<String> {
    let table = check_table(schema, table)?;
    Ok(format!("DROP TABLE IF EXISTS {}", table))
}

pub fn rename_table(schema: &str, table: &str, new_table: &str) -> EngineResult<String> {
    let qualified_table = check_table(schema, table)?;
    ensure_safe_ident(new_table)?;
    Ok(format!(
        "ALTER TABLE {} RENAME TO {}",
        qualified_table,
        quoted(new_table)
    ))
}

pub fn add_column(
    schema: &str,
    table: &str,
    column: &str,
    column_type: &str,
) -> EngineResult<String> {
    let table = check_table(schema, table)?;
    ensure_safe_ident(column)?;
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table,
        quoted(column),
        column_type
    ))
}

pub fn drop_column(schema: &str, table: &str, column: &str) -> EngineResult<String> {
    let table = check_table(schema, table)?;
    ensure_safe_ident(column)?;
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        table,
        quoted(column)
    ))
}

pub fn rename_column(
    schema: &str,
    table: &str,
    column: &str,
    new_column: &str,
) -> EngineResult<String> {
    let table = check_table(schema, table)?;
    ensure_safe_ident(column)?;
    ensure_safe_ident(new_column)?;
    Ok(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        table,
        quoted(column),
        quoted(new_column)
    ))
}

pub fn alter_column_type(
    schema: &str,
    table: &str,
    column: &str,
    column_type: &str,
) -> EngineResult<String> {
    let table = check_table(schema, table)?;
    ensure_safe_ident(column)?;
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING NULL",
        table,
        quoted(column),
        column_type
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::ParameterType;

    #[test]
    fn create_table_has_builtin_columns() {
        let sql = create_record_table("resources", "vehicles").unwrap();
        assert!(sql.starts_with("CREATE TABLE \"resources\".\"vehicles\""));
        for col in BUILTIN_COLUMNS {
            assert!(sql.contains(&format!("\"{}\"", col)), "missing {}", col);
        }
        assert!(sql.contains("\"id\" BIGSERIAL PRIMARY KEY"));
    }

    #[test]
    fn add_column_uses_declared_type_mapping() {
        let sql = add_column(
            "resources",
            "vehicles",
            "plate",
            ParameterType::ShortText.column_type(),
        )
        .unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"resources\".\"vehicles\" ADD COLUMN \"plate\" VARCHAR(255)"
        );
        let sql = add_column(
            "resources",
            "vehicles",
            "owner_ref",
            ParameterType::Relation { template_id: 1 }.column_type(),
        )
        .unwrap();
        assert!(sql.ends_with("\"owner_ref\" BIGINT"));
    }

    #[test]
    fn drop_and_rename() {
        assert_eq!(
            drop_column("resources", "vehicles", "plate").unwrap(),
            "ALTER TABLE \"resources\".\"vehicles\" DROP COLUMN \"plate\""
        );
        assert_eq!(
            rename_table("resources", "vehicles", "fleet").unwrap(),
            "ALTER TABLE \"resources\".\"vehicles\" RENAME TO \"fleet\""
        );
        assert_eq!(
            rename_column("resources", "vehicles", "plate", "reg_no").unwrap(),
            "ALTER TABLE \"resources\".\"vehicles\" RENAME COLUMN \"plate\" TO \"reg_no\""
        );
    }

    #[test]
    fn ddl_rejects_unsafe_identifiers() {
        assert!(create_record_table("resources", "veh icles").is_err());
        assert!(add_column("resources", "vehicles", "a;b", "TEXT").is_err());
        assert!(rename_table("resources", "vehicles", "Fleet").is_err());
    }
}
