//! Builds parameterized INSERT, SELECT, UPDATE, DELETE against runtime-named
//! tables. Every identifier is checked against the safe allow-list before it
//! enters SQL text.

use crate::error::EngineResult;
use crate::naming::ensure_safe_ident;
use crate::sql::{qualified, quoted};
use serde_json::Value;

/// One column with its bind value and optional SQL cast for the placeholder.
#[derive(Clone, Debug)]
pub struct ColumnValue {
    pub column: String,
    pub value: Value,
    pub cast: Option<&'static str>,
}

impl ColumnValue {
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        ColumnValue {
            column: column.into(),
            value,
            cast: None,
        }
    }

    pub fn with_cast(column: impl Into<String>, value: Value, cast: Option<&'static str>) -> Self {
        ColumnValue {
            column: column.into(),
            value,
            cast,
        }
    }
}

/// Generated SQL plus its positional bind values.
#[derive(Clone, Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn select_column_list(columns: &[String]) -> EngineResult<String> {
    let mut parts = Vec::with_capacity(columns.len());
    for c in columns {
        ensure_safe_ident(c)?;
        parts.push(quoted(c));
    }
    Ok(parts.join(", "))
}

fn check_table(schema: &str, table: &str) -> EngineResult<String> {
    ensure_safe_ident(schema)?;
    ensure_safe_ident(table)?;
    Ok(qualified(schema, table))
}

/// INSERT returning the generated id.
pub fn insert(schema: &str, table: &str, values: &[ColumnValue]) -> EngineResult<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = check_table(schema, table)?;
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for cv in values {
        ensure_safe_ident(&cv.column)?;
        let n = q.push_param(cv.value.clone());
        let ph = match cv.cast {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        };
        cols.push(quoted(&cv.column));
        placeholders.push(ph);
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        cols.join(", "),
        placeholders.join(", "),
        quoted("id")
    );
    Ok(q)
}

/// SELECT one row by id.
pub fn select_by_id(
    schema: &str,
    table: &str,
    columns: &[String],
    id: i64,
) -> EngineResult<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = check_table(schema, table)?;
    let cols = select_column_list(columns)?;
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        cols,
        table,
        quoted("id"),
        n
    );
    Ok(q)
}

/// SELECT a page ordered by id (insertion order).
pub fn select_page(
    schema: &str,
    table: &str,
    columns: &[String],
    limit: i64,
    offset: i64,
) -> EngineResult<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = check_table(schema, table)?;
    let cols = select_column_list(columns)?;
    let ln = q.push_param(Value::from(limit));
    let on = q.push_param(Value::from(offset));
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {} LIMIT ${} OFFSET ${}",
        cols,
        table,
        quoted("id"),
        ln,
        on
    );
    Ok(q)
}

/// SELECT COUNT(*) for page totals.
pub fn count_all(schema: &str, table: &str) -> EngineResult<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = check_table(schema, table)?;
    q.sql = format!("SELECT COUNT(*) FROM {}", table);
    Ok(q)
}

/// SELECT EXISTS for one id; used for relation integrity checks.
pub fn exists_by_id(schema: &str, table: &str, id: i64) -> EngineResult<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = check_table(schema, table)?;
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ${})",
        table,
        quoted("id"),
        n
    );
    Ok(q)
}

/// UPDATE by id, SET only the supplied columns. Empty set degenerates to a
/// no-op SELECT so callers need no special case.
pub fn update_by_id(
    schema: &str,
    table: &str,
    sets: &[ColumnValue],
    id: i64,
) -> EngineResult<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = check_table(schema, table)?;
    if sets.is_empty() {
        let n = q.push_param(Value::from(id));
        q.sql = format!(
            "SELECT {} FROM {} WHERE {} = ${}",
            quoted("id"),
            table,
            quoted("id"),
            n
        );
        return Ok(q);
    }
    let mut parts = Vec::with_capacity(sets.len());
    for cv in sets {
        ensure_safe_ident(&cv.column)?;
        let n = q.push_param(cv.value.clone());
        let rhs = match cv.cast {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        };
        parts.push(format!("{} = {}", quoted(&cv.column), rhs));
    }
    let idn = q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        table,
        parts.join(", "),
        quoted("id"),
        idn
    );
    Ok(q)
}

/// DELETE by id.
pub fn delete_by_id(schema: &str, table: &str, id: i64) -> EngineResult<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = check_table(schema, table)?;
    let n = q.push_param(Value::from(id));
    q.sql = format!("DELETE FROM {} WHERE {} = ${}", table, quoted("id"), n);
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn insert_shape() {
        let q = insert(
            "resources",
            "vehicles",
            &[
                ColumnValue::new("name", Value::from("Car1")),
                ColumnValue::with_cast(
                    "serviced_at",
                    Value::from("2024-01-01T00:00:00Z"),
                    Some("timestamptz"),
                ),
            ],
        )
        .unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO \"resources\".\"vehicles\" (\"name\", \"serviced_at\") \
             VALUES ($1, $2::timestamptz) RETURNING \"id\""
        );
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn select_page_orders_by_id() {
        let q = select_page("resources", "vehicles", &cols(&["id", "name"]), 5, 10).unwrap();
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\" FROM \"resources\".\"vehicles\" \
             ORDER BY \"id\" LIMIT $1 OFFSET $2"
        );
        assert_eq!(q.params, vec![Value::from(5), Value::from(10)]);
    }

    #[test]
    fn update_sets_only_supplied_columns() {
        let q = update_by_id(
            "resources",
            "vehicles",
            &[ColumnValue::new("description", Value::from("fast"))],
            3,
        )
        .unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"resources\".\"vehicles\" SET \"description\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(q.params[1], Value::from(3));
    }

    #[test]
    fn empty_update_degenerates_to_select() {
        let q = update_by_id("resources", "vehicles", &[], 3).unwrap();
        assert!(q.sql.starts_with("SELECT"));
    }

    #[test]
    fn unsafe_identifiers_are_rejected() {
        assert!(insert("resources", "veh\"icles", &[]).is_err());
        assert!(select_by_id("resources", "vehicles; drop", &cols(&["id"]), 1).is_err());
        assert!(select_by_id("resources", "vehicles", &cols(&["na me"]), 1).is_err());
        assert!(delete_by_id("Res", "vehicles", 1).is_err());
    }

    #[test]
    fn exists_query_shape() {
        let q = exists_by_id("resources", "rooms", 42).unwrap();
        assert_eq!(
            q.sql,
            "SELECT EXISTS(SELECT 1 FROM \"resources\".\"rooms\" WHERE \"id\" = $1)"
        );
    }
}
