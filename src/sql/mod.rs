//! Dynamic SQL generation for runtime-named tables: DDL, DML, binding, and
//! row decoding.

pub mod builder;
pub mod ddl;
pub mod params;
pub mod row;

pub use builder::QueryBuf;
pub use params::PgBindValue;

/// Quote an identifier for PostgreSQL. Identifiers reaching this point have
/// already passed the safe-ident allow-list; quoting is belt on top.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Schema-qualified table name.
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}
