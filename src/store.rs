//! Engine-owned table DDL: the template/parameter catalog, the ACL tables,
//! and the group directory, all living in the configured schema.

use crate::error::{EngineError, EngineResult};
use crate::naming::ensure_safe_ident;
use crate::sql::qualified;
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

/// Create the engine schema and its tables if absent. Idempotent; run once
/// at startup before any other engine call.
pub async fn ensure_engine_tables(pool: &PgPool, schema: &str) -> EngineResult<()> {
    ensure_safe_ident(schema)?;
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(pool)
        .await?;

    let templates = qualified(schema, "resource_templates");
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            table_name TEXT NOT NULL UNIQUE,
            description TEXT,
            user_id BIGINT NOT NULL,
            is_published BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
        templates
    ))
    .execute(pool)
    .await?;

    let parameters = qualified(schema, "resource_parameters");
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            template_id BIGINT NOT NULL,
            name TEXT NOT NULL,
            column_name TEXT NOT NULL,
            param_type TEXT NOT NULL,
            pattern TEXT,
            related_template_id BIGINT,
            UNIQUE (template_id, name),
            UNIQUE (template_id, column_name)
        )
        "#,
        parameters
    ))
    .execute(pool)
    .await?;

    let acl_sid = qualified(schema, "acl_sid");
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            sid TEXT NOT NULL,
            principal BOOLEAN NOT NULL,
            UNIQUE (sid, principal)
        )
        "#,
        acl_sid
    ))
    .execute(pool)
    .await?;

    let acl_oid = qualified(schema, "acl_object_identity");
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            object_class TEXT NOT NULL,
            object_id BIGINT NOT NULL,
            owner_sid BIGINT NOT NULL,
            UNIQUE (object_class, object_id)
        )
        "#,
        acl_oid
    ))
    .execute(pool)
    .await?;

    let acl_entry = qualified(schema, "acl_entry");
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            acl_object_identity BIGINT NOT NULL,
            ace_order INT NOT NULL,
            sid BIGINT NOT NULL,
            mask INT NOT NULL,
            granting BOOLEAN NOT NULL DEFAULT TRUE,
            UNIQUE (acl_object_identity, ace_order)
        )
        "#,
        acl_entry
    ))
    .execute(pool)
    .await?;

    let groups = qualified(schema, "user_groups");
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT
        )
        "#,
        groups
    ))
    .execute(pool)
    .await?;

    let members = qualified(schema, "group_members");
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            group_id BIGINT NOT NULL,
            user_id BIGINT NOT NULL,
            user_email TEXT NOT NULL,
            UNIQUE (group_id, user_id)
        )
        "#,
        members
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects
/// to the default `postgres` database to run CREATE DATABASE. Call before
/// creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> EngineResult<()> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| EngineError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&mut conn)
            .await?;
    if !exists.0 {
        let quoted = crate::sql::quoted(&db_name);
        sqlx::query(&format!("CREATE DATABASE {}", quoted))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> EngineResult<(String, String)> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| EngineError::BadRequest("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_name_parsing() {
        let (admin, name) = parse_db_name_from_url("postgres://localhost:5432/rms?sslmode=off").unwrap();
        assert_eq!(admin, "postgres://localhost:5432/postgres");
        assert_eq!(name, "rms");
    }
}
