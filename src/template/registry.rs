//! Template registry: catalog persistence, physical DDL orchestration, and
//! the publish lifecycle.

use crate::acl::{permission, AclEngine, ObjectIdentity, Principal};
use crate::error::{EngineError, EngineResult};
use crate::naming::{ensure_safe_ident, physical_name, ParameterType};
use crate::page::{limit_offset, Page};
use crate::relation::RelationResolver;
use crate::sql::{ddl, qualified};
use crate::template::model::{ParameterDef, ResourceParameter, ResourceTemplate, TemplatePatch};
use regex::Regex;
use sqlx::PgPool;

type TemplateRow = (i64, String, String, Option<String>, i64, bool);
type ParameterRow = (i64, i64, String, String, String, Option<String>, Option<i64>);

#[derive(Clone)]
pub struct TemplateRegistry {
    pool: PgPool,
    schema: String,
    acl: AclEngine,
    relations: RelationResolver,
}

impl TemplateRegistry {
    pub fn new(
        pool: PgPool,
        schema: String,
        acl: AclEngine,
        relations: RelationResolver,
    ) -> Self {
        TemplateRegistry {
            pool,
            schema,
            acl,
            relations,
        }
    }

    fn catalog(&self) -> String {
        qualified(&self.schema, "resource_templates")
    }

    fn parameter_catalog(&self) -> String {
        qualified(&self.schema, "resource_parameters")
    }

    fn template_from_row(row: TemplateRow) -> ResourceTemplate {
        let (id, name, table_name, description, user_id, is_published) = row;
        ResourceTemplate {
            id,
            name,
            table_name,
            description,
            user_id,
            is_published,
        }
    }

    fn parameter_from_row(row: ParameterRow) -> EngineResult<ResourceParameter> {
        let (id, template_id, name, column_name, tag, pattern, related) = row;
        Ok(ResourceParameter {
            id,
            template_id,
            name,
            column_name,
            param_type: ParameterType::from_tag(&tag, related)?,
            pattern,
        })
    }

    /// Create an unpublished template: unique display name, derived physical
    /// table name, empty physical table with built-in columns, ACL anchor
    /// owned by the creator. Initial parameters, when supplied, are attached
    /// in declaration order.
    pub async fn create_template(
        &self,
        owner: &Principal,
        name: &str,
        description: Option<&str>,
        parameters: Option<Vec<ParameterDef>>,
    ) -> EngineResult<ResourceTemplate> {
        let existing: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE name = $1",
            self.catalog()
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Err(EngineError::NameConflict(name.to_string()));
        }

        let table_name = self.free_table_name(name).await?;
        let row: TemplateRow = sqlx::query_as(&format!(
            "INSERT INTO {} (name, table_name, description, user_id, is_published) \
             VALUES ($1, $2, $3, $4, FALSE) \
             RETURNING id, name, table_name, description, user_id, is_published",
            self.catalog()
        ))
        .bind(name)
        .bind(&table_name)
        .bind(description)
        .bind(owner.id)
        .fetch_one(&self.pool)
        .await?;
        let template = Self::template_from_row(row);

        let create_sql = ddl::create_record_table(&self.schema, &template.table_name)?;
        tracing::debug!(sql = %create_sql, "ddl");
        sqlx::query(&create_sql).execute(&self.pool).await?;

        self.acl
            .register_object(&ObjectIdentity::template(template.id), owner)
            .await?;
        tracing::info!(template = %template.name, table = %template.table_name, "template created");

        if let Some(defs) = parameters {
            for def in defs {
                self.add_parameter(owner, template.id, def).await?;
            }
        }
        self.find_by_id(template.id).await
    }

    /// Derive the physical table name, suffixing `_2`, `_3`, … on collision.
    async fn free_table_name(&self, display_name: &str) -> EngineResult<String> {
        let base = physical_name(display_name)?;
        let mut candidate = base.clone();
        let mut suffix = 2u32;
        loop {
            let taken: Option<(i64,)> = sqlx::query_as(&format!(
                "SELECT id FROM {} WHERE table_name = $1",
                self.catalog()
            ))
            .bind(&candidate)
            .fetch_optional(&self.pool)
            .await?;
            if taken.is_none() {
                return Ok(candidate);
            }
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
    }

    pub async fn find_by_id(&self, id: i64) -> EngineResult<ResourceTemplate> {
        let row: Option<TemplateRow> = sqlx::query_as(&format!(
            "SELECT id, name, table_name, description, user_id, is_published \
             FROM {} WHERE id = $1",
            self.catalog()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::template_from_row)
            .ok_or_else(|| EngineError::NotFound(format!("template {}", id)))
    }

    pub async fn find_by_name(&self, name: &str) -> EngineResult<ResourceTemplate> {
        let row: Option<TemplateRow> = sqlx::query_as(&format!(
            "SELECT id, name, table_name, description, user_id, is_published \
             FROM {} WHERE name = $1",
            self.catalog()
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::template_from_row)
            .ok_or_else(|| EngineError::NotFound(format!("template '{}'", name)))
    }

    pub async fn find_by_table_name(&self, table_name: &str) -> EngineResult<ResourceTemplate> {
        let row: Option<TemplateRow> = sqlx::query_as(&format!(
            "SELECT id, name, table_name, description, user_id, is_published \
             FROM {} WHERE table_name = $1",
            self.catalog()
        ))
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::template_from_row)
            .ok_or_else(|| EngineError::NotFound(format!("table '{}'", table_name)))
    }

    /// Case-insensitive substring search over name and description.
    pub async fn search(&self, keyword: &str) -> EngineResult<Vec<ResourceTemplate>> {
        let needle = format!("%{}%", escape_like(keyword));
        let rows: Vec<TemplateRow> = sqlx::query_as(&format!(
            "SELECT id, name, table_name, description, user_id, is_published \
             FROM {} WHERE name ILIKE $1 ESCAPE '\\' OR description ILIKE $1 ESCAPE '\\' \
             ORDER BY id",
            self.catalog()
        ))
        .bind(&needle)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::template_from_row).collect())
    }

    pub async fn list_all(&self) -> EngineResult<Vec<ResourceTemplate>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(&format!(
            "SELECT id, name, table_name, description, user_id, is_published \
             FROM {} ORDER BY id",
            self.catalog()
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::template_from_row).collect())
    }

    pub async fn list_by_owner(&self, user_id: i64) -> EngineResult<Vec<ResourceTemplate>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(&format!(
            "SELECT id, name, table_name, description, user_id, is_published \
             FROM {} WHERE user_id = $1 ORDER BY id",
            self.catalog()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::template_from_row).collect())
    }

    /// Partial update of name/description while unpublished. Renaming
    /// re-derives the physical table name and renames the table.
    pub async fn update_template(
        &self,
        acting: &Principal,
        id: i64,
        patch: TemplatePatch,
    ) -> EngineResult<ResourceTemplate> {
        let template = self.find_by_id(id).await?;
        self.acl
            .require_permission(acting, &ObjectIdentity::template(id), permission::WRITE)
            .await?;
        if template.is_published {
            return Err(EngineError::AlreadyPublished(template.name));
        }
        let mut name = template.name.clone();
        let mut table_name = template.table_name.clone();
        if let Some(new_name) = &patch.name {
            if *new_name != template.name {
                let taken: Option<(i64,)> = sqlx::query_as(&format!(
                    "SELECT id FROM {} WHERE name = $1",
                    self.catalog()
                ))
                .bind(new_name)
                .fetch_optional(&self.pool)
                .await?;
                if taken.is_some() {
                    return Err(EngineError::NameConflict(new_name.clone()));
                }
                name = new_name.clone();
                table_name = self.free_table_name(new_name).await?;
            }
        }
        let description = patch.description.or(template.description);
        sqlx::query(&format!(
            "UPDATE {} SET name = $1, table_name = $2, description = $3 WHERE id = $4",
            self.catalog()
        ))
        .bind(&name)
        .bind(&table_name)
        .bind(&description)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if table_name != template.table_name {
            let rename_sql = ddl::rename_table(&self.schema, &template.table_name, &table_name)?;
            tracing::debug!(sql = %rename_sql, "ddl");
            sqlx::query(&rename_sql).execute(&self.pool).await?;
        }
        self.find_by_id(id).await
    }

    /// Attach a parameter to an unpublished template and add its physical
    /// column.
    pub async fn add_parameter(
        &self,
        acting: &Principal,
        template_id: i64,
        def: ParameterDef,
    ) -> EngineResult<ResourceParameter> {
        let template = self.find_by_id(template_id).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template_id),
                permission::WRITE,
            )
            .await?;
        if template.is_published {
            return Err(EngineError::AlreadyPublished(template.name));
        }
        let column_name = self.validate_parameter_def(&template, None, &def).await?;
        let related_template_id = self.related_template_id(&def).await?;

        let row: ParameterRow = sqlx::query_as(&format!(
            "INSERT INTO {} (template_id, name, column_name, param_type, pattern, related_template_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, template_id, name, column_name, param_type, pattern, related_template_id",
            self.parameter_catalog()
        ))
        .bind(template_id)
        .bind(&def.name)
        .bind(&column_name)
        .bind(def.param_type.tag())
        .bind(&def.pattern)
        .bind(related_template_id)
        .fetch_one(&self.pool)
        .await?;

        let add_sql = ddl::add_column(
            &self.schema,
            &template.table_name,
            &column_name,
            def.param_type.column_type(),
        )?;
        tracing::debug!(sql = %add_sql, "ddl");
        sqlx::query(&add_sql).execute(&self.pool).await?;
        Self::parameter_from_row(row)
    }

    /// Redefine a parameter on an unpublished template: rename and/or retype
    /// the physical column to match.
    pub async fn update_parameter(
        &self,
        acting: &Principal,
        template_id: i64,
        parameter_id: i64,
        def: ParameterDef,
    ) -> EngineResult<ResourceParameter> {
        let template = self.find_by_id(template_id).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template_id),
                permission::WRITE,
            )
            .await?;
        if template.is_published {
            return Err(EngineError::AlreadyPublished(template.name));
        }
        let current = self.find_parameter(template_id, parameter_id).await?;
        let column_name = self
            .validate_parameter_def(&template, Some(&current), &def)
            .await?;
        let related_template_id = self.related_template_id(&def).await?;

        if column_name != current.column_name {
            let rename_sql = ddl::rename_column(
                &self.schema,
                &template.table_name,
                &current.column_name,
                &column_name,
            )?;
            tracing::debug!(sql = %rename_sql, "ddl");
            sqlx::query(&rename_sql).execute(&self.pool).await?;
        }
        if def.param_type.column_type() != current.param_type.column_type() {
            let alter_sql = ddl::alter_column_type(
                &self.schema,
                &template.table_name,
                &column_name,
                def.param_type.column_type(),
            )?;
            tracing::debug!(sql = %alter_sql, "ddl");
            sqlx::query(&alter_sql).execute(&self.pool).await?;
        }
        let row: ParameterRow = sqlx::query_as(&format!(
            "UPDATE {} SET name = $1, column_name = $2, param_type = $3, pattern = $4, \
             related_template_id = $5 WHERE id = $6 \
             RETURNING id, template_id, name, column_name, param_type, pattern, related_template_id",
            self.parameter_catalog()
        ))
        .bind(&def.name)
        .bind(&column_name)
        .bind(def.param_type.tag())
        .bind(&def.pattern)
        .bind(related_template_id)
        .bind(parameter_id)
        .fetch_one(&self.pool)
        .await?;
        Self::parameter_from_row(row)
    }

    /// Detach a parameter and drop its column. Irreversible for any values
    /// the column held.
    pub async fn remove_parameter(
        &self,
        acting: &Principal,
        template_id: i64,
        parameter_id: i64,
    ) -> EngineResult<()> {
        let template = self.find_by_id(template_id).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template_id),
                permission::WRITE,
            )
            .await?;
        if template.is_published {
            return Err(EngineError::AlreadyPublished(template.name));
        }
        let parameter = self.find_parameter(template_id, parameter_id).await?;
        sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1",
            self.parameter_catalog()
        ))
        .bind(parameter_id)
        .execute(&self.pool)
        .await?;
        let drop_sql = ddl::drop_column(&self.schema, &template.table_name, &parameter.column_name)?;
        tracing::debug!(sql = %drop_sql, "ddl");
        sqlx::query(&drop_sql).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn find_parameter(
        &self,
        template_id: i64,
        parameter_id: i64,
    ) -> EngineResult<ResourceParameter> {
        let row: Option<ParameterRow> = sqlx::query_as(&format!(
            "SELECT id, template_id, name, column_name, param_type, pattern, related_template_id \
             FROM {} WHERE template_id = $1 AND id = $2",
            self.parameter_catalog()
        ))
        .bind(template_id)
        .bind(parameter_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::parameter_from_row)
            .transpose()?
            .ok_or_else(|| EngineError::NotFound(format!("parameter {}", parameter_id)))
    }

    /// All parameters of a template in declaration order. Used by the record
    /// store to validate attribute maps.
    pub async fn parameters_of(&self, template_id: i64) -> EngineResult<Vec<ResourceParameter>> {
        let rows: Vec<ParameterRow> = sqlx::query_as(&format!(
            "SELECT id, template_id, name, column_name, param_type, pattern, related_template_id \
             FROM {} WHERE template_id = $1 ORDER BY id",
            self.parameter_catalog()
        ))
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::parameter_from_row).collect()
    }

    pub async fn list_parameters(
        &self,
        template_id: i64,
        page: u32,
        page_size: u32,
    ) -> EngineResult<Page<ResourceParameter>> {
        self.find_by_id(template_id).await?;
        let (limit, offset) = limit_offset(page, page_size);
        let total: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE template_id = $1",
            self.parameter_catalog()
        ))
        .bind(template_id)
        .fetch_one(&self.pool)
        .await?;
        let rows: Vec<ParameterRow> = sqlx::query_as(&format!(
            "SELECT id, template_id, name, column_name, param_type, pattern, related_template_id \
             FROM {} WHERE template_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
            self.parameter_catalog()
        ))
        .bind(template_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let items = rows
            .into_iter()
            .map(Self::parameter_from_row)
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Page::new(items, page, page_size, total.0 as u64))
    }

    /// Lock the schema and unlock record operations. Fails when already
    /// published or when the template declares no parameters; never touches
    /// stored data.
    pub async fn publish(&self, acting: &Principal, template_id: i64) -> EngineResult<bool> {
        let template = self.find_by_id(template_id).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template_id),
                permission::WRITE,
            )
            .await?;
        if template.is_published {
            return Err(EngineError::AlreadyPublished(template.name));
        }
        let parameters = self.parameters_of(template_id).await?;
        if parameters.is_empty() {
            return Err(EngineError::NoParameters(template.name));
        }
        sqlx::query(&format!(
            "UPDATE {} SET is_published = TRUE WHERE id = $1",
            self.catalog()
        ))
        .bind(template_id)
        .execute(&self.pool)
        .await?;
        tracing::info!(template = %template.name, "published");
        Ok(true)
    }

    /// Administrative flip back; idempotent. Re-enables schema edits and
    /// blocks record operations again.
    pub async fn unpublish(&self, acting: &Principal, template_id: i64) -> EngineResult<bool> {
        let template = self.find_by_id(template_id).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template_id),
                permission::WRITE,
            )
            .await?;
        sqlx::query(&format!(
            "UPDATE {} SET is_published = FALSE WHERE id = $1",
            self.catalog()
        ))
        .bind(template_id)
        .execute(&self.pool)
        .await?;
        tracing::info!(template = %template.name, "unpublished");
        Ok(true)
    }

    /// Delete a template, its parameters, its physical table, and its ACL
    /// anchor. Blocked while any other template's relation parameter points
    /// at it.
    pub async fn delete(&self, acting: &Principal, template_id: i64) -> EngineResult<()> {
        let template = self.find_by_id(template_id).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template_id),
                permission::DELETE,
            )
            .await?;
        let referencing = self.relations.referencing_templates(template_id).await?;
        if !referencing.is_empty() {
            return Err(EngineError::InUseByRelation(referencing.join(", ")));
        }
        sqlx::query(&format!(
            "DELETE FROM {} WHERE template_id = $1",
            self.parameter_catalog()
        ))
        .bind(template_id)
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.catalog()))
            .bind(template_id)
            .execute(&self.pool)
            .await?;
        let drop_sql = ddl::drop_table(&self.schema, &template.table_name)?;
        tracing::debug!(sql = %drop_sql, "ddl");
        sqlx::query(&drop_sql).execute(&self.pool).await?;
        self.acl
            .remove_object(&ObjectIdentity::template(template_id))
            .await?;
        tracing::info!(template = %template.name, "template deleted");
        Ok(())
    }

    /// Shared checks for add/update parameter: per-template name uniqueness,
    /// no clash with built-in columns, compilable pattern. Returns the
    /// derived column name.
    async fn validate_parameter_def(
        &self,
        template: &ResourceTemplate,
        current: Option<&ResourceParameter>,
        def: &ParameterDef,
    ) -> EngineResult<String> {
        let conflict: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE template_id = $1 AND name = $2",
            self.parameter_catalog()
        ))
        .bind(template.id)
        .bind(&def.name)
        .fetch_optional(&self.pool)
        .await?;
        if let Some((existing_id,)) = conflict {
            if current.map(|p| p.id) != Some(existing_id) {
                return Err(EngineError::NameConflict(def.name.clone()));
            }
        }
        if let Some(pattern) = &def.pattern {
            Regex::new(pattern).map_err(|e| EngineError::InvalidPattern(e.to_string()))?;
        }
        let column_name = physical_name(&def.name)?;
        ensure_safe_ident(&column_name)?;
        if ddl::BUILTIN_COLUMNS.contains(&column_name.as_str()) {
            return Err(EngineError::NameConflict(column_name));
        }
        Ok(column_name)
    }

    /// For relation parameters, confirm the target template exists and
    /// return its id for the catalog row.
    async fn related_template_id(&self, def: &ParameterDef) -> EngineResult<Option<i64>> {
        if let ParameterType::Relation { template_id } = def.param_type {
            self.find_by_id(template_id).await?;
            Ok(Some(template_id))
        } else {
            Ok(None)
        }
    }
}

/// Escape LIKE wildcards in a user keyword; the query uses `ESCAPE '\'`.
pub fn escape_like(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }
}
