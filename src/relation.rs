//! Cross-template relation integrity. Relation columns carry the referenced
//! record id with no database-level foreign key, so existence is checked
//! here at write time and template deletion is blocked while referenced.

use crate::error::{EngineError, EngineResult};
use crate::sql::{builder, qualified};
use sqlx::PgPool;

#[derive(Clone)]
pub struct RelationResolver {
    pool: PgPool,
    schema: String,
}

impl RelationResolver {
    pub fn new(pool: PgPool, schema: String) -> Self {
        RelationResolver { pool, schema }
    }

    /// Confirm the referenced record exists in the target template's table.
    pub async fn ensure_target_exists(
        &self,
        target_table: &str,
        record_id: i64,
    ) -> EngineResult<()> {
        let q = builder::exists_by_id(&self.schema, target_table, record_id)?;
        tracing::debug!(sql = %q.sql, record_id, "relation check");
        let exists: (bool,) = sqlx::query_as(&q.sql)
            .bind(record_id)
            .fetch_one(&self.pool)
            .await?;
        if exists.0 {
            Ok(())
        } else {
            Err(EngineError::InvalidRelation(format!(
                "record {} in table '{}'",
                record_id, target_table
            )))
        }
    }

    /// Names of other templates holding a relation parameter that targets
    /// the given template. Non-empty blocks deletion.
    pub async fn referencing_templates(&self, template_id: i64) -> EngineResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT t.name FROM {} p JOIN {} t ON t.id = p.template_id \
             WHERE p.related_template_id = $1 AND p.template_id <> $1 ORDER BY t.name",
            qualified(&self.schema, "resource_parameters"),
            qualified(&self.schema, "resource_templates")
        ))
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
