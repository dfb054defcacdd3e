//! Group directory: groups, memberships, and the sid bookkeeping that keeps
//! ACL grants resolving across renames.

use crate::acl::{permission, AclEngine, ObjectIdentity, Principal};
use crate::error::{EngineError, EngineResult};
use crate::page::{limit_offset, Page};
use crate::sql::qualified;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Clone, Debug, Serialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GroupMember {
    pub user_id: i64,
    pub user_email: String,
}

#[derive(Clone)]
pub struct GroupDirectory {
    pool: PgPool,
    schema: String,
    acl: AclEngine,
}

impl GroupDirectory {
    pub fn new(pool: PgPool, schema: String, acl: AclEngine) -> Self {
        GroupDirectory { pool, schema, acl }
    }

    fn table(&self, name: &str) -> String {
        qualified(&self.schema, name)
    }

    /// Create a group and anchor it in the ACL tables with the creator as
    /// owner. The group name becomes a non-principal sid.
    pub async fn create_group(
        &self,
        acting: &Principal,
        name: &str,
        description: Option<&str>,
    ) -> EngineResult<Group> {
        let existing: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE name = $1",
            self.table("user_groups")
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Err(EngineError::NameConflict(name.to_string()));
        }
        let row: (i64,) = sqlx::query_as(&format!(
            "INSERT INTO {} (name, description) VALUES ($1, $2) RETURNING id",
            self.table("user_groups")
        ))
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        let group = Group {
            id: row.0,
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        self.acl
            .register_object(&ObjectIdentity::group(group.id), acting)
            .await?;
        tracing::info!(group = %group.name, id = group.id, "group created");
        Ok(group)
    }

    pub async fn find_by_id(&self, id: i64) -> EngineResult<Group> {
        let row: Option<(i64, String, Option<String>)> = sqlx::query_as(&format!(
            "SELECT id, name, description FROM {} WHERE id = $1",
            self.table("user_groups")
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(id, name, description)| Group {
            id,
            name,
            description,
        })
        .ok_or_else(|| EngineError::NotFound(format!("group {}", id)))
    }

    pub async fn find_by_name(&self, name: &str) -> EngineResult<Group> {
        let row: Option<(i64, String, Option<String>)> = sqlx::query_as(&format!(
            "SELECT id, name, description FROM {} WHERE name = $1",
            self.table("user_groups")
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(id, name, description)| Group {
            id,
            name,
            description,
        })
        .ok_or_else(|| EngineError::NotFound(format!("group '{}'", name)))
    }

    /// Rename a group and rewrite its ACL sid in the same transaction, so
    /// every existing entry keeps resolving for the group's members.
    pub async fn rename_group(
        &self,
        acting: &Principal,
        id: i64,
        new_name: &str,
    ) -> EngineResult<Group> {
        let group = self.find_by_id(id).await?;
        self.acl
            .require_permission(acting, &ObjectIdentity::group(id), permission::ADMINISTRATION)
            .await?;
        if group.name == new_name {
            return Ok(group);
        }
        let taken: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE name = $1",
            self.table("user_groups")
        ))
        .bind(new_name)
        .fetch_optional(&self.pool)
        .await?;
        if taken.is_some() {
            return Err(EngineError::NameConflict(new_name.to_string()));
        }
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "UPDATE {} SET name = $1 WHERE id = $2",
            self.table("user_groups")
        ))
        .bind(new_name)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "UPDATE {} SET sid = $1 WHERE sid = $2 AND principal = FALSE",
            self.table("acl_sid")
        ))
        .bind(new_name)
        .bind(&group.name)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(from = %group.name, to = %new_name, "group renamed");
        Ok(Group {
            id,
            name: new_name.to_string(),
            description: group.description,
        })
    }

    /// Delete a group and its membership rows. The sid row is deleted with
    /// it; entries referencing the orphaned sid stop matching, which revokes
    /// every grant the group carried.
    pub async fn delete_group(&self, acting: &Principal, id: i64) -> EngineResult<()> {
        let group = self.find_by_id(id).await?;
        self.acl
            .require_permission(acting, &ObjectIdentity::group(id), permission::DELETE)
            .await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "DELETE FROM {} WHERE group_id = $1",
            self.table("group_members")
        ))
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1",
            self.table("user_groups")
        ))
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        self.acl.remove_object(&ObjectIdentity::group(id)).await?;
        tracing::info!(group = %group.name, "group deleted");
        Ok(())
    }

    pub async fn add_member(
        &self,
        acting: &Principal,
        group_id: i64,
        member: &Principal,
    ) -> EngineResult<()> {
        self.find_by_id(group_id).await?;
        self.acl
            .require_permission(acting, &ObjectIdentity::group(group_id), permission::WRITE)
            .await?;
        sqlx::query(&format!(
            "INSERT INTO {} (group_id, user_id, user_email) VALUES ($1, $2, $3) \
             ON CONFLICT (group_id, user_id) DO NOTHING",
            self.table("group_members")
        ))
        .bind(group_id)
        .bind(member.id)
        .bind(&member.email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_member(
        &self,
        acting: &Principal,
        group_id: i64,
        user_id: i64,
    ) -> EngineResult<()> {
        self.find_by_id(group_id).await?;
        self.acl
            .require_permission(acting, &ObjectIdentity::group(group_id), permission::WRITE)
            .await?;
        sqlx::query(&format!(
            "DELETE FROM {} WHERE group_id = $1 AND user_id = $2",
            self.table("group_members")
        ))
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_members(
        &self,
        group_id: i64,
        page: u32,
        page_size: u32,
    ) -> EngineResult<Page<GroupMember>> {
        self.find_by_id(group_id).await?;
        let (limit, offset) = limit_offset(page, page_size);
        let total: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE group_id = $1",
            self.table("group_members")
        ))
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;
        let rows: Vec<(i64, String)> = sqlx::query_as(&format!(
            "SELECT user_id, user_email FROM {} WHERE group_id = $1 \
             ORDER BY id LIMIT $2 OFFSET $3",
            self.table("group_members")
        ))
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let items = rows
            .into_iter()
            .map(|(user_id, user_email)| GroupMember {
                user_id,
                user_email,
            })
            .collect();
        Ok(Page::new(items, page, page_size, total.0 as u64))
    }

    pub async fn list_groups(&self, page: u32, page_size: u32) -> EngineResult<Page<Group>> {
        let (limit, offset) = limit_offset(page, page_size);
        let total: (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table("user_groups")))
                .fetch_one(&self.pool)
                .await?;
        let rows: Vec<(i64, String, Option<String>)> = sqlx::query_as(&format!(
            "SELECT id, name, description FROM {} ORDER BY id LIMIT $1 OFFSET $2",
            self.table("user_groups")
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let items = rows
            .into_iter()
            .map(|(id, name, description)| Group {
                id,
                name,
                description,
            })
            .collect();
        Ok(Page::new(items, page, page_size, total.0 as u64))
    }

    /// Raw mask a principal sid holds directly on a group object, if any.
    pub async fn get_group_permission(
        &self,
        principal_sid: &str,
        group_id: i64,
    ) -> EngineResult<Option<i32>> {
        let row: Option<(i32,)> = sqlx::query_as(&format!(
            "SELECT e.mask FROM {} e \
             JOIN {} s ON s.id = e.sid \
             JOIN {} o ON o.id = e.acl_object_identity \
             WHERE s.sid = $1 AND s.principal = TRUE \
             AND o.object_class = $2 AND o.object_id = $3 \
             ORDER BY e.ace_order LIMIT 1",
            self.table("acl_entry"),
            self.table("acl_sid"),
            self.table("acl_object_identity")
        ))
        .bind(principal_sid)
        .bind(crate::acl::ObjectClass::Group.as_str())
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }
}
