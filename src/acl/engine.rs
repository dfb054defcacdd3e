//! ACL persistence and the permission check consulted before every mutating
//! engine operation.

use crate::acl::model::{
    evaluate, permission, AccessControlEntry, ObjectIdentity, Principal, PrincipalPermission, Sid,
};
use crate::error::{EngineError, EngineResult};
use crate::page::{limit_offset, Page};
use crate::sql::qualified;
use sqlx::PgPool;
use std::collections::HashSet;

#[derive(Clone)]
pub struct AclEngine {
    pool: PgPool,
    schema: String,
}

impl AclEngine {
    pub fn new(pool: PgPool, schema: String) -> Self {
        AclEngine { pool, schema }
    }

    fn table(&self, name: &str) -> String {
        qualified(&self.schema, name)
    }

    /// Look up a sid row id, inserting it when absent.
    async fn ensure_sid(&self, sid: &Sid) -> EngineResult<i64> {
        if let Some(id) = self.sid_id(sid).await? {
            return Ok(id);
        }
        let row: (i64,) = sqlx::query_as(&format!(
            "INSERT INTO {} (sid, principal) VALUES ($1, $2) \
             ON CONFLICT (sid, principal) DO UPDATE SET sid = EXCLUDED.sid RETURNING id",
            self.table("acl_sid")
        ))
        .bind(&sid.name)
        .bind(sid.principal)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn sid_id(&self, sid: &Sid) -> EngineResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE sid = $1 AND principal = $2",
            self.table("acl_sid")
        ))
        .bind(&sid.name)
        .bind(sid.principal)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    /// Anchor a new domain object in the ACL tables with its owner.
    pub async fn register_object(
        &self,
        object: &ObjectIdentity,
        owner: &Principal,
    ) -> EngineResult<()> {
        let owner_sid = self.ensure_sid(&Sid::user(owner.email.as_str())).await?;
        sqlx::query(&format!(
            "INSERT INTO {} (object_class, object_id, owner_sid) VALUES ($1, $2, $3) \
             ON CONFLICT (object_class, object_id) DO NOTHING",
            self.table("acl_object_identity")
        ))
        .bind(object.class.as_str())
        .bind(object.id)
        .bind(owner_sid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop an object identity and all of its entries. Used when the domain
    /// object itself is deleted.
    pub async fn remove_object(&self, object: &ObjectIdentity) -> EngineResult<()> {
        let Some((oid_id, _)) = self.object_row(object).await? else {
            return Ok(());
        };
        sqlx::query(&format!(
            "DELETE FROM {} WHERE acl_object_identity = $1",
            self.table("acl_entry")
        ))
        .bind(oid_id)
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.table("acl_object_identity")))
            .bind(oid_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// (object identity row id, owner sid string) for an anchored object.
    async fn object_row(&self, object: &ObjectIdentity) -> EngineResult<Option<(i64, String)>> {
        let row: Option<(i64, String)> = sqlx::query_as(&format!(
            "SELECT o.id, s.sid FROM {} o JOIN {} s ON s.id = o.owner_sid \
             WHERE o.object_class = $1 AND o.object_id = $2",
            self.table("acl_object_identity"),
            self.table("acl_sid")
        ))
        .bind(object.class.as_str())
        .bind(object.id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Group names the user belongs to; they act as non-principal sids.
    pub async fn groups_of(&self, user_id: i64) -> EngineResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT g.name FROM {} g JOIN {} m ON m.group_id = g.id WHERE m.user_id = $1",
            self.table("user_groups"),
            self.table("group_members")
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn load_entries(&self, oid_id: i64) -> EngineResult<Vec<AccessControlEntry>> {
        let rows: Vec<(i32, String, bool, i32, bool)> = sqlx::query_as(&format!(
            "SELECT e.ace_order, s.sid, s.principal, e.mask, e.granting \
             FROM {} e JOIN {} s ON s.id = e.sid \
             WHERE e.acl_object_identity = $1 ORDER BY e.ace_order",
            self.table("acl_entry"),
            self.table("acl_sid")
        ))
        .bind(oid_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(order, sid, principal, mask, granting)| AccessControlEntry {
                order,
                sid,
                principal,
                mask,
                granting,
            })
            .collect())
    }

    /// The check consulted before mutating operations. The object owner
    /// always passes; otherwise the ordered entry scan decides, and no
    /// matching entry denies.
    pub async fn check_permission(
        &self,
        principal: &Principal,
        object: &ObjectIdentity,
        required_mask: i32,
    ) -> EngineResult<bool> {
        let Some((oid_id, owner_sid)) = self.object_row(object).await? else {
            return Ok(false);
        };
        if owner_sid == principal.email {
            return Ok(true);
        }
        let mut resolved: HashSet<(String, bool)> = HashSet::new();
        resolved.insert((principal.email.clone(), true));
        for group in self.groups_of(principal.id).await? {
            resolved.insert((group, false));
        }
        let entries = self.load_entries(oid_id).await?;
        let decision = evaluate(&entries, &resolved, required_mask);
        tracing::debug!(
            object_class = object.class.as_str(),
            object_id = object.id,
            principal = %principal.email,
            required_mask,
            ?decision,
            "acl check"
        );
        Ok(decision.unwrap_or(false))
    }

    /// `check_permission` that fails with `NotAuthorized` instead of `false`.
    pub async fn require_permission(
        &self,
        principal: &Principal,
        object: &ObjectIdentity,
        required_mask: i32,
    ) -> EngineResult<()> {
        if self.check_permission(principal, object, required_mask).await? {
            Ok(())
        } else {
            Err(EngineError::NotAuthorized(format!(
                "{} on {} {}",
                required_mask,
                object.class.as_str(),
                object.id
            )))
        }
    }

    /// Grant `mask` to a sid. The acting principal must own the object or
    /// hold ADMINISTRATION on it. An existing entry for the sid is replaced;
    /// otherwise the entry appends at the next processing order.
    pub async fn grant(
        &self,
        acting: &Principal,
        object: &ObjectIdentity,
        sid: &Sid,
        mask: i32,
    ) -> EngineResult<()> {
        self.require_permission(acting, object, permission::ADMINISTRATION)
            .await?;
        let (oid_id, _) = self
            .object_row(object)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("acl object {}", object.id)))?;
        let sid_id = self.ensure_sid(sid).await?;
        let updated = sqlx::query(&format!(
            "UPDATE {} SET mask = $1, granting = TRUE WHERE acl_object_identity = $2 AND sid = $3",
            self.table("acl_entry")
        ))
        .bind(mask)
        .bind(oid_id)
        .bind(sid_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            sqlx::query(&format!(
                "INSERT INTO {} (acl_object_identity, ace_order, sid, mask, granting) \
                 SELECT $1, COALESCE(MAX(ace_order) + 1, 0), $2, $3, TRUE \
                 FROM {} WHERE acl_object_identity = $1",
                self.table("acl_entry"),
                self.table("acl_entry")
            ))
            .bind(oid_id)
            .bind(sid_id)
            .bind(mask)
            .execute(&self.pool)
            .await?;
        }
        tracing::info!(
            object_class = object.class.as_str(),
            object_id = object.id,
            sid = %sid.name,
            mask,
            "granted"
        );
        Ok(())
    }

    /// Remove every entry for a sid on an object. Same authorization rule as
    /// `grant`.
    pub async fn revoke(
        &self,
        acting: &Principal,
        object: &ObjectIdentity,
        sid: &Sid,
    ) -> EngineResult<()> {
        self.require_permission(acting, object, permission::ADMINISTRATION)
            .await?;
        let (oid_id, _) = self
            .object_row(object)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("acl object {}", object.id)))?;
        let Some(sid_id) = self.sid_id(sid).await? else {
            return Ok(());
        };
        sqlx::query(&format!(
            "DELETE FROM {} WHERE acl_object_identity = $1 AND sid = $2",
            self.table("acl_entry")
        ))
        .bind(oid_id)
        .bind(sid_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reassign ownership. Permitted for the current owner or an
    /// ADMINISTRATION holder.
    pub async fn change_owner(
        &self,
        acting: &Principal,
        object: &ObjectIdentity,
        new_owner: &Sid,
    ) -> EngineResult<()> {
        let (oid_id, owner_sid) = self
            .object_row(object)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("acl object {}", object.id)))?;
        if owner_sid != acting.email {
            self.require_permission(acting, object, permission::ADMINISTRATION)
                .await?;
        }
        let new_sid_id = self.ensure_sid(new_owner).await?;
        sqlx::query(&format!(
            "UPDATE {} SET owner_sid = $1 WHERE id = $2",
            self.table("acl_object_identity")
        ))
        .bind(new_sid_id)
        .bind(oid_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Page over the sids holding entries on an object, in processing order.
    pub async fn list_principals_with_access(
        &self,
        object: &ObjectIdentity,
        page: u32,
        page_size: u32,
    ) -> EngineResult<Page<PrincipalPermission>> {
        let (oid_id, _) = self
            .object_row(object)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("acl object {}", object.id)))?;
        let (limit, offset) = limit_offset(page, page_size);
        let total: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE acl_object_identity = $1",
            self.table("acl_entry")
        ))
        .bind(oid_id)
        .fetch_one(&self.pool)
        .await?;
        let rows: Vec<(String, bool, i32, bool)> = sqlx::query_as(&format!(
            "SELECT s.sid, s.principal, e.mask, e.granting \
             FROM {} e JOIN {} s ON s.id = e.sid \
             WHERE e.acl_object_identity = $1 ORDER BY e.ace_order LIMIT $2 OFFSET $3",
            self.table("acl_entry"),
            self.table("acl_sid")
        ))
        .bind(oid_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let items = rows
            .into_iter()
            .map(|(sid, principal, mask, granting)| PrincipalPermission {
                sid,
                principal,
                mask,
                granting,
            })
            .collect();
        Ok(Page::new(items, page, page_size, total.0 as u64))
    }
}
