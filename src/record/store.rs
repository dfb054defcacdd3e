//! Generic CRUD over template-backed tables, plus attachment mutation with
//! blob-store side effects ahead of the row update.

use crate::acl::{permission, AclEngine, ObjectIdentity, Principal};
use crate::blob::FileStorage;
use crate::error::{EngineError, EngineResult};
use crate::page::{limit_offset, Page};
use crate::record::attachments;
use crate::record::model::{RecordPatch, RecordSaveRequest, ResourceRecord};
use crate::record::validate::validate_attributes;
use crate::relation::RelationResolver;
use crate::sql::builder::{self, ColumnValue, QueryBuf};
use crate::sql::row::cell_to_value;
use crate::sql::PgBindValue;
use crate::template::{ResourceParameter, ResourceTemplate, TemplateRegistry};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy)]
enum AttachmentKind {
    Photo,
    Document,
}

impl AttachmentKind {
    fn column(self) -> &'static str {
        match self {
            AttachmentKind::Photo => "photos_names",
            AttachmentKind::Document => "document_names",
        }
    }

    fn list(self, record: &ResourceRecord) -> Option<&str> {
        match self {
            AttachmentKind::Photo => record.photos_names.as_deref(),
            AttachmentKind::Document => record.document_names.as_deref(),
        }
    }
}

#[derive(Clone)]
pub struct RecordStore {
    pool: PgPool,
    schema: String,
    endpoint_url: String,
    registry: TemplateRegistry,
    relations: RelationResolver,
    acl: AclEngine,
    files: Arc<dyn FileStorage>,
}

impl RecordStore {
    pub fn new(
        pool: PgPool,
        schema: String,
        endpoint_url: String,
        registry: TemplateRegistry,
        relations: RelationResolver,
        acl: AclEngine,
        files: Arc<dyn FileStorage>,
    ) -> Self {
        RecordStore {
            pool,
            schema,
            endpoint_url,
            registry,
            relations,
            acl,
            files,
        }
    }

    /// Resolve a table name to its template and parameters, rejecting
    /// unpublished templates.
    async fn published_template(
        &self,
        table_name: &str,
    ) -> EngineResult<(ResourceTemplate, Vec<ResourceParameter>)> {
        let template = self.registry.find_by_table_name(table_name).await?;
        if !template.is_published {
            return Err(EngineError::NotPublished(template.name));
        }
        let parameters = self.registry.parameters_of(template.id).await?;
        Ok((template, parameters))
    }

    fn select_columns(parameters: &[ResourceParameter]) -> Vec<String> {
        let mut cols: Vec<String> = crate::sql::ddl::BUILTIN_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();
        cols.extend(parameters.iter().map(|p| p.column_name.clone()));
        cols
    }

    fn row_to_record(
        parameters: &[ResourceParameter],
        row: &PgRow,
    ) -> EngineResult<ResourceRecord> {
        let mut attributes = HashMap::new();
        for p in parameters {
            let v = cell_to_value(row, &p.column_name);
            if !v.is_null() {
                attributes.insert(p.name.clone(), v);
            }
        }
        Ok(ResourceRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            user_id: row.try_get("user_id")?,
            photos_names: row.try_get("photos_names")?,
            document_names: row.try_get("document_names")?,
            attributes,
        })
    }

    /// Replace stored filenames with fully qualified download URLs.
    fn expand_attachment_urls(&self, mut record: ResourceRecord) -> ResourceRecord {
        record.photos_names = record
            .photos_names
            .map(|l| attachments::expand_urls(&self.endpoint_url, &l));
        record.document_names = record
            .document_names
            .map(|l| attachments::expand_urls(&self.endpoint_url, &l));
        record
    }

    async fn execute(&self, q: &QueryBuf) -> EngineResult<u64> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> EngineResult<Option<PgRow>> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.fetch_optional(&self.pool).await?)
    }

    async fn fetch_all(&self, q: &QueryBuf) -> EngineResult<Vec<PgRow>> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Confirm every relation-typed attribute points at an existing record
    /// in its target template's table.
    async fn check_relations(
        &self,
        validated: &[(&ResourceParameter, Value)],
    ) -> EngineResult<()> {
        for (parameter, value) in validated {
            if let crate::naming::ParameterType::Relation { template_id } = parameter.param_type {
                if let Some(record_id) = value.as_i64() {
                    let target = self.registry.find_by_id(template_id).await?;
                    self.relations
                        .ensure_target_exists(&target.table_name, record_id)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Insert a record. The owner is the acting principal; attachment lists
    /// start empty. Returns the new record id.
    pub async fn save(
        &self,
        acting: &Principal,
        table_name: &str,
        req: RecordSaveRequest,
    ) -> EngineResult<i64> {
        let (template, parameters) = self.published_template(table_name).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template.id),
                permission::WRITE,
            )
            .await?;
        let validated = validate_attributes(&parameters, &req.attributes)?;
        self.check_relations(&validated).await?;

        let mut values = vec![
            ColumnValue::new("name", Value::from(req.name)),
            ColumnValue::new(
                "description",
                req.description.map(Value::from).unwrap_or(Value::Null),
            ),
            ColumnValue::new("user_id", Value::from(acting.id)),
        ];
        for (parameter, value) in validated {
            values.push(ColumnValue::with_cast(
                parameter.column_name.clone(),
                value,
                parameter.param_type.bind_cast(),
            ));
        }
        let q = builder::insert(&self.schema, table_name, &values)?;
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| EngineError::Db(sqlx::Error::RowNotFound))?;
        let id: i64 = row.try_get("id")?;
        tracing::info!(table = %table_name, id, "record saved");
        Ok(id)
    }

    /// Fetch one record with bare stored filenames. Internal; public readers
    /// expand URLs.
    async fn load(
        &self,
        table_name: &str,
        parameters: &[ResourceParameter],
        id: i64,
    ) -> EngineResult<ResourceRecord> {
        let columns = Self::select_columns(parameters);
        let q = builder::select_by_id(&self.schema, table_name, &columns, id)?;
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("record {} in '{}'", id, table_name)))?;
        Self::row_to_record(parameters, &row)
    }

    pub async fn find_by_id(&self, table_name: &str, id: i64) -> EngineResult<ResourceRecord> {
        let (_, parameters) = self.published_template(table_name).await?;
        let record = self.load(table_name, &parameters, id).await?;
        Ok(self.expand_attachment_urls(record))
    }

    /// Page of records ordered by id (insertion order), URLs expanded.
    pub async fn find_all(
        &self,
        table_name: &str,
        page: u32,
        page_size: u32,
    ) -> EngineResult<Page<ResourceRecord>> {
        let (_, parameters) = self.published_template(table_name).await?;
        let (limit, offset) = limit_offset(page, page_size);
        let count_q = builder::count_all(&self.schema, table_name)?;
        tracing::debug!(sql = %count_q.sql, "query");
        let total: (i64,) = sqlx::query_as(&count_q.sql).fetch_one(&self.pool).await?;
        let columns = Self::select_columns(&parameters);
        let q = builder::select_page(&self.schema, table_name, &columns, limit, offset)?;
        let rows = self.fetch_all(&q).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = Self::row_to_record(&parameters, row)?;
            items.push(self.expand_attachment_urls(record));
        }
        Ok(Page::new(items, page, page_size, total.0 as u64))
    }

    /// Merge only the supplied fields into the stored row. Attachment lists
    /// are never touched here.
    pub async fn update(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
        patch: RecordPatch,
    ) -> EngineResult<()> {
        let (template, parameters) = self.published_template(table_name).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template.id),
                permission::WRITE,
            )
            .await?;
        self.load(table_name, &parameters, id).await?;

        let mut sets = Vec::new();
        if let Some(name) = patch.name {
            sets.push(ColumnValue::new("name", Value::from(name)));
        }
        if let Some(description) = patch.description {
            sets.push(ColumnValue::new("description", Value::from(description)));
        }
        if let Some(attrs) = &patch.attributes {
            let validated = validate_attributes(&parameters, attrs)?;
            self.check_relations(&validated).await?;
            for (parameter, value) in validated {
                sets.push(ColumnValue::with_cast(
                    parameter.column_name.clone(),
                    value,
                    parameter.param_type.bind_cast(),
                ));
            }
        }
        if sets.is_empty() {
            return Ok(());
        }
        let q = builder::update_by_id(&self.schema, table_name, &sets, id)?;
        self.execute(&q).await?;
        Ok(())
    }

    /// Delete the record's attachment files from the blob store, then the
    /// row. Blob deletions are not rolled back if a later step fails.
    pub async fn delete(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
    ) -> EngineResult<()> {
        let (template, parameters) = self.published_template(table_name).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template.id),
                permission::WRITE,
            )
            .await?;
        let record = self.load(table_name, &parameters, id).await?;
        for kind in [AttachmentKind::Photo, AttachmentKind::Document] {
            if let Some(list) = kind.list(&record) {
                for name in attachments::split_names(list) {
                    self.files.delete(name).await?;
                }
            }
        }
        let q = builder::delete_by_id(&self.schema, table_name, id)?;
        self.execute(&q).await?;
        tracing::info!(table = %table_name, id, "record deleted");
        Ok(())
    }

    async fn write_list(
        &self,
        table_name: &str,
        id: i64,
        kind: AttachmentKind,
        value: Option<String>,
    ) -> EngineResult<()> {
        let q = builder::update_by_id(
            &self.schema,
            table_name,
            &[ColumnValue::new(
                kind.column(),
                value.map(Value::from).unwrap_or(Value::Null),
            )],
            id,
        )?;
        self.execute(&q).await?;
        Ok(())
    }

    async fn add_attachment(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
        kind: AttachmentKind,
        bytes: Vec<u8>,
        original_name: &str,
    ) -> EngineResult<String> {
        let (template, parameters) = self.published_template(table_name).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template.id),
                permission::WRITE,
            )
            .await?;
        let record = self.load(table_name, &parameters, id).await?;
        let filename = self.files.upload(bytes, original_name).await?;
        let list = attachments::append_name(kind.list(&record), &filename);
        self.write_list(table_name, id, kind, Some(list)).await?;
        Ok(filename)
    }

    async fn delete_attachment(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
        kind: AttachmentKind,
        filename: &str,
    ) -> EngineResult<()> {
        let (template, parameters) = self.published_template(table_name).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template.id),
                permission::WRITE,
            )
            .await?;
        let record = self.load(table_name, &parameters, id).await?;
        let Some(list) = kind.list(&record) else {
            return Ok(());
        };
        if attachments::contains_name(list, filename) {
            self.files.delete(filename).await?;
        }
        let new_list = attachments::remove_name(list, filename);
        self.write_list(table_name, id, kind, new_list).await?;
        Ok(())
    }

    async fn delete_all_attachments(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
        kind: AttachmentKind,
    ) -> EngineResult<()> {
        let (template, parameters) = self.published_template(table_name).await?;
        self.acl
            .require_permission(
                acting,
                &ObjectIdentity::template(template.id),
                permission::WRITE,
            )
            .await?;
        let record = self.load(table_name, &parameters, id).await?;
        if let Some(list) = kind.list(&record) {
            for name in attachments::split_names(list) {
                self.files.delete(name).await?;
            }
        }
        self.write_list(table_name, id, kind, None).await?;
        Ok(())
    }

    pub async fn add_photo(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
        bytes: Vec<u8>,
        original_name: &str,
    ) -> EngineResult<String> {
        self.add_attachment(acting, table_name, id, AttachmentKind::Photo, bytes, original_name)
            .await
    }

    pub async fn add_document(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
        bytes: Vec<u8>,
        original_name: &str,
    ) -> EngineResult<String> {
        self.add_attachment(
            acting,
            table_name,
            id,
            AttachmentKind::Document,
            bytes,
            original_name,
        )
        .await
    }

    pub async fn delete_photo(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
        filename: &str,
    ) -> EngineResult<()> {
        self.delete_attachment(acting, table_name, id, AttachmentKind::Photo, filename)
            .await
    }

    pub async fn delete_document(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
        filename: &str,
    ) -> EngineResult<()> {
        self.delete_attachment(acting, table_name, id, AttachmentKind::Document, filename)
            .await
    }

    pub async fn delete_all_photos(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
    ) -> EngineResult<()> {
        self.delete_all_attachments(acting, table_name, id, AttachmentKind::Photo)
            .await
    }

    pub async fn delete_all_documents(
        &self,
        acting: &Principal,
        table_name: &str,
        id: i64,
    ) -> EngineResult<()> {
        self.delete_all_attachments(acting, table_name, id, AttachmentKind::Document)
            .await
    }
}
