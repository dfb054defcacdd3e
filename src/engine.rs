//! Engine facade wiring the services over one pool.

use crate::acl::AclEngine;
use crate::blob::FileStorage;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::group::GroupDirectory;
use crate::record::RecordStore;
use crate::relation::RelationResolver;
use crate::store::{ensure_database_exists, ensure_engine_tables};
use crate::template::TemplateRegistry;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct Engine {
    pub pool: PgPool,
    pub templates: TemplateRegistry,
    pub records: RecordStore,
    pub acl: AclEngine,
    pub groups: GroupDirectory,
}

impl Engine {
    /// Create the database if missing, connect, ensure engine tables, and
    /// wire the services.
    pub async fn connect(
        config: EngineConfig,
        files: Arc<dyn FileStorage>,
    ) -> EngineResult<Engine> {
        ensure_database_exists(&config.database_url).await?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;
        Self::from_pool(pool, config, files).await
    }

    /// Wire the services over an existing pool (for embedding and tests).
    pub async fn from_pool(
        pool: PgPool,
        config: EngineConfig,
        files: Arc<dyn FileStorage>,
    ) -> EngineResult<Engine> {
        ensure_engine_tables(&pool, &config.schema).await?;
        let acl = AclEngine::new(pool.clone(), config.schema.clone());
        let relations = RelationResolver::new(pool.clone(), config.schema.clone());
        let templates = TemplateRegistry::new(
            pool.clone(),
            config.schema.clone(),
            acl.clone(),
            relations.clone(),
        );
        let records = RecordStore::new(
            pool.clone(),
            config.schema.clone(),
            config.endpoint_url.clone(),
            templates.clone(),
            relations,
            acl.clone(),
            files,
        );
        let groups = GroupDirectory::new(pool.clone(), config.schema.clone(), acl.clone());
        Ok(Engine {
            pool,
            templates,
            records,
            acl,
            groups,
        })
    }
}
