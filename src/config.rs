//! Engine configuration from environment, plus tracing bootstrap for
//! embedding binaries.

use crate::error::{EngineError, EngineResult};

/// Runtime settings the engine reads once at startup.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Public URL prefix for attachment downloads. Stored filenames are
    /// expanded to `endpoint_url + filename` when records are returned.
    pub endpoint_url: String,
    /// PostgreSQL schema owning catalog tables and dynamic record tables.
    pub schema: String,
    /// Bucket for the S3 file storage backend.
    pub s3_bucket: String,
}

impl EngineConfig {
    /// Load from environment. `.env` files are honored when present.
    /// `DATABASE_URL` and `ENDPOINT_URL` are required; `RESOURCE_SCHEMA`
    /// defaults to `resources` and `S3_BUCKET` to `resource-files`.
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| EngineError::BadRequest("DATABASE_URL is not set".into()))?;
        let endpoint_url = std::env::var("ENDPOINT_URL")
            .map_err(|_| EngineError::BadRequest("ENDPOINT_URL is not set".into()))?;
        let schema = std::env::var("RESOURCE_SCHEMA").unwrap_or_else(|_| "resources".into());
        let s3_bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "resource-files".into());
        crate::naming::ensure_safe_ident(&schema)?;
        Ok(EngineConfig {
            database_url,
            endpoint_url,
            schema,
            s3_bucket,
        })
    }
}

/// Install the default `tracing` subscriber with `RUST_LOG`-style filtering.
/// Call once from the embedding binary before using the engine.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
