//! Blob store collaborator: opaque filename in, bytes behind it. The engine
//! stores filenames verbatim and never reads the bytes back.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store the bytes and return the generated filename.
    async fn upload(&self, bytes: Vec<u8>, original_name: &str) -> EngineResult<String>;
    /// Delete by filename. Deleting an unknown filename is not an error.
    async fn delete(&self, filename: &str) -> EngineResult<()>;
}

/// S3-backed storage. Filenames are `<uuid>-<sanitized original name>`;
/// commas are stripped because filenames live in comma-delimited lists.
pub struct S3FileStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3FileStorage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        S3FileStorage { client, bucket }
    }

    /// Build a client from the ambient AWS environment.
    pub async fn from_env(bucket: String) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        S3FileStorage {
            client: aws_sdk_s3::Client::new(&config),
            bucket,
        }
    }
}

fn generate_filename(original_name: &str) -> String {
    let sanitized: String = original_name
        .chars()
        .map(|c| if c == ',' || c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{}-{}", uuid::Uuid::new_v4(), sanitized)
}

#[async_trait]
impl FileStorage for S3FileStorage {
    async fn upload(&self, bytes: Vec<u8>, original_name: &str) -> EngineResult<String> {
        let filename = generate_filename(original_name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&filename)
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| EngineError::FileStorage(e.to_string()))?;
        tracing::debug!(filename = %filename, "uploaded");
        Ok(filename)
    }

    async fn delete(&self, filename: &str) -> EngineResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(filename)
            .send()
            .await
            .map_err(|e| EngineError::FileStorage(e.to_string()))?;
        tracing::debug!(filename = %filename, "deleted");
        Ok(())
    }
}

/// In-memory storage for tests and local development.
#[derive(Default)]
pub struct MemoryFileStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.lock().unwrap().contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn upload(&self, bytes: Vec<u8>, original_name: &str) -> EngineResult<String> {
        let filename = generate_filename(original_name);
        self.files.lock().unwrap().insert(filename.clone(), bytes);
        Ok(filename)
    }

    async fn delete(&self, filename: &str) -> EngineResult<()> {
        self.files.lock().unwrap().remove(filename);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_never_contain_commas() {
        let name = generate_filename("my, photo .png");
        assert!(!name.contains(','));
        assert!(!name.contains(' '));
        assert!(name.ends_with("my__photo_.png"));
    }

    #[test]
    fn filenames_are_unique_per_upload() {
        assert_ne!(generate_filename("a.png"), generate_filename("a.png"));
    }
}
