use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::Result;

/// Storage backend trait. One capability set over every concrete store;
/// adapters translate their own failures into the application error
/// taxonomy before returning, so nothing backend-specific crosses this
/// boundary.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write an object under the given key, replacing any existing object
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Read an object's content
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether an object exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get a signed URL for downloading (for remote storage)
    /// Local storage returns None; content is served by the application.
    async fn download_url(&self, key: &str, expires: Duration) -> Result<Option<String>>;

    /// Get the backend type tag stored on file records
    fn backend_type(&self) -> &'static str;
}
