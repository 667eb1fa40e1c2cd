use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::StorageBackend;

/// Local file system storage backend
pub struct LocalBackend {
    base_path: PathBuf,
}

impl LocalBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a key to a path under the base directory. Keys that would
    /// escape the base directory are rejected before any I/O happens.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('\\') || key.contains('\0') {
            return Err(AppError::InvalidName(format!("Invalid object key: {}", key)));
        }

        let relative = Path::new(key);
        if relative.is_absolute() {
            return Err(AppError::InvalidName(format!("Invalid object key: {}", key)));
        }

        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(AppError::InvalidName(format!(
                        "Invalid object key: {}",
                        key
                    )))
                }
            }
        }

        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let full_path = self.resolve(key)?;

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved object to {:?}", full_path);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let full_path = self.resolve(key)?;

        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Object not found: {}", key))
            } else {
                AppError::Io(e)
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.resolve(key)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted object {:?}", full_path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AppError::Io(e)),
        }

        // Try to remove empty parent directories
        let mut current_dir = full_path.parent().map(|p| p.to_path_buf());
        while let Some(dir) = current_dir {
            if dir == self.base_path {
                break;
            }
            match fs::read_dir(&dir).await {
                Ok(mut entries) => {
                    if entries.next_entry().await?.is_some() {
                        break; // Not empty
                    }
                    let _ = fs::remove_dir(&dir).await;
                }
                Err(_) => break,
            }
            current_dir = dir.parent().map(|p| p.to_path_buf());
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_path = self.resolve(key)?;
        Ok(full_path.exists())
    }

    async fn download_url(&self, _key: &str, _expires: Duration) -> Result<Option<String>> {
        // Content is served by the application, not by a signed URL
        Ok(None)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
