pub mod backend;
pub mod local;
#[cfg(test)]
pub mod memory;
pub mod object;
pub mod sign;

pub use backend::*;
pub use local::*;
pub use object::*;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

/// Storage manager holding every configured backend adapter.
///
/// New uploads go to the active backend; reads and deletes dispatch on the
/// backend tag recorded on the file, so records written under an earlier
/// binding keep working after the active backend changes. A record whose
/// tag has no configured adapter surfaces as backend-unavailable rather
/// than being reinterpreted.
pub struct StorageManager {
    active: Arc<dyn StorageBackend>,
    backends: HashMap<String, Arc<dyn StorageBackend>>,
}

impl StorageManager {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let mut backends: HashMap<String, Arc<dyn StorageBackend>> = HashMap::new();

        let local: Arc<dyn StorageBackend> = Arc::new(LocalBackend::new(&config.local_path));
        backends.insert("local".to_string(), local);

        if let Some(s3) = &config.s3 {
            backends.insert("s3".to_string(), Arc::new(ObjectStoreBackend::s3(s3)?));
        }
        if let Some(gcs) = &config.gcs {
            backends.insert("gcs".to_string(), Arc::new(ObjectStoreBackend::gcs(gcs)?));
        }

        let active = backends.get(&config.backend).cloned().ok_or_else(|| {
            AppError::BadRequest(format!(
                "Active storage backend '{}' is not configured",
                config.backend
            ))
        })?;

        tracing::info!(
            "Storage backends configured: [{}], active: {}",
            backends.keys().cloned().collect::<Vec<_>>().join(", "),
            config.backend
        );

        Ok(Self { active, backends })
    }

    /// Backend receiving new uploads
    pub fn active(&self) -> Arc<dyn StorageBackend> {
        self.active.clone()
    }

    pub fn active_type(&self) -> &'static str {
        self.active.backend_type()
    }

    /// Backend for an existing record's tag
    pub fn for_backend(&self, backend_type: &str) -> Result<Arc<dyn StorageBackend>> {
        self.backends.get(backend_type).cloned().ok_or_else(|| {
            AppError::BackendUnavailable(format!(
                "No configured backend for type '{}'",
                backend_type
            ))
        })
    }

    /// Configured backend tags, for health reporting
    pub fn backend_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.backends.keys().cloned().collect();
        types.sort();
        types
    }

    #[cfg(test)]
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        let mut backends = HashMap::new();
        backends.insert(backend.backend_type().to_string(), backend.clone());
        Self {
            active: backend,
            backends,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;

    #[test]
    fn test_unconfigured_active_backend_is_rejected() {
        let config = StorageConfig {
            backend: "s3".to_string(),
            local_path: "data/objects".to_string(),
            s3: None,
            gcs: None,
        };
        let err = StorageManager::from_config(&config).err().unwrap();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_dispatch_on_unknown_tag_is_backend_unavailable() {
        let manager = StorageManager::with_backend(Arc::new(MemoryBackend::new()));
        let err = manager.for_backend("s3").err().unwrap();
        assert!(matches!(err, AppError::BackendUnavailable(_)));
    }
}
