//! Trait-based storage abstractions over a document store.

pub mod inmemory;
pub mod traits;

// Re-export commonly used types and traits
pub use inmemory::MemoryOAuthStorage;
pub use traits::*;

use crate::errors::StorageError;
use std::sync::Arc;

/// Storage backend configuration and factory
#[derive(Clone)]
pub enum StorageBackend {
    Memory,
}

/// Create a storage backend based on configuration
pub async fn create_storage_backend(
    backend: StorageBackend,
) -> std::result::Result<Arc<dyn OAuthStorage>, StorageError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryOAuthStorage::new())),
    }
}

/// Parse storage backend from configuration string
pub fn parse_storage_backend(
    backend_name: &str,
) -> std::result::Result<StorageBackend, StorageError> {
    match backend_name {
        "memory" => Ok(StorageBackend::Memory),
        _ => Err(StorageError::InvalidData(format!(
            "Unknown storage backend: {}",
            backend_name
        ))),
    }
}
