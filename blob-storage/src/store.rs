use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::local_store::LocalBlobStore;
use crate::memory_store::MemoryBlobStore;
use crate::s3_store::S3BlobStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("container {0} does not exist")]
    ContainerMissing(String),

    #[error("blob {0} not found")]
    NotFound(String),

    #[error("invalid blob name {0:?}")]
    InvalidName(String),

    #[error("storage I/O failed")]
    Io(#[from] std::io::Error),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Outcome of a create-container call. Both variants mean the container is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExists,
}

/// A blob read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
}

/// Trait for writing and fetching whole blobs inside a named container.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Creates the container if it does not exist yet.
    async fn create_container(&self, container: &str) -> StoreResult<Provisioned>;

    /// Writes `data` under `name`, replacing any previous blob with that name.
    async fn put_blob(&self, container: &str, name: &str, data: Bytes, content_type: &str) -> StoreResult<()>;

    /// Retrieves a blob by its name.
    async fn get_blob(&self, container: &str, name: &str) -> StoreResult<StoredBlob>;

    /// Address a caller can use to reach the blob.
    fn blob_url(&self, container: &str, name: &str) -> String;
}


#[derive(Debug, Clone)]
pub enum BlobStores {
    Local(LocalBlobStore),
    Memory(MemoryBlobStore),
    S3(S3BlobStore),
}

impl BlobStores {
    /// Consumes the backend into a shareable handle.
    pub fn into_shared(self) -> Arc<dyn BlobStore> {
        match self {
            BlobStores::Local(a) => Arc::new(a),
            BlobStores::Memory(b) => Arc::new(b),
            BlobStores::S3(c) => Arc::new(c),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BlobStores::Local(_) => "local",
            BlobStores::Memory(_) => "memory",
            BlobStores::S3(_) => "s3",
        }
    }
}
