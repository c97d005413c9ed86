use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::store::{BlobStore, Provisioned, StoreError, StoreResult, StoredBlob};

/// An in-process `BlobStore`. Clones share the same contents.
///
/// Used by tests and by the `memory` backend for local runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    containers: DashMap<String, DashMap<String, StoredBlob>>,
    create_calls: AtomicUsize,
    fail_creates: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent create-container call fail as if the backend were down.
    pub fn fail_creates(&self, fail: bool) {
        self.inner.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail as if the backend were down.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.inner.create_calls.load(Ordering::SeqCst)
    }

    pub fn container_count(&self) -> usize {
        self.inner.containers.len()
    }

    pub fn blob_count(&self, container: &str) -> usize {
        self.inner.containers.get(container).map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create_container(&self, container: &str) -> StoreResult<Provisioned> {
        self.inner.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated outage".to_string()));
        }
        // entry() holds the shard lock, so concurrent creators agree on who created it
        let mut created = false;
        self.inner.containers.entry(container.to_string()).or_insert_with(|| {
            created = true;
            DashMap::new()
        });
        Ok(if created { Provisioned::Created } else { Provisioned::AlreadyExists })
    }

    async fn put_blob(&self, container: &str, name: &str, data: Bytes, content_type: &str) -> StoreResult<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated outage".to_string()));
        }
        let blobs = self
            .inner
            .containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerMissing(container.to_string()))?;
        blobs.insert(name.to_string(), StoredBlob { data, content_type: content_type.to_string() });
        Ok(())
    }

    async fn get_blob(&self, container: &str, name: &str) -> StoreResult<StoredBlob> {
        let blobs = self
            .inner
            .containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerMissing(container.to_string()))?;
        let blob = blobs.get(name).ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        Ok(blob.value().clone())
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        format!("memory://{}/{}", container, name)
    }
}
