use std::sync::Arc;

use blob_store::{BlobStore, Provisioned};
use dashmap::DashSet;

use crate::error::UploadResult;

/// A container known to exist in the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
}

/// Create-if-absent for containers, remembering which ones are already ensured.
///
/// No lock is held across the backend call: racing first calls both issue
/// a create, and the backend's idempotent create settles it.
pub struct ContainerProvisioner {
    store: Arc<dyn BlobStore>,
    ready: DashSet<String>,
}

impl ContainerProvisioner {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store, ready: DashSet::new() }
    }

    pub async fn ensure(&self, container: &str) -> UploadResult<Container> {
        if !self.ready.contains(container) {
            match self.store.create_container(container).await? {
                Provisioned::Created => tracing::debug!("created container {}", container),
                Provisioned::AlreadyExists => tracing::debug!("container {} already exists", container),
            }
            self.ready.insert(container.to_string());
        }
        Ok(Container { name: container.to_string() })
    }
}
