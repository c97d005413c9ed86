use std::sync::Arc;

use blob_store::BlobStore;
use bytes::Bytes;
use serde::Serialize;

use crate::error::{UploadError, UploadResult};
use crate::naming;
use crate::provision::ContainerProvisioner;
use crate::sniff;

/// Caller-chosen identity for the direct-naming mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub external_id: String,
    pub timestamp: String,
}

/// One inbound upload, normalized by an ingestion adapter.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub buffer: Bytes,
    pub content_type: String,
    pub extension_hint: Option<String>,
    pub correlation: Option<Correlation>,
}

impl UploadRequest {
    /// Resolves the content type, sniffing the bytes when the declared one is
    /// missing or generic.
    pub fn new(buffer: Bytes, declared_content_type: Option<&str>, extension_hint: Option<String>) -> Self {
        let content_type = sniff::resolve(declared_content_type, &buffer);
        Self { buffer, content_type, extension_hint, correlation: None }
    }

    pub fn with_correlation(mut self, correlation: Option<Correlation>) -> Self {
        self.correlation = correlation;
        self
    }
}

/// Identity of a blob that was written successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObjectDescriptor {
    #[serde(rename = "blobName")]
    pub name: String,
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

struct Backend {
    store: Arc<dyn BlobStore>,
    provisioner: ContainerProvisioner,
    container: String,
}

/// Provisions the container, names the blob and writes it in one call.
///
/// Built once at startup and shared by every request. A relay without a
/// backend rejects every upload with `StorageUnconfigured`.
pub struct BlobRelay {
    backend: Option<Backend>,
}

impl BlobRelay {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            backend: Some(Backend {
                provisioner: ContainerProvisioner::new(store.clone()),
                store,
                container: container.into(),
            }),
        }
    }

    pub fn unconfigured() -> Self {
        Self { backend: None }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Uploads under a freshly generated name.
    pub async fn upload(
        &self,
        buffer: Bytes,
        content_type: &str,
        extension_hint: Option<&str>,
    ) -> UploadResult<StoredObjectDescriptor> {
        let backend = self.checked_backend(&buffer)?;
        backend.provisioner.ensure(&backend.container).await?;
        let name = naming::generate(extension_hint);
        write(backend, name, buffer, content_type).await
    }

    /// Uploads under `<id>_<timestamp>.<ext>`. Last write wins for a repeated pair.
    pub async fn upload_named(
        &self,
        buffer: Bytes,
        content_type: &str,
        correlation: &Correlation,
    ) -> UploadResult<StoredObjectDescriptor> {
        let name = naming::direct_name(&correlation.external_id, &correlation.timestamp, content_type)?;
        let backend = self.checked_backend(&buffer)?;
        backend.provisioner.ensure(&backend.container).await?;
        write(backend, name, buffer, content_type).await
    }

    /// Routes a request to direct naming when it carries a correlation, else
    /// to generated naming.
    pub async fn submit(&self, request: UploadRequest) -> UploadResult<StoredObjectDescriptor> {
        match &request.correlation {
            Some(correlation) => {
                self.upload_named(request.buffer, &request.content_type, correlation).await
            }
            None => {
                self.upload(request.buffer, &request.content_type, request.extension_hint.as_deref())
                    .await
            }
        }
    }

    fn checked_backend(&self, buffer: &Bytes) -> UploadResult<&Backend> {
        if buffer.is_empty() {
            return Err(UploadError::EmptyPayload);
        }
        self.backend.as_ref().ok_or(UploadError::StorageUnconfigured)
    }
}

async fn write(
    backend: &Backend,
    name: String,
    buffer: Bytes,
    content_type: &str,
) -> UploadResult<StoredObjectDescriptor> {
    let size = buffer.len();
    backend
        .store
        .put_blob(&backend.container, &name, buffer, content_type)
        .await?;
    tracing::info!("stored {} ({} bytes, {})", name, size, content_type);
    Ok(StoredObjectDescriptor {
        url: backend.store.blob_url(&backend.container, &name),
        name,
        content_type: content_type.to_string(),
        size,
    })
}
