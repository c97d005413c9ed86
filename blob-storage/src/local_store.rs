use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use url::Url;
use uuid::Uuid;

use crate::store::{BlobStore, Provisioned, StoreError, StoreResult, StoredBlob};

const META_DIR: &str = ".meta";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Stores each container as a directory below `base_path`.
///
/// Content types live in a sidecar file under `<container>/.meta/`.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    fn container_path(&self, container: &str) -> PathBuf {
        self.base_path.join(container)
    }

    async fn existing_container(&self, container: &str) -> StoreResult<PathBuf> {
        let path = self.container_path(container);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(StoreError::ContainerMissing(container.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::ContainerMissing(container.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Writes `data` to a hidden temp file in `dir`, ready to be renamed into place.
async fn stage(dir: &Path, data: &[u8]) -> StoreResult<PathBuf> {
    let tmp = dir.join(format!(".tmp-{}", Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp, data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(tmp)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn create_container(&self, container: &str) -> StoreResult<Provisioned> {
        check_name(container)?;
        fs::create_dir_all(&self.base_path).await?;
        let path = self.container_path(container);
        let outcome = match fs::create_dir(&path).await {
            Ok(()) => Provisioned::Created,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Provisioned::AlreadyExists,
            Err(e) => return Err(e.into()),
        };
        fs::create_dir_all(path.join(META_DIR)).await?;
        Ok(outcome)
    }

    async fn put_blob(&self, container: &str, name: &str, data: Bytes, content_type: &str) -> StoreResult<()> {
        check_name(name)?;
        let dir = self.existing_container(container).await?;
        let meta_dir = dir.join(META_DIR);
        let staged_data = stage(&dir, &data).await?;
        let staged_meta = match stage(&meta_dir, content_type.as_bytes()).await {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&staged_data).await;
                return Err(e);
            }
        };

        // readers never see new bytes under a stale type or a type with no bytes
        if let Err(e) = fs::rename(&staged_data, dir.join(name)).await {
            let _ = fs::remove_file(&staged_data).await;
            let _ = fs::remove_file(&staged_meta).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&staged_meta, meta_dir.join(name)).await {
            let _ = fs::remove_file(&staged_meta).await;
            let _ = fs::remove_file(meta_dir.join(name)).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get_blob(&self, container: &str, name: &str) -> StoreResult<StoredBlob> {
        check_name(name)?;
        let dir = self.existing_container(container).await?;
        let data = match fs::read(dir.join(name)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        let content_type = match fs::read_to_string(dir.join(META_DIR).join(name)).await {
            Ok(ct) => ct,
            Err(e) if e.kind() == ErrorKind::NotFound => DEFAULT_CONTENT_TYPE.to_string(),
            Err(e) => return Err(e.into()),
        };
        Ok(StoredBlob { data: Bytes::from(data), content_type })
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        let path = self.container_path(container).join(name);
        Url::from_file_path(&path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("file://{}", path.display()))
    }
}
