use blob_store::{BlobStores, LocalBlobStore, MemoryBlobStore, S3BlobStore, S3Settings};
use thiserror::Error;
use upload_relay::BlobRelay;

use crate::params::{Args, BackendKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageConfigErr {
    #[error("no storage backend selected (set STORAGE_BACKEND)")]
    NoBackend,

    #[error("{0} is required for the selected storage backend")]
    MissingSetting(&'static str),
}

async fn select_backend(args: &Args) -> Result<BlobStores, StorageConfigErr> {
    match args.storage_backend {
        None => Err(StorageConfigErr::NoBackend),
        Some(BackendKind::Memory) => Ok(BlobStores::Memory(MemoryBlobStore::new())),
        Some(BackendKind::Local) => {
            let root = args.storage_root.clone().ok_or(StorageConfigErr::MissingSetting("STORAGE_ROOT"))?;
            Ok(BlobStores::Local(LocalBlobStore::new(root)))
        }
        Some(BackendKind::S3) => {
            let access_key = args.s3_access_key.clone().ok_or(StorageConfigErr::MissingSetting("AWS_ACCESS_KEY_ID"))?;
            let secret_key = args
                .s3_secret_key
                .clone()
                .ok_or(StorageConfigErr::MissingSetting("AWS_SECRET_ACCESS_KEY"))?;
            let store = S3BlobStore::connect(S3Settings {
                endpoint: args.s3_endpoint.clone(),
                region: args.s3_region.clone(),
                access_key,
                secret_key,
                public_base_url: args.public_base_url.clone(),
            })
            .await;
            Ok(BlobStores::S3(store))
        }
    }
}

/// Builds the process-wide relay once. A missing or incomplete backend is
/// logged loudly and yields a relay that fails every upload.
pub async fn build_relay(args: &Args) -> BlobRelay {
    match select_backend(args).await {
        Ok(store) => {
            tracing::info!("using {} storage, container {}", store.kind(), args.container);
            BlobRelay::new(store.into_shared(), args.container.clone())
        }
        Err(e) => {
            tracing::error!("storage is not configured: {}; uploads will fail", e);
            BlobRelay::unconfigured()
        }
    }
}
