//! Whole-blob storage backends addressed by container and name.

pub mod local_store;
pub mod memory_store;
pub mod s3_store;
pub mod store;

pub use local_store::LocalBlobStore;
pub use memory_store::MemoryBlobStore;
pub use s3_store::{S3BlobStore, S3Settings};
pub use store::{BlobStore, BlobStores, Provisioned, StoreError, StoreResult, StoredBlob};
