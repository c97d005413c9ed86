//! The upload pipeline: sniff the bytes, name the blob, make sure the
//! container exists and write the whole buffer once.

pub mod error;
pub mod ingest;
pub mod naming;
pub mod provision;
pub mod relay;
pub mod sniff;

pub use error::{UploadError, UploadResult};
pub use provision::{Container, ContainerProvisioner};
pub use relay::{BlobRelay, Correlation, StoredObjectDescriptor, UploadRequest};
