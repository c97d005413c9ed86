use blob_store::StoreError;
use thiserror::Error;

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file was uploaded")]
    MissingFile,

    #[error("request carries neither data nor base64")]
    MissingPayload,

    #[error("payload could not be decoded: {0}")]
    Decode(String),

    #[error("payload is empty")]
    EmptyPayload,

    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("invalid object name component {0:?}")]
    InvalidObjectName(String),

    #[error("storage backend is not configured")]
    StorageUnconfigured,

    #[error("storage backend unavailable")]
    StorageUnavailable(#[from] StoreError),
}

impl UploadError {
    /// Short opaque reason safe to hand back to callers.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::MissingFile => "missing_file",
            UploadError::MissingPayload => "missing_payload",
            UploadError::Decode(_) => "decode_error",
            UploadError::EmptyPayload => "empty_payload",
            UploadError::PayloadTooLarge { .. } => "payload_too_large",
            UploadError::InvalidObjectName(_) => "invalid_name",
            UploadError::StorageUnconfigured | UploadError::StorageUnavailable(_) => "storage_error",
        }
    }

    /// True when the caller sent something wrong, as opposed to a storage failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, UploadError::StorageUnconfigured | UploadError::StorageUnavailable(_))
    }
}
