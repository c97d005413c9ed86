//! Shared pieces of the ingestion adapters: size limits and the base64-JSON shape.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::error::{UploadError, UploadResult};
use crate::naming;
use crate::relay::UploadRequest;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Room left for multipart framing, form fields or a data-URI prefix on top
/// of the payload itself.
pub const ENVELOPE_ALLOWANCE: usize = 64 * 1024;

/// Counts streamed bytes and trips as soon as the limit is crossed, so an
/// oversized body is never fully buffered.
#[derive(Debug, Clone, Copy)]
pub struct SizeGuard {
    limit: usize,
    seen: usize,
}

impl SizeGuard {
    pub fn new(limit: usize) -> Self {
        Self { limit, seen: 0 }
    }

    pub fn add(&mut self, len: usize) -> UploadResult<()> {
        self.seen = self.seen.saturating_add(len);
        if self.seen > self.limit {
            return Err(UploadError::PayloadTooLarge { limit: self.limit });
        }
        Ok(())
    }
}

/// Largest request body worth reading for a given decoded limit.
pub fn encoded_body_limit(max_bytes: usize) -> usize {
    max_bytes.div_ceil(3).saturating_mul(4).saturating_add(ENVELOPE_ALLOWANCE)
}

/// Splits `data:<mime>[;param=value]*;base64,<payload>` into the mime essence
/// and the payload. Media-type parameters such as `charset` are dropped.
pub fn parse_data_uri(value: &str) -> Option<(&str, &str)> {
    let rest = value.trim_start().strip_prefix("data:")?;
    let (media_type, payload) = rest.rsplit_once(";base64,")?;
    let mime = media_type.split(';').next().unwrap_or_default().trim();
    if mime.is_empty() || media_type.contains(',') || payload.is_empty() {
        return None;
    }
    Some((mime, payload))
}

/// Normalizes a `{filename?, data?, base64?}` body into an upload request.
///
/// A non-blank `data` wins over `base64`; a blank one counts as absent. A
/// `data` value that isn't a data URI is treated as bare base64.
pub fn decode_base64_upload(
    filename: Option<&str>,
    data: Option<&str>,
    base64: Option<&str>,
    max_bytes: usize,
) -> UploadResult<UploadRequest> {
    let data = data.filter(|d| !d.trim().is_empty());
    let (declared, encoded) = match (data, base64) {
        (Some(data), _) => match parse_data_uri(data) {
            Some((mime, payload)) => (Some(mime), payload),
            None => (None, data),
        },
        (None, Some(raw)) => (None, raw),
        (None, None) => return Err(UploadError::MissingPayload),
    };

    if encoded.len() > encoded_body_limit(max_bytes) {
        return Err(UploadError::PayloadTooLarge { limit: max_bytes });
    }

    let compact: Vec<u8> = encoded.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let buffer = STANDARD
        .decode(&compact)
        .map_err(|e| UploadError::Decode(e.to_string()))?;
    if buffer.is_empty() {
        return Err(UploadError::Decode("decoded payload is empty".to_string()));
    }
    if buffer.len() > max_bytes {
        return Err(UploadError::PayloadTooLarge { limit: max_bytes });
    }

    let extension_hint = filename.and_then(naming::extension_from_filename);
    Ok(UploadRequest::new(Bytes::from(buffer), declared, extension_hint))
}
