//! Object naming: generated names and caller-supplied direct names.

use std::path::Path;

use chrono::Utc;
use rand::RngCore;

use crate::error::{UploadError, UploadResult};

const RANDOM_BYTES: usize = 6;

/// Returns `<yyyyMMddHHmmss>_<12 hex chars>[.ext]`.
///
/// The timestamp only sorts names; uniqueness comes from the random suffix.
pub fn generate(extension_hint: Option<&str>) -> String {
    let mut suffix = [0u8; RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut suffix);

    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let name = format!("{}_{}", stamp, hex::encode(suffix));
    match extension_hint.and_then(normalize_extension) {
        Some(ext) => format!("{}.{}", name, ext),
        None => name,
    }
}

/// Strips leading dots and lowercases. Anything that isn't plain ASCII
/// alphanumerics is dropped rather than embedded in an object name.
pub fn normalize_extension(hint: &str) -> Option<String> {
    let ext = hint.trim().trim_start_matches('.');
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Extension of an uploaded file's original name, e.g. `IMG_01.JPG` -> `jpg`.
pub fn extension_from_filename(filename: &str) -> Option<String> {
    let basename = filename.rsplit(['/', '\\']).next().unwrap_or("");
    Path::new(basename)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(normalize_extension)
}

/// `<id>_<timestamp>.<png|jpg>` for callers that pick their own identity.
///
/// Same id and timestamp means same name, so a repeat upload replaces the
/// earlier object.
pub fn direct_name(external_id: &str, timestamp: &str, content_type: &str) -> UploadResult<String> {
    let id = check_component(external_id)?;
    let ts = check_component(timestamp)?;
    let ext = if content_type == "image/png" { "png" } else { "jpg" };
    Ok(format!("{}_{}.{}", id, ts, ext))
}

fn check_component(value: &str) -> UploadResult<&str> {
    let value = value.trim();
    let bad = value.is_empty()
        || value.starts_with('.')
        || value.chars().any(|c| c == '/' || c == '\\' || c.is_control());
    if bad {
        return Err(UploadError::InvalidObjectName(value.to_string()));
    }
    Ok(value)
}
