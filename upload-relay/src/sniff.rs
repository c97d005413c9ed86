//! Magic-number content sniffing.

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Ordered hex prefixes of the formats we recognise.
const SIGNATURES: &[(&str, &str)] = &[
    ("ffd8ff", "image/jpeg"),
    ("89504e47", "image/png"),
    ("47494638", "image/gif"),
    ("424d", "image/bmp"),
    ("49492a00", "image/tiff"),
    ("4d4d002a", "image/tiff"),
    ("25504446", "application/pdf"),
];

/// Guesses a MIME type from the first 8 bytes of `buffer`, returning `fallback`
/// when nothing matches. Short and empty buffers simply don't match.
pub fn detect<'a>(buffer: &[u8], fallback: &'a str) -> &'a str {
    let head = hex::encode(&buffer[..buffer.len().min(8)]);
    for &(magic, mime) in SIGNATURES {
        if head.starts_with(magic) {
            return mime;
        }
    }
    fallback
}

/// A declared type carries no information when it's missing, blank or octet-stream.
pub fn is_generic(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence.is_empty() || essence.eq_ignore_ascii_case(OCTET_STREAM)
}

/// Keeps a meaningful declared type, otherwise sniffs the bytes.
pub fn resolve(declared: Option<&str>, buffer: &[u8]) -> String {
    match declared {
        Some(ct) if !is_generic(ct) => ct.trim().to_string(),
        _ => detect(buffer, OCTET_STREAM).to_string(),
    }
}
