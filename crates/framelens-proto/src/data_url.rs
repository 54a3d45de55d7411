//! Helpers for `data:image/...;base64,` payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Drop a leading `data:image/<subtype>;base64,` marker, if any.
pub fn strip_prefix(payload: &str) -> &str {
    let Some(rest) = payload.strip_prefix("data:image/") else {
        return payload;
    };
    match rest.split_once(";base64,") {
        Some((subtype, data))
            if !subtype.is_empty()
                && subtype.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            data
        }
        _ => payload,
    }
}

/// Bare base64 of the given bytes.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// JPEG bytes as a data URL.
pub fn encode_jpeg(bytes: &[u8]) -> String {
    format!("{JPEG_DATA_URL_PREFIX}{}", encode(bytes))
}

/// Decode a data URL or bare base64 string.
pub fn decode(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(strip_prefix(payload))
}
