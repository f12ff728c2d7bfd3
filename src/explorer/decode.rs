//! Upstream content decoding.

use base64::Engine as _;
use bytes::Bytes;

use crate::forge::{UpstreamError, UpstreamFile};
use crate::model::FileContent;

/// Decode an upstream file payload.
///
/// A `base64` encoding tag means the content is base64 of the raw bytes,
/// wrapped at 60 columns by GitHub.  Any other tag, or none, means the content
/// is already text and is passed through untouched.
pub fn decode_file(raw: UpstreamFile) -> Result<FileContent, UpstreamError> {
    let bytes = match raw.encoding.as_deref() {
        Some(tag) if tag.eq_ignore_ascii_case("base64") => {
            let compact: Vec<u8> = raw
                .content
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map(Bytes::from)
                .map_err(|e| UpstreamError::Decode(format!("invalid base64 in {}: {e}", raw.path)))?
        }
        _ => Bytes::from(raw.content),
    };
    Ok(FileContent::from_bytes(raw.path, bytes))
}
