//! Image encoding: raster figure bytes → base64 `ImageData` for a vision call,
//! and base64 text for the JSON digest.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Base64 text of `bytes` (standard alphabet, padded).
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Wrap a resolved figure as a vision attachment.
///
/// `detail: "high"` keeps axis labels and small boxes legible to
/// GPT-4-class models.
pub fn encode_figure(bytes: &[u8], mime_type: &str) -> ImageData {
    let b64 = to_base64(bytes);
    debug!("Encoded figure → {} bytes base64 ({mime_type})", b64.len());
    ImageData::new(b64, mime_type).with_detail("high")
}
