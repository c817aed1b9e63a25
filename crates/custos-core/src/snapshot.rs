//! Content snapshots embedded in the critical-file manifest.
//!
//! Text files are stored verbatim; anything that is not valid UTF-8 is stored
//! hex-encoded. The encoding tag is persisted alongside the snapshot so
//! repair never has to guess how to decode it.

use crate::error::{CustosError, Result};

pub const ENCODING_TEXT: &str = "text";
pub const ENCODING_HEX: &str = "hex";

/// Encode file contents for storage. Returns the stored form and its
/// encoding tag.
pub fn capture(bytes: &[u8]) -> (String, &'static str) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), ENCODING_TEXT),
        Err(_) => (hex::encode(bytes), ENCODING_HEX),
    }
}

/// Decode a stored snapshot back into the original raw bytes.
pub fn materialize(stored: &str, encoding: &str) -> Result<Vec<u8>> {
    match encoding {
        ENCODING_TEXT => Ok(stored.as_bytes().to_vec()),
        ENCODING_HEX => hex::decode(stored)
            .map_err(|e| CustosError::Other(format!("corrupt hex snapshot: {e}"))),
        other => Err(CustosError::Other(format!(
            "unknown snapshot encoding '{other}'"
        ))),
    }
}
