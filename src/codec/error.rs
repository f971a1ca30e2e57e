//! Errors surfaced by the object codec.

use thiserror::Error;

/// Errors encoding or decoding an [`super::Object`] can surface.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("slice of length {len} exceeds the configured size cap of {cap} bytes")]
    SizeCapExceeded { len: u64, cap: u64 },

    #[error("truncated object: expected at least {needed} more bytes, found {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown encoding tag {0}")]
    UnknownEncoding(u8),

    #[error("value bytes were not valid UTF-8 for JSON encoding: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("size cap {cap} outside the allowed [{min}, {max}] range")]
    InvalidSizeCap { cap: u64, min: u64, max: u64 },
}
