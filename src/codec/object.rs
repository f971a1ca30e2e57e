//! The `Object` artifact-serialization unit and its bit-exact wire format.
//!
//! ```text
//! | u64 LE len(type) | type bytes |
//! | u8 valueEncoding | u8 responseEncoding |
//! | u64 LE len(value) | value bytes |
//! | u64 LE len(response) | response bytes |
//! ```
//!
//! `valueEncoding` and `responseEncoding` independently select a
//! self-describing binary layout or JSON. The type is read first so a
//! reader can route without decoding either payload.

use serde::{Deserialize, Serialize};

use super::error::CodecError;
use super::error_wrapper::SerializableError;

/// Minimum permitted per-slice size cap (8 MiB).
pub const MIN_SIZE_CAP: u64 = 8 * 1024 * 1024;
/// Maximum permitted per-slice size cap (64 MiB).
pub const MAX_SIZE_CAP: u64 = 64 * 1024 * 1024;

/// Per-slice size cap guarding against corrupt or adversarial length
/// prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    size_cap: u64,
}

impl CodecConfig {
    /// Builds a config with `size_cap` clamped into `[MIN_SIZE_CAP,
    /// MAX_SIZE_CAP]`; out-of-range values are rejected rather than
    /// silently clamped.
    pub fn new(size_cap: u64) -> Result<Self, CodecError> {
        if !(MIN_SIZE_CAP..=MAX_SIZE_CAP).contains(&size_cap) {
            return Err(CodecError::InvalidSizeCap {
                cap: size_cap,
                min: MIN_SIZE_CAP,
                max: MAX_SIZE_CAP,
            });
        }
        Ok(Self { size_cap })
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { size_cap: MAX_SIZE_CAP }
    }
}

/// Selects how a value or response payload is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// A self-describing binary layout specific to the payload's type.
    Binary = 0,
    /// `serde_json`.
    Json = 1,
}

impl Encoding {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(Encoding::Binary),
            1 => Ok(Encoding::Json),
            other => Err(CodecError::UnknownEncoding(other)),
        }
    }
}

/// Metadata accompanying a downloaded artifact's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ObjectResponse {
    pub size: u64,
    pub retries: u32,
    pub error: Option<SerializableError>,
}

/// One artifact ready for (or read back from) durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub content_type: String,
    pub value: Vec<u8>,
    pub value_encoding: Encoding,
    pub response: ObjectResponse,
    pub response_encoding: Encoding,
}

impl Object {
    #[must_use]
    pub fn new(content_type: impl Into<String>, value: Vec<u8>, response: ObjectResponse) -> Self {
        Self {
            content_type: content_type.into(),
            value,
            value_encoding: Encoding::Binary,
            response,
            response_encoding: Encoding::Json,
        }
    }
}

/// Encodes `object` per the wire format, enforcing `config`'s size cap on
/// every length-prefixed slice.
pub fn encode(object: &Object, config: &CodecConfig) -> Result<Vec<u8>, CodecError> {
    let type_bytes = object.content_type.as_bytes();
    check_cap(type_bytes.len() as u64, config)?;

    let value_bytes = encode_value(&object.value, object.value_encoding)?;
    check_cap(value_bytes.len() as u64, config)?;

    let response_bytes = encode_response(&object.response, object.response_encoding)?;
    check_cap(response_bytes.len() as u64, config)?;

    let mut out = Vec::with_capacity(
        8 + type_bytes.len() + 2 + 8 + value_bytes.len() + 8 + response_bytes.len(),
    );
    out.extend_from_slice(&(type_bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(type_bytes);
    out.push(object.value_encoding.to_u8());
    out.push(object.response_encoding.to_u8());
    out.extend_from_slice(&(value_bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(&value_bytes);
    out.extend_from_slice(&(response_bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(&response_bytes);
    Ok(out)
}

/// Decodes an `Object` from `bytes`, enforcing `config`'s size cap before
/// any length-prefixed allocation.
pub fn decode(bytes: &[u8], config: &CodecConfig) -> Result<Object, CodecError> {
    let mut cursor = Cursor::new(bytes);

    let type_len = cursor.read_u64(config)?;
    let type_bytes = cursor.read_slice(type_len as usize)?;
    let content_type = std::str::from_utf8(type_bytes)?.to_string();

    let value_encoding = Encoding::from_u8(cursor.read_u8()?)?;
    let response_encoding = Encoding::from_u8(cursor.read_u8()?)?;

    let value_len = cursor.read_u64(config)?;
    let value_bytes = cursor.read_slice(value_len as usize)?;
    let value = decode_value(value_bytes, value_encoding)?;

    let response_len = cursor.read_u64(config)?;
    let response_bytes = cursor.read_slice(response_len as usize)?;
    let response = decode_response(response_bytes, response_encoding)?;

    Ok(Object {
        content_type,
        value,
        value_encoding,
        response,
        response_encoding,
    })
}

fn check_cap(len: u64, config: &CodecConfig) -> Result<(), CodecError> {
    if len > config.size_cap {
        return Err(CodecError::SizeCapExceeded { len, cap: config.size_cap });
    }
    Ok(())
}

fn encode_value(value: &[u8], encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    match encoding {
        Encoding::Binary => Ok(value.to_vec()),
        Encoding::Json => {
            let text = std::str::from_utf8(value)?;
            Ok(serde_json::to_vec(text)?)
        }
    }
}

fn decode_value(bytes: &[u8], encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    match encoding {
        Encoding::Binary => Ok(bytes.to_vec()),
        Encoding::Json => {
            let text: String = serde_json::from_slice(bytes)?;
            Ok(text.into_bytes())
        }
    }
}

fn encode_response(response: &ObjectResponse, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    match encoding {
        Encoding::Json => Ok(serde_json::to_vec(response)?),
        Encoding::Binary => {
            let mut out = Vec::new();
            out.extend_from_slice(&response.size.to_le_bytes());
            out.extend_from_slice(&response.retries.to_le_bytes());
            match &response.error {
                None => out.push(0),
                Some(err) => {
                    out.push(1);
                    let message = err.message.as_bytes();
                    out.extend_from_slice(&(message.len() as u64).to_le_bytes());
                    out.extend_from_slice(message);
                    match &err.kind {
                        None => out.push(0),
                        Some(kind) => {
                            out.push(1);
                            let kind = kind.as_bytes();
                            out.extend_from_slice(&(kind.len() as u64).to_le_bytes());
                            out.extend_from_slice(kind);
                        }
                    }
                }
            }
            Ok(out)
        }
    }
}

fn decode_response(bytes: &[u8], encoding: Encoding) -> Result<ObjectResponse, CodecError> {
    match encoding {
        Encoding::Json => Ok(serde_json::from_slice(bytes)?),
        Encoding::Binary => {
            let mut cursor = Cursor::new(bytes);
            let size = cursor.read_u64_unchecked()?;
            let retries = cursor.read_u32()?;
            let has_error = cursor.read_u8()?;
            let error = if has_error == 1 {
                let message_len = cursor.read_u64_unchecked()?;
                let message = std::str::from_utf8(cursor.read_slice(message_len as usize)?)?.to_string();
                let has_kind = cursor.read_u8()?;
                let kind = if has_kind == 1 {
                    let kind_len = cursor.read_u64_unchecked()?;
                    Some(std::str::from_utf8(cursor.read_slice(kind_len as usize)?)?.to_string())
                } else {
                    None
                };
                Some(SerializableError::new(message, kind))
            } else {
                None
            };
            Ok(ObjectResponse { size, retries, error })
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let available = self.bytes.len() - self.pos;
        if available < len {
            return Err(CodecError::Truncated { needed: len, available });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_slice(1)?[0])
    }

    #[allow(clippy::expect_used)]
    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let slice = self.read_slice(4)?;
        Ok(u32::from_le_bytes(slice.try_into().expect("length checked above")))
    }

    #[allow(clippy::expect_used)]
    fn read_u64_unchecked(&mut self) -> Result<u64, CodecError> {
        let slice = self.read_slice(8)?;
        Ok(u64::from_le_bytes(slice.try_into().expect("length checked above")))
    }

    fn read_u64(&mut self, config: &CodecConfig) -> Result<u64, CodecError> {
        let value = self.read_u64_unchecked()?;
        check_cap(value, config)?;
        Ok(value)
    }
}
