//! Wire encoding for `Object`, the unit persisted to and read back from
//! content storage and checkpoints.

mod error;
mod error_wrapper;
mod object;

pub use error::CodecError;
pub use error_wrapper::{describe_kind, init_error_kind_registry, SerializableError};
pub use object::{decode, encode, CodecConfig, Encoding, Object, ObjectResponse, MAX_SIZE_CAP, MIN_SIZE_CAP};
