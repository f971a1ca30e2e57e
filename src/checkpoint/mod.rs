//! Numeric-sequence checkpoint store on top of an abstract object
//! filesystem.

mod store;

pub use store::{CheckpointError, CheckpointStore};
