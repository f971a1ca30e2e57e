//! Errors surfaced by the sync and async content stores.

use std::fmt;

use crate::fs::FsError;

/// Errors a content store can surface.
#[derive(Debug)]
pub enum ContentStoreError {
    /// The underlying `Fs` reported an error.
    Fs(FsError),

    /// `write` was called after `finish` had already closed the queue.
    Closed,

    /// The operation's `CancellationToken` was cancelled.
    Cancelled,

    /// A worker task panicked or was otherwise lost.
    Join(String),

    /// Aggregates more than one worker's error from `finish`.
    Multi(Vec<ContentStoreError>),
}

impl From<FsError> for ContentStoreError {
    fn from(err: FsError) -> Self {
        if err.is_cancelled() {
            ContentStoreError::Cancelled
        } else {
            ContentStoreError::Fs(err)
        }
    }
}

impl fmt::Display for ContentStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentStoreError::Fs(source) => write!(f, "content store fs error: {source}"),
            ContentStoreError::Closed => write!(f, "content store queue is closed"),
            ContentStoreError::Cancelled => write!(f, "content store operation was cancelled"),
            ContentStoreError::Join(msg) => write!(f, "content store worker failed: {msg}"),
            ContentStoreError::Multi(errors) => {
                write!(f, "{} content store worker(s) failed: ", errors.len())?;
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ContentStoreError {}
