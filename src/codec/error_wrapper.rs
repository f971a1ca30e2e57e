//! Process-wide error-kind registry.
//!
//! The one piece of global mutable state the engine's concurrency model
//! permits: a one-time registration of human-readable descriptions for the
//! `kind` tags a [`SerializableError`] can carry, consulted by logging and
//! diagnostics but never required to decode an `Object`.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::fs::FsError;

static ERROR_KIND_REGISTRY: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

/// Initializes (idempotently) the process-wide error-kind registry.
///
/// Safe to call more than once or concurrently; only the first call's
/// contents take effect.
pub fn init_error_kind_registry() {
    ERROR_KIND_REGISTRY.get_or_init(default_registry);
}

fn default_registry() -> HashMap<&'static str, &'static str> {
    let mut m = HashMap::new();
    m.insert("not_exist", "object not found");
    m.insert("retryable", "transient fs error");
    m.insert("permission", "permission denied");
    m.insert("cancelled", "operation cancelled");
    m.insert("other", "unspecified fs error");
    m
}

/// Looks up the human-readable description for `kind`, registering the
/// default table on first use if it hasn't been already.
#[must_use]
pub fn describe_kind(kind: &str) -> Option<&'static str> {
    ERROR_KIND_REGISTRY.get_or_init(default_registry).get(kind).copied()
}

/// A serializable stand-in for a terminal error, carried inside an
/// [`super::ObjectResponse`] since the concrete `FsError`/`DownloaderError`
/// types aren't themselves `Serialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableError {
    pub message: String,
    pub kind: Option<String>,
}

impl SerializableError {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: Option<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl From<&FsError> for SerializableError {
    fn from(err: &FsError) -> Self {
        let kind = if err.is_not_exist() {
            "not_exist"
        } else if err.is_retryable() {
            "retryable"
        } else if err.is_cancelled() {
            "cancelled"
        } else {
            "other"
        };
        Self {
            message: err.to_string(),
            kind: Some(kind.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_describes_known_kinds() {
        init_error_kind_registry();
        assert_eq!(describe_kind("not_exist"), Some("object not found"));
        assert_eq!(describe_kind("no-such-kind"), None);
    }

    #[test]
    fn fs_error_conversion_tags_not_exist() {
        let err = FsError::NotExist { path: "x".to_string() };
        let wrapped = SerializableError::from(&err);
        assert_eq!(wrapped.kind.as_deref(), Some("not_exist"));
    }
}
