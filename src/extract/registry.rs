//! Content-type keyed handler registry and the crate's one built-in handler.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

/// Extracts candidate outlink strings from one artifact's bytes.
///
/// Implementors do not filter or normalize candidates; that's the
/// [`crate::link::LinkProcessor`]'s job.
pub trait LinkHandler: Send + Sync {
    /// Returns every candidate link string found in `bytes`.
    fn extract(&self, bytes: &[u8]) -> Vec<String>;
}

/// Scrapes `href="..."` and `src="..."` attribute values out of HTML bytes.
///
/// A minimal, dependency-light stand-in for a real HTML parser: good enough
/// to exercise the extractor pool end-to-end, not a spec-compliant HTML5
/// tokenizer.
pub struct HtmlLinkHandler {
    attr_pattern: Regex,
}

impl HtmlLinkHandler {
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self {
            // Matches href="..." / href='...' / src="..." / src='...',
            // case-insensitively, tolerating attribute whitespace.
            attr_pattern: Regex::new(r#"(?i)(?:href|src)\s*=\s*["']([^"']+)["']"#)
                .expect("static pattern is valid"),
        }
    }
}

impl Default for HtmlLinkHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkHandler for HtmlLinkHandler {
    fn extract(&self, bytes: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(bytes);
        self.attr_pattern
            .captures_iter(&text)
            .map(|c| c[1].to_string())
            .collect()
    }
}

/// Maps normalized content-type strings to the handler that extracts links
/// from them.
///
/// Content types are normalized by trimming whitespace around any `;`
/// parameter separator (`text/html; charset=utf-8` → `text/html`), per
/// §4.5's lookup contract.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn LinkHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `content_type`, replacing any prior entry.
    pub fn register(&mut self, content_type: impl Into<String>, handler: Arc<dyn LinkHandler>) {
        self.handlers.insert(normalize_content_type(&content_type.into()), handler);
    }

    /// Looks up the handler for `content_type`, if any.
    #[must_use]
    pub fn lookup(&self, content_type: &str) -> Option<Arc<dyn LinkHandler>> {
        self.handlers.get(&normalize_content_type(content_type)).cloned()
    }
}

/// Trims whitespace around the leading `;`-delimited segment of a MIME type.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_handler_extracts_href_and_src() {
        let handler = HtmlLinkHandler::new();
        let html = br#"<a href="https://a.example/one">x</a><img src='./two.png'>"#;
        assert_eq!(
            handler.extract(html),
            vec!["https://a.example/one".to_string(), "./two.png".to_string()]
        );
    }

    #[test]
    fn registry_normalizes_content_type_parameters() {
        let mut registry = HandlerRegistry::new();
        registry.register("text/html", Arc::new(HtmlLinkHandler::new()));
        assert!(registry.lookup("text/html; charset=utf-8").is_some());
        assert!(registry.lookup("TEXT/HTML").is_some());
        assert!(registry.lookup("application/json").is_none());
    }
}
