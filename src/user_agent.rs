//! Shared User-Agent string for the HTTP-backed `Fs` implementation.

const PROJECT_UA_URL: &str = "https://github.com/example/crawl-engine";

/// Default User-Agent sent by [`crate::fs::HttpFs`].
#[must_use]
pub(crate) fn default_crawl_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("crawl-engine/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_crate_version() {
        let ua = default_crawl_user_agent();
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.contains(PROJECT_UA_URL));
    }
}
