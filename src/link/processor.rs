//! Implements the NoFollow/Follow/Rewrite link-processing contract.
//!
//! Grounded in the teacher's `resolver::utils` regex helpers (compile once,
//! reuse) and its `parser::url` normalization pass; the `s/pattern/replace/`
//! rewrite syntax itself has no teacher precedent and is modeled directly on
//! `sed`'s substitution command, the closest idiomatic fit for a
//! user-authored rewrite rule.

use regex::Regex;
use thiserror::Error;

/// Errors raised while compiling a [`LinkProcessor`].
#[derive(Debug, Error)]
pub enum LinkRuleError {
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rewrite rule {rule:?} is not of the form s<delim>pattern<delim>replacement<delim>")]
    MalformedRewrite { rule: String },
}

/// One compiled `s<delim>pattern<delim>replacement<delim>` rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    /// Parses a rule using `sed`'s `s` substitution syntax. The character
    /// immediately after `s` is taken as the delimiter, so patterns and
    /// replacements containing `/` can use e.g. `s%...%...%`.
    pub fn parse(rule: &str) -> Result<Self, LinkRuleError> {
        let mut chars = rule.chars();
        if chars.next() != Some('s') {
            return Err(LinkRuleError::MalformedRewrite { rule: rule.to_string() });
        }
        let delim = chars.next().ok_or_else(|| LinkRuleError::MalformedRewrite { rule: rule.to_string() })?;
        let rest: String = chars.collect();
        let parts: Vec<&str> = rest.splitn(3, delim).collect();
        // A trailing delimiter yields an empty third element (`pattern/repl/`);
        // a missing one yields only two parts, which is still malformed.
        let [pattern, replacement] = match parts.as_slice() {
            [pattern, replacement, _tail] => [*pattern, *replacement],
            _ => return Err(LinkRuleError::MalformedRewrite { rule: rule.to_string() }),
        };

        let pattern = Regex::new(pattern).map_err(|source| LinkRuleError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            replacement: replacement.to_string(),
        })
    }

    fn apply(&self, link: &str) -> String {
        self.pattern.replace(link, self.replacement.as_str()).into_owned()
    }
}

/// A compiled NoFollow/Follow/Rewrite rule bundle.
///
/// `process` maps one candidate link to zero or more surviving, possibly
/// rewritten links, per §4.4's contract.
#[derive(Debug, Clone, Default)]
pub struct LinkProcessor {
    no_follow: Vec<Regex>,
    follow: Vec<Regex>,
    rewrite: Vec<RewriteRule>,
    passthrough: bool,
}

impl LinkProcessor {
    /// Builds a processor from raw `NoFollow`/`Follow` regex strings and
    /// `Rewrite` rule strings.
    pub fn new(no_follow: &[String], follow: &[String], rewrite: &[String]) -> Result<Self, LinkRuleError> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, LinkRuleError> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|source| LinkRuleError::InvalidPattern {
                        pattern: p.clone(),
                        source,
                    })
                })
                .collect()
        };
        Ok(Self {
            no_follow: compile(no_follow)?,
            follow: compile(follow)?,
            rewrite: rewrite.iter().map(|r| RewriteRule::parse(r)).collect::<Result<_, _>>()?,
            passthrough: false,
        })
    }

    /// A processor that performs no filtering or rewriting; every candidate
    /// (after fragment trimming) passes through unchanged.
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            no_follow: Vec::new(),
            follow: Vec::new(),
            rewrite: Vec::new(),
            passthrough: true,
        }
    }

    /// Runs one candidate link through the contract, returning the links it
    /// expands to (zero if dropped).
    #[must_use]
    pub fn process(&self, link: &str) -> Vec<String> {
        if link.starts_with('#') {
            return Vec::new();
        }
        let trimmed = trim_fragment(link);
        if self.passthrough {
            return vec![trimmed.to_string()];
        }

        let no_follow_hit = self.no_follow.iter().any(|p| p.is_match(trimmed));
        let follow_hit = self.follow.iter().any(|p| p.is_match(trimmed));
        if no_follow_hit && !follow_hit {
            return Vec::new();
        }

        if self.rewrite.is_empty() {
            return vec![trimmed.to_string()];
        }
        self.rewrite.iter().map(|rule| rule.apply(trimmed)).collect()
    }
}

/// Trims a trailing `#...` or `%23...` fragment, if present.
fn trim_fragment(link: &str) -> &str {
    let link = match link.find('#') {
        Some(idx) => &link[..idx],
        None => link,
    };
    match link.find("%23") {
        Some(idx) => &link[..idx],
        None => link,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn drops_links_starting_with_hash() {
        let p = LinkProcessor::passthrough();
        assert!(p.process("#top").is_empty());
    }

    #[test]
    fn trims_trailing_fragment_variants() {
        let p = LinkProcessor::passthrough();
        assert_eq!(p.process("https://x.com/page#section"), vec!["https://x.com/page"]);
        assert_eq!(p.process("https://x.com/page%23section"), vec!["https://x.com/page"]);
    }

    #[test]
    fn no_follow_without_matching_follow_drops_link() {
        let p = LinkProcessor::new(&["^http://".to_string()], &[], &[]).unwrap();
        assert!(p.process("http://insecure.example").is_empty());
        assert_eq!(p.process("https://secure.example"), vec!["https://secure.example"]);
    }

    #[test]
    fn follow_overrides_no_follow() {
        let p = LinkProcessor::new(
            &["^http://".to_string()],
            &["^http://allow.me/".to_string()],
            &[],
        )
        .unwrap();
        assert_eq!(
            p.process("http://allow.me/ok"),
            vec!["http://allow.me/ok"]
        );
        assert!(p.process("http://other.example").is_empty());
    }

    #[test]
    fn rewrite_rules_reorder_path_segments() {
        let p = LinkProcessor::new(
            &["^http://".to_string(), "^https://".to_string()],
            &["https://allow.me/".to_string()],
            &["s%^(https://allow.me)/(.*?)/(.*)%$1/$3/$2%".to_string()],
        )
        .unwrap();
        let inputs = ["http://g.com/", "https://y.com", "https://allow.me/one/two/three"];
        let outputs: Vec<String> = inputs.iter().flat_map(|link| p.process(link)).collect();
        assert_eq!(outputs, vec!["https://allow.me/two/three/one"]);
    }

    #[test]
    fn multiple_rewrites_all_emit() {
        let p = LinkProcessor::new(
            &[],
            &[],
            &[
                "s/a/x/".to_string(),
                "s/a/y/".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(p.process("a"), vec!["x", "y"]);
    }

    #[test]
    fn malformed_rewrite_rejected() {
        assert!(RewriteRule::parse("not-a-rule").is_err());
        assert!(RewriteRule::parse("s/only-one-part").is_err());
    }
}
