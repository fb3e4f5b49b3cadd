use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for discarding anchors that cannot point at a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkFilterConfig {
    /// Address prefixes that never lead to a document (compared case-insensitively)
    #[serde(default = "default_ignored_prefixes")]
    pub ignored_prefixes: Vec<String>,

    /// Whether a bare `#` placeholder anchor is discarded
    #[serde(default = "default_ignore_placeholder")]
    pub ignore_placeholder: bool,
}

fn default_ignored_prefixes() -> Vec<String> {
    vec!["javascript:".to_string()]
}

fn default_ignore_placeholder() -> bool {
    true
}

impl Default for LinkFilterConfig {
    fn default() -> Self {
        Self {
            ignored_prefixes: default_ignored_prefixes(),
            ignore_placeholder: default_ignore_placeholder(),
        }
    }
}

/// Decides which raw anchors are worth classifying and turns them into
/// absolute addresses
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    config: LinkFilterConfig,
}

impl LinkFilter {
    pub fn new(config: LinkFilterConfig) -> Self {
        Self { config }
    }

    /// Reject empty addresses, placeholder anchors and script pseudo-addresses
    pub fn accept_href(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return false;
        }

        if self.config.ignore_placeholder && trimmed == "#" {
            return false;
        }

        let lower = trimmed.to_lowercase();
        !self
            .config
            .ignored_prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
    }

    /// Resolve an accepted href against the page address
    pub fn resolve(&self, base: &Url, raw: &str) -> Option<Url> {
        if !self.accept_href(raw) {
            return None;
        }

        match base.join(raw.trim()) {
            Ok(url) => Some(url),
            Err(e) => {
                ::log::debug!("Dropping unresolvable link {:?}: {}", raw, e);
                None
            }
        }
    }
}
