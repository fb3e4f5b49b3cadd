use crate::categories::DocumentCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier the host assigns to a browsing tab
pub type TabId = i64;

/// Maximum number of characters kept from a link's visible text
pub const LINK_TEXT_EXCERPT_LEN: usize = 50;

/// A link found while scanning a page, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    /// Raw target address as written in the document
    pub target_address: String,

    /// Whitespace-normalized text content of the element
    pub visible_text: String,
}

impl CandidateLink {
    pub fn new(target_address: impl Into<String>, visible_text: impl Into<String>) -> Self {
        Self {
            target_address: target_address.into(),
            visible_text: visible_text.into(),
        }
    }
}

/// A link that survived filtering, with its document category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedLink {
    /// Absolute address of the document
    pub url: String,

    pub category: DocumentCategory,

    /// First characters of the visible label
    pub link_text_excerpt: String,
}

/// Ordered outcome of one detection pass
///
/// Entries are unique by `url` and sorted by category priority; links of
/// the same category keep the order they had in the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionResult {
    links: Vec<ClassifiedLink>,
}

impl DetectionResult {
    /// Builds a result from links already in scan order. Later duplicates
    /// of an address are dropped and the rest stably sorted by priority.
    pub fn from_scan_order(links: impl IntoIterator<Item = ClassifiedLink>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut unique: Vec<ClassifiedLink> = links
            .into_iter()
            .filter(|link| seen.insert(link.url.clone()))
            .collect();

        // sort_by_key is stable
        unique.sort_by_key(|link| link.category.priority());

        Self { links: unique }
    }

    pub fn links(&self) -> &[ClassifiedLink] {
        &self.links
    }

    /// Addresses in result order
    pub fn urls(&self) -> Vec<String> {
        self.links.iter().map(|link| link.url.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Most recent link set reported for a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabEntry {
    pub tab_id: TabId,
    pub urls: Vec<String>,
}

/// The last analysis outcome, shared by every tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSummary {
    /// Summary text from the service, or the offline fallback
    #[serde(rename = "policySummary")]
    pub summary: String,

    /// When the analysis finished (RFC 3339)
    #[serde(rename = "lastUpdate")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "policyUrls", default)]
    pub urls: Vec<String>,

    /// Description of the failure that produced an offline summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PersistedSummary {
    /// A summary produced by the service; clears any previous error
    pub fn analyzed(summary: String, urls: Vec<String>) -> Self {
        Self {
            summary,
            timestamp: Utc::now(),
            urls,
            error: None,
        }
    }

    /// A locally synthesized summary recorded together with the failure
    pub fn offline(summary: String, urls: Vec<String>, error: String) -> Self {
        Self {
            summary,
            timestamp: Utc::now(),
            urls,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str, category: DocumentCategory) -> ClassifiedLink {
        ClassifiedLink {
            url: url.to_string(),
            category,
            link_text_excerpt: String::new(),
        }
    }

    #[test]
    fn test_from_scan_order_dedups_first_wins() {
        let result = DetectionResult::from_scan_order(vec![
            link("https://a.test/terms", DocumentCategory::Terms),
            link("https://a.test/terms", DocumentCategory::Other),
        ]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.links()[0].category, DocumentCategory::Terms);
    }

    #[test]
    fn test_from_scan_order_is_stable_by_priority() {
        let result = DetectionResult::from_scan_order(vec![
            link("https://a.test/legal", DocumentCategory::Legal),
            link("https://a.test/terms-b", DocumentCategory::Terms),
            link("https://a.test/privacy", DocumentCategory::Privacy),
            link("https://a.test/terms-a", DocumentCategory::Terms),
        ]);
        assert_eq!(
            result.urls(),
            vec![
                "https://a.test/privacy",
                "https://a.test/terms-b",
                "https://a.test/terms-a",
                "https://a.test/legal",
            ]
        );
    }

    #[test]
    fn test_persisted_summary_storage_keys() {
        let summary = PersistedSummary::analyzed("X".to_string(), vec!["a".to_string()]);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["policySummary"], "X");
        assert_eq!(value["policyUrls"][0], "a");
        assert!(value["lastUpdate"].is_string());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_classified_link_json_shape() {
        let value = serde_json::to_value(link("https://a.test/p", DocumentCategory::Privacy)).unwrap();
        assert_eq!(value["category"], "privacy");
        assert_eq!(value["linkTextExcerpt"], "");
    }
}
