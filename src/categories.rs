use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of legal/trust document a link points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    /// Privacy policy
    Privacy,
    /// Terms of service / conditions of use
    Terms,
    /// Cookie policy
    Cookies,
    /// Legal notice / imprint
    Legal,
    /// Anything else that still looks like a policy document
    Other,
}

impl DocumentCategory {
    /// Categories in the order they are tested; the first match wins
    pub const DETECTION_ORDER: [DocumentCategory; 4] = [
        DocumentCategory::Privacy,
        DocumentCategory::Terms,
        DocumentCategory::Cookies,
        DocumentCategory::Legal,
    ];

    /// Sort rank, lower sorts first
    pub fn priority(self) -> u8 {
        match self {
            DocumentCategory::Privacy => 1,
            DocumentCategory::Terms => 2,
            DocumentCategory::Cookies => 3,
            DocumentCategory::Legal => 4,
            DocumentCategory::Other => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentCategory::Privacy => "Privacy Policy",
            DocumentCategory::Terms => "Terms of Service",
            DocumentCategory::Cookies => "Cookie Policy",
            DocumentCategory::Legal => "Legal Notice",
            DocumentCategory::Other => "Other Policy",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            DocumentCategory::Privacy => "🔒",
            DocumentCategory::Terms => "📜",
            DocumentCategory::Cookies => "🍪",
            DocumentCategory::Legal => "⚖️",
            DocumentCategory::Other => "📄",
        }
    }

    /// Lowercase substrings looked for in the link's target address
    pub fn url_keywords(self) -> &'static [&'static str] {
        match self {
            DocumentCategory::Privacy => {
                &["privacy", "confidentialite", "datenschutz", "gdpr", "rgpd"]
            }
            DocumentCategory::Terms => &["terms", "conditions", "cgu", "cgv", "eula"],
            DocumentCategory::Cookies => &["cookie"],
            DocumentCategory::Legal => &["legal", "mentions-legales", "imprint", "impressum"],
            DocumentCategory::Other => &[],
        }
    }

    /// Lowercase substrings looked for in the link's visible label
    pub fn text_keywords(self) -> &'static [&'static str] {
        match self {
            DocumentCategory::Privacy => &[
                "privacy",
                "confidentialité",
                "données personnelles",
                "data protection",
                "datenschutz",
            ],
            DocumentCategory::Terms => &[
                "terms",
                "conditions",
                "cgu",
                "cgv",
                "conditions d'utilisation",
            ],
            DocumentCategory::Cookies => &["cookie"],
            DocumentCategory::Legal => &[
                "legal",
                "légal",
                "mentions légales",
                "imprint",
                "impressum",
            ],
            DocumentCategory::Other => &[],
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon(), self.label())
    }
}
