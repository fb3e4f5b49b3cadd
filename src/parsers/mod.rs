pub mod html;


use crate::results::CandidateLink;
use scraper::Html;

/// Result of scanning a page document
pub struct ParseResult {
    /// Page title (if available)
    pub title: Option<String>,
    /// `href` of the document's first `<base>` element
    pub base_href: Option<String>,
    /// Anchor-like elements in document order
    pub candidates: Vec<CandidateLink>,
}

/// Parses a page's HTML source into its title, base address and link candidates
pub fn parse(source: &str) -> ParseResult {
    let doc = Html::parse_document(source);
    ParseResult {
        title: html::title_of(&doc),
        base_href: html::base_href_of(&doc),
        candidates: html::candidates_of(&doc),
    }
}
