use crate::results::CandidateLink;
use crate::utils::normalize_whitespace;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a, area").expect("Anchor selector should be valid"));

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("Title selector should be valid"));

static BASE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("Base selector should be valid"));

/// Enumerates anchor-like elements in document order
///
/// Elements without an `href` are reported with an empty address so the
/// caller's filter sees every anchor the page has.
pub fn extract_candidates(html: &str) -> Vec<CandidateLink> {
    candidates_of(&Html::parse_document(html))
}

pub(crate) fn candidates_of(doc: &Html) -> Vec<CandidateLink> {
    let candidates = doc
        .select(&ANCHOR_SELECTOR)
        .map(|element| {
            let href = element.value().attr("href").unwrap_or_default();
            // text nodes concatenate as-is, like the DOM's textContent
            let text = element.text().collect::<String>();
            let label = if text.trim().is_empty() {
                // image maps and icon links only carry alt/title text
                element
                    .value()
                    .attr("alt")
                    .or_else(|| element.value().attr("title"))
                    .unwrap_or_default()
                    .to_string()
            } else {
                text
            };
            CandidateLink::new(href, normalize_whitespace(&label))
        })
        .collect::<Vec<_>>();

    ::log::debug!("HTML parser found {} anchors", candidates.len());
    if !candidates.is_empty() {
        ::log::trace!(
            "First few anchors: {:?}",
            candidates
                .iter()
                .take(5)
                .map(|c| c.target_address.as_str())
                .collect::<Vec<_>>()
        );
    }

    candidates
}

/// Page title, if the document has a non-empty one
pub fn extract_title(html: &str) -> Option<String> {
    title_of(&Html::parse_document(html))
}

pub(crate) fn title_of(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SELECTOR)
        .next()
        .map(|t| normalize_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Address relative links resolve against, when the document declares one
pub(crate) fn base_href_of(doc: &Html) -> Option<String> {
    doc.select(&BASE_SELECTOR)
        .next()
        .and_then(|base| base.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
}
