use crate::categories::DocumentCategory;
use crate::results::{CandidateLink, ClassifiedLink, LINK_TEXT_EXCERPT_LEN};
use crate::utils::excerpt;
use regex::Regex;
use std::sync::LazyLock;

/// Broad keyword set that keeps an `Other` link in the results
static GENERIC_POLICY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)policy|privacy|terms|cookie|legal|conditions")
        .expect("Generic policy pattern should be valid")
});

/// Decides the document category of a link from its address and label.
///
/// Both inputs are lowercased. A category matches when its address keywords
/// occur in the address or its text keywords occur in the label; categories
/// are tried in [`DocumentCategory::DETECTION_ORDER`] and the first match
/// wins. Links matching nothing are `Other`.
pub fn classify(target_address: &str, visible_text: &str) -> DocumentCategory {
    let address = target_address.to_lowercase();
    let text = visible_text.to_lowercase();

    DocumentCategory::DETECTION_ORDER
        .into_iter()
        .find(|category| {
            category.url_keywords().iter().any(|k| address.contains(k))
                || category.text_keywords().iter().any(|k| text.contains(k))
        })
        .unwrap_or(DocumentCategory::Other)
}

/// Whether an address or label mentions anything policy-like at all
pub fn is_relevant(target_address: &str, visible_text: &str) -> bool {
    GENERIC_POLICY_PATTERN.is_match(target_address) || GENERIC_POLICY_PATTERN.is_match(visible_text)
}

/// Classify an already-resolved candidate, dropping unrelated `Other` links
pub fn classify_candidate(candidate: &CandidateLink) -> Option<ClassifiedLink> {
    let category = classify(&candidate.target_address, &candidate.visible_text);

    if category == DocumentCategory::Other
        && !is_relevant(&candidate.target_address, &candidate.visible_text)
    {
        ::log::trace!("Not a policy link: {}", candidate.target_address);
        return None;
    }

    Some(ClassifiedLink {
        url: candidate.target_address.clone(),
        category,
        link_text_excerpt: excerpt(&candidate.visible_text, LINK_TEXT_EXCERPT_LEN),
    })
}
