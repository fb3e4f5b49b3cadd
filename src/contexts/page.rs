//! Detection orchestrator running inside a page.

use crate::classifier::classify_candidate;
use crate::contexts::background::BackgroundHandle;
use crate::error::HostError;
use crate::filter::LinkFilter;
use crate::messages::{Envelope, RuntimeMessage, RuntimeResponse};
use crate::parsers;
use crate::results::{CandidateLink, DetectionResult, TabId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

/// Loading state of a page document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// What the page context can see of its document at a point in time
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub ready_state: ReadyState,
    pub html: String,
}

impl PageSnapshot {
    pub fn loading() -> Self {
        Self {
            ready_state: ReadyState::Loading,
            html: String::new(),
        }
    }

    pub fn complete(html: impl Into<String>) -> Self {
        Self {
            ready_state: ReadyState::Complete,
            html: html.into(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.ready_state != ReadyState::Loading
    }
}

/// Runs one detection pass over a document.
///
/// Anchors are enumerated in document order, placeholder and script
/// addresses dropped, the rest resolved against the document base (a
/// declared `<base href>`, else `page_url`) and classified.
/// Unrelated `Other` links are discarded, duplicates collapse onto their
/// first occurrence and the survivors are stably sorted by priority.
pub fn detect(html: &str, page_url: &Url, filter: &LinkFilter) -> DetectionResult {
    let parsed = parsers::parse(html);
    let base = document_base(page_url, parsed.base_href.as_deref());

    let classified = parsed
        .candidates
        .into_iter()
        .filter_map(|candidate| {
            let resolved = filter.resolve(&base, &candidate.target_address)?;
            classify_candidate(&CandidateLink::new(resolved, candidate.visible_text))
        });

    DetectionResult::from_scan_order(classified)
}

fn document_base(page_url: &Url, base_href: Option<&str>) -> Url {
    match base_href.map(|href| page_url.join(href)) {
        Some(Ok(base)) => base,
        Some(Err(e)) => {
            ::log::debug!("Ignoring unusable <base href>: {}", e);
            page_url.clone()
        }
        None => page_url.clone(),
    }
}

/// Control side of a resident page context
#[derive(Debug, Clone)]
pub struct PageHandle {
    tab_id: TabId,
    tx: mpsc::Sender<Envelope>,
}

impl PageHandle {
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// False once the page context has stopped listening
    pub fn is_resident(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Send a control request and wait for the page's reply
    pub async fn request(&self, message: RuntimeMessage) -> Result<RuntimeResponse, HostError> {
        let (envelope, reply) = Envelope::request(message);
        self.tx
            .send(envelope)
            .await
            .map_err(|_| HostError::NoReceiver(self.tab_id))?;
        reply.await.map_err(|_| HostError::PortClosed)
    }
}

/// Scanner resident in one tab's page
pub struct PageContext {
    tab_id: TabId,
    page_url: Url,
    snapshot: watch::Receiver<PageSnapshot>,
    filter: LinkFilter,
    background: BackgroundHandle,
}

impl PageContext {
    pub fn new(
        tab_id: TabId,
        page_url: Url,
        snapshot: watch::Receiver<PageSnapshot>,
        filter: LinkFilter,
        background: BackgroundHandle,
    ) -> Self {
        Self {
            tab_id,
            page_url,
            snapshot,
            filter,
            background,
        }
    }

    /// Start the page task; it detects once the document is loaded and
    /// then answers control requests until every handle is dropped
    pub fn spawn(self) -> (PageHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<Envelope>(32);
        let handle = PageHandle {
            tab_id: self.tab_id,
            tx,
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut control_rx: mpsc::Receiver<Envelope>) {
        ::log::info!("Policy detector initialized in tab {}", self.tab_id);

        let mut awaiting_load = !self.snapshot.borrow().is_loaded();
        if !awaiting_load {
            self.detect_and_report().await;
        } else {
            ::log::debug!("Tab {} still loading, deferring detection", self.tab_id);
        }

        loop {
            tokio::select! {
                changed = self.snapshot.changed(), if awaiting_load => {
                    if changed.is_err() {
                        ::log::debug!("Document of tab {} went away before loading", self.tab_id);
                        awaiting_load = false;
                        continue;
                    }
                    if self.snapshot.borrow_and_update().is_loaded() {
                        awaiting_load = false;
                        self.detect_and_report().await;
                    }
                }
                envelope = control_rx.recv() => {
                    match envelope {
                        Some(envelope) => self.handle_control(envelope).await,
                        None => break,
                    }
                }
            }
        }

        ::log::debug!("Policy detector for tab {} stopped", self.tab_id);
    }

    async fn handle_control(&mut self, mut envelope: Envelope) {
        ::log::debug!("Tab {} received {}", self.tab_id, envelope.message.kind());

        match envelope.message {
            RuntimeMessage::Ping => {
                envelope.respond(RuntimeResponse::Pong { active: true });
            }
            RuntimeMessage::DetectPolicies => {
                self.detect_and_report().await;
                envelope.respond(RuntimeResponse::Detection { success: true });
            }
            _ => {
                ::log::warn!(
                    "Tab {} ignoring unexpected {} message",
                    self.tab_id,
                    envelope.message.kind()
                );
            }
        }
    }

    /// Scan the current document and emit exactly one detection event
    async fn detect_and_report(&self) -> DetectionResult {
        let html = self.snapshot.borrow().html.clone();
        let result = detect(&html, &self.page_url, &self.filter);

        if result.is_empty() {
            ::log::info!("No policies detected in tab {}", self.tab_id);
        } else {
            ::log::info!(
                "Detected {} policies in tab {}: {:?}",
                result.len(),
                self.tab_id,
                result.urls()
            );
        }

        let message = RuntimeMessage::FoundPolicies {
            urls: result.urls(),
            details: Some(result.links().to_vec()),
        };
        if let Err(e) = self
            .background
            .send(Envelope::notify(message, Some(self.tab_id)))
            .await
        {
            ::log::error!("Tab {} failed to report policies: {}", self.tab_id, e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::DocumentCategory;

    fn page_url() -> Url {
        Url::parse("https://shop.example.com/products/42").unwrap()
    }

    #[test]
    fn test_detect_dedups_and_orders() {
        let html = r#"<body>
            <a href="/random">Random</a>
            <a href="/terms">Terms</a>
            <a href="/privacy">Privacy</a>
            <a href="/privacy">Privacy again</a>
        </body>"#;

        let result = detect(html, &page_url(), &LinkFilter::default());
        assert_eq!(
            result.urls(),
            vec![
                "https://shop.example.com/privacy",
                "https://shop.example.com/terms",
            ]
        );
        assert_eq!(result.links()[0].link_text_excerpt, "Privacy");
    }

    #[test]
    fn test_detect_skips_placeholders_and_scripts() {
        let html = r##"<body>
            <a href="#">Privacy</a>
            <a href="javascript:showTerms()">Terms</a>
            <a href="">Cookies</a>
            <a>Legal</a>
        </body>"##;

        assert!(detect(html, &page_url(), &LinkFilter::default()).is_empty());
    }

    #[test]
    fn test_detect_keeps_generic_policy_links_last() {
        let html = r#"<body>
            <a href="/refund-policy">Refunds</a>
            <a href="/impressum">Impressum</a>
            <a href="/cookies">Cookies</a>
        </body>"#;

        let result = detect(html, &page_url(), &LinkFilter::default());
        let categories: Vec<_> = result.links().iter().map(|l| l.category).collect();
        assert_eq!(
            categories,
            vec![
                DocumentCategory::Cookies,
                DocumentCategory::Legal,
                DocumentCategory::Other,
            ]
        );
    }

    #[test]
    fn test_detect_is_idempotent() {
        let html = r#"<a href="/legal">Legal</a><a href="/privacy">Privacy</a>"#;
        let filter = LinkFilter::default();
        assert_eq!(
            detect(html, &page_url(), &filter),
            detect(html, &page_url(), &filter)
        );
    }

    #[test]
    fn test_ordering_holds_for_mixed_page() {
        let html = r#"
            <a href="/legal">a</a><a href="/cookie-policy">b</a><a href="/tos-policy">c</a>
            <a href="/terms">d</a><a href="/privacy">e</a><a href="/legal">f</a>
            <a href="https://other.org/privacy">g</a>"#;

        let result = detect(html, &page_url(), &LinkFilter::default());
        let ranks: Vec<u8> = result.links().iter().map(|l| l.category.priority()).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "{ranks:?}");

        let mut urls = result.urls();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), result.len());
    }

    #[test]
    fn test_interactive_document_counts_as_loaded() {
        assert!(!PageSnapshot::loading().is_loaded());
        let interactive = PageSnapshot {
            ready_state: ReadyState::Interactive,
            html: String::new(),
        };
        assert!(interactive.is_loaded());
        assert!(PageSnapshot::complete("").is_loaded());
    }

    #[test]
    fn test_keyword_split_by_inline_markup() {
        let html = r#"<a href="/p/1">Confiden<span>tialité</span></a>"#;
        let result = detect(html, &page_url(), &LinkFilter::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result.links()[0].category, DocumentCategory::Privacy);
        assert_eq!(result.links()[0].link_text_excerpt, "Confidentialité");
    }

    #[test]
    fn test_relative_links_follow_document_base() {
        let html = r#"<head><base href="https://legal.cdn.test/docs/"></head>
            <body><a href="privacy.html">Privacy</a><a href="/terms">Terms</a></body>"#;
        let result = detect(html, &page_url(), &LinkFilter::default());
        assert_eq!(
            result.urls(),
            vec![
                "https://legal.cdn.test/docs/privacy.html",
                "https://legal.cdn.test/terms"
            ]
        );
    }

    #[test]
    fn test_relative_base_resolves_against_page() {
        let html = r#"<base href="/static/"><a href="cookies.html">Cookies</a>"#;
        let result = detect(html, &page_url(), &LinkFilter::default());
        assert_eq!(result.urls(), vec!["https://shop.example.com/static/cookies.html"]);
    }
}
