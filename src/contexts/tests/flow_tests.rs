use crate::contexts::background::{BackgroundContext, BackgroundHandle};
use crate::contexts::host::{BrowserHost, LocalBrowser};
use crate::contexts::page::PageSnapshot;
use crate::contexts::popup::{AnalyzeOutcome, PopupCoordinator, PopupSettings, PopupState};
use crate::error::SummarizerError;
use crate::filter::LinkFilter;
use crate::messages::{Envelope, RuntimeMessage};
use crate::results::TabId;
use crate::storage::{MemoryStorage, SummaryStorage};
use crate::summarizer::Summarizer;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP_PAGE: &str = r#"<html><body>
        <a href="/privacy">Privacy policy</a>
        <a href="/privacy">Privacy</a>
        <a href="/terms">Terms of sale</a>
        <a href="/random">Random</a>
    </body></html>"#;

    /// Records every request and answers with a scripted reply
    struct RecordingSummarizer {
        calls: Mutex<Vec<Vec<String>>>,
        replies: Mutex<VecDeque<(Duration, Result<String, String>)>>,
    }

    impl RecordingSummarizer {
        fn answering(summary: &str) -> Self {
            Self::scripted(vec![(Duration::ZERO, Ok(summary.to_string()))])
        }

        fn failing(error: &str) -> Self {
            Self::scripted(vec![(Duration::ZERO, Err(error.to_string()))])
        }

        /// Replies are used in order; the last one repeats
        fn scripted(replies: Vec<(Duration, Result<String, String>)>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            }
        }

        async fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl Summarizer for RecordingSummarizer {
        async fn summarize(&self, urls: &[String]) -> Result<String, SummarizerError> {
            self.calls.lock().await.push(urls.to_vec());
            let (delay, reply) = {
                let mut replies = self.replies.lock().await;
                if replies.len() > 1 {
                    replies.pop_front().unwrap()
                } else {
                    replies.front().cloned().unwrap()
                }
            };
            tokio::time::sleep(delay).await;
            reply.map_err(SummarizerError::MalformedResponse)
        }
    }

    struct Harness {
        summarizer: Arc<RecordingSummarizer>,
        storage: Arc<MemoryStorage>,
        background: BackgroundHandle,
        browser: Arc<LocalBrowser>,
    }

    impl Harness {
        fn new(summarizer: RecordingSummarizer) -> Self {
            let summarizer = Arc::new(summarizer);
            let storage = Arc::new(MemoryStorage::new());
            let (background, _task) =
                BackgroundContext::new(summarizer.clone(), storage.clone()).spawn();
            let browser = Arc::new(LocalBrowser::new(background.clone(), LinkFilter::default()));
            Self {
                summarizer,
                storage,
                background,
                browser,
            }
        }

        fn popup(&self) -> PopupCoordinator<LocalBrowser> {
            PopupCoordinator::new(
                self.browser.clone(),
                self.background.clone(),
                self.storage.clone(),
                PopupSettings::default(),
            )
        }

        async fn open(&self, url: &str, html: &str, with_detector: bool) -> TabId {
            self.browser
                .open_tab(Url::parse(url).unwrap(), PageSnapshot::complete(html), with_detector)
                .await
        }
    }

    fn shop_policies() -> Vec<String> {
        vec![
            "https://shop.test/privacy".to_string(),
            "https://shop.test/terms".to_string(),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_reaches_cache_and_summary() {
        let harness = Harness::new(RecordingSummarizer::answering("X"));
        let tab = harness.open("https://shop.test/", SHOP_PAGE, true).await;

        let mut popup = harness.popup();
        assert_eq!(popup.analyze().await, AnalyzeOutcome::Reloaded);
        harness.background.drain().await.unwrap();

        assert_eq!(harness.background.get_policies(tab).await.unwrap(), shop_policies());
        assert_eq!(popup.detected_policies().await.unwrap(), shop_policies());

        let stored = harness.storage.load().await.unwrap().unwrap();
        assert_eq!(stored.summary, "X");
        assert_eq!(stored.urls, shop_policies());
        assert!(stored.error.is_none());

        // load-time detection plus the explicit one, identical both times
        let calls = harness.summarizer.calls().await;
        assert_eq!(calls, vec![shop_policies(), shop_policies()]);

        popup.load_summary().await;
        assert!(popup.display().starts_with("X"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_service_persists_offline_summary() {
        let harness = Harness::new(RecordingSummarizer::failing("connection refused"));
        harness.open("https://shop.test/", SHOP_PAGE, true).await;

        let mut popup = harness.popup();
        popup.analyze().await;
        harness.background.drain().await.unwrap();

        let stored = harness.storage.load().await.unwrap().unwrap();
        assert!(stored.summary.contains("unavailable"));
        assert!(stored.summary.contains("1. https://shop.test/privacy"));
        assert!(stored.summary.contains("2. https://shop.test/terms"));
        assert!(stored.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(stored.urls, shop_policies());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_page_still_reports() {
        let harness = Harness::new(RecordingSummarizer::answering("nothing"));
        let tab = harness
            .open("https://blank.test/", "<html><body><a href='/about'>About</a></body></html>", true)
            .await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        harness.background.drain().await.unwrap();

        assert_eq!(harness.summarizer.calls().await, vec![Vec::<String>::new()]);
        assert!(harness.background.get_policies(tab).await.unwrap().is_empty());
        assert!(harness.storage.load().await.unwrap().unwrap().urls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_waits_for_page_load() {
        let harness = Harness::new(RecordingSummarizer::answering("X"));
        let tab = harness
            .browser
            .open_tab(Url::parse("https://shop.test/").unwrap(), PageSnapshot::loading(), true)
            .await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.background.drain().await.unwrap();
        assert!(harness.summarizer.calls().await.is_empty());

        harness
            .browser
            .update_page(tab, PageSnapshot::complete(SHOP_PAGE))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.background.drain().await.unwrap();

        assert_eq!(harness.summarizer.calls().await, vec![shop_policies()]);

        // a later DOM change does not trigger another automatic pass
        harness
            .browser
            .update_page(tab, PageSnapshot::complete("<a href='/legal'>Legal</a>"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.background.drain().await.unwrap();
        assert_eq!(harness.summarizer.calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_injects_missing_detector() {
        let harness = Harness::new(RecordingSummarizer::answering("X"));
        let tab = harness.open("https://shop.test/", SHOP_PAGE, false).await;
        assert!(!harness.browser.has_detector(tab).await);

        let mut popup = harness.popup();
        assert_eq!(popup.analyze().await, AnalyzeOutcome::Reloaded);
        assert!(popup.transitions().contains(&PopupState::Injecting));
        assert!(harness.browser.has_detector(tab).await);

        harness.background.drain().await.unwrap();
        assert_eq!(harness.background.get_policies(tab).await.unwrap(), shop_policies());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescan_replaces_tab_entry() {
        let harness = Harness::new(RecordingSummarizer::answering("X"));
        let tab = harness.open("https://shop.test/", SHOP_PAGE, true).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        harness
            .browser
            .update_page(tab, PageSnapshot::complete("<a href='/cookies'>Cookies</a>"))
            .await
            .unwrap();
        harness
            .browser
            .send_to_tab(tab, RuntimeMessage::DetectPolicies)
            .await
            .unwrap();

        assert_eq!(
            harness.background.get_policies(tab).await.unwrap(),
            vec!["https://shop.test/cookies"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_tab_forgets_policies() {
        let harness = Harness::new(RecordingSummarizer::answering("X"));
        let tab = harness.open("https://shop.test/", SHOP_PAGE, true).await;
        harness
            .browser
            .send_to_tab(tab, RuntimeMessage::DetectPolicies)
            .await
            .unwrap();
        assert_eq!(harness.background.get_policies(tab).await.unwrap(), shop_policies());

        harness.browser.close_tab(tab).await.unwrap();
        assert!(harness.background.get_policies(tab).await.unwrap().is_empty());
        assert!(!harness.browser.has_detector(tab).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_finished_analysis_wins() {
        let harness = Harness::new(RecordingSummarizer::scripted(vec![
            (Duration::from_secs(5), Ok("slow first".to_string())),
            (Duration::from_secs(1), Ok("fast second".to_string())),
        ]));

        for urls in [vec!["a".to_string()], vec!["b".to_string()]] {
            let found = RuntimeMessage::FoundPolicies { urls, details: None };
            harness
                .background
                .send(Envelope::notify(found, Some(1)))
                .await
                .unwrap();
        }
        harness.background.drain().await.unwrap();

        // the tab entry follows arrival order, the summary follows completion order
        assert_eq!(harness.background.get_policies(1).await.unwrap(), vec!["b"]);
        let stored = harness.storage.load().await.unwrap().unwrap();
        assert_eq!(stored.summary, "slow first");
        assert_eq!(stored.urls, vec!["a"]);
    }
}
