//! Background coordinator: per-tab result cache, query interface and the
//! relay to the summarization service.

use crate::error::HostError;
use crate::messages::{Envelope, RuntimeMessage, RuntimeResponse};
use crate::results::{PersistedSummary, TabEntry, TabId};
use crate::storage::SummaryStorage;
use crate::summarizer::Summarizer;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

/// Most recent link set of every tab that has reported a detection.
///
/// Owned by the background task; the detection handler and the tab-removed
/// handler are its only writers.
#[derive(Debug, Default)]
pub struct TabResultCache {
    entries: HashMap<TabId, TabEntry>,
}

impl TabResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever the tab reported before
    pub fn record(&mut self, tab_id: TabId, urls: Vec<String>) {
        self.entries.insert(tab_id, TabEntry { tab_id, urls });
    }

    /// Cached addresses of a tab; empty when the tab never reported
    pub fn policies(&self, tab_id: TabId) -> Vec<String> {
        self.entries
            .get(&tab_id)
            .map(|entry| entry.urls.clone())
            .unwrap_or_default()
    }

    pub fn entry(&self, tab_id: TabId) -> Option<&TabEntry> {
        self.entries.get(&tab_id)
    }

    pub fn remove(&mut self, tab_id: TabId) -> Option<TabEntry> {
        self.entries.remove(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fallback text shown when the summarization service cannot be used
pub fn offline_summary(urls: &[String], error: &str) -> String {
    let listing = if urls.is_empty() {
        "No policies detected".to_string()
    } else {
        urls.iter()
            .enumerate()
            .map(|(i, url)| format!("{}. {}", i + 1, url))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "⚠️ Analysis server unavailable\n\n\
         Policies detected on this page:\n\n\
         {listing}\n\n\
         💡 Tip: check that the analysis server is running\n\
         Error: {error}"
    )
}

/// Ask the service for a summary and persist the outcome.
///
/// Any failure is replaced by an offline summary carrying the error, so the
/// stored record always reflects the latest attempt.
pub async fn analyze_and_persist(
    summarizer: &dyn Summarizer,
    storage: &dyn SummaryStorage,
    urls: Vec<String>,
) -> PersistedSummary {
    let record = match summarizer.summarize(&urls).await {
        Ok(summary) => {
            ::log::info!("Summary received for {} urls", urls.len());
            PersistedSummary::analyzed(summary, urls)
        }
        Err(e) => {
            ::log::error!("Analysis failed: {}", e);
            let error = e.to_string();
            PersistedSummary::offline(offline_summary(&urls, &error), urls, error)
        }
    };

    match storage.save(&record).await {
        Ok(()) => ::log::debug!("Summary saved to storage"),
        Err(e) => ::log::error!("Failed to persist summary: {}", e),
    }

    record
}

/// Events the background task reacts to
#[derive(Debug)]
pub enum BackgroundEvent {
    /// A runtime message from a page or the popup
    Runtime(Envelope),

    /// The host closed a tab
    TabRemoved(TabId),

    /// Reply once every analysis started so far has finished
    Drain(oneshot::Sender<()>),
}

/// Sending side of the background task
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    tx: mpsc::Sender<BackgroundEvent>,
}

impl BackgroundHandle {
    pub async fn send(&self, envelope: Envelope) -> Result<(), HostError> {
        self.tx
            .send(BackgroundEvent::Runtime(envelope))
            .await
            .map_err(|_| HostError::PortClosed)
    }

    /// Query interface: the tab's cached link set
    pub async fn get_policies(&self, tab_id: TabId) -> Result<Vec<String>, HostError> {
        let (envelope, reply) = Envelope::request(RuntimeMessage::GetPolicies { tab_id });
        self.send(envelope).await?;
        match reply.await.map_err(|_| HostError::PortClosed)? {
            RuntimeResponse::Policies { urls } => Ok(urls),
            other => {
                ::log::warn!("Unexpected reply to getPolicies: {:?}", other);
                Ok(Vec::new())
            }
        }
    }

    pub async fn tab_removed(&self, tab_id: TabId) -> Result<(), HostError> {
        self.tx
            .send(BackgroundEvent::TabRemoved(tab_id))
            .await
            .map_err(|_| HostError::PortClosed)
    }

    /// Wait for in-flight analyses to settle
    pub async fn drain(&self) -> Result<(), HostError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(BackgroundEvent::Drain(tx))
            .await
            .map_err(|_| HostError::PortClosed)?;
        rx.await.map_err(|_| HostError::PortClosed)
    }
}

/// The privileged background context
pub struct BackgroundContext {
    cache: TabResultCache,
    summarizer: Arc<dyn Summarizer>,
    storage: Arc<dyn SummaryStorage>,
    analyses: JoinSet<()>,
}

impl BackgroundContext {
    pub fn new(summarizer: Arc<dyn Summarizer>, storage: Arc<dyn SummaryStorage>) -> Self {
        Self {
            cache: TabResultCache::new(),
            summarizer,
            storage,
            analyses: JoinSet::new(),
        }
    }

    /// Start the background task; it runs until every handle is dropped
    pub fn spawn(self) -> (BackgroundHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<BackgroundEvent>(10000);
        let task = tokio::spawn(self.run(rx));
        ::log::info!("Background context started");
        (BackgroundHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<BackgroundEvent>) {
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                Some(joined) = self.analyses.join_next(), if !self.analyses.is_empty() => {
                    if let Err(e) = joined {
                        ::log::error!("Analysis task failed: {}", e);
                    }
                }
            }
        }

        self.settle_analyses().await;
        ::log::info!("Background context stopped");
    }

    async fn handle_event(&mut self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Runtime(envelope) => self.handle_message(envelope),
            BackgroundEvent::TabRemoved(tab_id) => {
                if self.cache.remove(tab_id).is_some() {
                    ::log::debug!("Forgot policies of closed tab {}", tab_id);
                }
            }
            BackgroundEvent::Drain(done) => {
                self.settle_analyses().await;
                let _ = done.send(());
            }
        }
    }

    fn handle_message(&mut self, mut envelope: Envelope) {
        match &envelope.message {
            RuntimeMessage::FoundPolicies { urls, .. } => {
                let urls = urls.clone();
                ::log::info!(
                    "Policies detected in tab {:?}: {:?}",
                    envelope.sender_tab,
                    urls
                );

                if let Some(tab_id) = envelope.sender_tab {
                    self.cache.record(tab_id, urls.clone());
                }

                // each detection gets its own request; the last to finish wins
                let summarizer = Arc::clone(&self.summarizer);
                let storage = Arc::clone(&self.storage);
                self.analyses.spawn(async move {
                    analyze_and_persist(summarizer.as_ref(), storage.as_ref(), urls).await;
                });
            }
            RuntimeMessage::GetPolicies { tab_id } => {
                let urls = self.cache.policies(*tab_id);
                envelope.respond(RuntimeResponse::Policies { urls });
            }
            other => {
                ::log::warn!("Background ignoring {} message", other.kind());
            }
        }
    }

    async fn settle_analyses(&mut self) {
        while let Some(joined) = self.analyses.join_next().await {
            if let Err(e) = joined {
                ::log::error!("Analysis task failed: {}", e);
            }
        }
    }
}
