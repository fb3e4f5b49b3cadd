//! Browser capabilities the popup relies on, and an in-process browser
//! providing them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, watch};
use url::Url;

use crate::contexts::background::BackgroundHandle;
use crate::contexts::page::{PageContext, PageHandle, PageSnapshot};
use crate::error::HostError;
use crate::filter::LinkFilter;
use crate::messages::{RuntimeMessage, RuntimeResponse};
use crate::results::TabId;

/// The tab a popup was opened over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// What the host browser lets the popup do
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// The focused tab of the current window
    async fn active_tab(&self) -> Result<TabInfo, HostError>;

    /// Deliver a message to the detector resident in a tab and wait for its reply
    async fn send_to_tab(
        &self,
        tab_id: TabId,
        message: RuntimeMessage,
    ) -> Result<RuntimeResponse, HostError>;

    /// Install the detector into a tab's page
    async fn inject_detector(&self, tab_id: TabId) -> Result<(), HostError>;
}

/// Schemes whose pages a detector may be installed into
const INJECTABLE_SCHEMES: [&str; 3] = ["http", "https", "file"];

struct TabRecord {
    url: Url,
    snapshot: watch::Sender<PageSnapshot>,
    detector: Option<PageHandle>,
}

/// In-process browser: owns the tabs, their documents and the detectors
/// running in them
pub struct LocalBrowser {
    tabs: Mutex<HashMap<TabId, TabRecord>>,
    active: Mutex<Option<TabId>>,
    next_id: AtomicI64,
    background: BackgroundHandle,
    filter: LinkFilter,
}

impl LocalBrowser {
    pub fn new(background: BackgroundHandle, filter: LinkFilter) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            next_id: AtomicI64::new(1),
            background,
            filter,
        }
    }

    /// Open a tab and focus it. With `with_detector` the detector starts
    /// with the page, as a declared content script would.
    pub async fn open_tab(&self, url: Url, snapshot: PageSnapshot, with_detector: bool) -> TabId {
        let tab_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (snapshot_tx, _) = watch::channel(snapshot);

        let mut record = TabRecord {
            url,
            snapshot: snapshot_tx,
            detector: None,
        };
        if with_detector && is_injectable(&record.url) {
            record.detector = Some(self.start_detector(tab_id, &record));
        }

        ::log::debug!("Opened tab {} at {}", tab_id, record.url);
        self.tabs.lock().await.insert(tab_id, record);
        *self.active.lock().await = Some(tab_id);
        tab_id
    }

    /// Replace the document of a tab (navigation progress, DOM updates)
    pub async fn update_page(&self, tab_id: TabId, snapshot: PageSnapshot) -> Result<(), HostError> {
        let tabs = self.tabs.lock().await;
        let record = tabs.get(&tab_id).ok_or(HostError::TabNotFound(tab_id))?;
        record.snapshot.send_replace(snapshot);
        Ok(())
    }

    pub async fn set_active(&self, tab_id: TabId) -> Result<(), HostError> {
        if !self.tabs.lock().await.contains_key(&tab_id) {
            return Err(HostError::TabNotFound(tab_id));
        }
        *self.active.lock().await = Some(tab_id);
        Ok(())
    }

    /// Close a tab, stopping its detector and notifying the background
    pub async fn close_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        let removed = self.tabs.lock().await.remove(&tab_id);
        if removed.is_none() {
            return Err(HostError::TabNotFound(tab_id));
        }

        let mut active = self.active.lock().await;
        if *active == Some(tab_id) {
            *active = None;
        }
        drop(active);

        ::log::debug!("Closed tab {}", tab_id);
        self.background.tab_removed(tab_id).await
    }

    /// Whether a detector is currently listening in the tab
    pub async fn has_detector(&self, tab_id: TabId) -> bool {
        self.tabs
            .lock()
            .await
            .get(&tab_id)
            .and_then(|record| record.detector.as_ref())
            .is_some_and(PageHandle::is_resident)
    }

    fn start_detector(&self, tab_id: TabId, record: &TabRecord) -> PageHandle {
        let context = PageContext::new(
            tab_id,
            record.url.clone(),
            record.snapshot.subscribe(),
            self.filter.clone(),
            self.background.clone(),
        );
        let (handle, _task) = context.spawn();
        handle
    }
}

fn is_injectable(url: &Url) -> bool {
    INJECTABLE_SCHEMES.contains(&url.scheme())
}

#[async_trait]
impl BrowserHost for LocalBrowser {
    async fn active_tab(&self) -> Result<TabInfo, HostError> {
        let active = (*self.active.lock().await).ok_or(HostError::NoActiveTab)?;
        let tabs = self.tabs.lock().await;
        let record = tabs.get(&active).ok_or(HostError::NoActiveTab)?;
        Ok(TabInfo {
            id: active,
            url: record.url.to_string(),
        })
    }

    async fn send_to_tab(
        &self,
        tab_id: TabId,
        message: RuntimeMessage,
    ) -> Result<RuntimeResponse, HostError> {
        let detector = {
            let tabs = self.tabs.lock().await;
            let record = tabs.get(&tab_id).ok_or(HostError::TabNotFound(tab_id))?;
            record.detector.clone().ok_or(HostError::NoReceiver(tab_id))?
        };
        detector.request(message).await
    }

    async fn inject_detector(&self, tab_id: TabId) -> Result<(), HostError> {
        let mut tabs = self.tabs.lock().await;
        let record = tabs.get(&tab_id).ok_or(HostError::TabNotFound(tab_id))?;

        if !is_injectable(&record.url) {
            return Err(HostError::Injection {
                tab_id,
                reason: format!("cannot access contents of {}", record.url),
            });
        }

        if record.detector.as_ref().is_some_and(PageHandle::is_resident) {
            ::log::debug!("Detector already resident in tab {}", tab_id);
            return Ok(());
        }

        let handle = self.start_detector(tab_id, record);
        if let Some(record) = tabs.get_mut(&tab_id) {
            record.detector = Some(handle);
        }
        ::log::info!("Detector injected into tab {}", tab_id);
        Ok(())
    }
}
