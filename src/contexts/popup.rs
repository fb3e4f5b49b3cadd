//! UI coordinator of a popup session.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AssistantConfig;
use crate::contexts::background::BackgroundHandle;
use crate::contexts::host::BrowserHost;
use crate::error::HostError;
use crate::messages::{RuntimeMessage, RuntimeResponse};
use crate::results::TabId;
use crate::storage::SummaryStorage;
use crate::utils::{format_timestamp, has_restricted_scheme};

pub(crate) const LOADING_TEXT: &str = "⏳ Loading...";
pub(crate) const NO_SUMMARY_TEXT: &str = "ℹ️ No policy analyzed yet.\n\n👉 Click 'Analyze this page' to detect privacy policies and terms of use.";
pub(crate) const RESTRICTED_TEXT: &str = "❌ This extension cannot analyze internal browser pages.\n\nPlease go to a regular website.";
pub(crate) const ANALYZING_TEXT: &str = "🔍 Analysis in progress...";
pub(crate) const INJECTING_TEXT: &str = "⏳ Injecting the detection script...";
pub(crate) const INJECTION_FAILED_TEXT: &str = "❌ Unable to inject the script.\n\n💡 Tip: reload the page and try again.";
pub(crate) const DETECTING_TEXT: &str = "⏳ Detecting policies...";
pub(crate) const COMMUNICATION_FAILED_TEXT: &str = "❌ Communication error.\n\n💡 Reload the page and try again.";
pub(crate) const WAITING_TEXT: &str = "⏳ Analysis in progress...\n\nPlease wait a few seconds.";

/// Where the popup currently is in its load or analyze flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Idle,
    Loading,
    Ready,
    Error,
    Probing,
    Injecting,
    Detecting,
    Waiting,
}

/// How an "analyze now" request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeOutcome {
    /// The active page cannot be scanned
    Rejected,
    /// No detector could be installed in the page
    InjectionFailed,
    /// The detection command did not reach the page
    CommunicationFailed,
    /// The active tab could not be determined
    NoActiveTab,
    /// Detection ran and the summary was reloaded after the settling delay
    Reloaded,
}

/// Timing and scope settings of the popup
#[derive(Debug, Clone)]
pub struct PopupSettings {
    pub restricted_schemes: Vec<String>,
    pub probe_timeout: Duration,
    pub injection_settle: Duration,
    pub summary_reload_delay: Duration,
}

impl From<&AssistantConfig> for PopupSettings {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            restricted_schemes: config.restricted_schemes.clone(),
            probe_timeout: config.probe_timeout(),
            injection_settle: config.injection_settle(),
            summary_reload_delay: config.summary_reload_delay(),
        }
    }
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self::from(&AssistantConfig::default())
    }
}

/// One popup session; holds no state beyond its own lifetime
pub struct PopupCoordinator<H: BrowserHost> {
    host: Arc<H>,
    background: BackgroundHandle,
    storage: Arc<dyn SummaryStorage>,
    settings: PopupSettings,
    state: PopupState,
    display: String,
    transitions: Vec<PopupState>,
}

impl<H: BrowserHost> PopupCoordinator<H> {
    pub fn new(
        host: Arc<H>,
        background: BackgroundHandle,
        storage: Arc<dyn SummaryStorage>,
        settings: PopupSettings,
    ) -> Self {
        Self {
            host,
            background,
            storage,
            settings,
            state: PopupState::Idle,
            display: String::new(),
            transitions: vec![PopupState::Idle],
        }
    }

    pub fn state(&self) -> PopupState {
        self.state
    }

    /// Text currently shown to the user
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Every state entered so far, oldest first
    pub fn transitions(&self) -> &[PopupState] {
        &self.transitions
    }

    fn show(&mut self, state: PopupState, text: impl Into<String>) {
        self.state = state;
        self.display = text.into();
        self.transitions.push(state);
    }

    /// Render the persisted summary, a guidance message, or the read failure
    pub async fn load_summary(&mut self) -> PopupState {
        self.show(PopupState::Loading, LOADING_TEXT);

        match self.storage.load().await {
            Ok(Some(record)) => {
                let text = format!(
                    "{}\n\n---\n⏰ Last analysis: {}",
                    record.summary,
                    format_timestamp(&record.timestamp)
                );
                self.show(PopupState::Ready, text);
            }
            Ok(None) => self.show(PopupState::Ready, NO_SUMMARY_TEXT),
            Err(e) => {
                ::log::error!("Failed to load summary: {}", e);
                self.show(PopupState::Error, format!("❌ Error while loading: {}", e));
            }
        }

        self.state
    }

    /// Make sure a detector runs in the active tab, ask it for a fresh
    /// detection and reload the summary after a fixed delay
    pub async fn analyze(&mut self) -> AnalyzeOutcome {
        let tab = match self.host.active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                self.show(PopupState::Error, format!("❌ Error: {}", e));
                return AnalyzeOutcome::NoActiveTab;
            }
        };

        if has_restricted_scheme(&tab.url, &self.settings.restricted_schemes) {
            ::log::info!("Refusing to analyze internal page {}", tab.url);
            self.show(PopupState::Error, RESTRICTED_TEXT);
            return AnalyzeOutcome::Rejected;
        }

        ::log::info!("Analyzing tab {} at {}", tab.id, tab.url);
        self.show(PopupState::Probing, ANALYZING_TEXT);

        if let Err(e) = self.probe(tab.id).await {
            ::log::info!("Detector not found in tab {} ({}), injecting", tab.id, e);
            self.show(PopupState::Injecting, INJECTING_TEXT);

            if let Err(e) = self.host.inject_detector(tab.id).await {
                ::log::error!("Injection failed: {}", e);
                self.show(PopupState::Error, INJECTION_FAILED_TEXT);
                return AnalyzeOutcome::InjectionFailed;
            }

            // the detector initializes asynchronously
            tokio::time::sleep(self.settings.injection_settle).await;
        }

        self.show(PopupState::Detecting, DETECTING_TEXT);
        match self
            .host
            .send_to_tab(tab.id, RuntimeMessage::DetectPolicies)
            .await
        {
            Ok(_) => {
                self.show(PopupState::Waiting, WAITING_TEXT);
                tokio::time::sleep(self.settings.summary_reload_delay).await;
                self.load_summary().await;
                AnalyzeOutcome::Reloaded
            }
            Err(e) => {
                ::log::error!("Detection command failed: {}", e);
                self.show(PopupState::Error, COMMUNICATION_FAILED_TEXT);
                AnalyzeOutcome::CommunicationFailed
            }
        }
    }

    /// Links the background has cached for the active tab
    pub async fn detected_policies(&self) -> Result<Vec<String>, HostError> {
        let tab = self.host.active_tab().await?;
        self.background.get_policies(tab.id).await
    }

    /// Check that a detector answers in the tab within the probe timeout
    pub(crate) async fn probe(&self, tab_id: TabId) -> Result<(), HostError> {
        let ping = self.host.send_to_tab(tab_id, RuntimeMessage::Ping);
        match tokio::time::timeout(self.settings.probe_timeout, ping).await {
            Ok(Ok(RuntimeResponse::Pong { active: true })) => Ok(()),
            Ok(Ok(other)) => {
                ::log::warn!("Unexpected reply to ping: {:?}", other);
                Err(HostError::NoReceiver(tab_id))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HostError::Timeout(tab_id)),
        }
    }
}
