// Re-export modules
pub mod categories;
pub mod classifier;
pub mod config;
pub mod contexts;
pub mod error;
pub mod filter;
pub mod messages;
pub mod parsers;
pub mod results;
pub mod storage;
pub mod summarizer;
pub mod utils;
pub mod webdriver;

// Re-export commonly used types for convenience
pub use categories::DocumentCategory;
pub use classifier::classify;
pub use contexts::page::detect;
pub use error::AssistantError;
pub use results::{ClassifiedLink, DetectionResult, PersistedSummary, TabId};

use config::AssistantConfig;
use contexts::{BackgroundContext, BackgroundHandle, LocalBrowser, PopupCoordinator, PopupSettings};
use filter::LinkFilter;
use std::sync::Arc;
use storage::{FileStorage, SummaryStorage};
use summarizer::{HttpSummarizer, Summarizer};
use tokio::task::JoinHandle;

/// Builder wiring the background, page and popup contexts together
pub struct PolicyAssistant {
    config: AssistantConfig,
    summarizer: Option<Arc<dyn Summarizer>>,
    storage: Option<Arc<dyn SummaryStorage>>,
}

impl Default for PolicyAssistant {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyAssistant {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            config: AssistantConfig::default(),
            summarizer: None,
            storage: None,
        }
    }

    pub fn with_config(mut self, config: AssistantConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a JSON file
    pub fn with_config_file(
        self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, AssistantError> {
        let config = AssistantConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Use a custom summarizer instead of the HTTP endpoint from the config
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Use a custom store instead of the JSON file from the config
    pub fn with_storage(mut self, storage: Arc<dyn SummaryStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Start the background context and the in-process browser
    pub fn start(self) -> Result<RunningAssistant, AssistantError> {
        let summarizer = match self.summarizer {
            Some(summarizer) => summarizer,
            None => Arc::new(HttpSummarizer::new(
                self.config.analyze_url()?,
                self.config.request_timeout(),
            )?),
        };
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(FileStorage::new(self.config.storage_path.clone())));

        let (background, background_task) =
            BackgroundContext::new(summarizer, Arc::clone(&storage)).spawn();
        let browser = Arc::new(LocalBrowser::new(
            background.clone(),
            LinkFilter::new(self.config.link_filter.clone()),
        ));

        Ok(RunningAssistant {
            config: self.config,
            storage,
            background,
            background_task,
            browser,
        })
    }
}

/// Handles to a started assistant
pub struct RunningAssistant {
    config: AssistantConfig,
    storage: Arc<dyn SummaryStorage>,
    background: BackgroundHandle,
    background_task: JoinHandle<()>,
    browser: Arc<LocalBrowser>,
}

impl RunningAssistant {
    pub fn browser(&self) -> &Arc<LocalBrowser> {
        &self.browser
    }

    pub fn background(&self) -> &BackgroundHandle {
        &self.background
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Open a new popup session over the current browser state
    pub fn popup(&self) -> PopupCoordinator<LocalBrowser> {
        PopupCoordinator::new(
            Arc::clone(&self.browser),
            self.background.clone(),
            Arc::clone(&self.storage),
            PopupSettings::from(&self.config),
        )
    }

    /// Wait for outstanding analyses, then stop the background context.
    /// Popups still holding the browser only see closed ports afterwards.
    pub async fn shutdown(self) -> Result<(), AssistantError> {
        self.background.drain().await?;
        self.background_task.abort();
        ::log::info!("Assistant stopped");
        Ok(())
    }
}
