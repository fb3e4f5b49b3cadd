use crate::error::ConfigError;
use crate::filter::LinkFilterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration shared by the background, page and popup contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Summarization endpoint receiving `POST { "urls": [...] }`
    #[serde(default = "default_analyze_endpoint")]
    pub analyze_endpoint: String,

    /// Timeout for one analysis request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long the popup waits for a detector to answer a ping
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Delay after injecting a detector before it is sent commands
    #[serde(default = "default_injection_settle_ms")]
    pub injection_settle_ms: u64,

    /// Delay between a detection command and reloading the summary
    #[serde(default = "default_summary_reload_delay_ms")]
    pub summary_reload_delay_ms: u64,

    /// Address prefixes of pages that cannot be scanned
    #[serde(default = "default_restricted_schemes")]
    pub restricted_schemes: Vec<String>,

    /// Where the last summary is persisted
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// URL for the WebDriver instance used to load pages
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Rules for discarding non-document anchors
    #[serde(default)]
    pub link_filter: LinkFilterConfig,
}

fn default_analyze_endpoint() -> String {
    "http://127.0.0.1:5000/analyze".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_probe_timeout_ms() -> u64 {
    500
}

fn default_injection_settle_ms() -> u64 {
    1000
}

fn default_summary_reload_delay_ms() -> u64 {
    3000
}

fn default_restricted_schemes() -> Vec<String> {
    vec![
        "chrome://".to_string(),
        "chrome-extension://".to_string(),
        "edge://".to_string(),
    ]
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("policy-summary.json")
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            analyze_endpoint: default_analyze_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            injection_settle_ms: default_injection_settle_ms(),
            summary_reload_delay_ms: default_summary_reload_delay_ms(),
            restricted_schemes: default_restricted_schemes(),
            storage_path: default_storage_path(),
            webdriver_url: default_webdriver_url(),
            link_filter: LinkFilterConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.analyze_url()?;
        Ok(config)
    }

    /// Apply `WEBDRIVER_URL` and `POLICY_ANALYZE_URL` overrides from the environment
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        if let Ok(endpoint) = std::env::var("POLICY_ANALYZE_URL") {
            if !endpoint.is_empty() {
                self.analyze_endpoint = endpoint;
            }
        }
        self
    }

    pub fn analyze_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.analyze_endpoint)
            .map_err(|_| ConfigError::Endpoint(self.analyze_endpoint.clone()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn injection_settle(&self) -> Duration {
        Duration::from_millis(self.injection_settle_ms)
    }

    pub fn summary_reload_delay(&self) -> Duration {
        Duration::from_millis(self.summary_reload_delay_ms)
    }
}
