use thiserror::Error;

use crate::results::TabId;

/// Failures talking to the external summarization service
#[derive(Debug, Error)]
pub enum SummarizerError {
    /// The request never produced a response (connection refused, timeout, ...)
    #[error("analysis server unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("HTTP error! status: {0}")]
    Status(reqwest::StatusCode),

    /// The body could not be read as `{ "summary": "..." }`
    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),
}

/// Failures reading or writing the persisted summary
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage contains invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the host browser capabilities used by the popup
#[derive(Debug, Error)]
pub enum HostError {
    #[error("unable to find the active tab")]
    NoActiveTab,

    #[error("no tab with id {0}")]
    TabNotFound(TabId),

    /// Nothing in the page is listening for messages
    #[error("could not establish connection: receiving end does not exist in tab {0}")]
    NoReceiver(TabId),

    /// The receiver went away before it replied
    #[error("the message port closed before a response was received")]
    PortClosed,

    #[error("no response from tab {0} within the allotted time")]
    Timeout(TabId),

    #[error("cannot inject detector into tab {tab_id}: {reason}")]
    Injection { tab_id: TabId, reason: String },
}

/// Failures loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid analyze endpoint `{0}`")]
    Endpoint(String),
}

/// Failures acquiring a page through WebDriver
#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("failed to connect to any WebDriver server (tried {0})")]
    Connect(String),

    #[error("failed to load {url}: {source}")]
    Command {
        url: String,
        #[source]
        source: fantoccini::error::CmdError,
    },

    #[error("timed out loading {0}")]
    Timeout(String),
}

/// Top-level failures of the assistant binary and builder
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Summarizer(#[from] SummarizerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    WebDriver(#[from] WebDriverError),

    #[error("invalid page address `{0}`")]
    PageUrl(String),

    #[error("cannot read page source: {0}")]
    PageSource(#[source] std::io::Error),
}
