//! Loads real pages through a WebDriver server so the detector can scan
//! the rendered document.

use crate::error::WebDriverError;
use crate::parsers;
use fantoccini::{Client, ClientBuilder};
use std::time::Duration;
use tokio::time::timeout;

/// Common local WebDriver endpoints tried when the configured one is down
const FALLBACK_WEBDRIVER_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4444", // geckodriver / Selenium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444",
];

const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(45);

/// A document as rendered by the browser
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// Address after redirects
    pub url: String,
    pub title: Option<String>,
    pub html: String,
}

/// Connect to the WebDriver server, trying the usual local fallbacks
async fn connect(webdriver_url: &str) -> Result<Client, WebDriverError> {
    match ClientBuilder::native().connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::warn!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    let mut tried = vec![webdriver_url.to_string()];
    for url in FALLBACK_WEBDRIVER_URLS {
        if url == webdriver_url {
            continue;
        }

        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = ClientBuilder::native().connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
        tried.push(url.to_string());
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(WebDriverError::Connect(tried.join(", ")))
}

/// Navigate to `page_url` and return the rendered source
pub async fn fetch_page(webdriver_url: &str, page_url: &str) -> Result<LoadedPage, WebDriverError> {
    let client = connect(webdriver_url).await?;
    let started = std::time::Instant::now();

    let loaded = timeout(PAGE_LOAD_TIMEOUT, load(&client, page_url)).await;

    if let Err(e) = client.close().await {
        ::log::warn!("Failed to close WebDriver session: {}", e);
    }

    let page = loaded.map_err(|_| WebDriverError::Timeout(page_url.to_string()))??;
    ::log::debug!(
        "Loaded {} in {:.2} seconds",
        page.url,
        started.elapsed().as_secs_f64()
    );
    Ok(page)
}

async fn load(client: &Client, page_url: &str) -> Result<LoadedPage, WebDriverError> {
    let command_error = |source| WebDriverError::Command {
        url: page_url.to_string(),
        source,
    };

    client.goto(page_url).await.map_err(command_error)?;
    let html = client.source().await.map_err(command_error)?;
    let url = client
        .current_url()
        .await
        .map(|u| u.to_string())
        .unwrap_or_else(|_| page_url.to_string());

    Ok(LoadedPage {
        title: parsers::html::extract_title(&html),
        url,
        html,
    })
}
