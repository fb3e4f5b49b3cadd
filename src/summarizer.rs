//! Client for the external summarization service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::SummarizerError;

/// Anything that can turn a set of policy addresses into a summary
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, urls: &[String]) -> Result<String, SummarizerError>;
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    urls: &'a [String],
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    summary: Option<String>,
}

/// Posts `{ "urls": [...] }` to the analyze endpoint and reads back
/// `{ "summary": "..." }`
#[derive(Debug, Clone)]
pub struct HttpSummarizer {
    client: Client,
    endpoint: Url,
}

impl HttpSummarizer {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, SummarizerError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("policy-scout/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, urls: &[String]) -> Result<String, SummarizerError> {
        ::log::info!("Sending {} urls to {}", urls.len(), self.endpoint);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&AnalyzeRequest { urls })
            .send()
            .await?;

        let status = response.status();
        ::log::debug!("Analysis server answered {}", status);
        if !status.is_success() {
            return Err(SummarizerError::Status(status));
        }

        let body = response.text().await?;
        let parsed: AnalyzeResponse = serde_json::from_str(&body)
            .map_err(|e| SummarizerError::MalformedResponse(e.to_string()))?;

        parsed.summary.ok_or_else(|| {
            SummarizerError::MalformedResponse("response has no `summary` field".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn summarizer_for(server: &MockServer) -> HttpSummarizer {
        let endpoint = Url::parse(&format!("{}/analyze", server.uri())).unwrap();
        HttpSummarizer::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    fn urls() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(serde_json::json!({"urls": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"summary": "X"})))
            .expect(1)
            .mount(&server)
            .await;

        let summary = summarizer_for(&server).summarize(&urls()).await.unwrap();
        assert_eq!(summary, "X");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = summarizer_for(&server).summarize(&urls()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::Status(s) if s.as_u16() == 500));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_missing_summary_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "?"})))
            .mount(&server)
            .await;

        let err = summarizer_for(&server).summarize(&urls()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = summarizer_for(&server).summarize(&urls()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        // nothing listens on port 9 of localhost
        let endpoint = Url::parse("http://127.0.0.1:9/analyze").unwrap();
        let summarizer = HttpSummarizer::new(endpoint, Duration::from_secs(2)).unwrap();
        let err = summarizer.summarize(&urls()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::Transport(_)));
    }
}
