use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{IngestError, IngestResult};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Raw text transport used for feeds and structured endpoints.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> IngestResult<String>;
}

/// Converts a document URL into Markdown.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    async fn fetch_markdown(&self, url: &str) -> IngestResult<String>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

#[async_trait]
impl TextFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> IngestResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// Reader service that serves `{base}{url}` as cleaned Markdown.
#[derive(Clone)]
pub struct JinaReader {
    fetcher: HttpFetcher,
    base_url: String,
}

impl JinaReader {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            fetcher: HttpFetcher::new(timeout),
            base_url,
        }
    }
}

#[async_trait]
impl DocumentReader for JinaReader {
    async fn fetch_markdown(&self, url: &str) -> IngestResult<String> {
        self.fetcher
            .fetch_text(&format!("{}{}", self.base_url, url))
            .await
    }
}
