use std::sync::Arc;

use finnews_core::NewsItem;
use reqwest::Url;
use tokio::sync::Semaphore;

use crate::error::{IngestError, IngestResult};
use crate::fetch::{DocumentReader, TextFetcher};
use crate::payload::parse_structured_payload;
use crate::retry::RetryPolicy;
use crate::sources::StructuredEndpoint;

const UNKNOWN_TITLE: &str = "Unknown Title";

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Upper bound on in-flight fetches across all callers
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// Resolves one candidate into normalized news items.
///
/// Structured endpoints are fetched raw and expanded into their entries;
/// anything else goes through the document reader as a single article.
pub struct Ingestor {
    fetcher: Arc<dyn TextFetcher>,
    reader: Arc<dyn DocumentReader>,
    retry: RetryPolicy,
    permits: Semaphore,
}

impl Ingestor {
    pub fn new(
        fetcher: Arc<dyn TextFetcher>,
        reader: Arc<dyn DocumentReader>,
        config: IngestConfig,
    ) -> Self {
        Self {
            fetcher,
            reader,
            retry: config.retry,
            permits: Semaphore::new(config.max_concurrency.max(1)),
        }
    }

    pub async fn resolve(&self, candidate: &str) -> IngestResult<Vec<NewsItem>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| IngestError::Closed)?;

        match StructuredEndpoint::classify(candidate) {
            Some(endpoint) => {
                let text = self
                    .retry
                    .run(candidate, || self.fetcher.fetch_text(candidate))
                    .await?;
                let items = parse_structured_payload(&text, endpoint.tag())?;
                tracing::debug!("{} yielded {} entries", endpoint.tag(), items.len());
                Ok(items)
            }
            None => {
                let markdown = self
                    .retry
                    .run(candidate, || self.reader.fetch_markdown(candidate))
                    .await?;
                Ok(vec![article_item(candidate, &markdown)])
            }
        }
    }
}

fn article_item(url: &str, markdown: &str) -> NewsItem {
    let title = markdown
        .lines()
        .map(|line| line.trim_start_matches(|c: char| c == '#' || c.is_whitespace()).trim_end())
        .find(|line| !line.is_empty())
        .unwrap_or(UNKNOWN_TITLE)
        .to_string();
    let source = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string());

    NewsItem::new(url, title, source).with_body(markdown.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted outcomes in order and counts calls.
    struct Scripted {
        outcomes: Mutex<VecDeque<IngestResult<String>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(outcomes: Vec<IngestResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn next(&self) -> IngestResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(IngestError::Status(404)))
        }
    }

    #[async_trait]
    impl TextFetcher for Scripted {
        async fn fetch_text(&self, _url: &str) -> IngestResult<String> {
            self.next()
        }
    }

    #[async_trait]
    impl DocumentReader for Scripted {
        async fn fetch_markdown(&self, _url: &str) -> IngestResult<String> {
            self.next()
        }
    }

    fn ingestor(fetcher: Arc<Scripted>, reader: Arc<Scripted>) -> Ingestor {
        Ingestor::new(
            fetcher,
            reader,
            IngestConfig {
                max_concurrency: 2,
                retry: RetryPolicy::immediate(3),
            },
        )
    }

    #[tokio::test]
    async fn test_structured_endpoint_expands_entries() {
        let fetcher = Scripted::new(vec![Ok(
            r#"var ajaxResult={"LivesList":[{"url_unique":"u1","simtitle":"t1","digest":"d1"}]};"#.into(),
        )]);
        let reader = Scripted::new(vec![]);
        let ing = ingestor(fetcher.clone(), reader.clone());

        let url = StructuredEndpoint::EastmoneyKuaixun.poll_url(chrono::Utc::now());
        let items = ing.resolve(&url).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "u1");
        assert_eq!(items[0].title, "t1");
        assert_eq!(items[0].body.as_deref(), Some("d1"));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_article_through_reader() {
        let reader = Scripted::new(vec![Ok("\n# 央行宣布降准\n\n正文内容".into())]);
        let ing = ingestor(Scripted::new(vec![]), reader);

        let items = ing.resolve("https://www.36kr.com/p/123").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "https://www.36kr.com/p/123");
        assert_eq!(items[0].title, "央行宣布降准");
        assert_eq!(items[0].source, "www.36kr.com");
        assert!(items[0].content().contains("正文内容"));
    }

    #[tokio::test]
    async fn test_blank_document_gets_placeholder_title() {
        let reader = Scripted::new(vec![Ok("  \n##\n".into())]);
        let ing = ingestor(Scripted::new(vec![]), reader);

        let items = ing.resolve("https://a.example/x").await.unwrap();
        assert_eq!(items[0].title, UNKNOWN_TITLE);
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let reader = Scripted::new(vec![Err(IngestError::Status(503)), Ok("# Title".into())]);
        let ing = ingestor(Scripted::new(vec![]), reader.clone());

        let items = ing.resolve("https://a.example/x").await.unwrap();
        assert_eq!(items[0].title, "Title");
        assert_eq!(reader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_fails_without_retry() {
        let reader = Scripted::new(vec![Err(IngestError::Status(404))]);
        let ing = ingestor(Scripted::new(vec![]), reader.clone());

        assert!(matches!(
            ing.resolve("https://a.example/gone").await,
            Err(IngestError::Status(404))
        ));
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_structured_payload_errors() {
        let fetcher = Scripted::new(vec![Ok("<html>busy</html>".into())]);
        let ing = ingestor(fetcher, Scripted::new(vec![]));

        let url = StructuredEndpoint::SinaLive.poll_url(chrono::Utc::now());
        assert!(matches!(ing.resolve(&url).await, Err(IngestError::Malformed(_))));
    }
}
