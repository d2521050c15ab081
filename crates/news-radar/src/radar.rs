use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;

use crate::dedup::DedupRegistry;
use crate::fetch::TextFetcher;
use crate::rss::parse_feed_links;
use crate::sources::Source;

/// Multi-source discovery of new candidate identifiers.
pub struct Radar {
    fetcher: Arc<dyn TextFetcher>,
    sources: Vec<Source>,
    registry: Arc<DedupRegistry>,
}

impl Radar {
    pub fn new(
        fetcher: Arc<dyn TextFetcher>,
        sources: Vec<Source>,
        registry: Arc<DedupRegistry>,
    ) -> Self {
        Self {
            fetcher,
            sources,
            registry,
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn registry(&self) -> &Arc<DedupRegistry> {
        &self.registry
    }

    /// Poll every source concurrently and return the candidates not seen before.
    ///
    /// A failing source contributes nothing; the others still report. Structured
    /// endpoints are returned on every round and never enter the registry.
    pub async fn harvest(&self) -> Vec<String> {
        let scans = self.sources.iter().map(|source| self.scan(source));
        let candidates: Vec<String> = join_all(scans).await.into_iter().flatten().collect();

        if !candidates.is_empty() {
            tracing::info!(
                "Radar detected {} candidates from {} sources",
                candidates.len(),
                self.sources.len()
            );
        }

        candidates
    }

    async fn scan(&self, source: &Source) -> Vec<String> {
        match source {
            Source::Structured(endpoint) => vec![endpoint.poll_url(Utc::now())],
            Source::Feed(url) => {
                let xml = match self.fetcher.fetch_text(url).await {
                    Ok(xml) => xml,
                    Err(e) => {
                        tracing::warn!("Feed unavailable: {} ({})", url, e);
                        return Vec::new();
                    }
                };

                match parse_feed_links(&xml) {
                    Ok(links) => links
                        .into_iter()
                        .filter(|link| self.registry.insert(link))
                        .collect(),
                    Err(e) => {
                        tracing::warn!("Feed unreadable: {} ({})", url, e);
                        Vec::new()
                    }
                }
            }
        }
    }
}
