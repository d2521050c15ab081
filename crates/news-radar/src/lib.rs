//! Discovery and ingestion of financial news.
//!
//! [`Radar`] polls every configured feed concurrently and returns candidate
//! identifiers not seen before; [`Ingestor`] turns one candidate into zero or
//! more [`finnews_core::NewsItem`]s.

pub mod dedup;
pub mod error;
pub mod fetch;
pub mod ingestor;
pub mod payload;
pub mod radar;
pub mod retry;
pub mod rss;
pub mod sources;

pub use dedup::DedupRegistry;
pub use error::{IngestError, IngestResult};
pub use fetch::{DocumentReader, HttpFetcher, JinaReader, TextFetcher};
pub use ingestor::{IngestConfig, Ingestor};
pub use radar::Radar;
pub use retry::RetryPolicy;
pub use sources::{Source, StructuredEndpoint};
