use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use llm_gateway::{GatewayConfig, ProviderKind, ThermalConfig};
use news_radar::{IngestConfig, RetryPolicy};
use signal_engine::AnalyzerConfig;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub gateway: GatewayConfig,

    // Inference presets
    pub temp_fast: f32,                  // 0.1, relevance check
    pub temp_slow: f32,                  // 0.6, adversarial critique

    // Crawling
    pub jina_reader_base: String,
    pub max_crawler_concurrency: usize,  // 10
    pub fetch_timeout: Duration,

    // Loop
    pub harvest_interval: Duration,      // 30s
    pub queue_capacity: usize,           // 100

    // Storage
    pub data_dir: PathBuf,
    pub archive_raw: bool,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let provider: ProviderKind = var("LLM_PROVIDER", "local").parse()?;
        let deepseek_api_key = lookup("DEEPSEEK_API_KEY").filter(|k| !k.trim().is_empty());
        if provider == ProviderKind::Cloud && deepseek_api_key.is_none() {
            anyhow::bail!("DEEPSEEK_API_KEY must be set when LLM_PROVIDER selects the cloud backend");
        }

        let gateway = GatewayConfig {
            provider,
            ollama_base_url: var("OLLAMA_BASE_URL", "http://localhost:11434"),
            local_model: var("LOCAL_MODEL_NAME", "qwen3:8b"),
            deepseek_base_url: var("DEEPSEEK_BASE_URL", "https://api.deepseek.com"),
            deepseek_model: var("DEEPSEEK_MODEL_NAME", "deepseek-chat"),
            deepseek_api_key,
            max_gpu_concurrency: parse(&lookup, "MAX_GPU_CONCURRENCY", 1)?,
            max_cloud_concurrency: parse(&lookup, "MAX_CLOUD_CONCURRENCY", 16)?,
            context_window: parse(&lookup, "CONTEXT_WINDOW", 4096)?,
            timeout: Duration::from_secs(parse(&lookup, "INFERENCE_TIMEOUT_SECS", 120)?),
            thermal: ThermalConfig {
                limit_c: parse(&lookup, "GPU_TEMP_LIMIT", 80)?,
                resume_c: parse(&lookup, "GPU_TEMP_RESUME", 65)?,
                poll_interval: Duration::from_secs(parse(&lookup, "GPU_TEMP_CHECK_INTERVAL", 5)?),
            },
        };

        let config = Self {
            gateway,
            temp_fast: parse(&lookup, "TEMP_FAST", 0.1)?,
            temp_slow: parse(&lookup, "TEMP_SLOW", 0.6)?,
            jina_reader_base: var("JINA_READER_BASE", "https://r.jina.ai/"),
            max_crawler_concurrency: parse(&lookup, "MAX_CRAWLER_CONCURRENCY", 10)?,
            fetch_timeout: Duration::from_secs(parse(&lookup, "FETCH_TIMEOUT_SECS", 15)?),
            harvest_interval: Duration::from_secs(parse(&lookup, "HARVEST_INTERVAL_SECS", 30)?),
            queue_capacity: parse(&lookup, "QUEUE_CAPACITY", 100)?,
            data_dir: PathBuf::from(var("DATA_DIR", "data")),
            archive_raw: parse(&lookup, "ARCHIVE_RAW", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            anyhow::bail!("QUEUE_CAPACITY must be at least 1");
        }
        if self.harvest_interval.is_zero() {
            anyhow::bail!("HARVEST_INTERVAL_SECS must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.temp_fast) || !(0.0..=2.0).contains(&self.temp_slow) {
            anyhow::bail!("TEMP_FAST / TEMP_SLOW must be within [0, 2]");
        }
        Ok(())
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            max_concurrency: self.max_crawler_concurrency,
            retry: RetryPolicy::default(),
        }
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            critique_temperature: self.temp_slow,
            ..AnalyzerConfig::default()
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn signal_dir(&self) -> PathBuf {
        self.data_dir.join("signals")
    }

    pub fn calibration_path(&self) -> PathBuf {
        self.signal_dir().join("calibration_history.json")
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<PipelineConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        PipelineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.gateway.provider, ProviderKind::Local);
        assert_eq!(c.gateway.max_gpu_concurrency, 1);
        assert_eq!(c.gateway.thermal.limit_c, 80);
        assert_eq!(c.gateway.thermal.resume_c, 65);
        assert_eq!(c.harvest_interval, Duration::from_secs(30));
        assert_eq!(c.queue_capacity, 100);
        assert_eq!(c.temp_fast, 0.1);
        assert!(c.archive_raw);
        assert_eq!(c.calibration_path(), PathBuf::from("data/signals/calibration_history.json"));
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("LLM_PROVIDER", "deepseek"),
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("MAX_CLOUD_CONCURRENCY", "32"),
            ("TEMP_SLOW", "0.7"),
            ("ARCHIVE_RAW", "false"),
        ])
        .unwrap();
        assert_eq!(c.gateway.provider, ProviderKind::Cloud);
        assert_eq!(c.gateway.permits(), 32);
        assert_eq!(c.analyzer_config().critique_temperature, 0.7);
        assert!(!c.archive_raw);
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        assert!(config(&[("MAX_GPU_CONCURRENCY", "two")]).is_err());
        assert!(config(&[("LLM_PROVIDER", "cloud")]).is_err());
        assert!(config(&[("QUEUE_CAPACITY", "0")]).is_err());
        assert!(config(&[("TEMP_FAST", "9")]).is_err());
    }
}
