//! Inference gateway: the only path from the pipeline to a text-generation model.
//!
//! Exactly one [`InferenceProvider`] backs a gateway. Every call takes a permit
//! from a counting semaphore sized for that backend, and local calls also pass
//! through the [`ThermalGate`] before touching the device.

pub mod deepseek;
pub mod error;
pub mod gateway;
pub mod ollama;
pub mod provider;
pub mod thermal;

pub use deepseek::DeepSeekProvider;
pub use error::{LlmError, LlmResult};
pub use gateway::InferenceGateway;
pub use ollama::OllamaProvider;
pub use provider::{InferenceProvider, InferenceRequest};
pub use thermal::{NvidiaSmiProbe, TemperatureProbe, ThermalConfig, ThermalGate};

use std::str::FromStr;
use std::time::Duration;

/// Which backend serves inference for this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Single shared accelerator behind an Ollama server
    Local,
    /// DeepSeek (OpenAI-compatible) cloud API
    Cloud,
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "ollama" => Ok(ProviderKind::Local),
            "cloud" | "deepseek" => Ok(ProviderKind::Cloud),
            other => Err(LlmError::Config(format!("unknown LLM_PROVIDER '{other}'"))),
        }
    }
}

/// Configuration for the inference gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: ProviderKind,
    pub ollama_base_url: String,
    pub local_model: String,
    pub deepseek_base_url: String,
    pub deepseek_model: String,
    pub deepseek_api_key: Option<String>,
    /// Permits for the local device (1 = strictly serialized)
    pub max_gpu_concurrency: usize,
    /// Permits for the cloud backend
    pub max_cloud_concurrency: usize,
    pub context_window: u32,
    pub timeout: Duration,
    pub thermal: ThermalConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            ollama_base_url: "http://localhost:11434".to_string(),
            local_model: "qwen3:8b".to_string(),
            deepseek_base_url: "https://api.deepseek.com".to_string(),
            deepseek_model: "deepseek-chat".to_string(),
            deepseek_api_key: None,
            max_gpu_concurrency: 1,
            max_cloud_concurrency: 16,
            context_window: 4096,
            timeout: Duration::from_secs(120),
            thermal: ThermalConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Permit count for the selected backend.
    pub fn permits(&self) -> usize {
        match self.provider {
            ProviderKind::Local => self.max_gpu_concurrency.max(1),
            ProviderKind::Cloud => self.max_cloud_concurrency.max(1),
        }
    }
}
