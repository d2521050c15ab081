use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::deepseek::DeepSeekProvider;
use crate::error::{LlmError, LlmResult};
use crate::ollama::OllamaProvider;
use crate::provider::{InferenceProvider, InferenceRequest};
use crate::thermal::{NvidiaSmiProbe, ThermalGate};
use crate::{GatewayConfig, ProviderKind};

/// Admission-controlled access to the configured inference backend.
///
/// Failures never escape: callers get an empty string and must read it as
/// "no signal".
pub struct InferenceGateway {
    provider: Arc<dyn InferenceProvider>,
    permits: Semaphore,
    permit_count: usize,
    thermal: Option<ThermalGate>,
}

impl InferenceGateway {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        permits: usize,
        thermal: Option<ThermalGate>,
    ) -> Self {
        let permit_count = permits.max(1);
        Self {
            provider,
            permits: Semaphore::new(permit_count),
            permit_count,
            thermal,
        }
    }

    /// Build the backend selected by configuration. Only the local backend is
    /// thermally gated.
    pub fn from_config(config: &GatewayConfig) -> LlmResult<Self> {
        let gateway = match config.provider {
            ProviderKind::Local => {
                let provider = OllamaProvider::new(
                    config.ollama_base_url.clone(),
                    config.local_model.clone(),
                    config.context_window,
                    config.timeout,
                );
                let thermal = ThermalGate::new(config.thermal.clone(), Arc::new(NvidiaSmiProbe));
                Self::new(Arc::new(provider), config.permits(), Some(thermal))
            }
            ProviderKind::Cloud => {
                let api_key = config
                    .deepseek_api_key
                    .clone()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| {
                        LlmError::Config("DEEPSEEK_API_KEY is required for the cloud provider".into())
                    })?;
                let provider = DeepSeekProvider::new(
                    config.deepseek_base_url.clone(),
                    config.deepseek_model.clone(),
                    api_key,
                    config.timeout,
                );
                Self::new(Arc::new(provider), config.permits(), None)
            }
        };

        Ok(gateway)
    }

    pub fn backend_name(&self) -> &'static str {
        self.provider.backend_name()
    }

    pub fn permit_count(&self) -> usize {
        self.permit_count
    }

    /// Generate text for `prompt`, or an empty string on any failure.
    pub async fn infer(&self, prompt: &str, temperature: f32, max_tokens: u32) -> String {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("Inference gateway closed, dropping call");
                return String::new();
            }
        };

        if let Some(gate) = &self.thermal {
            let waits = gate.wait_until_safe().await;
            if waits > 0 {
                tracing::warn!("Inference call throttled for {} thermal polls", waits);
            }
        }

        let request = InferenceRequest {
            prompt: prompt.to_string(),
            temperature,
            max_output_tokens: max_tokens,
        };

        match self.provider.generate(&request).await {
            Ok(text) => {
                tracing::debug!(
                    "{} returned {} chars (temp={:.2})",
                    self.provider.backend_name(),
                    text.len(),
                    temperature
                );
                text
            }
            Err(e) => {
                tracing::warn!("Inference failure ({}): {}", self.provider.backend_name(), e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermal::tests::ScriptedProbe;
    use crate::thermal::ThermalConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the prompt, tracking peak concurrency.
    struct EchoProvider {
        active: AtomicUsize,
        peak: AtomicUsize,
        fail: bool,
    }

    impl EchoProvider {
        fn new(fail: bool) -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl InferenceProvider for EchoProvider {
        async fn generate(&self, request: &InferenceRequest) -> LlmResult<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                Err(LlmError::ServiceUnavailable("Status: 500".into()))
            } else {
                Ok(request.prompt.clone())
            }
        }

        fn backend_name(&self) -> &'static str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_single_permit_serializes_calls() {
        let provider = Arc::new(EchoProvider::new(false));
        let gateway = InferenceGateway::new(provider.clone(), 1, None);

        let (a, b, c) = tokio::join!(
            gateway.infer("a", 0.1, 8),
            gateway.infer("b", 0.5, 8),
            gateway.infer("c", 0.7, 8),
        );

        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("a", "b", "c"));
        assert_eq!(provider.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wider_permits_allow_parallel_calls() {
        let provider = Arc::new(EchoProvider::new(false));
        let gateway = InferenceGateway::new(provider.clone(), 3, None);

        tokio::join!(
            gateway.infer("a", 0.1, 8),
            gateway.infer("b", 0.5, 8),
            gateway.infer("c", 0.7, 8),
        );

        assert!(provider.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_provider_failure_yields_empty_text() {
        let gateway = InferenceGateway::new(Arc::new(EchoProvider::new(true)), 1, None);
        assert_eq!(gateway.infer("a", 0.1, 8).await, "");
    }

    #[test]
    fn test_hot_device_delays_but_completes() {
        let thermal = ThermalGate::new(
            ThermalConfig {
                limit_c: 80,
                resume_c: 65,
                poll_interval: Duration::from_millis(1),
            },
            Arc::new(ScriptedProbe::new(&[Some(90), Some(85), Some(50)])),
        );
        let gateway = InferenceGateway::new(Arc::new(EchoProvider::new(false)), 1, Some(thermal));

        let text = tokio_test::block_on(gateway.infer("hot", 0.1, 8));
        assert_eq!(text, "hot");
    }

    #[test]
    fn test_cloud_requires_api_key() {
        let config = GatewayConfig {
            provider: ProviderKind::Cloud,
            ..GatewayConfig::default()
        };
        assert!(matches!(
            InferenceGateway::from_config(&config),
            Err(LlmError::Config(_))
        ));
    }
}
