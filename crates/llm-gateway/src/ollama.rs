use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, LlmResult};
use crate::provider::{InferenceProvider, InferenceRequest};

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
    num_predict: u32,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Local backend: an Ollama server driving a single accelerator.
#[derive(Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    context_window: u32,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String, context_window: u32, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            context_window,
        }
    }
}

#[async_trait]
impl InferenceProvider for OllamaProvider {
    async fn generate(&self, request: &InferenceRequest) -> LlmResult<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_ctx: self.context_window,
                num_predict: request.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let result = response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(result.response)
    }

    fn backend_name(&self) -> &'static str {
        "ollama"
    }
}
