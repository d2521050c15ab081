use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmResult;

/// One text-generation request. The prompt is opaque to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Backend-agnostic interface to a text-generation model.
///
/// Implemented by the local Ollama backend and the DeepSeek cloud backend.
/// Only [`crate::InferenceGateway`] calls this.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn generate(&self, request: &InferenceRequest) -> LlmResult<String>;

    fn backend_name(&self) -> &'static str;
}
