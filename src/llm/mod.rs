use std::sync::Arc;

use crate::config::Config;

pub mod anthropic;
pub mod client;
pub mod openai;

pub use client::LlmClient;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: String,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
    fn name(&self) -> &str;
}

/// Builds the generation provider selected by configuration. Chosen once at
/// startup; the provider serves the direct-analysis fallback agent.
pub fn build_provider(config: &Config) -> Arc<dyn Provider> {
    match config.llm_provider.as_str() {
        "anthropic" => Arc::new(anthropic::AnthropicProvider::new(
            config.anthropic_api_key.as_deref().unwrap_or(""),
        )),
        "openai" => Arc::new(openai::OpenAiCompatProvider::openai(
            config.openai_api_key.as_deref().unwrap_or(""),
        )),
        "ollama" => Arc::new(openai::OpenAiCompatProvider::ollama(
            &config.ollama_base_url,
        )),
        _ => Arc::new(openai::OpenAiCompatProvider::google(
            config.google_api_key.as_deref().unwrap_or(""),
        )),
    }
}
