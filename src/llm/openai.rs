use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
};

use super::{GenerateRequest, GenerateResponse, Provider};

/// Chat-completions provider for any OpenAI-compatible endpoint. Covers
/// OpenAI itself, Google's Gemini compatibility surface, and local Ollama.
pub struct OpenAiCompatProvider {
    client: Client<OpenAIConfig>,
    provider_name: String,
}

impl OpenAiCompatProvider {
    fn with_config(config: OpenAIConfig, provider_name: &str) -> Self {
        Self {
            client: Client::with_config(config),
            provider_name: provider_name.to_string(),
        }
    }

    pub fn openai(api_key: &str) -> Self {
        Self::with_config(OpenAIConfig::new().with_api_key(api_key), "openai")
    }

    pub fn google(api_key: &str) -> Self {
        Self::with_config(
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai"),
            "google",
        )
    }

    pub fn ollama(base_url: &str) -> Self {
        Self::with_config(
            OpenAIConfig::new()
                .with_api_key("ollama")
                .with_api_base(format!("{base_url}/v1")),
            "ollama",
        )
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiCompatProvider {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(req.system.clone()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(req.prompt.clone()),
                name: None,
            }),
        ];

        #[allow(deprecated)]
        let request = CreateChatCompletionRequest {
            model: req.model.clone(),
            messages,
            temperature: Some(req.temperature),
            max_completion_tokens: Some(req.max_tokens),
            ..Default::default()
        };

        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let finish_reason = response
            .choices
            .first()
            .and_then(|c| c.finish_reason)
            .map(|r| format!("{r:?}").to_lowercase())
            .unwrap_or_default();

        let (input_tokens, output_tokens) = match &response.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (0, 0),
        };

        Ok(GenerateResponse {
            content,
            model: response.model,
            input_tokens,
            output_tokens,
            finish_reason,
            provider: String::new(),
        })
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}
