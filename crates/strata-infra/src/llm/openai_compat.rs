//! OpenAI-compatible extraction provider.
//!
//! Uses [`async_openai`] for type-safe chat-completion requests. Any server
//! speaking the OpenAI chat API can be targeted through `base_url`.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use secrecy::{ExposeSecret, SecretString};
use strata_core::provider::extractor::ExtractionProvider;
use strata_types::config::ExtractionSettings;
use strata_types::provider::{ExtractionPrompt, ProviderError};

const PROVIDER_NAME: &str = "openai-compatible";

/// Extraction provider for any OpenAI-compatible chat-completion API.
///
/// Does NOT derive Debug: the `async_openai::Client` holds the API key.
pub struct OpenAiExtractionProvider {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiExtractionProvider {
    pub fn new(settings: &ExtractionSettings, api_key: SecretString) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(settings.base_url.trim_end_matches('/'));

        Self {
            client: Client::with_config(openai_config),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }

    /// System message carries the instruction; the user message carries the
    /// context window (when present) followed by the message.
    fn build_request(&self, prompt: &ExtractionPrompt) -> CreateChatCompletionRequest {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(prompt.instruction.clone()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(user_content(prompt)),
                name: None,
            }),
        ];

        CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_completion_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            ..Default::default()
        }
    }
}

fn user_content(prompt: &ExtractionPrompt) -> String {
    if prompt.context_window.trim().is_empty() {
        format!("Message:\n{}", prompt.message)
    } else {
        format!(
            "Recent conversation:\n{}\n\nMessage:\n{}",
            prompt.context_window, prompt.message
        )
    }
}

impl ExtractionProvider for OpenAiExtractionProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn extract_candidates(&self, prompt: &ExtractionPrompt) -> Result<String, ProviderError> {
        let response = self
            .client
            .chat()
            .create(self.build_request(prompt))
            .await
            .map_err(map_openai_error)?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// Map an `async_openai::error::OpenAIError` to a [`ProviderError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> ProviderError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "invalid_api_key"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
            {
                ProviderError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                ProviderError::RateLimited {
                    retry_after_ms: None,
                }
            } else {
                ProviderError::Status {
                    status: 400,
                    message: api_err.message.clone(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status() {
            Some(status) if status.as_u16() == 401 => ProviderError::AuthenticationFailed,
            Some(status) if status.as_u16() == 429 => ProviderError::RateLimited {
                retry_after_ms: None,
            },
            Some(status) => ProviderError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => ProviderError::Transport(err.to_string()),
        },
        OpenAIError::JSONDeserialize(_, content) => {
            ProviderError::Deserialization(format!("failed to parse response: {content}"))
        }
        _ => ProviderError::Transport(err.to_string()),
    }
}
