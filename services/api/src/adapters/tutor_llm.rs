//! services/api/src/adapters/tutor_llm.rs
//!
//! This module contains the adapter for the tutoring LLM.
//! It implements the `LanguageModelService` port from the `core` crate.

use adaptive_learning_core::{
    ports::{LanguageModelService, PortError, PortResult},
    prompts::{Prompt, ResponseMode},
};
use async_openai::{
    config::{Config, OpenAIConfig},
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{error, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LanguageModelService` using an OpenAI-compatible LLM.
///
/// `C` is the client configuration: `OpenAIConfig` for OpenAI-style endpoints,
/// `AzureConfig` for an Azure deployment. For Azure, `model` is the deployment.
#[derive(Clone)]
pub struct OpenAiTutorAdapter<C: Config = OpenAIConfig> {
    client: Client<C>,
    model: String,
}

impl<C: Config> OpenAiTutorAdapter<C> {
    /// Creates a new `OpenAiTutorAdapter`.
    pub fn new(client: Client<C>, model: String) -> Self {
        Self { client, model }
    }

    /// Translates a composed prompt into a chat-completion request.
    fn build_request(&self, prompt: &Prompt) -> PortResult<CreateChatCompletionRequest> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt.system_instructions.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt.user_content.as_str())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages).n(1);
        if prompt.response_mode == ResponseMode::StrictJson {
            builder.response_format(ResponseFormat::JsonObject);
        }

        builder
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `LanguageModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl<C> LanguageModelService for OpenAiTutorAdapter<C>
where
    C: Config + Send + Sync + 'static,
{
    async fn generate(&self, prompt: &Prompt) -> PortResult<String> {
        let request = self.build_request(prompt)?;

        info!(event_type = "gpt_call", kind = ?prompt.kind, "Calling the tutoring model");

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| {
                error!(event_type = "gpt_call_error", error = %e, "Model call failed");
                PortError::Unexpected(e.to_string())
            })?;

        // Extract the text content from the first choice in the response.
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                error!(event_type = "gpt_call_error", "Model response contained no text content");
                PortError::Unexpected("Model response contained no text content.".to_string())
            })?;

        info!(event_type = "gpt_response_success", "Received response from the tutoring model");
        Ok(content)
    }
}
