//! services/api/src/adapters/story_llm.rs
//!
//! This module contains the adapter for the story-writing LLM.
//! It implements the `TextGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use storybook_core::ports::{PortError, PortResult, TextGenerationService};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiStoryAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiStoryAdapter {
    /// Creates a new `OpenAiStoryAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiStoryAdapter {
    /// Submits the fully built story prompt and returns the raw model text.
    ///
    /// The prompt is self-contained (persona, outline, formatting rules), so
    /// it is sent as a single user message. Every upstream failure collapses
    /// to a generic error here; only the image path differentiates failures.
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Requesting story text");

        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
        )];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Unexpected("No text in model response".to_string()))?;

        Ok(text)
    }
}
