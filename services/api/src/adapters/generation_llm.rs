//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the text-generation LLM backend.
//! It implements the `TextGenerationService` port from the `core` crate against
//! any OpenAI-compatible chat completions endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use reading_club_core::{
    domain::{Message, Role},
    ports::{GenerationRequest, PortError, PortResult, TextGenerationService, TokenStream},
};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    fn build_request(request: &GenerationRequest) -> PortResult<CreateChatCompletionRequest> {
        let messages = to_chat_messages(&request.system_prompt, &request.messages)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model).messages(messages);
        if let Some(max_tokens) = request.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        args.build().map_err(unavailable)
    }
}

/// Every backend failure collapses into the single "generation unavailable" kind.
fn unavailable(e: OpenAIError) -> PortError {
    PortError::GenerationUnavailable(e.to_string())
}

fn to_chat_messages(
    system_prompt: &str,
    messages: &[Message],
) -> PortResult<Vec<ChatCompletionRequestMessage>> {
    let mut chat = Vec::with_capacity(messages.len() + 1);
    chat.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(unavailable)?
            .into(),
    );

    for message in messages {
        let converted: ChatCompletionRequestMessage = match message.role {
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map_err(unavailable)?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map_err(unavailable)?
                .into(),
        };
        chat.push(converted);
    }
    Ok(chat)
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiGenerationAdapter {
    /// Runs a single chat completion and returns the first choice's text.
    async fn generate(&self, request: GenerationRequest) -> PortResult<String> {
        let chat_request = Self::build_request(&request)?;
        debug!(
            "Sending completion request: model={}, messages={}",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(unavailable)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                PortError::GenerationUnavailable(
                    "Completion response contained no text content.".to_string(),
                )
            })
    }

    /// Opens a streamed chat completion. Each item is the text carried by one
    /// chunk; chunks without text (role headers, finish markers) are skipped.
    async fn generate_stream(&self, request: GenerationRequest) -> PortResult<TokenStream> {
        let chat_request = Self::build_request(&request)?;
        debug!(
            "Opening completion stream: model={}, messages={}",
            request.model,
            request.messages.len()
        );

        let chunks = self
            .client
            .chat()
            .create_stream(chat_request)
            .await
            .map_err(unavailable)?;

        let deltas = chunks.filter_map(|chunk| async move {
            match chunk {
                Ok(response) => {
                    let text: String = response
                        .choices
                        .into_iter()
                        .filter_map(|choice| choice.delta.content)
                        .collect();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(e) => Some(Err(unavailable(e))),
            }
        });

        Ok(Box::pin(deltas))
    }
}
