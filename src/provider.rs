//! The provider adapter contract (§6.1).
//!
//! The session core drives this contract; concrete transports (an
//! OpenAI-like, Anthropic-like, or Gemini-like HTTP client) are out of
//! scope for this crate and live behind whatever implements
//! [`ProviderClient`]/[`ChatSession`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::events::StreamSink;
use crate::message::Message;
use crate::tools::{ToolDefinition, ToolHandler};

/// A provider-reported JSON schema response format request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFormat {
    pub name: String,
    pub strict: bool,
    pub json_schema: String,
}

/// Per-call options threaded into [`ChatSession::message`].
#[derive(Clone, Default)]
pub struct SendOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Provider-specific reasoning-effort hint (e.g. "low", "high").
    pub reasoning_effort: Option<String>,
    pub response_format: Option<ResponseFormat>,
    pub stream: Option<StreamSink>,
}

impl std::fmt::Debug for SendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendOptions")
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("response_format", &self.response_format)
            .field("stream", &self.stream.is_some())
            .finish()
    }
}

/// Token usage reported by the provider: the last message's usage and the
/// cumulative usage across the chat session's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTokenUsage {
    pub last_message: TokenUsage,
    pub cumulative: TokenUsage,
}

/// A bound, stateful chat conversation against one provider. Implementors
/// must treat `max_tokens()` as provider-authoritative at the start of each
/// turn — a cached value should be invalidated whenever a new usage payload
/// is reported (§9, open question).
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Sends `history` (already converted to the provider's native message
    /// shape is the adapter's job; this trait still hands over the
    /// provider-neutral `Message` sequence) with the currently snapshotted
    /// tool set, and returns the assistant's reply. Streams intermediate
    /// events to `options.stream` if set, and must abort promptly when
    /// `cancel` is tripped.
    async fn message(
        &mut self,
        history: &[Message],
        tools: &[ToolDefinition],
        options: SendOptions,
        cancel: CancellationToken,
    ) -> Result<Message>;

    async fn register_tool(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Result<()>;

    async fn deregister_tool(&mut self, name: &str) -> Result<()>;

    async fn list_tools(&self) -> Vec<ToolDefinition>;

    async fn token_usage(&self) -> SessionTokenUsage;

    /// Provider-reported context ceiling, re-queried at the start of every
    /// turn rather than cached indefinitely.
    async fn max_tokens(&self) -> u64;

    async fn history(&self) -> (String, Vec<Message>);
}

/// Creates bound [`ChatSession`]s against one provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn new_chat(
        &self,
        system_prompt: &str,
        initial_messages: Vec<Message>,
    ) -> Result<Box<dyn ChatSession>>;
}
