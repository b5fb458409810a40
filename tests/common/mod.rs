//! Shared test double for the provider adapter contract (§6.1). A single
//! `EchoProvider` plays every role the scenario tests need: plain replies,
//! one `echo` tool round trip, and a configurable `max_tokens` ceiling for
//! driving compaction deterministically.

use std::sync::Arc;

use agent_session_core::{
    ChatSession, Message, ProviderClient, Role, SendOptions, SessionTokenUsage, ToolDefinition,
    ToolHandler,
};
use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// A tool definition/handler pair returning a fixed `{"result": "Echo: hi"}`
/// payload, for the scenario and property tests that only need a tool to
/// exist and answer deterministically.
pub fn echo_tool() -> (ToolDefinition, Arc<dyn ToolHandler>) {
    let definition = ToolDefinition::new("echo", "echoes a canned reply", "{}");
    let handler: Arc<dyn ToolHandler> = Arc::new(|_args: String, _cancel: CancellationToken| async move {
        Ok(json!({"result": "Echo: hi"}))
    });
    (definition, handler)
}

pub struct EchoProvider {
    pub max_tokens: u64,
}

impl EchoProvider {
    pub fn new(max_tokens: u64) -> Arc<Self> {
        Arc::new(Self { max_tokens })
    }
}

#[async_trait]
impl ProviderClient for EchoProvider {
    async fn new_chat(
        &self,
        system_prompt: &str,
        _initial_messages: Vec<Message>,
    ) -> agent_session_core::Result<Box<dyn ChatSession>> {
        Ok(Box::new(EchoChat {
            max_tokens: self.max_tokens,
            system_prompt: system_prompt.to_string(),
            tools: Vec::new(),
            cumulative: SessionTokenUsage::default(),
        }))
    }
}

struct EchoChat {
    max_tokens: u64,
    system_prompt: String,
    tools: Vec<ToolDefinition>,
    cumulative: SessionTokenUsage,
}

#[async_trait]
impl ChatSession for EchoChat {
    async fn message(
        &mut self,
        history: &[Message],
        tools: &[ToolDefinition],
        _options: SendOptions,
        _cancel: CancellationToken,
    ) -> agent_session_core::Result<Message> {
        self.cumulative.last_message.input_tokens = 10;
        self.cumulative.last_message.output_tokens = 10;
        self.cumulative.cumulative.input_tokens += 10;
        self.cumulative.cumulative.output_tokens += 10;

        if matches!(history.last(), Some(m) if m.role == Role::Tool) {
            return Ok(Message::assistant_text("Echo: hi"));
        }

        let last_user_text = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.get_text())
            .unwrap_or_default();

        if last_user_text.trim() == "echo hi" && !tools.is_empty() {
            let mut msg = Message::empty(Role::Assistant);
            msg.add_tool_call("t1", "echo", "{}");
            return Ok(msg);
        }

        Ok(Message::assistant_text(format!("you said: {last_user_text}")))
    }

    async fn register_tool(
        &mut self,
        definition: ToolDefinition,
        _handler: Arc<dyn ToolHandler>,
    ) -> agent_session_core::Result<()> {
        self.tools.push(definition);
        Ok(())
    }

    async fn deregister_tool(&mut self, name: &str) -> agent_session_core::Result<()> {
        self.tools.retain(|t| t.name != name);
        Ok(())
    }

    async fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }

    async fn token_usage(&self) -> SessionTokenUsage {
        self.cumulative
    }

    async fn max_tokens(&self) -> u64 {
        self.max_tokens
    }

    async fn history(&self) -> (String, Vec<Message>) {
        (self.system_prompt.clone(), Vec::new())
    }
}

/// A provider that always calls the same tool, no matter what the history
/// or prior tool results look like. Used to deterministically drive the
/// turn loop past its round cap.
pub struct LoopingProvider;

impl LoopingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl ProviderClient for LoopingProvider {
    async fn new_chat(
        &self,
        system_prompt: &str,
        _initial_messages: Vec<Message>,
    ) -> agent_session_core::Result<Box<dyn ChatSession>> {
        Ok(Box::new(LoopingChat {
            system_prompt: system_prompt.to_string(),
            tools: Vec::new(),
            cumulative: SessionTokenUsage::default(),
            round: std::sync::atomic::AtomicU64::new(0),
        }))
    }
}

struct LoopingChat {
    system_prompt: String,
    tools: Vec<ToolDefinition>,
    cumulative: SessionTokenUsage,
    round: std::sync::atomic::AtomicU64,
}

#[async_trait]
impl ChatSession for LoopingChat {
    async fn message(
        &mut self,
        _history: &[Message],
        _tools: &[ToolDefinition],
        _options: SendOptions,
        _cancel: CancellationToken,
    ) -> agent_session_core::Result<Message> {
        self.cumulative.last_message.input_tokens = 5;
        self.cumulative.last_message.output_tokens = 5;
        self.cumulative.cumulative.input_tokens += 5;
        self.cumulative.cumulative.output_tokens += 5;

        let n = self.round.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut msg = Message::empty(Role::Assistant);
        msg.add_tool_call(format!("loop{n}"), "echo", "{}");
        Ok(msg)
    }

    async fn register_tool(
        &mut self,
        definition: ToolDefinition,
        _handler: Arc<dyn ToolHandler>,
    ) -> agent_session_core::Result<()> {
        self.tools.push(definition);
        Ok(())
    }

    async fn deregister_tool(&mut self, name: &str) -> agent_session_core::Result<()> {
        self.tools.retain(|t| t.name != name);
        Ok(())
    }

    async fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }

    async fn token_usage(&self) -> SessionTokenUsage {
        self.cumulative
    }

    async fn max_tokens(&self) -> u64 {
        1_000_000
    }

    async fn history(&self) -> (String, Vec<Message>) {
        (self.system_prompt.clone(), Vec::new())
    }
}
