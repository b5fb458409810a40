//! Streaming event protocol (§6.2).
//!
//! Events are delivered to the caller's sink in the order the provider
//! emits them. A sink that returns an error cancels the turn with that
//! error — the session treats the sink exactly like any other fallible
//! suspension point.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// A tool call surfaced in a `ToolCall` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEvent {
    pub id: String,
    pub name: String,
    pub args_json: String,
}

/// A tool result surfaced in a `ToolResult` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultEvent {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One event in the ordered trace the session emits while driving a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental text chunk.
    Content { text: String },
    /// Incremental reasoning chunk.
    Thinking { text: String },
    /// Final reasoning summary, with an optional duration in milliseconds.
    ThinkingSummary {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    /// One or more tool calls the model requested.
    ToolCall { calls: Vec<ToolCallEvent> },
    /// One or more tool results persisted back to the model.
    ToolResult { results: Vec<ToolResultEvent> },
    /// Terminal event for a round or turn.
    Done { finish_reason: String },
}

/// Caller-supplied sink for [`StreamEvent`]s. Boxed so both closures and
/// `Arc`-shared multi-consumer sinks work; `Send + Sync` so it can be
/// invoked from whichever task is driving the provider round.
pub type StreamSink = Arc<dyn Fn(StreamEvent) -> Result<()> + Send + Sync>;
