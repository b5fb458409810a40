//! Content blocks: the tagged union that makes up a [`crate::message::Message`].
//!
//! A content block has exactly one populated variant. Empty blocks (a
//! variant with no meaningful payload) are invalid and must never be
//! produced or accepted — every constructor on [`ContentBlock`] enforces
//! this, and deserialization drops any block that fails the check rather
//! than surfacing it to callers (older payloads sometimes carried
//! zero-valued blocks).

use serde::{Deserialize, Serialize};

/// A single unit of content inside a [`crate::message::Message`].
///
/// Mirrors the shape the SDK has always used for its `ContentBlock` enum,
/// extended with the variants a tool-calling, compacting agent session
/// needs: tool calls, tool results, reasoning traces, and ephemeral system
/// reminders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text, either model-generated or user-provided.
    Text { text: String },

    /// A tool call requested by the model.
    ToolCall {
        id: String,
        name: String,
        args_json: String,
    },

    /// The result of executing a tool call.
    ToolResult {
        tool_call_id: String,
        name: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },

    /// A reasoning/thinking trace, with an optional opaque signature some
    /// providers attach for verification on resend.
    Thinking {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        signature: Option<String>,
    },

    /// An ephemeral reminder injected into one turn. Persisted once but
    /// stripped from every subsequent history rebuild.
    SystemReminder { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args_json: impl Into<String>) -> Self {
        ContentBlock::ToolCall {
            id: id.into(),
            name: name.into(),
            args_json: args_json.into(),
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        error: Option<String>,
    ) -> Self {
        ContentBlock::ToolResult {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
            error,
        }
    }

    pub fn thinking(text: impl Into<String>, signature: Option<String>) -> Self {
        ContentBlock::Thinking {
            text: text.into(),
            signature,
        }
    }

    pub fn system_reminder(text: impl Into<String>) -> Self {
        ContentBlock::SystemReminder { text: text.into() }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ContentBlock::Text { .. })
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, ContentBlock::ToolCall { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, ContentBlock::ToolResult { .. })
    }

    pub fn is_thinking(&self) -> bool {
        matches!(self, ContentBlock::Thinking { .. })
    }

    pub fn is_system_reminder(&self) -> bool {
        matches!(self, ContentBlock::SystemReminder { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<(&str, &str, &str)> {
        match self {
            ContentBlock::ToolCall { id, name, args_json } => Some((id, name, args_json)),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<(&str, &str, &str, Option<&str>)> {
        match self {
            ContentBlock::ToolResult {
                tool_call_id,
                name,
                content,
                error,
            } => Some((tool_call_id, name, content, error.as_deref())),
            _ => None,
        }
    }

    /// Every `ContentBlock` variant defined above always carries a
    /// populated payload by construction; this check exists for the
    /// deserialization boundary, where a permissive older payload might
    /// carry a block whose string fields are all empty and semantically
    /// meaningless (e.g. a tool call with no id and no name).
    pub fn is_empty(&self) -> bool {
        match self {
            ContentBlock::Text { text } => text.is_empty(),
            ContentBlock::ToolCall { id, name, args_json } => {
                id.is_empty() && name.is_empty() && args_json.is_empty()
            }
            ContentBlock::ToolResult {
                tool_call_id,
                name,
                content,
                ..
            } => tool_call_id.is_empty() && name.is_empty() && content.is_empty(),
            ContentBlock::Thinking { text, .. } => text.is_empty(),
            ContentBlock::SystemReminder { text } => text.is_empty(),
        }
    }
}
