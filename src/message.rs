//! Messages and persisted records.
//!
//! A [`Message`] is the in-memory conversational unit the turn loop and the
//! provider adapter trade back and forth. A [`Record`] is what the
//! [`crate::store::Store`] persists: a `Message` plus the envelope fields
//! (id, liveness, status, token counts, timestamp, session id) described in
//! the data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;

/// Role of a message's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a conversation: a role plus an ordered sequence of content
/// blocks. A single message may mix text with tool calls (an assistant turn
/// that both narrates and calls) or carry multiple tool results (a tool turn
/// answering several concurrent calls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_contents"
    )]
    pub contents: Vec<ContentBlock>,
}

/// Drops any content block with no populated payload. Defensive: older
/// payloads sometimes carried zero-valued blocks, and the wire contract
/// forbids handing them back to callers.
fn deserialize_contents<'de, D>(deserializer: D) -> std::result::Result<Vec<ContentBlock>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Vec<ContentBlock> = Vec::deserialize(deserializer)?;
    Ok(raw.into_iter().filter(|c| !c.is_empty()).collect())
}

impl Message {
    pub fn new(role: Role, contents: Vec<ContentBlock>) -> Self {
        Self { role, contents }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// An empty message builder for a given role, to be filled in with
    /// `add_*` calls.
    pub fn empty(role: Role) -> Self {
        Self::new(role, Vec::new())
    }

    pub fn add_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.contents.push(ContentBlock::text(text));
        self
    }

    pub fn add_tool_call(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        args_json: impl Into<String>,
    ) -> &mut Self {
        self.contents.push(ContentBlock::tool_call(id, name, args_json));
        self
    }

    pub fn add_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        error: Option<String>,
    ) -> &mut Self {
        self.contents
            .push(ContentBlock::tool_result(tool_call_id, name, content, error));
        self
    }

    pub fn add_thinking(&mut self, text: impl Into<String>, signature: Option<String>) -> &mut Self {
        self.contents.push(ContentBlock::thinking(text, signature));
        self
    }

    pub fn add_system_reminder(&mut self, text: impl Into<String>) -> &mut Self {
        self.contents.push(ContentBlock::system_reminder(text));
        self
    }

    /// Concatenates every text block's contents with `\n`.
    pub fn get_text(&self) -> String {
        self.contents
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn get_tool_calls(&self) -> Vec<(&str, &str, &str)> {
        self.contents.iter().filter_map(ContentBlock::as_tool_call).collect()
    }

    pub fn get_tool_results(&self) -> Vec<(&str, &str, &str, Option<&str>)> {
        self.contents
            .iter()
            .filter_map(ContentBlock::as_tool_result)
            .collect()
    }

    pub fn has_text(&self) -> bool {
        self.contents.iter().any(ContentBlock::is_text)
    }

    pub fn has_tool_calls(&self) -> bool {
        self.contents.iter().any(ContentBlock::is_tool_call)
    }

    pub fn has_tool_results(&self) -> bool {
        self.contents.iter().any(ContentBlock::is_tool_result)
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Returns a copy of this message with every `SystemReminder` block
    /// stripped. Used by `history()` to hide ephemeral reminders from the
    /// caller-visible conversation.
    pub fn without_system_reminders(&self) -> Self {
        Self {
            role: self.role,
            contents: self
                .contents
                .iter()
                .filter(|c| !c.is_system_reminder())
                .cloned()
                .collect(),
        }
    }
}

/// Transient vs. finalized state of a persisted [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Success,
    Failed,
}

/// A persisted message with the envelope the store, the compaction
/// scheduler, and the turn loop all reason about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Monotonic within a session.
    pub id: u64,
    pub session_id: String,
    pub role: Role,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_contents"
    )]
    pub contents: Vec<ContentBlock>,
    /// `false` means logically removed by compaction.
    pub live: bool,
    pub status: RecordStatus,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Builds a new, not-yet-persisted record. `id` is assigned by the
    /// store on `add_record`; `0` is a placeholder.
    pub fn new(session_id: impl Into<String>, message: Message, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            session_id: session_id.into(),
            role: message.role,
            contents: message.contents,
            live: true,
            status: RecordStatus::Pending,
            input_tokens: 0,
            output_tokens: 0,
            timestamp,
        }
    }

    pub fn message(&self) -> Message {
        Message::new(self.role, self.contents.clone())
    }

    pub fn is_empty_message(&self) -> bool {
        self.contents.is_empty()
    }

    /// Drops any content block that failed the empty-block check —
    /// deserialization must never hand a zero-valued block back to a
    /// caller.
    pub fn drop_empty_blocks(&mut self) {
        self.contents.retain(|c| !c.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_text_joins_with_newline() {
        let mut msg = Message::empty(Role::Assistant);
        msg.add_text("first").add_text("second");
        assert_eq!(msg.get_text(), "first\nsecond");
    }

    #[test]
    fn test_mixed_text_and_tool_call() {
        let mut msg = Message::empty(Role::Assistant);
        msg.add_text("narrating...").add_tool_call("t1", "echo", "{}");
        assert!(msg.has_text());
        assert!(msg.has_tool_calls());
        assert_eq!(msg.get_tool_calls(), vec![("t1", "echo", "{}")]);
    }

    #[test]
    fn test_multiple_tool_results_in_one_message() {
        let mut msg = Message::empty(Role::Tool);
        msg.add_tool_result("t1", "echo", "a", None);
        msg.add_tool_result("t2", "echo", "b", Some("oops".into()));
        let results = msg.get_tool_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].3, Some("oops"));
    }

    #[test]
    fn test_without_system_reminders_drops_only_reminders() {
        let mut msg = Message::empty(Role::User);
        msg.add_system_reminder("reminder").add_text("hello");
        let filtered = msg.without_system_reminders();
        assert_eq!(filtered.contents.len(), 1);
        assert_eq!(filtered.get_text(), "hello");
    }

    #[test]
    fn test_record_drop_empty_blocks() {
        let mut record = Record::new("s1", Message::empty(Role::Assistant), Utc::now());
        record.contents.push(ContentBlock::text(""));
        record.contents.push(ContentBlock::tool_call("t1", "echo", "{}"));
        record.drop_empty_blocks();
        assert_eq!(record.contents.len(), 1);
    }

    #[test]
    fn test_record_round_trip_json() {
        let mut msg = Message::empty(Role::Assistant);
        msg.add_tool_call("t1", "echo", "{}");
        let record = Record::new("s1", msg, Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.contents, record.contents);
        assert!(back.contents.iter().all(|c| !c.is_empty()));
    }
}
