//! Compaction strategy (§4.3).
//!
//! The session passes the oldest contiguous run of non-system live records
//! whose combined tokens meet the reclaim target; a `Summarizer` turns that
//! run into replacement text. The interface is intentionally narrow so
//! callers can supply their own compression algorithm.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::message::{Record, Role};
use crate::provider::{ProviderClient, SendOptions};

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, records: &[Record], cancel: CancellationToken) -> Result<String>;
}

/// Renders a record's role-prefixed text for either reference strategy.
fn render_record(record: &Record) -> String {
    let role = match record.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    format!("{role}: {}", record.message().get_text())
}

/// Sends the records plus a configurable prompt to a caller-supplied
/// provider and returns its text verbatim.
pub struct LlmSummarizer {
    provider: Arc<dyn ProviderClient>,
    prompt: String,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn ProviderClient>, prompt: impl Into<String>) -> Self {
        Self {
            provider,
            prompt: prompt.into(),
        }
    }

    pub fn default_prompt() -> String {
        "Summarize the following conversation so it can replace the original \
         messages without losing information the assistant will need later."
            .to_string()
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, records: &[Record], cancel: CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled("summarization cancelled before starting"));
        }

        let body = records.iter().map(render_record).collect::<Vec<_>>().join("\n");
        let mut chat = self.provider.new_chat(&self.prompt, vec![]).await?;

        let user_msg = crate::message::Message::user_text(body);
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::cancelled("summarization cancelled"));
            }
            result = chat.message(&[user_msg], &[], SendOptions::default(), cancel.clone()) => result?,
        };

        Ok(reply.get_text())
    }
}

/// No-provider fallback: the first `head` records concatenated, an ellipsis
/// marker, then the last `tail` records.
pub struct HeadTailSummarizer {
    pub head: usize,
    pub tail: usize,
}

impl HeadTailSummarizer {
    pub fn new(head: usize, tail: usize) -> Self {
        Self { head, tail }
    }
}

impl Default for HeadTailSummarizer {
    fn default() -> Self {
        Self::new(3, 3)
    }
}

#[async_trait]
impl Summarizer for HeadTailSummarizer {
    async fn summarize(&self, records: &[Record], _cancel: CancellationToken) -> Result<String> {
        if records.is_empty() {
            return Ok(String::new());
        }
        let head_n = self.head.min(records.len());
        let tail_n = self.tail.min(records.len().saturating_sub(head_n));

        let head_text = records[..head_n].iter().map(render_record).collect::<Vec<_>>().join("\n");
        let tail_text = records[records.len() - tail_n..]
            .iter()
            .map(render_record)
            .collect::<Vec<_>>()
            .join("\n");

        if tail_n == 0 {
            return Ok(head_text);
        }
        Ok(format!("{head_text}\n... (elided) ...\n{tail_text}"))
    }
}
