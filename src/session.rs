//! The session core: turn loop, tool dispatch, compaction scheduling,
//! streaming fan-out, and cancellation (§4.5).

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{SessionConfig, MAX_TOOL_ROUNDS};
use crate::content::ContentBlock;
use crate::context;
use crate::error::{Error, Result};
use crate::events::{StreamEvent, StreamSink, ToolCallEvent, ToolResultEvent};
use crate::message::{Message, Record, RecordStatus, Role};
use crate::metrics::SessionMetrics;
use crate::provider::{ChatSession, ProviderClient, SendOptions, SessionTokenUsage};
use crate::store::SharedStore;
use crate::summarizer::Summarizer;
use crate::tools::{ToolDefinition, ToolHandler, ToolRegistry, ToolRegistrySnapshot};

/// The two context carriers from §6.4, threaded through one turn.
#[derive(Clone, Default)]
pub struct TurnContext {
    /// Consulted once per turn at prepare time; its text becomes a
    /// `SystemReminder` block prepended to the incoming user record.
    pub system_reminder_fn: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    /// Path provider adapters may dump raw request/response bodies to for
    /// diagnostics. The core never reads it; it is only forwarded.
    pub debug_dir: Option<std::path::PathBuf>,
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("system_reminder_fn", &self.system_reminder_fn.is_some())
            .field("debug_dir", &self.debug_dir)
            .finish()
    }
}

/// Builds a new [`Session`] or restores one from an existing [`SharedStore`]
/// entry, mirroring the SDK's original `AgentOptionsBuilder` ergonomics.
pub struct SessionBuilder {
    store: Option<SharedStore>,
    provider: Option<Arc<dyn ProviderClient>>,
    system_prompt: String,
    summarizer: Option<Arc<dyn Summarizer>>,
    tools: Vec<(ToolDefinition, Arc<dyn ToolHandler>)>,
    config: SessionConfig,
    session_id: Option<String>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            store: None,
            provider: None,
            system_prompt: String::new(),
            summarizer: None,
            tools: Vec::new(),
            config: SessionConfig::default(),
            session_id: None,
        }
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ProviderClient>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn tool(mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools.push((definition, handler));
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Supplies a stable session id. New sessions otherwise receive a fresh
    /// one; restored sessions must reuse the caller-supplied id (see
    /// [`SessionBuilder::restore`]).
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Creates a brand-new session: persists the system record (if any),
    /// seeds metrics with the configured compaction threshold, and
    /// registers the builder's tools with both the local registry and the
    /// bound provider.
    pub async fn build(self) -> Result<Session> {
        let store = self.store.ok_or_else(|| Error::config("a Store is required"))?;
        let provider = self.provider.ok_or_else(|| Error::config("a ProviderClient is required"))?;
        let session_id = self.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut chat = provider.new_chat(&self.system_prompt, vec![]).await?;

        let registry = ToolRegistry::new();
        for (definition, handler) in self.tools {
            registry.register(definition.clone(), handler.clone()).await?;
            chat.register_tool(definition, handler).await?;
        }

        if !self.system_prompt.is_empty() {
            let mut record = Record::new(session_id.as_str(), Message::system(self.system_prompt.clone()), Utc::now());
            record.status = RecordStatus::Success;
            store.add_record(&session_id, record).await.map_err(|e| Error::store(e.to_string()))?;
        }

        let mut metrics = SessionMetrics::default();
        metrics.compaction_threshold = self.config.compaction_threshold;
        store
            .save_metrics(&session_id, metrics)
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        Ok(Session {
            session_id,
            store,
            chat: Mutex::new(chat),
            registry,
            summarizer: self.summarizer,
            config: RwLock::new(self.config),
            turn_guard: Mutex::new(()),
        })
    }

    /// Restores a previously-persisted session. The system prompt this
    /// builder was given is ignored — the restored session keeps whatever
    /// system record is already live in the store (§9, S4). Stale `pending`
    /// records from a crashed prior turn are transitioned to `failed`
    /// before the session accepts new turns (§7, "Recovery on load").
    pub async fn restore(self) -> Result<Session> {
        let store = self.store.ok_or_else(|| Error::config("a Store is required"))?;
        let provider = self.provider.ok_or_else(|| Error::config("a ProviderClient is required"))?;
        let session_id = self
            .session_id
            .ok_or_else(|| Error::config("restoring a session requires session_id(..)"))?;

        let records = store
            .get_all_records(&session_id)
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        for mut record in records.iter().cloned().filter(|r| r.status == RecordStatus::Pending) {
            record.status = RecordStatus::Failed;
            store
                .update_record(&session_id, record.id, record)
                .await
                .map_err(|e| Error::store(e.to_string()))?;
        }

        let system_prompt = records
            .iter()
            .find(|r| r.role == Role::System)
            .map(|r| r.message().get_text())
            .unwrap_or_default();

        let mut chat = provider.new_chat(&system_prompt, vec![]).await?;

        let registry = ToolRegistry::new();
        for (definition, handler) in self.tools {
            registry.register(definition.clone(), handler.clone()).await?;
            chat.register_tool(definition, handler).await?;
        }

        // Ensures metrics exist; a missing entry returns (and this leaves
        // persisted) the default, never clobbering a persisted threshold.
        let existing = store
            .load_metrics(&session_id)
            .await
            .map_err(|e| Error::store(e.to_string()))?;
        store
            .save_metrics(&session_id, existing)
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        Ok(Session {
            session_id,
            store,
            chat: Mutex::new(chat),
            registry,
            summarizer: self.summarizer,
            config: RwLock::new(self.config),
            turn_guard: Mutex::new(()),
        })
    }
}

/// A long-lived, provider-bound conversational session.
pub struct Session {
    session_id: String,
    store: SharedStore,
    chat: Mutex<Box<dyn ChatSession>>,
    registry: ToolRegistry,
    summarizer: Option<Arc<dyn Summarizer>>,
    config: RwLock<SessionConfig>,
    /// Held for the duration of one turn; a second concurrent `message()`
    /// call observes it locked and fails fast with `ConcurrentTurn` rather
    /// than queuing.
    turn_guard: Mutex<()>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Reconstructs the caller-visible conversation from live records:
    /// drops the system record (returned separately), strips
    /// `SystemReminder` blocks, and omits messages that become empty after
    /// stripping.
    pub async fn history(&self) -> Result<(String, Vec<Message>)> {
        let live = self
            .store
            .get_live_records(&self.session_id)
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        let mut system_prompt = String::new();
        let mut messages = Vec::new();
        for record in live {
            if record.role == Role::System {
                system_prompt = record.message().get_text();
                continue;
            }
            let filtered = record.message().without_system_reminders();
            if filtered.is_empty() {
                continue;
            }
            messages.push(filtered);
        }
        Ok((system_prompt, messages))
    }

    pub async fn token_usage(&self) -> SessionTokenUsage {
        self.chat.lock().await.token_usage().await
    }

    pub async fn max_tokens(&self) -> u64 {
        self.chat.lock().await.max_tokens().await
    }

    pub async fn metrics(&self) -> Result<SessionMetrics> {
        self.store
            .load_metrics(&self.session_id)
            .await
            .map_err(|e| Error::store(e.to_string()))
    }

    pub async fn register_tool(&self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Result<()> {
        self.registry.register(definition.clone(), handler.clone()).await?;
        self.chat.lock().await.register_tool(definition, handler).await
    }

    pub async fn deregister_tool(&self, name: &str) -> Result<()> {
        self.registry.deregister(name).await;
        self.chat.lock().await.deregister_tool(name).await
    }

    pub async fn list_tools(&self) -> Vec<String> {
        self.registry.list_names().await
    }

    /// Clamped to `[0.0, 1.0]`; `0.0` disables automatic compaction and is
    /// persisted as given, not replaced by a default on the next reload.
    pub async fn set_compaction_threshold(&self, threshold: f64) -> Result<()> {
        let mut metrics = self.metrics().await?;
        metrics.set_threshold(threshold);
        self.store
            .save_metrics(&self.session_id, metrics)
            .await
            .map_err(|e| Error::store(e.to_string()))
    }

    /// Forces a compaction pass regardless of the configured threshold.
    pub async fn compact_now(&self, cancel: CancellationToken) -> Result<()> {
        self.run_compaction(cancel, true).await
    }

    /// The turn loop (§4.5.2). Returns the final assistant message, or an
    /// error if the turn fails at any state.
    pub async fn message(
        &self,
        user_msg: Message,
        turn: TurnContext,
        options: SendOptions,
        cancel: CancellationToken,
    ) -> Result<Message> {
        let _guard = self
            .turn_guard
            .try_lock()
            .map_err(|_| Error::ConcurrentTurn)?;

        if cancel.is_cancelled() {
            return Err(Error::cancelled("turn cancelled before it started"));
        }

        // --- Preparing ---
        let now = Utc::now();
        let mut pending = Record::new(self.session_id.as_str(), user_msg, now);
        if let Some(reminder_fn) = &turn.system_reminder_fn {
            pending.contents.insert(0, ContentBlock::system_reminder(reminder_fn()));
        }
        let pending_id = self
            .store
            .add_record(&self.session_id, pending)
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        let mut in_turn_ids = vec![pending_id];

        // --- Compacting? ---
        if let Err(err) = self.run_compaction(cancel.clone(), false).await {
            if err.is_locally_recoverable() {
                log::warn!("compaction skipped for session {}: {err}", self.session_id);
            } else {
                self.finalize(&in_turn_ids, false).await;
                return Err(err);
            }
        }

        // --- Sending / AwaitingTools / Dispatching ---
        let stream = options.stream.clone();
        match self.run_rounds(&mut in_turn_ids, &options, &stream, cancel.clone()).await {
            Ok(final_msg) => {
                self.finalize(&in_turn_ids, true).await;
                Ok(final_msg)
            }
            Err(err) => {
                self.finalize(&in_turn_ids, false).await;
                Err(err)
            }
        }
    }

    async fn run_rounds(
        &self,
        in_turn_ids: &mut Vec<u64>,
        options: &SendOptions,
        stream: &Option<StreamSink>,
        cancel: CancellationToken,
    ) -> Result<Message> {
        let snapshot = self.registry.snapshot().await;
        let tool_defs: Vec<ToolDefinition> = snapshot.definitions().to_vec();

        let mut round: u32 = 0;
        loop {
            if round >= MAX_TOOL_ROUNDS {
                return Err(Error::tool_loop_overflow(MAX_TOOL_ROUNDS));
            }
            round += 1;

            if cancel.is_cancelled() {
                return Err(Error::cancelled("turn cancelled mid-round"));
            }

            let live = self
                .store
                .get_live_records(&self.session_id)
                .await
                .map_err(|e| Error::store(e.to_string()))?;
            let history: Vec<Message> = live.iter().map(Record::message).collect();

            let assistant_msg = {
                let mut chat = self.chat.lock().await;
                chat.message(&history, &tool_defs, options.clone(), cancel.clone()).await?
            };

            let mut to_persist = assistant_msg.clone();
            to_persist.contents.retain(|c| !c.is_empty());
            let assistant_record = Record::new(self.session_id.as_str(), to_persist, Utc::now());
            let assistant_id = self
                .store
                .add_record(&self.session_id, assistant_record)
                .await
                .map_err(|e| Error::store(e.to_string()))?;
            in_turn_ids.push(assistant_id);
            self.attribute_last_message_tokens(assistant_id).await?;

            if !assistant_msg.has_tool_calls() {
                return Ok(assistant_msg);
            }

            let calls: Vec<ToolCallEvent> = assistant_msg
                .get_tool_calls()
                .into_iter()
                .map(|(id, name, args_json)| ToolCallEvent {
                    id: id.to_string(),
                    name: name.to_string(),
                    args_json: args_json.to_string(),
                })
                .collect();
            Self::emit(stream, StreamEvent::ToolCall { calls: calls.clone() })?;

            let results = self.dispatch_tools(&snapshot, calls, cancel.clone()).await;

            let mut tool_msg = Message::empty(Role::Tool);
            for r in &results {
                tool_msg.add_tool_result(r.tool_call_id.clone(), r.name.clone(), r.content.clone(), r.error.clone());
            }
            let tool_record = Record::new(self.session_id.as_str(), tool_msg, Utc::now());
            let tool_id = self
                .store
                .add_record(&self.session_id, tool_record)
                .await
                .map_err(|e| Error::store(e.to_string()))?;
            in_turn_ids.push(tool_id);

            Self::emit(stream, StreamEvent::ToolResult { results })?;
        }
    }

    async fn dispatch_tools(
        &self,
        snapshot: &ToolRegistrySnapshot,
        calls: Vec<ToolCallEvent>,
        cancel: CancellationToken,
    ) -> Vec<ToolResultEvent> {
        let futures = calls.into_iter().map(|call| {
            let handler = snapshot.handler(&call.name);
            let cancel = cancel.clone();
            async move {
                match handler {
                    None => ToolResultEvent {
                        tool_call_id: call.id,
                        name: call.name.clone(),
                        content: format!("tool '{}' is not registered", call.name),
                        error: Some("not_found".to_string()),
                    },
                    Some(handler) => match handler.call(&call.args_json, cancel).await {
                        Ok(value) => {
                            let error = value
                                .get("error")
                                .and_then(|v| v.as_str())
                                .map(|s| s.to_string());
                            ToolResultEvent {
                                tool_call_id: call.id,
                                name: call.name,
                                content: value.to_string(),
                                error,
                            }
                        }
                        Err(err) => ToolResultEvent {
                            tool_call_id: call.id,
                            name: call.name,
                            content: err.to_string(),
                            error: Some(err.to_string()),
                        },
                    },
                }
            }
        });
        futures::future::join_all(futures).await
    }

    async fn attribute_last_message_tokens(&self, record_id: u64) -> Result<()> {
        let usage = self.chat.lock().await.token_usage().await;
        let mut record = self
            .store
            .get_record(&self.session_id, record_id)
            .await
            .map_err(|e| Error::store(e.to_string()))?;
        record.input_tokens = usage.last_message.input_tokens;
        record.output_tokens = usage.last_message.output_tokens;
        self.store
            .update_record(&self.session_id, record_id, record)
            .await
            .map_err(|e| Error::store(e.to_string()))
    }

    /// Finalizing / Failing state: transitions every record created during
    /// the turn from `pending` to `success` or `failed`, and on success
    /// refreshes cumulative token usage from the provider's report.
    async fn finalize(&self, in_turn_ids: &[u64], success: bool) {
        let status = if success { RecordStatus::Success } else { RecordStatus::Failed };
        for &id in in_turn_ids {
            let Ok(mut record) = self.store.get_record(&self.session_id, id).await else {
                continue;
            };
            record.status = status;
            if self.store.update_record(&self.session_id, id, record).await.is_err() {
                log::warn!("failed to finalize record {id} in session {}", self.session_id);
            }
        }

        if success {
            let usage = self.chat.lock().await.token_usage().await;
            if let Ok(mut metrics) = self.metrics().await {
                metrics.cumulative_tokens = usage.cumulative.input_tokens + usage.cumulative.output_tokens;
                let _ = self.store.save_metrics(&self.session_id, metrics).await;
            }
        }
    }

    /// Shared compaction implementation. `force` bypasses the
    /// percent-full gate (used by `compact_now`); the regular turn path
    /// still checks the configured threshold first.
    async fn run_compaction(&self, cancel: CancellationToken, force: bool) -> Result<()> {
        let metrics = self.metrics().await?;
        if !force && metrics.compaction_threshold <= 0.0 {
            return Ok(());
        }

        let max_tokens = self.max_tokens().await;
        let live = self
            .store
            .get_live_records(&self.session_id)
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        let effective_threshold = if metrics.compaction_threshold > 0.0 {
            metrics.compaction_threshold
        } else {
            crate::config::DEFAULT_COMPACTION_THRESHOLD
        };

        if !force {
            let pf = context::percent_full(&live, max_tokens);
            if pf < effective_threshold {
                return Ok(());
            }
        }

        let target = context::reclaim_target(context::live_tokens(&live), max_tokens, effective_threshold);
        let selection = context::select_for_compaction(&live, target);
        if selection.records.is_empty() {
            return Ok(());
        }

        let summarizer = self
            .summarizer
            .as_ref()
            .ok_or_else(|| Error::summarizer("no summarizer configured"))?;
        // Normalize whatever the summarizer's bound provider failed with
        // (e.g. `Error::Provider`) into `Error::Summarizer` so it reads as
        // locally recoverable to `message()`; a cancellation is left as-is
        // so it still aborts the turn rather than being swallowed.
        let summary_text = summarizer
            .summarize(&selection.records, cancel)
            .await
            .map_err(|e| match e {
                Error::Cancelled(_) => e,
                other => Error::summarizer(other.to_string()),
            })?;

        for record in &selection.records {
            self.store
                .mark_dead(&self.session_id, record.id)
                .await
                .map_err(|e| Error::store(e.to_string()))?;
        }

        let marker = self.config.read().await.summary_marker.clone();
        let text = format!("{marker}\n{summary_text}");
        let earliest_timestamp = selection
            .records
            .iter()
            .map(|r| r.timestamp)
            .min()
            .unwrap_or_else(Utc::now);

        let mut summary_record = Record::new(self.session_id.as_str(), Message::assistant_text(text), earliest_timestamp);
        summary_record.status = RecordStatus::Success;
        self.store
            .add_record(&self.session_id, summary_record)
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        let mut metrics = metrics;
        metrics.record_compaction(Utc::now());
        self.store
            .save_metrics(&self.session_id, metrics)
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        Ok(())
    }

    fn emit(stream: &Option<StreamSink>, event: StreamEvent) -> Result<()> {
        match stream {
            Some(sink) => sink(event),
            None => Ok(()),
        }
    }
}
