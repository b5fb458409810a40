//! # Agent Session Core
//!
//! A provider-neutral runtime for building LLM-driven conversational agents
//! with tool use. This crate owns the turn loop, the message and content
//! block model, context-window compaction, durable/resumable persistence,
//! and the streaming event protocol — it does not speak to any specific
//! model provider's wire format. Bind it to one by implementing
//! [`ProviderClient`]/[`ChatSession`].
//!
//! ## Key Features
//!
//! - **Provider-neutral**: the turn loop, compaction, and persistence are
//!   all independent of which model or HTTP API sits behind `ChatSession`.
//! - **Durable and resumable**: every record a turn produces is persisted
//!   through a [`Store`] before the turn proceeds; a crashed session can be
//!   reopened with [`SessionBuilder::restore`].
//! - **Context-window compaction**: an automatic or on-demand pass that
//!   summarizes the oldest eligible records once the live history crosses a
//!   configurable percentage of the provider's context window.
//! - **Tool calling**: a turn-scoped, snapshotted registry dispatches
//!   concurrent tool calls and persists their results alongside the
//!   conversation.
//! - **Streaming**: an ordered [`StreamEvent`] protocol for incremental
//!   text, reasoning, tool calls, and tool results.
//! - **Cancellation**: every suspension point accepts a
//!   [`tokio_util::sync::CancellationToken`] and aborts promptly when it
//!   trips.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_session_core::{Session, InMemoryStore, SendOptions, TurnContext};
//! use tokio_util::sync::CancellationToken;
//! use std::sync::Arc;
//!
//! # async fn run(provider: Arc<dyn agent_session_core::ProviderClient>) -> agent_session_core::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let session = Session::builder()
//!     .store(store)
//!     .provider(provider)
//!     .system_prompt("You are a helpful assistant")
//!     .build()
//!     .await?;
//!
//! let reply = session
//!     .message(
//!         agent_session_core::Message::user_text("What's 2+2?"),
//!         TurnContext::default(),
//!         SendOptions::default(),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! println!("{}", reply.get_text());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **session**: the turn loop, state machine, tool dispatch, and
//!   compaction scheduling — the part most callers interact with directly.
//! - **message**: `Message`/`Record`, the in-memory and persisted units of
//!   conversation.
//! - **content**: `ContentBlock`, the tagged union inside a message.
//! - **store**: the persistence contract plus an in-memory reference
//!   backend.
//! - **provider**: the narrow contract a model adapter implements.
//! - **tools**: the tool registry and turn-start snapshotting.
//! - **summarizer**: pluggable compaction strategies.
//! - **context**: token estimation and the compaction selection policy.
//! - **events**: the streaming event protocol.
//! - **metrics**: per-session compaction and token bookkeeping.
//! - **config**: session-wide configuration and its builder.
//! - **error**: the crate's error type and conversions.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Content blocks: the tagged union that makes up a message.
mod content;

/// Session-wide configuration and its builder.
mod config;

/// Token estimation and the context-window compaction selection policy.
mod context;

/// The crate's error type and conversions.
mod error;

/// Streaming event protocol for incremental provider output and tool
/// dispatch.
mod events;

/// Messages and persisted records.
mod message;

/// Per-session compaction and token bookkeeping, persisted separately from
/// records.
mod metrics;

/// The provider adapter contract a model binding implements.
mod provider;

/// The turn loop: state machine, tool dispatch, compaction scheduling, and
/// cancellation.
mod session;

/// Persistence contract and an in-memory reference backend.
mod store;

/// Pluggable compaction strategies.
mod summarizer;

/// Tool definition and turn-scoped registry.
mod tools;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

// --- Session Core ---

pub use session::{
    /// A long-lived, provider-bound conversational session: owns the turn
    /// loop, the tool registry, and the bound provider's chat handle.
    Session,

    /// Builds a new session or restores one from an existing store entry.
    SessionBuilder,

    /// Per-turn ambient context: the system-reminder generator and an
    /// optional debug-dump directory, threaded through `Session::message`.
    TurnContext,
};

// --- Messages and Content ---

pub use message::{
    /// A message in a conversation: a role plus an ordered sequence of
    /// content blocks.
    Message,

    /// A persisted message with the envelope the store, the compaction
    /// scheduler, and the turn loop all reason about.
    Record,

    /// Transient vs. finalized state of a persisted `Record`.
    RecordStatus,

    /// Role of a message's author (System, User, Assistant, Tool).
    Role,
};

pub use content::ContentBlock;

// --- Persistence ---

pub use store::{
    /// In-memory reference `Store`, useful for tests and non-durable
    /// sessions.
    InMemoryStore,

    /// Shared handle to a `Store` backend, bound to a session at build time.
    SharedStore,

    /// Session-scoped persistence contract. Implement this against your own
    /// durable backend to make sessions crash-recoverable.
    Store,
};

pub use metrics::SessionMetrics;

// --- Provider Binding ---

pub use provider::{
    /// A bound, stateful chat conversation against one provider.
    ChatSession,

    /// Creates bound `ChatSession`s against one provider.
    ProviderClient,

    /// A provider-reported JSON schema response format request.
    ResponseFormat,

    /// Per-call options threaded into `ChatSession::message`.
    SendOptions,

    /// Token usage reported by the provider for the last message and
    /// cumulatively across the chat session's lifetime.
    SessionTokenUsage,

    /// A single usage report: input and output token counts.
    TokenUsage,
};

// --- Tools ---

pub use tools::{
    /// Metadata describing a tool the provider may call.
    ToolDefinition,

    /// A tool's execution logic.
    ToolHandler,

    /// Thread-safe, insertion-ordered registry of tools.
    ToolRegistry,

    /// An immutable view of the registry taken at turn start.
    ToolRegistrySnapshot,
};

// --- Compaction ---

pub use summarizer::{
    /// No-provider fallback: head records, an ellipsis marker, then tail
    /// records.
    HeadTailSummarizer,

    /// Delegates compaction to a bound provider.
    LlmSummarizer,

    /// Turns a contiguous run of records into replacement summary text.
    Summarizer,
};

pub use context::estimate_tokens;

// --- Streaming ---

pub use events::{StreamEvent, StreamSink, ToolCallEvent, ToolResultEvent};

// --- Configuration ---

pub use config::{SessionConfig, SessionConfigBuilder, DEFAULT_COMPACTION_THRESHOLD, MAX_TOOL_ROUNDS};

// --- Error Handling ---

pub use error::{
    /// Comprehensive error type covering every failure mode the session
    /// runtime can surface.
    Error,

    /// Type alias for `Result<T, Error>` used throughout the crate.
    Result,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module with the types most callers need.
/// Import with `use agent_session_core::prelude::*;`.
pub mod prelude {
    pub use crate::{
        ChatSession, ContentBlock, Error, InMemoryStore, Message, ProviderClient, Record, Result,
        SendOptions, Session, SessionBuilder, SessionConfig, Store, StreamEvent, ToolDefinition,
        ToolHandler, TurnContext,
    };
}
