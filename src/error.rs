//! # Error Types for the Agent Session Runtime
//!
//! This module defines every error kind the session runtime can surface,
//! following the same shape as the SDK's original error module: a single
//! `thiserror`-derived enum with convenience constructors, plus automatic
//! `#[from]` conversions for the error types callers are most likely to
//! propagate with `?`.
//!
//! ## Error Categories
//!
//! - **Provider**: the bound `ProviderClient`/`ChatSession` failed (network,
//!   auth, quota, malformed response). The adapter owns retrying transient
//!   failures; the core surfaces whatever it was handed.
//! - **ToolHandler**: a registered tool handler returned an error-shaped
//!   result. Not fatal — the turn persists the error and keeps going.
//! - **ToolLoopOverflow**: more than 10 provider rounds in a single turn.
//! - **ConcurrentTurn**: a second `message()` call arrived while one was
//!   already in flight on the same session.
//! - **Cancelled**: the turn's cancellation token was tripped.
//! - **Store**: the persistence backend failed a record or metrics
//!   operation.
//! - **Summarizer**: compaction failed; the turn proceeds without compacting.
//! - **Schema**: tool registration was rejected (duplicate name bound to a
//!   different handler, invalid schema).
//! - **Config**: invalid `SessionConfig`/builder input.
//! - **InvalidInput**: malformed caller input (e.g. an empty content block).
//! - **Json**: serialization/deserialization failure, auto-converted from
//!   `serde_json::Error`.
//! - **Other**: catch-all, used sparingly.

use thiserror::Error;

/// Type alias for `Result<T, Error>` used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type covering every failure mode in the session
/// runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// The bound provider adapter failed to produce a response.
    #[error("provider error: {0}")]
    Provider(String),

    /// A tool handler returned an error-shaped result. Non-fatal to the
    /// turn: the result is persisted with `error` set and the round
    /// continues.
    #[error("tool handler error ({tool}): {message}")]
    ToolHandler { tool: String, message: String },

    /// More than 10 provider rounds occurred within one turn.
    #[error("tool loop exceeded the maximum of {max} rounds")]
    ToolLoopOverflow { max: u32 },

    /// A second `message()` call arrived while one was already in flight.
    #[error("a turn is already in progress on this session")]
    ConcurrentTurn,

    /// The turn's cancellation token was tripped before completion.
    #[error("turn cancelled: {0}")]
    Cancelled(String),

    /// The persistence backend failed a record or metrics operation.
    #[error("store error: {0}")]
    Store(String),

    /// Compaction failed; the caller should treat this as a warning, not a
    /// turn failure.
    #[error("summarizer error: {0}")]
    Summarizer(String),

    /// Tool registration was rejected.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid configuration supplied to a builder.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid input supplied by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Miscellaneous error that doesn't fit another category.
    #[error("error: {0}")]
    Other(String),
}

impl Error {
    pub fn provider(msg: impl Into<String>) -> Self {
        Error::Provider(msg.into())
    }

    pub fn tool_handler(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolHandler {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn tool_loop_overflow(max: u32) -> Self {
        Error::ToolLoopOverflow { max }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Error::Cancelled(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    pub fn summarizer(msg: impl Into<String>) -> Self {
        Error::Summarizer(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// True for errors §7 classifies as locally recoverable (the turn may
    /// continue rather than fail outright): tool-handler errors and
    /// summarizer errors.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(self, Error::ToolHandler { .. } | Error::Summarizer(_))
    }
}
