//! Session configuration.
//!
//! Mirrors the shape of the SDK's original `AgentOptionsBuilder`: a fluent
//! builder with validation in `build()`. What it configures is narrower,
//! since the core owns only the knobs §4.5.1 and §9 give it — the hard
//! 10-round tool cap is not one of them.

use crate::error::{Error, Result};

/// The only magic number besides the 10-round tool cap that the core owns.
pub const DEFAULT_COMPACTION_THRESHOLD: f64 = 0.8;

/// Default marker prefix for compaction summary records.
pub const DEFAULT_SUMMARY_MARKER: &str = "[Previous conversation summary]";

/// Hard cap on provider rounds within a single turn (§4.5.2 step 5).
pub const MAX_TOOL_ROUNDS: u32 = 10;

/// Configuration for a [`crate::session::Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub compaction_threshold: f64,
    pub summary_marker: String,
    pub debug_dir: Option<std::path::PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            summary_marker: DEFAULT_SUMMARY_MARKER.to_string(),
            debug_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    compaction_threshold: Option<f64>,
    summary_marker: Option<String>,
    debug_dir: Option<std::path::PathBuf>,
}

impl SessionConfigBuilder {
    /// Clamped to `[0.0, 1.0]` at build time, same as
    /// `Session::set_compaction_threshold`.
    pub fn compaction_threshold(mut self, threshold: f64) -> Self {
        self.compaction_threshold = Some(threshold);
        self
    }

    pub fn summary_marker(mut self, marker: impl Into<String>) -> Self {
        self.summary_marker = Some(marker.into());
        self
    }

    pub fn debug_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<SessionConfig> {
        let marker = self.summary_marker.unwrap_or_else(|| DEFAULT_SUMMARY_MARKER.to_string());
        if marker.is_empty() {
            return Err(Error::config("summary_marker must not be empty"));
        }
        Ok(SessionConfig {
            compaction_threshold: self
                .compaction_threshold
                .unwrap_or(DEFAULT_COMPACTION_THRESHOLD)
                .clamp(0.0, 1.0),
            summary_marker: marker,
            debug_dir: self.debug_dir,
        })
    }
}
