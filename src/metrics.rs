//! Per-session metrics, persisted separately from records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compaction bookkeeping and cumulative token usage for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub compaction_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compaction_time: Option<DateTime<Utc>>,
    pub cumulative_tokens: u64,
    /// Clamped to `[0.0, 1.0]`. `0.0` disables automatic compaction; this
    /// is a deliberate, persisted setting, never silently replaced with a
    /// default on reload.
    pub compaction_threshold: f64,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self {
            compaction_count: 0,
            last_compaction_time: None,
            cumulative_tokens: 0,
            compaction_threshold: crate::config::DEFAULT_COMPACTION_THRESHOLD,
        }
    }
}

impl SessionMetrics {
    pub fn record_compaction(&mut self, at: DateTime<Utc>) {
        self.compaction_count += 1;
        self.last_compaction_time = Some(at);
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.compaction_threshold = threshold.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold_matches_config_default() {
        let metrics = SessionMetrics::default();
        assert_eq!(metrics.compaction_threshold, 0.8);
    }

    #[test]
    fn test_set_threshold_clamps() {
        let mut metrics = SessionMetrics::default();
        metrics.set_threshold(-1.0);
        assert_eq!(metrics.compaction_threshold, 0.0);
        metrics.set_threshold(5.0);
        assert_eq!(metrics.compaction_threshold, 1.0);
    }

    #[test]
    fn test_record_compaction_increments() {
        let mut metrics = SessionMetrics::default();
        let now = Utc::now();
        metrics.record_compaction(now);
        assert_eq!(metrics.compaction_count, 1);
        assert_eq!(metrics.last_compaction_time, Some(now));
    }
}
