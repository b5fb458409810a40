//! Persistence contract and an in-memory reference backend.
//!
//! `Store` is session-scoped storage, not the source of truth for in-flight
//! turn state — the [`crate::session::Session`] owns that. Compound
//! operations (e.g. adding several records during one tool round) are
//! issued as individual calls and may be partially applied under a crash;
//! recovery is handled by `Session::restore` detecting stale `pending`
//! records, not by the store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::message::Record;
use crate::metrics::SessionMetrics;

/// Session-scoped persistence contract. Backends may be in-memory or
/// durable; a durable backend must honor single-record atomicity. See
/// §4.4/§6.3 for the full durability contract.
#[async_trait]
pub trait Store: Send + Sync {
    /// Appends a record, assigning it a monotonic id within the session.
    /// Must persist before returning the id.
    async fn add_record(&self, session_id: &str, record: Record) -> Result<u64>;

    async fn get_record(&self, session_id: &str, id: u64) -> Result<Record>;

    /// Ordered by `(timestamp, id)`.
    async fn get_all_records(&self, session_id: &str) -> Result<Vec<Record>>;

    /// Only `live = true`, same ordering as `get_all_records`.
    async fn get_live_records(&self, session_id: &str) -> Result<Vec<Record>>;

    /// Replaces all mutable fields of the record in place.
    async fn update_record(&self, session_id: &str, id: u64, record: Record) -> Result<()>;

    async fn mark_live(&self, session_id: &str, id: u64) -> Result<()>;

    async fn mark_dead(&self, session_id: &str, id: u64) -> Result<()>;

    /// Hard delete — used only by `clear`.
    async fn delete_record(&self, session_id: &str, id: u64) -> Result<()>;

    /// Drops all records and metrics for the session.
    async fn clear(&self, session_id: &str) -> Result<()>;

    /// Upsert.
    async fn save_metrics(&self, session_id: &str, metrics: SessionMetrics) -> Result<()>;

    /// Missing metrics return defaults.
    async fn load_metrics(&self, session_id: &str) -> Result<SessionMetrics>;

    async fn list_sessions(&self) -> Result<Vec<String>>;

    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

#[derive(Default)]
struct SessionData {
    records: HashMap<u64, Record>,
    next_id: u64,
    metrics: Option<SessionMetrics>,
}

/// In-memory reference `Store`. Safe for concurrent single-record
/// operations across sessions, as the contract requires, via one
/// `RwLock`-guarded map keyed by session id plus a per-session inner state
/// that is only ever mutated by one `add_record`/`update_record` at a time.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sort_records(mut records: Vec<Record>) -> Vec<Record> {
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        records
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn add_record(&self, session_id: &str, mut record: Record) -> Result<u64> {
        let mut guard = self.sessions.write().await;
        let data = guard.entry(session_id.to_string()).or_default();
        data.next_id += 1;
        let id = data.next_id;
        record.id = id;
        record.session_id = session_id.to_string();
        data.records.insert(id, record);
        Ok(id)
    }

    async fn get_record(&self, session_id: &str, id: u64) -> Result<Record> {
        let guard = self.sessions.read().await;
        guard
            .get(session_id)
            .and_then(|d| d.records.get(&id))
            .cloned()
            .ok_or_else(|| Error::store(format!("no record {id} in session {session_id}")))
    }

    async fn get_all_records(&self, session_id: &str) -> Result<Vec<Record>> {
        let guard = self.sessions.read().await;
        let records = guard
            .get(session_id)
            .map(|d| d.records.values().cloned().collect())
            .unwrap_or_default();
        Ok(Self::sort_records(records))
    }

    async fn get_live_records(&self, session_id: &str) -> Result<Vec<Record>> {
        Ok(self
            .get_all_records(session_id)
            .await?
            .into_iter()
            .filter(|r| r.live)
            .collect())
    }

    async fn update_record(&self, session_id: &str, id: u64, record: Record) -> Result<()> {
        let mut guard = self.sessions.write().await;
        let data = guard
            .get_mut(session_id)
            .ok_or_else(|| Error::store(format!("unknown session {session_id}")))?;
        if !data.records.contains_key(&id) {
            return Err(Error::store(format!("no record {id} in session {session_id}")));
        }
        data.records.insert(id, record);
        Ok(())
    }

    async fn mark_live(&self, session_id: &str, id: u64) -> Result<()> {
        let mut guard = self.sessions.write().await;
        let data = guard
            .get_mut(session_id)
            .ok_or_else(|| Error::store(format!("unknown session {session_id}")))?;
        let record = data
            .records
            .get_mut(&id)
            .ok_or_else(|| Error::store(format!("no record {id} in session {session_id}")))?;
        record.live = true;
        Ok(())
    }

    async fn mark_dead(&self, session_id: &str, id: u64) -> Result<()> {
        let mut guard = self.sessions.write().await;
        let data = guard
            .get_mut(session_id)
            .ok_or_else(|| Error::store(format!("unknown session {session_id}")))?;
        let record = data
            .records
            .get_mut(&id)
            .ok_or_else(|| Error::store(format!("no record {id} in session {session_id}")))?;
        record.live = false;
        Ok(())
    }

    async fn delete_record(&self, session_id: &str, id: u64) -> Result<()> {
        let mut guard = self.sessions.write().await;
        if let Some(data) = guard.get_mut(session_id) {
            data.records.remove(&id);
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let mut guard = self.sessions.write().await;
        guard.remove(session_id);
        Ok(())
    }

    async fn save_metrics(&self, session_id: &str, metrics: SessionMetrics) -> Result<()> {
        let mut guard = self.sessions.write().await;
        let data = guard.entry(session_id.to_string()).or_default();
        data.metrics = Some(metrics);
        Ok(())
    }

    async fn load_metrics(&self, session_id: &str) -> Result<SessionMetrics> {
        let guard = self.sessions.read().await;
        Ok(guard
            .get(session_id)
            .and_then(|d| d.metrics.clone())
            .unwrap_or_default())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let guard = self.sessions.read().await;
        Ok(guard.keys().cloned().collect())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut guard = self.sessions.write().await;
        guard.remove(session_id);
        Ok(())
    }
}

/// Shared handle, convenient for wiring one backend into multiple sessions
/// (the store is shared by all sessions within a process per §5).
pub type SharedStore = Arc<dyn Store>;
