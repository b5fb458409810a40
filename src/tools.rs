//! Tool definition and registry.
//!
//! A [`ToolRegistry`] is a name-keyed map from a tool's name to its
//! `(ToolDefinition, handler)` pair. Mutation may happen concurrently with
//! turn execution — [`ToolRegistry::snapshot`] freezes the registered set at
//! turn start so a mid-turn registration never changes what the current
//! turn advertises to the provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Metadata describing a tool the provider may call. `mcp_json_schema` is
/// forwarded to the provider verbatim — the registry never inspects it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub mcp_json_schema: String,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        mcp_json_schema: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            mcp_json_schema: mcp_json_schema.into(),
        }
    }
}

/// A tool's execution logic: takes the call's argument JSON and a
/// cancellation token forwarded from the triggering turn, and returns the
/// result JSON (success or `{"error": "..."}` shaped, per the caller's
/// convention). Handlers that perform I/O should observe `cancel` and
/// terminate promptly when it trips.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args_json: &str, cancel: CancellationToken) -> Result<Value>;
}

/// Blanket impl so a plain async closure can be registered directly,
/// mirroring the ergonomics of the SDK's original tool-builder API.
#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(String, CancellationToken) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    async fn call(&self, args_json: &str, cancel: CancellationToken) -> Result<Value> {
        (self)(args_json.to_string(), cancel).await
    }
}

struct Entry {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Thread-safe, insertion-ordered registry of tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<RwLock<Registry>>,
}

#[derive(Default)]
struct Registry {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. Fails with [`Error::Schema`] if a tool of that name
    /// is already registered and bound to a different handler; re-registering
    /// an identical `(definition, handler)` pointer is idempotent.
    pub async fn register(&self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Result<()> {
        let mut guard = self.inner.write().await;
        if let Some(existing) = guard.entries.get(&definition.name) {
            let same_handler = Arc::ptr_eq(&existing.handler, &handler);
            let same_definition = existing.definition == definition;
            if same_handler && same_definition {
                return Ok(());
            }
            return Err(Error::schema(format!(
                "tool '{}' is already registered with a different handler",
                definition.name
            )));
        }
        guard.order.push(definition.name.clone());
        guard.entries.insert(
            definition.name.clone(),
            Entry { definition, handler },
        );
        Ok(())
    }

    /// No-op if the name isn't registered.
    pub async fn deregister(&self, name: &str) {
        let mut guard = self.inner.write().await;
        if guard.entries.remove(name).is_some() {
            guard.order.retain(|n| n != name);
        }
    }

    /// Names in registration order, for stable `tools/list` output.
    pub async fn list_names(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    pub async fn lookup(&self, name: &str) -> Option<(ToolDefinition, Arc<dyn ToolHandler>)> {
        let guard = self.inner.read().await;
        guard
            .entries
            .get(name)
            .map(|e| (e.definition.clone(), e.handler.clone()))
    }

    /// Freezes the current registration order and definitions for one turn.
    /// Registration that happens after this call does not affect the
    /// returned snapshot.
    pub async fn snapshot(&self) -> ToolRegistrySnapshot {
        let guard = self.inner.read().await;
        let definitions = guard
            .order
            .iter()
            .filter_map(|name| guard.entries.get(name).map(|e| e.definition.clone()))
            .collect();
        let handlers = guard
            .entries
            .iter()
            .map(|(name, e)| (name.clone(), e.handler.clone()))
            .collect();
        ToolRegistrySnapshot { definitions, handlers }
    }
}

/// An immutable view of the registry taken at turn start.
#[derive(Clone)]
pub struct ToolRegistrySnapshot {
    definitions: Vec<ToolDefinition>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistrySnapshot {
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }
}
