//! Testable properties 4-8. Properties 1-3 (record monotonicity, live-view
//! equivalence, round-trip persistence) are already covered by the unit
//! tests in `store.rs`/`message.rs` and are not duplicated here.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_session_core::{
    Error, InMemoryStore, Message, RecordStatus, Role, SendOptions, Session, Store, ToolDefinition,
    ToolHandler, TurnContext,
};
use async_trait::async_trait;
use common::{echo_tool, EchoProvider, LoopingProvider};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Property 4: `history()` filtering idempotence.
#[tokio::test]
async fn history_is_idempotent_and_hides_reminders() {
    let store = Arc::new(InMemoryStore::new());
    let session = Session::builder()
        .store(store)
        .provider(EchoProvider::new(10_000))
        .system_prompt("sys")
        .build()
        .await
        .unwrap();

    let turn = TurnContext {
        system_reminder_fn: Some(Arc::new(|| "<system-reminder>reminder</system-reminder>".to_string())),
        debug_dir: None,
    };
    session
        .message(Message::user_text("hi"), turn, SendOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    let first = session.history().await.unwrap();
    let second = session.history().await.unwrap();
    assert_eq!(first, second);
    for message in &first.1 {
        assert!(!message.contents.iter().any(|c| c.is_system_reminder()));
    }
}

/// Property 5: turn-count cap.
#[tokio::test]
async fn turn_count_cap_fails_every_in_turn_record() {
    let store = Arc::new(InMemoryStore::new());
    let (def, handler) = echo_tool();
    let session = Session::builder()
        .store(store.clone())
        .provider(LoopingProvider::new())
        .system_prompt("sys")
        .tool(def, handler)
        .build()
        .await
        .unwrap();

    let err = session
        .message(
            Message::user_text("go"),
            TurnContext::default(),
            SendOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolLoopOverflow { max: 10 }));

    let all = store.get_all_records(session.session_id()).await.unwrap();
    let in_turn: Vec<_> = all.iter().filter(|r| r.role != Role::System).collect();
    assert!(!in_turn.is_empty());
    assert!(in_turn.iter().all(|r| r.status == RecordStatus::Failed));
}

/// Property 6: compaction preserves the system prompt across repeated
/// compactions interleaved with turns.
#[tokio::test]
async fn compaction_preserves_system_prompt_across_n_compactions() {
    let store = Arc::new(InMemoryStore::new());
    let config = agent_session_core::SessionConfig::builder()
        .compaction_threshold(0.1)
        .build()
        .unwrap();
    let session = Session::builder()
        .store(store)
        .provider(EchoProvider::new(40))
        .system_prompt("original system prompt")
        .summarizer(Arc::new(agent_session_core::HeadTailSummarizer::default()))
        .config(config)
        .build()
        .await
        .unwrap();

    for i in 0..12 {
        session
            .message(
                Message::user_text(format!("a reasonably long message body number {i} here")),
                TurnContext::default(),
                SendOptions::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    let metrics = session.metrics().await.unwrap();
    assert!(metrics.compaction_count >= 1);

    let (system_prompt, _) = session.history().await.unwrap();
    assert_eq!(system_prompt, "original system prompt");
}

/// Property 7: threshold = 0 disables compaction, and the setting survives
/// a restore.
#[tokio::test]
async fn zero_threshold_disables_compaction_and_persists_across_restore() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = agent_session_core::SessionConfig::builder()
        .compaction_threshold(0.0)
        .build()
        .unwrap();
    let session = Session::builder()
        .store(store.clone())
        .provider(EchoProvider::new(40))
        .system_prompt("sys")
        .summarizer(Arc::new(agent_session_core::HeadTailSummarizer::default()))
        .config(config)
        .session_id("s-threshold")
        .build()
        .await
        .unwrap();

    for i in 0..12 {
        session
            .message(
                Message::user_text(format!("a reasonably long message body number {i} here")),
                TurnContext::default(),
                SendOptions::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    let metrics = session.metrics().await.unwrap();
    assert_eq!(metrics.compaction_count, 0);
    assert_eq!(metrics.compaction_threshold, 0.0);
    drop(session);

    let restored = Session::builder()
        .store(store)
        .provider(EchoProvider::new(40))
        .system_prompt("ignored")
        .session_id("s-threshold")
        .restore()
        .await
        .unwrap();
    let restored_metrics = restored.metrics().await.unwrap();
    assert_eq!(restored_metrics.compaction_threshold, 0.0);
}

/// A tool handler that blocks until cancelled, then records that it saw
/// the cancellation before returning.
struct CancelAwareHandler {
    observed: Arc<AtomicBool>,
}

#[async_trait]
impl ToolHandler for CancelAwareHandler {
    async fn call(&self, _args_json: &str, cancel: CancellationToken) -> agent_session_core::Result<Value> {
        cancel.cancelled().await;
        self.observed.store(true, Ordering::SeqCst);
        Ok(json!({"result": "cancelled"}))
    }
}

/// Property 8: cancellation propagation to a running tool handler.
#[tokio::test]
async fn cancellation_propagates_to_tool_handler() {
    let store = Arc::new(InMemoryStore::new());
    let observed = Arc::new(AtomicBool::new(false));
    let def = ToolDefinition::new("echo", "blocks on cancellation", "{}");
    let handler: Arc<dyn ToolHandler> = Arc::new(CancelAwareHandler { observed: observed.clone() });

    let session = Arc::new(
        Session::builder()
            .store(store)
            .provider(EchoProvider::new(10_000))
            .system_prompt("sys")
            .tool(def, handler)
            .build()
            .await
            .unwrap(),
    );

    let cancel = CancellationToken::new();
    let session_clone = session.clone();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move {
        session_clone
            .message(
                Message::user_text("echo hi"),
                TurnContext::default(),
                SendOptions::default(),
                cancel_clone,
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("turn did not finish within bounded time")
        .unwrap();

    assert!(matches!(result, Err(Error::Cancelled(_))));
    assert!(observed.load(Ordering::SeqCst));
}
