use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use apbridge_core::{SnapshotFault, SnapshotStore};
use apbridge_interpreter::chat::ChatSink;
use apbridge_interpreter::error::{InterpreterError, InterpreterResult};
use apbridge_interpreter::messages::MessageCatalog;
use apbridge_interpreter::pipeline::{AnnouncementPipeline, PipelineState, PollOutcome};
use apbridge_interpreter::queries::QuerySettings;
use async_trait::async_trait;
use serde_json::json;

/// Records delivered messages; optionally fails every n-th send.
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl RecordingSink {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Default::default()
        }
    }

    fn messages(&self) -> Vec<String> {
        self.sent.lock().expect("sink lock").clone()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send(&self, text: &str) -> InterpreterResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(InterpreterError::delivery("simulated outage"));
        }
        self.sent.lock().expect("sink lock").push(text.to_string());
        Ok(())
    }
}

fn write_state(path: &Path, value: serde_json::Value) {
    std::fs::write(path, value.to_string()).expect("write state");
}

fn state_with_items(count: i64) -> serde_json::Value {
    let items: Vec<_> = (0..count)
        .map(|i| json!({"index": i, "item": 100 + i, "location": 200 + i}))
        .collect();
    json!({
        "me": {"game": "Pokemon Emerald"},
        "room": {"location_count": 10},
        "checked_locations": [200, 201],
        "items": items,
        "data_storage": {"data_package": {"games": {"Pokemon Emerald": {
            "item_name_to_id": {"Potion": 100, "HM01 Cut": 101, "Stone Badge": 102, "Antidote": 103},
            "location_name_to_id": {"Route 101": 200}
        }}}}
    })
}

fn pipeline(path: &Path, sink: Arc<RecordingSink>) -> AnnouncementPipeline {
    AnnouncementPipeline::new(
        SnapshotStore::new(path),
        QuerySettings {
            override_total: 0,
            fallback_game: "Pokemon Emerald".to_string(),
            slot_name: Some("Jade".to_string()),
        },
        Arc::new(MessageCatalog::empty()),
        sink,
    )
}

#[tokio::test]
async fn first_poll_announces_everything_then_goes_quiet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, state_with_items(3));
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = pipeline(&path, sink.clone());

    assert_eq!(
        pipeline.poll_once().await,
        PollOutcome::Dispatched { sent: 3, failed: 0 }
    );
    assert_eq!(pipeline.seen(), 3);
    assert_eq!(pipeline.state(), PipelineState::Idle);

    assert_eq!(pipeline.poll_once().await, PollOutcome::Unchanged);
    assert_eq!(pipeline.seen(), 3);

    let messages = sink.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(
        messages[0],
        "Jade obtained Potion (Route 101) - 2/10 checks (20.0%) - 8 remaining."
    );
    assert!(messages[1].starts_with("🔑✨ Jade obtained HM01 Cut (Loc 201)"));
    assert!(messages[2].starts_with("🔑✨ Jade obtained Stone Badge"));
}

#[tokio::test]
async fn priming_skips_history_and_only_new_items_are_announced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, state_with_items(2));
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = pipeline(&path, sink.clone());

    assert_eq!(pipeline.prime().await, 2);
    assert_eq!(pipeline.poll_once().await, PollOutcome::Unchanged);

    write_state(&path, state_with_items(4));
    assert_eq!(
        pipeline.poll_once().await,
        PollOutcome::Dispatched { sent: 2, failed: 0 }
    );
    let messages = sink.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("Stone Badge"));
    assert!(messages[1].contains("Antidote"));
}

#[tokio::test]
async fn unreadable_snapshot_skips_without_touching_the_counter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, state_with_items(2));
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = pipeline(&path, sink.clone());
    pipeline.prime().await;

    std::fs::write(&path, r#"{"items": [{"index": 0"#).expect("truncate state");
    assert!(matches!(
        pipeline.poll_once().await,
        PollOutcome::Skipped(SnapshotFault::ParseError(_))
    ));
    assert_eq!(pipeline.seen(), 2);

    std::fs::remove_file(&path).expect("remove state");
    assert_eq!(
        pipeline.poll_once().await,
        PollOutcome::Skipped(SnapshotFault::NotFound)
    );
    assert_eq!(pipeline.seen(), 2);

    write_state(&path, state_with_items(3));
    assert_eq!(
        pipeline.poll_once().await,
        PollOutcome::Dispatched { sent: 1, failed: 0 }
    );
    assert_eq!(sink.messages().len(), 1);
}

#[tokio::test]
async fn shrinking_list_resets_and_missing_section_is_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, state_with_items(4));
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = pipeline(&path, sink.clone());
    pipeline.prime().await;

    write_state(&path, json!({"room": {"location_count": 10}}));
    assert_eq!(pipeline.poll_once().await, PollOutcome::NoItems);
    assert_eq!(pipeline.seen(), 4);

    write_state(&path, state_with_items(1));
    assert_eq!(
        pipeline.poll_once().await,
        PollOutcome::Reset { observed: 1 }
    );
    assert_eq!(pipeline.seen(), 1);
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn failed_send_is_logged_and_the_batch_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, state_with_items(3));
    let sink = Arc::new(RecordingSink::failing_on(2));
    let mut pipeline = pipeline(&path, sink.clone());

    assert_eq!(
        pipeline.poll_once().await,
        PollOutcome::Dispatched { sent: 2, failed: 1 }
    );
    assert_eq!(pipeline.seen(), 3);
    let messages = sink.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("Potion"));
    assert!(messages[1].contains("Stone Badge"));
}

#[tokio::test]
async fn manual_reload_marks_everything_as_seen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, state_with_items(1));
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = pipeline(&path, sink.clone());
    pipeline.prime().await;

    write_state(&path, state_with_items(4));
    assert_eq!(pipeline.reload().await, 4);
    assert_eq!(pipeline.poll_once().await, PollOutcome::Unchanged);
    assert!(sink.messages().is_empty());
}
