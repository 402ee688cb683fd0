use std::path::Path;
use std::sync::{Arc, Mutex};

use apbridge_core::config::LocationOverride;
use apbridge_core::BridgeConfig;
use apbridge_interpreter::chat::ChatSink;
use apbridge_interpreter::enrichment::ItemInfoClient;
use apbridge_interpreter::error::InterpreterResult;
use apbridge_interpreter::messages::MessageCatalog;
use apbridge_interpreter::{BridgeService, ChatUser, CommandRouter};
use async_trait::async_trait;
use serde_json::json;

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn messages(&self) -> Vec<String> {
        self.sent.lock().expect("sink lock").clone()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send(&self, text: &str) -> InterpreterResult<()> {
        self.sent.lock().expect("sink lock").push(text.to_string());
        Ok(())
    }
}

fn config_for(state_file: &Path) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.paths.state_file = state_file.to_path_buf();
    config.bot.channel = "jade".to_string();
    config.bot.poll_interval_secs = 1;
    config.enrichment.enabled = false;
    config
}

fn router_for(config: BridgeConfig) -> CommandRouter {
    CommandRouter::new(
        Arc::new(config),
        Arc::new(MessageCatalog::empty()),
        Arc::new(ItemInfoClient::disabled()),
    )
}

fn write_state(path: &Path, value: serde_json::Value) {
    std::fs::write(path, value.to_string()).expect("write state");
}

fn emerald_state(items: usize) -> serde_json::Value {
    let items: Vec<_> = (0..items as i64)
        .map(|i| json!({"index": i, "item": 100 + i, "location": 200 + i, "player_name": "Jade"}))
        .collect();
    json!({
        "me": {"game": "Pokemon Emerald", "slot_name": "Jade"},
        "checked_locations": [200, 201, 202],
        "items": items,
        "data_storage": {
            "slot_data": {"dexsanity": true, "trainersanity": false},
            "data_package": {"games": {"Pokemon Emerald": {
                "item_name_to_id": {"Potion": 100, "Dynamo Badge": 101, "Super Potion": 102, "Antidote": 103},
                "location_name_to_id": {"Route 101": 200, "Route 102": 201}
            }}}
        }
    })
}

#[tokio::test]
async fn progress_without_total_uses_short_reply() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, emerald_state(2));
    let router = router_for(config_for(&path));

    let reply = router
        .handle_message(&ChatUser::viewer("ash"), "!progress")
        .await
        .expect("command reply");
    assert_eq!(reply, "3 checks completed - seed total not available.");
}

#[tokio::test]
async fn progress_uses_configured_total() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, emerald_state(2));
    let mut config = config_for(&path);
    config.archipelago.total_locations_override = Some(LocationOverride::Text("12".to_string()));
    let router = router_for(config);

    let reply = router
        .handle_message(&ChatUser::viewer("ash"), "!progress")
        .await
        .expect("command reply");
    assert_eq!(reply, "3 / 12 checks (25.0%) completed - 9 remaining.");
}

#[tokio::test]
async fn flags_list_only_enabled_switches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, emerald_state(1));
    let router = router_for(config_for(&path));

    let reply = router
        .handle_message(&ChatUser::viewer("ash"), "!flags")
        .await
        .expect("command reply");
    assert_eq!(reply, "Main flags: Dexsanity");
}

#[tokio::test]
async fn lastitem_lists_newest_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, emerald_state(3));
    let router = router_for(config_for(&path));

    let reply = router
        .handle_message(&ChatUser::viewer("ash"), "!lastitem 2")
        .await
        .expect("command reply");
    assert_eq!(
        reply,
        "Latest items:\nJade: Super Potion @ Loc 202\nJade: Dynamo Badge @ Route 102"
    );
}

#[tokio::test]
async fn missing_snapshot_answers_state_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let router = router_for(config_for(&dir.path().join("missing.json")));
    let viewer = ChatUser::viewer("ash");
    let missing = "State file not available yet. The fetcher may not be running.";

    for command in ["!lastitem", "!keyitems", "!iteminfo", "!rules", "!team"] {
        assert_eq!(
            router.handle_message(&viewer, command).await.as_deref(),
            Some(missing),
            "{command}"
        );
    }
    assert_eq!(
        router.handle_message(&viewer, "!flags").await.as_deref(),
        Some("Slot data is not available yet.")
    );
    assert_eq!(router.handle_message(&viewer, "good luck!").await, None);
}

#[tokio::test]
async fn present_but_empty_sections_use_empty_replies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(
        &path,
        json!({"items": [], "data_storage": {"slot_data": {"unknown_opt": 1}}}),
    );
    let router = router_for(config_for(&path));
    let viewer = ChatUser::viewer("ash");

    assert_eq!(
        router.handle_message(&viewer, "!lastitem").await.as_deref(),
        Some("No items received yet.")
    );
    assert_eq!(
        router.handle_message(&viewer, "!keyitems").await.as_deref(),
        Some("No key items obtained yet.")
    );
    assert_eq!(
        router.handle_message(&viewer, "!iteminfo").await.as_deref(),
        Some("No items received yet.")
    );
    assert_eq!(
        router.handle_message(&viewer, "!rules").await.as_deref(),
        Some("Unable to read the seed rules from the state file.")
    );
}

#[tokio::test]
async fn percent_style_catalog_renders_progress() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, emerald_state(2));
    let catalog_path = dir.path().join("messages.json");
    std::fs::write(
        &catalog_path,
        json!({
            "progress": "%a / %b checks (%c%) - %d left",
            "progress.unknown": "%a checks so far"
        })
        .to_string(),
    )
    .expect("write catalog");
    let catalog = Arc::new(MessageCatalog::load(&catalog_path).expect("load catalog"));
    let viewer = ChatUser::viewer("ash");

    let mut config = config_for(&path);
    let unknown = CommandRouter::new(
        Arc::new(config.clone()),
        catalog.clone(),
        Arc::new(ItemInfoClient::disabled()),
    );
    assert_eq!(
        unknown.handle_message(&viewer, "!progress").await.as_deref(),
        Some("3 checks so far")
    );

    config.archipelago.total_locations_override = Some(LocationOverride::Text("12".to_string()));
    let router = CommandRouter::new(
        Arc::new(config),
        catalog,
        Arc::new(ItemInfoClient::disabled()),
    );
    assert_eq!(
        router.handle_message(&viewer, "!progress").await.as_deref(),
        Some("3 / 12 checks (25.0%) - 9 left")
    );
}

#[tokio::test]
async fn team_reports_solo_or_team_number() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let router = router_for(config_for(&path));
    let viewer = ChatUser::viewer("ash");

    write_state(&path, emerald_state(1));
    assert_eq!(
        router.handle_message(&viewer, "!team").await.as_deref(),
        Some("Playing solo, no team for this slot.")
    );

    write_state(&path, json!({"me": {"slot_name": "Jade", "team_number": 0}}));
    assert_eq!(
        router.handle_message(&viewer, "!team").await.as_deref(),
        Some("Playing solo, no team for this slot.")
    );

    write_state(&path, json!({"me": {"slot_name": "Jade", "team_number": 2}}));
    assert_eq!(
        router.handle_message(&viewer, "!team").await.as_deref(),
        Some("Playing on team 2.")
    );
}

#[tokio::test]
async fn privileged_commands_require_admin() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, emerald_state(2));
    let router = router_for(config_for(&path));

    let denied = router
        .handle_message(&ChatUser::viewer("ash"), "!apreload")
        .await
        .expect("command reply");
    assert_eq!(
        denied,
        "This command is reserved for the streamer and moderators."
    );

    let owner = router
        .handle_message(&ChatUser::viewer("Jade"), "!apreload")
        .await
        .expect("command reply");
    assert_eq!(owner, "State file reloaded manually (2 items).");

    let raw = router
        .handle_message(&ChatUser::moderator("misty"), "!apraw me")
        .await
        .expect("command reply");
    assert!(raw.starts_with("[DEBUG] me="));
}

#[tokio::test]
async fn service_routes_reload_to_the_poll_task() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, emerald_state(2));
    let sink = Arc::new(RecordingSink::default());
    let mut service = BridgeService::with_parts(
        config_for(&path),
        sink.clone(),
        Arc::new(MessageCatalog::empty()),
        Arc::new(ItemInfoClient::disabled()),
    );

    service.start().await.expect("start service");
    assert!(service.is_running());

    write_state(&path, emerald_state(4));
    let handled = service
        .handle_message(&ChatUser::broadcaster("jade"), "!apreload")
        .await
        .expect("handle message");
    assert!(handled);

    service.stop().await.expect("stop service");
    assert!(!service.is_running());

    let messages = sink.messages();
    assert_eq!(
        messages.first().map(String::as_str),
        Some("Archipelago bot connected. Type !help for the list of commands.")
    );
    assert!(messages
        .iter()
        .any(|m| m == "State file reloaded manually (4 items)."));
    assert!(service.start().await.is_err());
}

#[tokio::test]
async fn service_without_auto_announce_reloads_directly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    write_state(&path, emerald_state(3));
    let mut config = config_for(&path);
    config.bot.auto_announce_items = false;
    let sink = Arc::new(RecordingSink::default());
    let mut service = BridgeService::with_parts(
        config,
        sink.clone(),
        Arc::new(MessageCatalog::empty()),
        Arc::new(ItemInfoClient::disabled()),
    );

    service.start().await.expect("start service");
    let handled = service
        .handle_message(&ChatUser::moderator("misty"), "!apreload")
        .await
        .expect("handle message");
    service.stop().await.expect("stop service");

    assert!(handled);
    assert_eq!(
        sink.messages().last().map(String::as_str),
        Some("State file reloaded manually (3 items).")
    );
}
