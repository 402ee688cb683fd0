//! Read-only questions about the current snapshot.
//!
//! Handlers are stateless: build a [`QueryHandlers`] over a freshly loaded
//! snapshot, ask, drop it. Each answer is either ready or explicitly
//! unavailable because the section it needs is missing from the snapshot.

use apbridge_core::dedup::{unique_ascending, unique_recent};
use apbridge_core::notability::Notability;
use apbridge_core::resolver::resolve_game_package;
use apbridge_core::types::{int_from_value, is_truthy};
use apbridge_core::{AcquisitionEvent, BridgeConfig, GameLookup, ProgressSnapshot, Snapshot};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Outcome of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Answer<T> {
    Ready(T),
    /// The snapshot lacks the section this query needs.
    Unavailable,
}

impl<T> Answer<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Answer::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Answer::Ready(value) => Some(value),
            Answer::Unavailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Answer<U> {
        match self {
            Answer::Ready(value) => Answer::Ready(f(value)),
            Answer::Unavailable => Answer::Unavailable,
        }
    }
}

/// Configuration values the queries depend on.
#[derive(Debug, Clone, Default)]
pub struct QuerySettings {
    pub override_total: u64,
    pub fallback_game: String,
    /// Display name for events that carry no player name.
    pub slot_name: Option<String>,
}

impl QuerySettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            override_total: config.total_locations_override(),
            fallback_game: config.fallback_game().to_string(),
            slot_name: config
                .archipelago
                .slot_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// An acquisition event with names resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEvent {
    pub sequence_index: i64,
    pub item_id: Option<i64>,
    pub location_id: Option<i64>,
    pub player: String,
    pub item: String,
    pub location: String,
    pub notable: bool,
}

/// Resolve names and notability for one event.
pub fn resolve_event(
    event: &AcquisitionEvent,
    lookup: &GameLookup,
    settings: &QuerySettings,
    snapshot: &Snapshot,
) -> ResolvedEvent {
    let item = lookup.resolve_item_opt(event.item_id);
    let notable = Notability::classify(lookup, event.item_id, &item);
    ResolvedEvent {
        sequence_index: event.sequence_index,
        item_id: event.item_id,
        location_id: event.location_id,
        player: player_label(event, settings, snapshot),
        location: lookup.resolve_location_opt(event.location_id),
        item,
        notable,
    }
}

fn player_label(event: &AcquisitionEvent, settings: &QuerySettings, snapshot: &Snapshot) -> String {
    event
        .player_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or(settings.slot_name.as_deref())
        .or_else(|| snapshot.slot_name())
        .unwrap_or("The player")
        .to_string()
}

/// Result of looking up the n-th recent unique item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemDetail {
    Found(ResolvedEvent),
    NotEnough { requested: usize, available: usize },
}

/// Seed and server metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedInfo {
    pub seed: Option<String>,
    pub game: Option<String>,
    pub room_name: Option<String>,
    pub server_version: Option<String>,
    pub generator_version: Option<String>,
}

/// The connected slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityInfo {
    pub slot_name: Option<String>,
    pub game: Option<String>,
    pub slot_id: Option<i64>,
    pub team_id: Option<i64>,
    pub player_number: Option<i64>,
    pub team_number: Option<i64>,
}

/// One line of the rules digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleLine {
    pub label: &'static str,
    pub value: String,
}

impl fmt::Display for RuleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

const GOALS: &[(i64, &str)] = &[
    (0, "Champion"),
    (1, "Steven"),
    (2, "Norman"),
    (3, "Legendary Hunt"),
];
const SHUFFLE_MODES: &[(i64, &str)] = &[(0, "Vanilla"), (1, "Shuffle"), (2, "Random")];
const ITEM_POOLS: &[(i64, &str)] = &[(0, "Shuffled"), (1, "Diverse balanced"), (2, "Diverse")];
const FLASH_REQUIREMENTS: &[(i64, &str)] = &[
    (0, "None"),
    (1, "Granite Cave only"),
    (2, "Victory Road only"),
    (3, "Granite Cave + Victory Road"),
];
const COUNT_REQUIREMENTS: &[(i64, &str)] = &[(0, "Badges"), (1, "Gyms")];

/// Boolean options shown as yes/no rules, in display order.
const RULE_SWITCHES: &[(&str, &str)] = &[
    ("key_items", "Key items"),
    ("bikes", "Bikes"),
    ("event_tickets", "Event tickets"),
    ("rods", "Rods"),
    ("overworld_items", "Overworld items"),
    ("hidden_items", "Hidden items"),
    ("npc_gifts", "NPC gifts"),
    ("berry_trees", "Berry trees"),
    ("dexsanity", "Dexsanity"),
    ("trainersanity", "Trainersanity"),
];

const FLAG_SWITCHES: &[(&str, &str)] = &[
    ("key_items", "Randomized key items"),
    ("bikes", "Randomized bikes"),
    ("event_tickets", "Randomized event tickets"),
    ("rods", "Randomized rods"),
    ("overworld_items", "Randomized overworld items"),
    ("hidden_items", "Randomized hidden items"),
    ("npc_gifts", "Randomized NPC gifts"),
    ("berry_trees", "Randomized berry trees"),
    ("dexsanity", "Dexsanity"),
    ("trainersanity", "Trainersanity"),
    ("remote_items", "Remote items"),
    ("death_link", "DeathLink"),
    ("free_fly_location_id", "Free Fly"),
];

/// Query handlers over one loaded snapshot.
pub struct QueryHandlers<'a> {
    snapshot: &'a Snapshot,
    settings: &'a QuerySettings,
    lookup: GameLookup,
}

impl<'a> QueryHandlers<'a> {
    pub fn new(snapshot: &'a Snapshot, settings: &'a QuerySettings) -> Self {
        let lookup = resolve_game_package(snapshot, &settings.fallback_game);
        Self {
            snapshot,
            settings,
            lookup,
        }
    }

    pub fn lookup(&self) -> &GameLookup {
        &self.lookup
    }

    /// Progress is always computable; an unknown total is part of the answer.
    pub fn progress(&self) -> Answer<ProgressSnapshot> {
        Answer::Ready(ProgressSnapshot::compute(
            self.snapshot,
            self.settings.override_total,
        ))
    }

    /// Latest unique items, newest first.
    pub fn unique_recent(&self, limit: usize) -> Answer<Vec<ResolvedEvent>> {
        if !self.snapshot.has_items_section() {
            return Answer::Unavailable;
        }
        Answer::Ready(
            unique_recent(self.snapshot.events(), limit.max(1))
                .into_iter()
                .map(|e| self.resolve(e))
                .collect(),
        )
    }

    /// Every notable item obtained so far, oldest first, one entry per item.
    pub fn unique_notable_all(&self) -> Answer<Vec<ResolvedEvent>> {
        if !self.snapshot.has_items_section() {
            return Answer::Unavailable;
        }
        let mut seen_items = HashSet::new();
        let notable = unique_ascending(self.snapshot.events())
            .into_iter()
            .filter_map(|event| {
                let item_id = event.item_id?;
                if seen_items.contains(&item_id) {
                    return None;
                }
                let resolved = self.resolve(event);
                if !resolved.notable {
                    return None;
                }
                seen_items.insert(item_id);
                Some(resolved)
            })
            .collect();
        Answer::Ready(notable)
    }

    /// The `index`-th most recent unique item (1-based).
    pub fn item_detail(&self, index: usize) -> Answer<ItemDetail> {
        let index = index.max(1);
        self.unique_recent(index).map(|recent| {
            let available = recent.len();
            match recent.into_iter().nth(index - 1) {
                Some(event) => ItemDetail::Found(event),
                None => ItemDetail::NotEnough {
                    requested: index,
                    available,
                },
            }
        })
    }

    /// Named seed options as label/value lines. Absent options are omitted.
    pub fn rules_digest(&self) -> Answer<Vec<RuleLine>> {
        match self.snapshot.slot_data() {
            Some(slot) => Answer::Ready(rules_from_slot_data(slot)),
            None => Answer::Unavailable,
        }
    }

    /// Labels of the options that are switched on. May be empty.
    pub fn flags_digest(&self) -> Answer<Vec<String>> {
        match self.snapshot.slot_data() {
            Some(slot) => Answer::Ready(flags_from_slot_data(slot)),
            None => Answer::Unavailable,
        }
    }

    pub fn seed_info(&self) -> Answer<SeedInfo> {
        let room = &self.snapshot.room;
        Answer::Ready(SeedInfo {
            seed: self.snapshot.seed().map(str::to_string),
            game: self.snapshot.game_name().map(str::to_string),
            room_name: room.room_name.clone(),
            server_version: room.server_version.clone(),
            generator_version: room.generator_version.clone(),
        })
    }

    /// The connected slot. Unavailable until the fetcher reports who it is.
    pub fn identity(&self) -> Answer<IdentityInfo> {
        let me = &self.snapshot.identity;
        let slot_name = self.snapshot.slot_name().map(str::to_string);
        let game = self.snapshot.game_name().map(str::to_string);
        if slot_name.is_none() && game.is_none() && me.slot_id.is_none() {
            return Answer::Unavailable;
        }
        Answer::Ready(IdentityInfo {
            slot_name,
            game,
            slot_id: me.slot_id,
            team_id: me.team_id,
            player_number: me.player_number,
            team_number: me.team_number,
        })
    }

    fn resolve(&self, event: &AcquisitionEvent) -> ResolvedEvent {
        resolve_event(event, &self.lookup, self.settings, self.snapshot)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coded(value: &Value, table: &[(i64, &'static str)], unknown: &str) -> String {
    match int_from_value(value) {
        Some(code) => table
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| label.to_string())
            .unwrap_or_else(|| format!("{} {}", unknown, code)),
        None => value_text(value),
    }
}

fn yes_no(value: &Value) -> String {
    if is_truthy(value) { "Yes" } else { "No" }.to_string()
}

fn present<'v>(slot: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    slot.get(key).filter(|v| !v.is_null())
}

/// `<count> <badges|gyms>`, or just the requirement kind without a count.
fn requirement_value(
    slot: &Map<String, Value>,
    requirement_key: &str,
    count_key: &str,
) -> Option<String> {
    let requirement = present(slot, requirement_key);
    let count = present(slot, count_key);
    if requirement.is_none() && count.is_none() {
        return None;
    }
    let requirement = requirement
        .map(|v| coded(v, COUNT_REQUIREMENTS, "Code"))
        .unwrap_or_else(|| "?".to_string());
    Some(match count {
        Some(count) => format!("{} {}", value_text(count), requirement.to_lowercase()),
        None => requirement,
    })
}

fn rules_from_slot_data(slot: &Map<String, Value>) -> Vec<RuleLine> {
    let mut lines = Vec::new();
    let mut push = |label: &'static str, value: Option<String>| {
        if let Some(value) = value {
            lines.push(RuleLine { label, value });
        }
    };

    push("Goal", present(slot, "goal").map(|v| coded(v, GOALS, "Mode")));
    push(
        "Badges",
        present(slot, "badges").map(|v| coded(v, SHUFFLE_MODES, "Code")),
    );
    push(
        "HMs",
        present(slot, "hms").map(|v| coded(v, SHUFFLE_MODES, "Code")),
    );
    for &(key, label) in RULE_SWITCHES {
        push(label, present(slot, key).map(yes_no));
    }
    push(
        "Item pool",
        present(slot, "item_pool_type").map(|v| coded(v, ITEM_POOLS, "Code")),
    );
    push(
        "Flash required",
        present(slot, "require_flash").map(|v| coded(v, FLASH_REQUIREMENTS, "Code")),
    );
    push(
        "Elite Four",
        requirement_value(slot, "elite_four_requirement", "elite_four_count"),
    );
    push(
        "Norman",
        requirement_value(slot, "norman_requirement", "norman_count"),
    );
    push("Remote items", present(slot, "remote_items").map(yes_no));
    push("Free Fly", present(slot, "free_fly_location_id").map(yes_no));
    push("DeathLink", present(slot, "death_link").map(yes_no));

    lines
}

fn flags_from_slot_data(slot: &Map<String, Value>) -> Vec<String> {
    let mut flags = Vec::new();
    let code = |key: &str| present(slot, key).and_then(int_from_value);

    if let Some(goal) = code("goal").and_then(|c| GOALS.iter().find(|(g, _)| *g == c)) {
        flags.push(format!("Goal: {}", goal.1));
    }
    match code("badges") {
        Some(1) => flags.push("Shuffled badges".to_string()),
        Some(2) => flags.push("Randomized badges".to_string()),
        _ => {}
    }
    match code("hms") {
        Some(1) => flags.push("Shuffled HMs".to_string()),
        Some(2) => flags.push("Randomized HMs".to_string()),
        _ => {}
    }
    for &(key, label) in FLAG_SWITCHES {
        if slot.get(key).map(is_truthy).unwrap_or(false) {
            flags.push(label.to_string());
        }
    }
    for (name, requirement_key, count_key) in [
        ("Elite Four", "elite_four_requirement", "elite_four_count"),
        ("Norman", "norman_requirement", "norman_count"),
    ] {
        let requirement = match code(requirement_key) {
            Some(0) => "badges",
            Some(1) => "gyms",
            _ => continue,
        };
        if let Some(count) = present(slot, count_key) {
            flags.push(format!(
                "{}: {} {} required",
                name,
                value_text(count),
                requirement
            ));
        }
    }

    flags
}
