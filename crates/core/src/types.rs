//! Typed view over the snapshot document written by the fetcher.
//!
//! Every field is optional. Deserialization is lenient per field and per
//! element: a value of the wrong type degrades to its empty/zero default
//! instead of failing the whole document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Full parsed snapshot document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Acquisition events in file order. `None` when the section is absent.
    #[serde(deserialize_with = "lenient::events")]
    pub items: Option<Vec<AcquisitionEvent>>,

    /// Location ids already checked by the player.
    #[serde(deserialize_with = "lenient::id_list")]
    pub checked_locations: Vec<i64>,

    /// Room metadata reported by the server.
    #[serde(deserialize_with = "lenient::record")]
    pub room: RoomInfo,

    /// The connected slot.
    #[serde(rename = "me", alias = "identity", deserialize_with = "lenient::record")]
    pub identity: Identity,

    /// Server-level metadata copied from the fetcher configuration.
    #[serde(deserialize_with = "lenient::record")]
    pub archipelago: ArchipelagoInfo,

    /// Slot data and the embedded data package.
    #[serde(deserialize_with = "lenient::record")]
    pub data_storage: DataStorage,
}

/// One record of an item having been received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionEvent {
    /// Item id.
    #[serde(rename = "item", alias = "item_id", deserialize_with = "lenient::opt_int")]
    pub item_id: Option<i64>,

    /// Location the item was found at.
    #[serde(
        rename = "location",
        alias = "location_id",
        deserialize_with = "lenient::opt_int"
    )]
    pub location_id: Option<i64>,

    /// Ordering key assigned by the server. Not necessarily the array position.
    #[serde(rename = "index", deserialize_with = "lenient::int")]
    pub sequence_index: i64,

    /// Slot number of the player who sent the item.
    #[serde(rename = "player", deserialize_with = "lenient::opt_int")]
    pub source_player: Option<i64>,

    /// Display name of the sending player, when the fetcher knows it.
    #[serde(deserialize_with = "lenient::opt_text")]
    pub player_name: Option<String>,

    /// Raw item flags.
    #[serde(deserialize_with = "lenient::int")]
    pub flags: i64,

    /// Receive timestamp.
    #[serde(deserialize_with = "lenient::or_default")]
    pub time: Option<f64>,
}

/// Identity of an acquisition used for deduplication.
pub type EventPair = (Option<i64>, Option<i64>);

impl AcquisitionEvent {
    /// The `(item, location)` pair identifying logically-equivalent events.
    pub fn pair(&self) -> EventPair {
        (self.item_id, self.location_id)
    }
}

/// Room metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomInfo {
    #[serde(deserialize_with = "lenient::int")]
    pub location_count: i64,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub seed: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub room_name: Option<String>,
    #[serde(deserialize_with = "lenient::version_text")]
    pub server_version: Option<String>,
    #[serde(deserialize_with = "lenient::version_text")]
    pub generator_version: Option<String>,
    #[serde(deserialize_with = "lenient::opt_int")]
    pub hint_points: Option<i64>,
}

/// The slot the fetcher is connected as.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    #[serde(deserialize_with = "lenient::opt_text")]
    pub slot_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub game: Option<String>,
    #[serde(deserialize_with = "lenient::opt_int")]
    pub slot_id: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_int")]
    pub team_id: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_int")]
    pub player_number: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_int")]
    pub team_number: Option<i64>,
}

/// Server-level metadata. Unknown keys are preserved in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchipelagoInfo {
    #[serde(deserialize_with = "lenient::opt_text")]
    pub game: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub slot_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub seed: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Data retrieved from the server's data storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataStorage {
    /// Per-seed options. `None` when absent or not an object.
    #[serde(deserialize_with = "lenient::object")]
    pub slot_data: Option<Map<String, Value>>,

    #[serde(deserialize_with = "lenient::record")]
    pub data_package: DataPackage,

    #[serde(deserialize_with = "lenient::record")]
    pub retrieved: Map<String, Value>,
}

/// Embedded lookup tables keyed by game name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPackage {
    #[serde(deserialize_with = "lenient::entries")]
    pub games: BTreeMap<String, GamePackage>,
}

/// Lookup tables for one game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GamePackage {
    #[serde(deserialize_with = "lenient::id_map")]
    pub item_name_to_id: BTreeMap<String, i64>,

    #[serde(deserialize_with = "lenient::id_map")]
    pub location_name_to_id: BTreeMap<String, i64>,

    /// Optional classification tags keyed by item id (as a string).
    #[serde(rename = "items", deserialize_with = "lenient::entries")]
    pub item_classifications: BTreeMap<String, ItemClassification>,
}

/// Classification tags for a single item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemClassification {
    #[serde(alias = "categories", deserialize_with = "lenient::tags")]
    pub classification: Vec<String>,
}

impl Snapshot {
    /// Build a snapshot from an already parsed JSON value.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Acquisition events, empty when the section is absent.
    pub fn events(&self) -> &[AcquisitionEvent] {
        self.items.as_deref().unwrap_or(&[])
    }

    /// Whether the snapshot carries an `items` section at all.
    pub fn has_items_section(&self) -> bool {
        self.items.is_some()
    }

    /// Number of distinct checked locations.
    pub fn checks_done(&self) -> usize {
        self.checked_locations.iter().collect::<BTreeSet<_>>().len()
    }

    /// Game name of the connected slot, falling back to the server metadata.
    pub fn game_name(&self) -> Option<&str> {
        [&self.identity.game, &self.archipelago.game]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Slot name of the connected player.
    pub fn slot_name(&self) -> Option<&str> {
        [&self.identity.slot_name, &self.archipelago.slot_name]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Seed identifier from the room, falling back to the server metadata.
    pub fn seed(&self) -> Option<&str> {
        self.room
            .seed
            .as_deref()
            .or(self.archipelago.seed.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    /// Per-seed options, `None` when absent or empty.
    pub fn slot_data(&self) -> Option<&Map<String, Value>> {
        self.data_storage
            .slot_data
            .as_ref()
            .filter(|slot| !slot.is_empty())
    }
}

/// Read a JSON value as an integer. Numeric strings are accepted; fractional
/// numbers, booleans and everything else are not.
pub fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Python-style truthiness of an option value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

mod lenient {
    use super::{int_from_value, AcquisitionEvent};
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::{Map, Value};
    use std::collections::BTreeMap;

    pub fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(d)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Structured sections only accept JSON objects.
    pub fn record<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(match Value::deserialize(d)? {
            value @ Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => T::default(),
        })
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(int_from_value(&Value::deserialize(d)?).unwrap_or(0))
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(int_from_value(&Value::deserialize(d)?))
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Like `opt_text`, but also renders `{major, minor, build}` version objects.
    pub fn version_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(o) => {
                let part = |key: &str| o.get(key).and_then(int_from_value);
                match (part("major"), part("minor"), part("build")) {
                    (Some(major), Some(minor), Some(build)) => {
                        Some(format!("{}.{}.{}", major, minor, build))
                    }
                    _ => None,
                }
            }
            _ => None,
        })
    }

    pub fn object<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Map<String, Value>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(o) => Some(o),
            _ => None,
        })
    }

    pub fn id_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(values) => values.iter().filter_map(int_from_value).collect(),
            _ => Vec::new(),
        })
    }

    /// Every array element yields one event, so the event count always
    /// matches the raw array length. Elements that are not objects become
    /// empty events. When both a key and its `_id` alias are present the
    /// plain key wins unless it is null.
    pub fn events<'de, D>(d: D) -> Result<Option<Vec<AcquisitionEvent>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(values) => Some(values.into_iter().map(event).collect()),
            _ => None,
        })
    }

    fn event(value: Value) -> AcquisitionEvent {
        let Value::Object(mut fields) = value else {
            return AcquisitionEvent::default();
        };
        for (key, alias) in [("item", "item_id"), ("location", "location_id")] {
            let fallback = fields.remove(alias);
            let canonical_missing = fields.get(key).map_or(true, Value::is_null);
            if canonical_missing {
                if let Some(fallback) = fallback {
                    fields.insert(key.to_string(), fallback);
                }
            }
        }
        serde_json::from_value(Value::Object(fields)).unwrap_or_default()
    }

    pub fn entries<'de, D, T>(d: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Object(o) => o
                .into_iter()
                .filter_map(|(k, v)| serde_json::from_value(v).ok().map(|v| (k, v)))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn id_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(o) => o
                .into_iter()
                .filter_map(|(k, v)| int_from_value(&v).map(|id| (k, id)))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn tags<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => vec![s],
            Value::Array(values) => values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }
}
