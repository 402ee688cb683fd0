//! Identifier resolution through the data package embedded in the snapshot.

use crate::types::{GamePackage, Snapshot};
use std::collections::HashMap;
use tracing::debug;

/// Inverted lookup tables for the active game.
#[derive(Debug, Clone, Default)]
pub struct GameLookup {
    /// Name of the package that was selected, if any.
    pub game: Option<String>,
    item_id_to_name: HashMap<i64, String>,
    location_id_to_name: HashMap<i64, String>,
    item_tags: HashMap<i64, Vec<String>>,
}

/// Pick the package for the connected game and invert its name→id maps.
///
/// Selection order: the identity's game, then `fallback_game`, then the only
/// package when exactly one exists. Otherwise the lookup is empty.
pub fn resolve_game_package(snapshot: &Snapshot, fallback_game: &str) -> GameLookup {
    let games = &snapshot.data_storage.data_package.games;
    let game_name = snapshot.game_name();

    let selected = game_name
        .and_then(|name| games.get_key_value(name))
        .or_else(|| games.get_key_value(fallback_game))
        .or_else(|| {
            if games.len() == 1 {
                games.iter().next()
            } else {
                None
            }
        });

    let lookup = match selected {
        Some((name, package)) => GameLookup::from_package(name, package),
        None => GameLookup::default(),
    };

    debug!(
        "resolved game package: game_name={:?}, packages={:?}, selected={:?}, items={}, locations={}",
        game_name,
        games.keys().collect::<Vec<_>>(),
        lookup.game,
        lookup.item_id_to_name.len(),
        lookup.location_id_to_name.len()
    );
    lookup
}

impl GameLookup {
    /// Build the inverse maps for one package.
    ///
    /// When two names share an id the last one in ascending name order wins.
    /// The package format does not say which is right, so none is preferred.
    pub fn from_package(game: &str, package: &GamePackage) -> Self {
        let item_id_to_name = package
            .item_name_to_id
            .iter()
            .map(|(name, id)| (*id, name.clone()))
            .collect();
        let location_id_to_name = package
            .location_name_to_id
            .iter()
            .map(|(name, id)| (*id, name.clone()))
            .collect();
        let item_tags = package
            .item_classifications
            .iter()
            .filter(|(_, c)| !c.classification.is_empty())
            .filter_map(|(id, c)| {
                id.trim()
                    .parse::<i64>()
                    .ok()
                    .map(|id| (id, c.classification.clone()))
            })
            .collect();

        Self {
            game: Some(game.to_string()),
            item_id_to_name,
            location_id_to_name,
            item_tags,
        }
    }

    /// Whether no package was selected or it maps nothing.
    pub fn is_empty(&self) -> bool {
        self.item_id_to_name.is_empty() && self.location_id_to_name.is_empty()
    }

    /// Mapped item name, if any.
    pub fn item_name(&self, id: i64) -> Option<&str> {
        self.item_id_to_name.get(&id).map(String::as_str)
    }

    /// Mapped location name, if any.
    pub fn location_name(&self, id: i64) -> Option<&str> {
        self.location_id_to_name.get(&id).map(String::as_str)
    }

    /// Item name, or `Item <id>` when unmapped.
    pub fn resolve_item(&self, id: i64) -> String {
        self.item_name(id)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Item {}", id))
    }

    /// Location name, or `Loc <id>` when unmapped.
    pub fn resolve_location(&self, id: i64) -> String {
        self.location_name(id)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Loc {}", id))
    }

    /// Like [`Self::resolve_item`] for events that may lack an id.
    pub fn resolve_item_opt(&self, id: Option<i64>) -> String {
        id.map(|id| self.resolve_item(id))
            .unwrap_or_else(|| "Item ?".to_string())
    }

    /// Like [`Self::resolve_location`] for events that may lack an id.
    pub fn resolve_location_opt(&self, id: Option<i64>) -> String {
        id.map(|id| self.resolve_location(id))
            .unwrap_or_else(|| "Loc ?".to_string())
    }

    /// Classification tags for an item, when the package carries them.
    pub fn item_tags(&self, id: i64) -> Option<&[String]> {
        self.item_tags.get(&id).map(Vec::as_slice)
    }

    /// Whether the package carries classification tags at all.
    pub fn has_item_tags(&self) -> bool {
        !self.item_tags.is_empty()
    }
}
