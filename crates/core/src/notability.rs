//! Ordinary vs notable item classification.

use crate::resolver::GameLookup;

/// Tags that mark an item as notable.
const NOTABLE_TAGS: &[&str] = &["progression", "useful", "trap", "key"];

/// How an item is judged notable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notability {
    /// Resolved name starts with `HM` or contains `BADGE`.
    NameHeuristic,
    /// The package's classification tags include a notable tag.
    ClassificationTags,
}

impl Notability {
    /// Strategy for one item: tags when the package carries them for it,
    /// otherwise the name heuristic.
    pub fn for_item(lookup: &GameLookup, item_id: Option<i64>) -> Self {
        match item_id.and_then(|id| lookup.item_tags(id)) {
            Some(_) => Notability::ClassificationTags,
            None => Notability::NameHeuristic,
        }
    }

    /// Classify an item with the strategy chosen by [`Self::for_item`].
    pub fn classify(lookup: &GameLookup, item_id: Option<i64>, name: &str) -> bool {
        Self::for_item(lookup, item_id).is_notable(lookup, item_id, name)
    }

    /// Apply this strategy.
    pub fn is_notable(&self, lookup: &GameLookup, item_id: Option<i64>, name: &str) -> bool {
        match self {
            Notability::NameHeuristic => name_is_notable(name),
            Notability::ClassificationTags => item_id
                .and_then(|id| lookup.item_tags(id))
                .map(tags_are_notable)
                .unwrap_or(false),
        }
    }
}

/// `HM01 Cut`, `Stone Badge` and the like.
pub fn name_is_notable(name: &str) -> bool {
    let upper = name.trim().to_uppercase();
    upper.starts_with("HM") || upper.contains("BADGE")
}

pub fn tags_are_notable(tags: &[String]) -> bool {
    tags.iter()
        .any(|tag| NOTABLE_TAGS.iter().any(|n| tag.eq_ignore_ascii_case(n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_game_package;
    use crate::types::Snapshot;
    use serde_json::json;

    fn lookup() -> GameLookup {
        let snapshot = Snapshot::from_value(json!({
            "data_storage": {"data_package": {"games": {"Pokemon Emerald": {
                "item_name_to_id": {"HM01 Cut": 1, "Potion": 2, "Mach Bike": 3, "Stone Badge": 4},
                "items": {
                    "3": {"classification": ["Progression"]},
                    "4": {"categories": ["filler"]}
                }
            }}}}
        }))
        .expect("parse snapshot");
        resolve_game_package(&snapshot, "Pokemon Emerald")
    }

    #[test]
    fn name_heuristic_matches_hms_and_badges() {
        assert!(name_is_notable("HM01 Cut"));
        assert!(name_is_notable("hm05 flash"));
        assert!(name_is_notable("Knuckle Badge"));
        assert!(!name_is_notable("Potion"));
        assert!(!name_is_notable("Item 42"));
    }

    #[test]
    fn tags_win_when_present_for_the_item() {
        let lookup = lookup();
        assert_eq!(
            Notability::for_item(&lookup, Some(3)),
            Notability::ClassificationTags
        );
        assert!(Notability::classify(&lookup, Some(3), "Mach Bike"));
        // Tagged as filler: the name does not rescue it.
        assert!(!Notability::classify(&lookup, Some(4), "Stone Badge"));
    }

    #[test]
    fn untagged_items_fall_back_to_the_name() {
        let lookup = lookup();
        assert_eq!(
            Notability::for_item(&lookup, Some(1)),
            Notability::NameHeuristic
        );
        assert!(Notability::classify(&lookup, Some(1), "HM01 Cut"));
        assert!(!Notability::classify(&lookup, Some(2), "Potion"));
        assert!(!Notability::classify(&lookup, None, "Item ?"));
    }
}
