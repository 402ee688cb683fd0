//! Item descriptions from a PokéAPI-compatible endpoint.

use apbridge_core::config::EnrichmentConfig;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// English description of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub name: String,
    pub short_effect: String,
    pub flavor_text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemResponse {
    name: Option<String>,
    effect_entries: Vec<EffectEntry>,
    flavor_text_entries: Vec<FlavorEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EffectEntry {
    short_effect: Option<String>,
    effect: Option<String>,
    language: NamedResource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlavorEntry {
    text: Option<String>,
    language: NamedResource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamedResource {
    name: String,
}

/// Turn an item name into an API slug: `Dive Ball` becomes `dive-ball`.
pub fn normalize_slug(item_name: &str) -> String {
    let folded: String = item_name
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '.')
        .map(|c| match c {
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'à' | 'â' | 'ä' => 'a',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect();
    WHITESPACE.replace_all(&folded, "-").into_owned()
}

/// Cached client for item descriptions.
pub struct ItemInfoClient {
    client: Option<reqwest::Client>,
    base_url: String,
    cache: DashMap<String, ItemInfo>,
}

impl ItemInfoClient {
    /// Build a client. A disabled or unbuildable client answers "no info".
    pub fn new(config: &EnrichmentConfig) -> Self {
        let client = if config.enabled {
            match reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
                .build()
            {
                Ok(client) => Some(client),
                Err(err) => {
                    warn!("item info lookups disabled: failed to build HTTP client: {}", err);
                    None
                }
            }
        } else {
            None
        };

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: DashMap::new(),
        }
    }

    /// Client that never performs lookups.
    pub fn disabled() -> Self {
        Self {
            client: None,
            base_url: String::new(),
            cache: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Description for `item_name`. Every failure is logged and yields `None`.
    pub async fn lookup(&self, item_name: &str) -> Option<ItemInfo> {
        let client = self.client.as_ref()?;
        let slug = normalize_slug(item_name);
        if slug.is_empty() {
            return None;
        }

        if let Some(info) = self.cache.get(&slug) {
            return Some(info.clone());
        }

        let url = format!("{}/item/{}", self.base_url, slug);
        let response = match client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("item info request failed for {:?}: {}", slug, err);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("item info endpoint returned {} for {}", response.status(), url);
            return None;
        }
        let body: ItemResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!("item info response for {:?} is not valid JSON: {}", slug, err);
                return None;
            }
        };

        let info = item_info_from_response(body, item_name);
        debug!("cached item info for {:?}", slug);
        self.cache.insert(slug, info.clone());
        Some(info)
    }
}

fn item_info_from_response(body: ItemResponse, fallback_name: &str) -> ItemInfo {
    let short_effect = body
        .effect_entries
        .iter()
        .find(|e| e.language.name == "en")
        .and_then(|e| e.short_effect.clone().or_else(|| e.effect.clone()))
        .unwrap_or_default();
    let flavor_text = body
        .flavor_text_entries
        .iter()
        .find(|e| e.language.name == "en")
        .and_then(|e| e.text.clone())
        .unwrap_or_default();

    ItemInfo {
        name: body.name.unwrap_or_else(|| fallback_name.to_string()),
        short_effect: single_line(&short_effect),
        flavor_text: single_line(&flavor_text),
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\u{c}'], " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slugs_fold_accents_and_punctuation() {
        assert_eq!(normalize_slug("Dive Ball"), "dive-ball");
        assert_eq!(normalize_slug("  King's   Rock "), "kings-rock");
        assert_eq!(normalize_slug("Poké Flute"), "poke-flute");
        assert_eq!(normalize_slug("Mr. Mime Doll"), "mr-mime-doll");
        assert_eq!(normalize_slug(""), "");
    }

    #[test]
    fn english_entries_are_selected() {
        let body: ItemResponse = serde_json::from_value(json!({
            "name": "potion",
            "effect_entries": [
                {"short_effect": "Heilt 20 KP.", "language": {"name": "de"}},
                {"short_effect": "Restores 20\nHP.", "language": {"name": "en"}}
            ],
            "flavor_text_entries": [
                {"text": "A spray-type\u{c}medicine.", "language": {"name": "en"}}
            ]
        }))
        .expect("parse body");

        let info = item_info_from_response(body, "Potion");
        assert_eq!(info.name, "potion");
        assert_eq!(info.short_effect, "Restores 20 HP.");
        assert_eq!(info.flavor_text, "A spray-type medicine.");
    }

    #[tokio::test]
    async fn disabled_client_has_no_info() {
        let client = ItemInfoClient::new(&EnrichmentConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(!client.is_enabled());
        assert_eq!(client.lookup("Potion").await, None);
    }
}
