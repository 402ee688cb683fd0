//! Message catalog and placeholder formatting.
//!
//! Every chat message has a key and a built-in English fallback. A catalog
//! file may override any of them; the file is a flat JSON object mapping keys
//! such as `progress.unknown` to templates. Templates use `{name}` or the
//! older `%name` placeholder style.

use crate::error::{InterpreterError, InterpreterResult};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{error, info};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}|%([A-Za-z_][A-Za-z0-9_]*)")
        .expect("placeholder pattern is valid")
});

/// A message key paired with its built-in fallback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub key: &'static str,
    pub fallback: &'static str,
}

/// Named arguments for a template.
pub type Args<'a> = [(&'a str, String)];

/// Renders messages by key.
pub trait MessageFormatter: Send + Sync {
    /// Render `key` with `args`. The catalog template wins when present,
    /// `fallback` otherwise.
    fn render(&self, key: &str, fallback: &str, args: &Args<'_>) -> String;

    /// Render a [`Template`].
    fn render_template(&self, template: &Template, args: &Args<'_>) -> String {
        self.render(template.key, template.fallback, args)
    }
}

/// Replace `{name}` and `%name` placeholders. Unknown placeholders are kept
/// verbatim. A `%name` token takes the longest identifier after the `%`.
pub fn fill(template: &str, args: &Args<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            args.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Templates loaded from a catalog file.
#[derive(Debug, Default)]
pub struct MessageCatalog {
    path: Option<PathBuf>,
    templates: RwLock<HashMap<String, String>>,
}

impl MessageCatalog {
    /// A catalog without a file. Every message uses its fallback.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a catalog file, failing on unreadable or malformed content.
    pub fn load(path: &Path) -> InterpreterResult<Self> {
        let templates = read_catalog(path)?;
        info!("loaded {} message templates from {}", templates.len(), path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            templates: RwLock::new(templates),
        })
    }

    /// Open an optional catalog file. Load failures are logged and leave the
    /// catalog empty; a later [`Self::reload`] may still succeed.
    pub fn open(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::empty();
        };
        match Self::load(path) {
            Ok(catalog) => catalog,
            Err(err) => {
                error!("message catalog unavailable, using built-in messages: {}", err);
                Self {
                    path: Some(path.to_path_buf()),
                    templates: RwLock::default(),
                }
            }
        }
    }

    /// Re-read the catalog file. On failure the current templates stay.
    pub fn reload(&self) -> InterpreterResult<usize> {
        let Some(path) = self.path.as_deref() else {
            return Ok(0);
        };
        let templates = read_catalog(path)?;
        let count = templates.len();
        *self
            .templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = templates;
        info!("reloaded {} message templates from {}", count, path.display());
        Ok(count)
    }

    /// Template for a key, if the catalog has one.
    pub fn template(&self, key: &str) -> Option<String> {
        self.templates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageFormatter for MessageCatalog {
    fn render(&self, key: &str, fallback: &str, args: &Args<'_>) -> String {
        match self.template(key) {
            Some(template) => fill(&template, args),
            None => fill(fallback, args),
        }
    }
}

fn read_catalog(path: &Path) -> InterpreterResult<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        InterpreterError::catalog(format!("failed to read {}: {}", path.display(), e))
    })?;
    let value: Value = serde_json::from_str(&content)?;
    let Value::Object(map) = value else {
        return Err(InterpreterError::catalog(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    };

    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}

/// Built-in messages.
pub mod templates {
    use super::Template;

    macro_rules! template {
        ($name:ident, $key:literal, $fallback:literal) => {
            pub const $name: Template = Template {
                key: $key,
                fallback: $fallback,
            };
        };
    }

    template!(
        BOT_CONNECTED,
        "bot_connected",
        "Archipelago bot connected. Type {prefix}help for the list of commands."
    );
    template!(
        ANNOUNCE,
        "announce",
        "{player} obtained {item} ({location}) - {checks_done}/{total} checks ({percent}%) - {remaining} remaining."
    );
    template!(
        ANNOUNCE_UNKNOWN_TOTAL,
        "announce.unknown_total",
        "{player} obtained {item} ({location}) - {checks_done} checks completed."
    );
    template!(ANNOUNCE_NOTABLE, "announce.notable", "🔑✨ {text} ✨🔑");
    template!(
        PROGRESS,
        "progress",
        "{checks_done} / {total} checks ({percent}%) completed - {remaining} remaining."
    );
    template!(
        PROGRESS_UNKNOWN,
        "progress.unknown",
        "{checks_done} checks completed - seed total not available."
    );
    template!(
        STATE_MISSING,
        "state_missing",
        "State file not available yet. The fetcher may not be running."
    );
    template!(ITEMS_EMPTY, "items.empty", "No items received yet.");
    template!(LASTITEM, "lastitem", "Latest items:\n{lines}");
    template!(LASTITEM_LINE, "lastitem.line", "{player}: {item} @ {location}");
    template!(KEYITEMS, "keyitems", "Key items obtained:\n{lines}");
    template!(KEYITEMS_LINE, "keyitems.line", "- {item} ({location})");
    template!(KEYITEMS_EMPTY, "keyitems.empty", "No key items obtained yet.");
    template!(RULES, "rules", "Main seed rules:\n{summary}");
    template!(
        RULES_EMPTY,
        "rules.empty",
        "Unable to read the seed rules from the state file."
    );
    template!(FLAGS, "flags", "Main flags: {flags}");
    template!(
        FLAGS_EMPTY,
        "flags.empty",
        "No special flags detected for this seed."
    );
    template!(
        FLAGS_UNAVAILABLE,
        "flags.unavailable",
        "Slot data is not available yet."
    );
    template!(
        SEEDINFO,
        "seedinfo",
        "Seed: {seed} - Game: {game} - Archipelago {server_version}"
    );
    template!(
        ITEMINFO,
        "iteminfo",
        "Item: {name} - Last check: {location}\nEffect: {short_effect}\nDescription: {flavor}"
    );
    template!(
        ITEMINFO_NOT_FOUND,
        "iteminfo.not_found",
        "No item information found for {item}."
    );
    template!(
        ITEMINFO_NOT_ENOUGH,
        "iteminfo.not_enough",
        "There are not {index} recent unique items yet."
    );
    template!(
        IDENTITY,
        "identity",
        "Slot: {slot_name} - Game: {game} - Player {player_number}, team {team_number}"
    );
    template!(
        IDENTITY_UNAVAILABLE,
        "identity.unavailable",
        "The connected slot is not known yet."
    );
    template!(TEAM_SOLO, "team_solo", "Playing solo, no team for this slot.");
    template!(
        TEAM_MULTI_HEADER,
        "team_multi_header",
        "Playing on team {team_number}."
    );
    template!(
        HELP,
        "help",
        "Main commands: {prefix}seedinfo, {prefix}progress, {prefix}lastitem, {prefix}about\nFull list and docs: {help_url}"
    );
    template!(
        ABOUT,
        "about",
        "AP-Twitch Bridge - Archipelago to chat bot by {author}. Source and downloads: {repo_url} - Type {prefix}help for commands."
    );
    template!(
        ADMIN_ONLY,
        "admin_only",
        "This command is reserved for the streamer and moderators."
    );
    template!(APRELOAD, "apreload", "State file reloaded manually ({items} items).");
    template!(APLOG, "aplog", "Fetcher log (last {lines} lines):\n{log}");
    template!(APLOG_EMPTY, "aplog.empty", "Fetcher log is empty or unavailable.");
    template!(
        APSTATUS,
        "apstatus",
        "State file: {path} - exists: {exists} - modified: {modified} - items: {items} - checks: {checks} - status: {status}"
    );
}
