//! Chat command parsing and dispatch.

use crate::enrichment::ItemInfoClient;
use crate::messages::{templates, MessageCatalog, MessageFormatter, Template};
use crate::permissions::{ChatUser, Permissions};
use crate::pipeline::PollControl;
use crate::queries::{Answer, ItemDetail, QueryHandlers, QuerySettings, ResolvedEvent};
use apbridge_core::constants::{DEFAULT_LOG_TAIL_LINES, RECENT_UNIQUE_LIMIT};
use apbridge_core::snapshot::read_log_tail;
use apbridge_core::{BridgeConfig, Snapshot, SnapshotStore};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const MAX_RECENT_LIMIT: usize = 25;
const MAX_LOG_LINES: usize = 50;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Progress,
    LastItem { limit: usize },
    KeyItems,
    Rules,
    Flags,
    SeedInfo,
    ItemInfo { index: usize },
    Identity,
    Team,
    Help,
    About,
    /// Raw snapshot dump, optionally of one top-level section.
    ApRaw { section: Option<String> },
    ApReload,
    ApLog { lines: usize },
    ApStatus,
}

impl Command {
    /// Parse `text` as a command. Returns `None` for ordinary chat and
    /// unknown commands.
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let body = text.trim().strip_prefix(prefix)?;
        let mut words = body.split_whitespace();
        let name = words.next()?.to_lowercase();
        let arg = words.next();
        let number = |default: usize, max: usize| {
            arg.and_then(|a| a.parse::<usize>().ok())
                .map(|n| n.clamp(1, max))
                .unwrap_or(default)
        };

        Some(match name.as_str() {
            "progress" => Command::Progress,
            "lastitem" | "lastitems" => Command::LastItem {
                limit: number(RECENT_UNIQUE_LIMIT, MAX_RECENT_LIMIT),
            },
            "keyitems" => Command::KeyItems,
            "rules" => Command::Rules,
            "flags" => Command::Flags,
            "seedinfo" => Command::SeedInfo,
            "iteminfo" => Command::ItemInfo {
                index: number(1, MAX_RECENT_LIMIT),
            },
            "identity" => Command::Identity,
            "team" => Command::Team,
            "help" => Command::Help,
            "about" => Command::About,
            "apraw" => Command::ApRaw {
                section: arg.map(str::to_string),
            },
            "apreload" => Command::ApReload,
            "aplog" => Command::ApLog {
                lines: number(DEFAULT_LOG_TAIL_LINES, MAX_LOG_LINES),
            },
            "apstatus" => Command::ApStatus,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Progress => "progress",
            Command::LastItem { .. } => "lastitem",
            Command::KeyItems => "keyitems",
            Command::Rules => "rules",
            Command::Flags => "flags",
            Command::SeedInfo => "seedinfo",
            Command::ItemInfo { .. } => "iteminfo",
            Command::Identity => "identity",
            Command::Team => "team",
            Command::Help => "help",
            Command::About => "about",
            Command::ApRaw { .. } => "apraw",
            Command::ApReload => "apreload",
            Command::ApLog { .. } => "aplog",
            Command::ApStatus => "apstatus",
        }
    }

    /// Commands reserved for admins.
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Command::ApRaw { .. } | Command::ApReload | Command::ApLog { .. } | Command::ApStatus
        )
    }
}

/// Answers chat commands.
pub struct CommandRouter {
    config: Arc<BridgeConfig>,
    store: SnapshotStore,
    settings: QuerySettings,
    catalog: Arc<MessageCatalog>,
    enrichment: Arc<ItemInfoClient>,
    permissions: Permissions,
    control: Option<mpsc::Sender<PollControl>>,
}

impl CommandRouter {
    pub fn new(
        config: Arc<BridgeConfig>,
        catalog: Arc<MessageCatalog>,
        enrichment: Arc<ItemInfoClient>,
    ) -> Self {
        Self {
            store: SnapshotStore::new(config.paths.state_file.clone()),
            settings: QuerySettings::from_config(&config),
            permissions: Permissions::from_config(&config.bot),
            config,
            catalog,
            enrichment,
            control: None,
        }
    }

    /// Route manual reloads to a running poll task.
    pub fn with_control(mut self, control: mpsc::Sender<PollControl>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.config.bot.prefix
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Parse and answer a chat message. `None` when it is not a command.
    pub async fn handle_message(&self, user: &ChatUser, text: &str) -> Option<String> {
        let command = Command::parse(text, self.prefix())?;
        debug!("command {} from {}", command.name(), user.name);
        Some(self.execute(user, &command).await)
    }

    /// Answer a parsed command on behalf of `user`.
    pub async fn execute(&self, user: &ChatUser, command: &Command) -> String {
        if command.is_privileged() && !self.permissions.is_admin(user) {
            info!("denied {} to {}", command.name(), user.name);
            return self.render(&templates::ADMIN_ONLY, &[]);
        }

        match command {
            Command::Progress => self.progress(&self.load().await),
            Command::LastItem { limit } => self.last_items(&self.load().await, *limit),
            Command::KeyItems => self.key_items(&self.load().await),
            Command::Rules => self.rules(&self.load().await),
            Command::Flags => self.flags(&self.load().await),
            Command::SeedInfo => self.seed_info(&self.load().await),
            Command::ItemInfo { index } => self.item_info(&self.load().await, *index).await,
            Command::Identity => self.identity(&self.load().await),
            Command::Team => self.team(&self.load().await),
            Command::Help => self.help(),
            Command::About => self.about(),
            Command::ApRaw { section } => self.raw_dump(section.as_deref()).await,
            Command::ApReload => self.reload().await,
            Command::ApLog { lines } => self.log_tail(*lines).await,
            Command::ApStatus => self.status().await,
        }
    }

    /// Greeting sent when the bot comes online.
    pub fn greeting(&self) -> String {
        self.render(
            &templates::BOT_CONNECTED,
            &[("prefix", self.prefix().to_string())],
        )
    }

    /// The periodic "about" broadcast.
    pub fn about(&self) -> String {
        let bot = &self.config.bot;
        self.render(
            &templates::ABOUT,
            &[
                ("author", bot.author.clone()),
                ("repo", bot.repo_url.clone()),
                ("repo_url", bot.repo_url.clone()),
                ("help_url", self.config.help_url().to_string()),
                ("prefix", self.prefix().to_string()),
            ],
        )
    }

    fn render(&self, template: &Template, args: &[(&str, String)]) -> String {
        self.catalog.render_template(template, args)
    }

    async fn load(&self) -> Snapshot {
        self.store.load_async().await
    }

    fn progress(&self, snapshot: &Snapshot) -> String {
        let queries = QueryHandlers::new(snapshot, &self.settings);
        let progress = queries.progress().ready().unwrap_or_default();
        if !progress.is_total_known() {
            return self.render(
                &templates::PROGRESS_UNKNOWN,
                &[
                    ("checks_done", progress.checks_done.to_string()),
                    ("a", progress.checks_done.to_string()),
                ],
            );
        }
        // Single-letter aliases keep older `%a %b %c %d` catalogs working.
        self.render(
            &templates::PROGRESS,
            &[
                ("checks_done", progress.checks_done.to_string()),
                ("total", progress.total_locations.to_string()),
                ("percent", progress.percent_label()),
                ("remaining", progress.remaining.to_string()),
                ("a", progress.checks_done.to_string()),
                ("b", progress.total_locations.to_string()),
                ("c", progress.percent_label()),
                ("d", progress.remaining.to_string()),
            ],
        )
    }

    fn last_items(&self, snapshot: &Snapshot, limit: usize) -> String {
        let queries = QueryHandlers::new(snapshot, &self.settings);
        match queries.unique_recent(limit) {
            Answer::Ready(events) if events.is_empty() => self.render(&templates::ITEMS_EMPTY, &[]),
            Answer::Ready(events) => {
                let lines = self.item_lines(&templates::LASTITEM_LINE, &events);
                self.render(&templates::LASTITEM, &[("lines", lines)])
            }
            Answer::Unavailable => self.render(&templates::STATE_MISSING, &[]),
        }
    }

    fn key_items(&self, snapshot: &Snapshot) -> String {
        let queries = QueryHandlers::new(snapshot, &self.settings);
        match queries.unique_notable_all() {
            Answer::Ready(events) if events.is_empty() => {
                self.render(&templates::KEYITEMS_EMPTY, &[])
            }
            Answer::Ready(events) => {
                let lines = self.item_lines(&templates::KEYITEMS_LINE, &events);
                self.render(&templates::KEYITEMS, &[("lines", lines)])
            }
            Answer::Unavailable => self.render(&templates::STATE_MISSING, &[]),
        }
    }

    fn item_lines(&self, line: &Template, events: &[ResolvedEvent]) -> String {
        events
            .iter()
            .map(|e| {
                self.render(
                    line,
                    &[
                        ("player", e.player.clone()),
                        ("item", e.item.clone()),
                        ("location", e.location.clone()),
                    ],
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn rules(&self, snapshot: &Snapshot) -> String {
        let queries = QueryHandlers::new(snapshot, &self.settings);
        match queries.rules_digest() {
            Answer::Ready(rules) if rules.is_empty() => self.render(&templates::RULES_EMPTY, &[]),
            Answer::Ready(rules) => {
                let summary = rules
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n");
                self.render(&templates::RULES, &[("summary", summary)])
            }
            Answer::Unavailable => self.render(&templates::STATE_MISSING, &[]),
        }
    }

    fn flags(&self, snapshot: &Snapshot) -> String {
        let queries = QueryHandlers::new(snapshot, &self.settings);
        match queries.flags_digest() {
            Answer::Ready(flags) if flags.is_empty() => self.render(&templates::FLAGS_EMPTY, &[]),
            Answer::Ready(flags) => self.render(&templates::FLAGS, &[("flags", flags.join(" · "))]),
            Answer::Unavailable => self.render(&templates::FLAGS_UNAVAILABLE, &[]),
        }
    }

    fn seed_info(&self, snapshot: &Snapshot) -> String {
        let queries = QueryHandlers::new(snapshot, &self.settings);
        let info = queries.seed_info().ready().unwrap_or_default();
        let text = |v: Option<String>, default: &str| v.unwrap_or_else(|| default.to_string());
        self.render(
            &templates::SEEDINFO,
            &[
                ("seed", text(info.seed, "???")),
                ("game", text(info.game, "Unknown")),
                ("room_name", text(info.room_name, "?")),
                ("server_version", text(info.server_version, "?")),
                ("generator_version", text(info.generator_version, "?")),
            ],
        )
    }

    async fn item_info(&self, snapshot: &Snapshot, index: usize) -> String {
        let detail = QueryHandlers::new(snapshot, &self.settings).item_detail(index);
        let event = match detail {
            Answer::Ready(ItemDetail::Found(event)) => event,
            Answer::Ready(ItemDetail::NotEnough {
                requested,
                available,
            }) if available > 0 => {
                return self.render(
                    &templates::ITEMINFO_NOT_ENOUGH,
                    &[("index", requested.to_string())],
                );
            }
            Answer::Ready(ItemDetail::NotEnough { .. }) => {
                return self.render(&templates::ITEMS_EMPTY, &[]);
            }
            Answer::Unavailable => return self.render(&templates::STATE_MISSING, &[]),
        };

        match self.enrichment.lookup(&event.item).await {
            Some(info) => self.render(
                &templates::ITEMINFO,
                &[
                    ("name", non_empty(info.name, &event.item)),
                    ("location", event.location.clone()),
                    ("short_effect", non_empty(info.short_effect, "(no effect found)")),
                    ("flavor", non_empty(info.flavor_text, "(no description found)")),
                ],
            ),
            None => self.render(
                &templates::ITEMINFO_NOT_FOUND,
                &[("item", event.item.clone())],
            ),
        }
    }

    fn identity(&self, snapshot: &Snapshot) -> String {
        let queries = QueryHandlers::new(snapshot, &self.settings);
        let Some(me) = queries.identity().ready() else {
            return self.render(&templates::IDENTITY_UNAVAILABLE, &[]);
        };
        let num = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string());
        self.render(
            &templates::IDENTITY,
            &[
                ("slot_name", me.slot_name.unwrap_or_else(|| "?".to_string())),
                ("game", me.game.unwrap_or_else(|| "Unknown".to_string())),
                ("slot_id", num(me.slot_id)),
                ("team_id", num(me.team_id)),
                ("player_number", num(me.player_number)),
                ("team_number", num(me.team_number)),
            ],
        )
    }

    fn team(&self, snapshot: &Snapshot) -> String {
        let queries = QueryHandlers::new(snapshot, &self.settings);
        let Some(me) = queries.identity().ready() else {
            return self.render(&templates::STATE_MISSING, &[]);
        };
        match me.team_number {
            Some(team) if team > 0 => self.render(
                &templates::TEAM_MULTI_HEADER,
                &[("team_number", team.to_string())],
            ),
            _ => self.render(&templates::TEAM_SOLO, &[]),
        }
    }

    fn help(&self) -> String {
        self.render(
            &templates::HELP,
            &[
                ("prefix", self.prefix().to_string()),
                ("help_url", self.config.help_url().to_string()),
            ],
        )
    }

    async fn raw_dump(&self, section: Option<&str>) -> String {
        if let Some(section) = section {
            let store = self.store.clone();
            let name = section.to_string();
            let raw = tokio::task::spawn_blocking(move || store.raw_section(&name))
                .await
                .unwrap_or_else(|e| {
                    warn!("join raw dump task failed: {}", e);
                    None
                });
            return match raw {
                Some(value) => format!("[DEBUG] {}={}", section, value),
                None => format!("[DEBUG] section {} not found", section),
            };
        }

        let snapshot = self.load().await;
        format!(
            "[DEBUG] room={} seed={} game={} slot_id={} player_number={} items={} checks={}",
            snapshot.room.room_name.as_deref().unwrap_or(""),
            snapshot.seed().unwrap_or(""),
            snapshot.game_name().unwrap_or(""),
            snapshot.identity.slot_id.unwrap_or(-1),
            snapshot.identity.player_number.unwrap_or(-1),
            snapshot.events().len(),
            snapshot.checks_done()
        )
    }

    async fn reload(&self) -> String {
        if let Err(err) = self.catalog.reload() {
            warn!("message catalog reload failed: {}", err);
        }

        let items = match self.request_poll_reload().await {
            Some(seen) => seen,
            None => self.load().await.events().len(),
        };
        self.render(&templates::APRELOAD, &[("items", items.to_string())])
    }

    async fn request_poll_reload(&self) -> Option<usize> {
        let control = self.control.as_ref()?;
        let (reply, response) = oneshot::channel();
        if control
            .send(PollControl::Reload { reply: Some(reply) })
            .await
            .is_err()
        {
            debug!("poll task is not running, reloading locally");
            return None;
        }
        response.await.ok()
    }

    async fn log_tail(&self, lines: usize) -> String {
        let Some(path) = self.config.paths.fetcher_log.clone() else {
            return self.render(&templates::APLOG_EMPTY, &[]);
        };
        let tail = tokio::task::spawn_blocking(move || read_log_tail(&path, lines)).await;
        match tail {
            Ok(Ok(log)) if !log.trim().is_empty() => self.render(
                &templates::APLOG,
                &[("lines", lines.to_string()), ("log", log)],
            ),
            Ok(Ok(_)) => self.render(&templates::APLOG_EMPTY, &[]),
            Ok(Err(err)) => {
                warn!("failed to read fetcher log: {}", err);
                self.render(&templates::APLOG_EMPTY, &[])
            }
            Err(err) => {
                warn!("join log tail task failed: {}", err);
                self.render(&templates::APLOG_EMPTY, &[])
            }
        }
    }

    async fn status(&self) -> String {
        let store = self.store.clone();
        let status = match tokio::task::spawn_blocking(move || store.status()).await {
            Ok(status) => status,
            Err(err) => {
                warn!("join status task failed: {}", err);
                return format!("[DEBUG] status unavailable: {}", err);
            }
        };
        let modified = status
            .modified
            .map(|m| {
                DateTime::<Local>::from(m)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "-".to_string());
        self.render(
            &templates::APSTATUS,
            &[
                ("path", status.path.display().to_string()),
                ("exists", status.exists.to_string()),
                ("modified", modified),
                ("items", status.items.to_string()),
                ("checks", status.checks.to_string()),
                (
                    "status",
                    status
                        .fault
                        .map(|f| f.to_string())
                        .unwrap_or_else(|| "ok".to_string()),
                ),
            ],
        )
    }
}

fn non_empty(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_arguments() {
        assert_eq!(Command::parse("!progress", "!"), Some(Command::Progress));
        assert_eq!(
            Command::parse("  !LastItem 3 ", "!"),
            Some(Command::LastItem { limit: 3 })
        );
        assert_eq!(
            Command::parse("!lastitem lots", "!"),
            Some(Command::LastItem { limit: 5 })
        );
        assert_eq!(
            Command::parse("!iteminfo 0", "!"),
            Some(Command::ItemInfo { index: 1 })
        );
        assert_eq!(
            Command::parse("!apraw room", "!"),
            Some(Command::ApRaw {
                section: Some("room".to_string())
            })
        );
        assert_eq!(
            Command::parse("!aplog 500", "!"),
            Some(Command::ApLog { lines: 50 })
        );
        assert_eq!(Command::parse("!Team", "!"), Some(Command::Team));
    }

    #[test]
    fn ignores_chat_and_unknown_commands() {
        assert_eq!(Command::parse("hello chat", "!"), None);
        assert_eq!(Command::parse("!dance", "!"), None);
        assert_eq!(Command::parse("!", "!"), None);
        assert_eq!(Command::parse("?progress", "!"), None);
    }

    #[test]
    fn only_debug_commands_are_privileged() {
        assert!(Command::ApReload.is_privileged());
        assert!(Command::ApStatus.is_privileged());
        assert!(!Command::Rules.is_privileged());
        assert!(!Command::ItemInfo { index: 1 }.is_privileged());
    }
}
