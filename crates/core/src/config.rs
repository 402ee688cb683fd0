use crate::constants::{
    DEFAULT_COMMAND_PREFIX, DEFAULT_DIGEST_INTERVAL_MINUTES, DEFAULT_ENRICHMENT_BASE_URL,
    DEFAULT_ENRICHMENT_TIMEOUT_SECS, DEFAULT_FALLBACK_GAME, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_REPO_URL, MAX_INTERVAL_SECS,
};
use crate::Error;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for apbridge.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// File locations.
    pub paths: PathsConfig,

    /// Bot behaviour.
    pub bot: BotConfig,

    /// Archipelago slot settings.
    pub archipelago: ArchipelagoConfig,

    /// Remote item description lookups.
    pub enrichment: EnrichmentConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Snapshot written by the fetcher.
    pub state_file: PathBuf,

    /// Fetcher log, used by the log tail command.
    pub fetcher_log: Option<PathBuf>,

    /// Message catalog (JSON object of key to template).
    pub messages_file: Option<PathBuf>,
}

/// Bot behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Command prefix.
    pub prefix: String,

    /// Channel owner. Treated as an admin.
    pub channel: String,

    /// Announce newly received items automatically.
    pub auto_announce_items: bool,

    /// Seconds between two snapshot polls.
    pub poll_interval_secs: u64,

    /// Minutes between two "about" broadcasts.
    pub digest_interval_minutes: u64,

    /// Names allowed to run privileged commands.
    pub admin_users: Vec<String>,

    /// Let moderators run privileged commands.
    pub allow_mods_as_admin: bool,

    /// Link shown by the help message.
    pub help_url: Option<String>,

    /// Link shown by the about message.
    pub repo_url: String,

    /// Author shown by the about message.
    pub author: String,
}

/// Archipelago slot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchipelagoConfig {
    /// Display name used when an event carries no player name.
    pub slot_name: Option<String>,

    /// Total number of locations, used when the room does not report one.
    pub total_locations_override: Option<LocationOverride>,

    /// Game package used when the connected game has none.
    pub fallback_game: Option<String>,
}

/// Raw override value. Anything that is not a positive integer counts as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationOverride {
    Count(i64),
    Text(String),
    Other(toml::Value),
}

impl LocationOverride {
    /// The override as a location count, 0 when unusable.
    pub fn resolve(&self) -> u64 {
        let value = match self {
            Self::Count(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<i64>().ok(),
            Self::Other(_) => None,
        };
        value.filter(|n| *n > 0).map(|n| n as u64).unwrap_or(0)
    }
}

/// Remote item description lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Enable lookups.
    pub enabled: bool,

    /// Base URL of the item API.
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: LogLevel,

    /// Log format.
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level.
    Error,

    /// Warning level.
    Warn,

    /// Info level.
    Info,

    /// Debug level.
    Debug,

    /// Trace level.
    Trace,
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format.
    Json,

    /// Text format.
    Text,
}

impl BridgeConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))?;
        Ok(config_dir.join("apbridge").join("config.toml"))
    }

    /// Load configuration from file.
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::FileSystem(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = toml::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.paths.resolve_relative_to(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        std::fs::write(path, content)
            .map_err(|e| Error::FileSystem(format!("Failed to write config file: {}", e)))
    }

    /// Reject settings the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bot.poll_interval_secs == 0 {
            return Err(Error::validation("bot.poll_interval_secs must be positive"));
        }
        if self.bot.digest_interval_minutes == 0 {
            return Err(Error::validation(
                "bot.digest_interval_minutes must be positive",
            ));
        }
        if self.bot.poll_interval_secs > MAX_INTERVAL_SECS
            || self.bot.digest_interval_minutes > MAX_INTERVAL_SECS / 60
        {
            return Err(Error::validation("bot intervals must not exceed one week"));
        }
        if self.bot.prefix.trim().is_empty() {
            return Err(Error::validation("bot.prefix must not be empty"));
        }
        Ok(())
    }

    /// Positive total-location override, 0 when unset or unusable.
    pub fn total_locations_override(&self) -> u64 {
        self.archipelago
            .total_locations_override
            .as_ref()
            .map(LocationOverride::resolve)
            .unwrap_or(0)
    }

    /// Game package used when the connected game has none.
    pub fn fallback_game(&self) -> &str {
        self.archipelago
            .fallback_game
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_FALLBACK_GAME)
    }

    /// Interval between two snapshot polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.bot.poll_interval_secs.clamp(1, MAX_INTERVAL_SECS))
    }

    /// Interval between two "about" broadcasts.
    pub fn digest_interval(&self) -> Duration {
        let secs = self.bot.digest_interval_minutes.max(1).saturating_mul(60);
        Duration::from_secs(secs.min(MAX_INTERVAL_SECS))
    }

    /// Link shown by the help message.
    pub fn help_url(&self) -> &str {
        self.bot.help_url.as_deref().unwrap_or(&self.bot.repo_url)
    }
}

impl PathsConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.state_file);
        if let Some(p) = self.fetcher_log.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.messages_file.as_mut() {
            resolve(p);
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("state.json"),
            fetcher_log: None,
            messages_file: None,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            channel: String::new(),
            auto_announce_items: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            digest_interval_minutes: DEFAULT_DIGEST_INTERVAL_MINUTES,
            admin_users: Vec::new(),
            allow_mods_as_admin: true,
            help_url: None,
            repo_url: DEFAULT_REPO_URL.to_string(),
            author: "Jade (TheLovenityJade)".to_string(),
        }
    }
}

impl Default for ArchipelagoConfig {
    fn default() -> Self {
        Self {
            slot_name: None,
            total_locations_override: None,
            fallback_game: Some(DEFAULT_FALLBACK_GAME.to_string()),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_ENRICHMENT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_ENRICHMENT_TIMEOUT_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
        }
    }
}

impl LogLevel {
    /// Directive understood by `tracing` filters.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
