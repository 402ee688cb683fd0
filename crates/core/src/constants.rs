//! Application constants and configuration defaults.

/// Default interval between two snapshot polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default interval between two "about" broadcasts, in minutes.
pub const DEFAULT_DIGEST_INTERVAL_MINUTES: u64 = 15;

/// Upper bound for the poll and digest intervals, in seconds (one week).
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Maximum length of a single outbound chat message.
pub const MAX_CHAT_MESSAGE_LENGTH: usize = 450;

/// Number of entries returned by "most recent unique" queries.
pub const RECENT_UNIQUE_LIMIT: usize = 5;

/// Game package used when the identity's game has no package of its own.
pub const DEFAULT_FALLBACK_GAME: &str = "Pokemon Emerald";

/// Default number of fetcher log lines returned by the log tail command.
pub const DEFAULT_LOG_TAIL_LINES: usize = 10;

/// Default command prefix.
pub const DEFAULT_COMMAND_PREFIX: &str = "!";

/// Default base URL for item enrichment lookups.
pub const DEFAULT_ENRICHMENT_BASE_URL: &str = "https://pokeapi.co/api/v2";

/// Default timeout for item enrichment lookups, in seconds.
pub const DEFAULT_ENRICHMENT_TIMEOUT_SECS: u64 = 10;

/// Default project URL shown by the help and about messages.
pub const DEFAULT_REPO_URL: &str = "https://github.com/lovenityjade/APTwitchBot";
