//! Who may run privileged commands.

use apbridge_core::config::BotConfig;
use std::collections::HashSet;

/// Author of a chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatUser {
    pub name: String,
    pub is_broadcaster: bool,
    pub is_moderator: bool,
}

impl ChatUser {
    /// A viewer without any badge.
    pub fn viewer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The channel owner.
    pub fn broadcaster(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_broadcaster: true,
            is_moderator: false,
        }
    }

    pub fn moderator(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_broadcaster: false,
            is_moderator: true,
        }
    }
}

/// Admin policy built from the bot configuration.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    channel: String,
    admin_users: HashSet<String>,
    allow_mods: bool,
}

impl Permissions {
    pub fn from_config(bot: &BotConfig) -> Self {
        Self {
            channel: bot.channel.trim().to_lowercase(),
            admin_users: bot
                .admin_users
                .iter()
                .map(|u| u.trim().to_lowercase())
                .filter(|u| !u.is_empty())
                .collect(),
            allow_mods: bot.allow_mods_as_admin,
        }
    }

    /// Broadcaster, moderator when allowed, allow-listed name, or the channel
    /// owner by name. Names compare case-insensitively.
    pub fn is_admin(&self, user: &ChatUser) -> bool {
        if user.is_broadcaster {
            return true;
        }
        if user.is_moderator && self.allow_mods {
            return true;
        }
        let name = user.name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }
        self.admin_users.contains(&name) || (!self.channel.is_empty() && name == self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissions(allow_mods: bool) -> Permissions {
        let bot = BotConfig {
            channel: "TheLovenityJade".to_string(),
            admin_users: vec!["Helper".to_string()],
            allow_mods_as_admin: allow_mods,
            ..Default::default()
        };
        Permissions::from_config(&bot)
    }

    #[test]
    fn owner_and_allow_list_are_admins() {
        let p = permissions(false);
        assert!(p.is_admin(&ChatUser::broadcaster("anyone")));
        assert!(p.is_admin(&ChatUser::viewer("thelovenityjade")));
        assert!(p.is_admin(&ChatUser::viewer("HELPER")));
        assert!(!p.is_admin(&ChatUser::viewer("lurker")));
        assert!(!p.is_admin(&ChatUser::viewer("")));
    }

    #[test]
    fn moderators_follow_configuration() {
        assert!(permissions(true).is_admin(&ChatUser::moderator("mod")));
        assert!(!permissions(false).is_admin(&ChatUser::moderator("mod")));
    }
}
