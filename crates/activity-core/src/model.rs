//! Wire and persisted data shapes (spec §3).

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// An internal surrogate key for a guild or user row, assigned by the store.
pub type InternalId = i64;

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "isBot")]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub author: Author,
}

impl Default for Author {
    fn default() -> Self {
        Author {
            id: String::new(),
            name: String::new(),
            is_bot: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRef {
    pub id: String,
}

/// One exported channel's worth of messages (spec §3 "Export").
#[derive(Debug, Clone, Deserialize)]
pub struct Export {
    pub guild: GuildRef,
    pub channel: ChannelRef,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// A fully computed, about-to-be-persisted activity row (spec §3 "ActivityRow").
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub channel_id: u64,
    pub guild_id: InternalId,
    pub user_id: InternalId,
    pub insert_date: DateTime<Utc>,
    pub message_hash: String,
    pub message_length: i32,
    pub message_simhash: i64,
    pub normalized_length: i32,
    pub xp_gained: i32,
    pub guild_average_message_length: f64,
    pub guild_message_count: i64,
}

/// Cached/persisted per-(user, guild) aggregate (spec §3 "UserLevelsRow").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserLevels {
    pub total_xp: i64,
    pub level: i32,
    pub user_message_count: i64,
    pub user_average_message_length: f64,
    pub user_average_message_length_ema: f64,
}

impl Default for UserLevels {
    fn default() -> Self {
        UserLevels {
            total_xp: 0,
            level: 0,
            user_message_count: 0,
            user_average_message_length: 0.0,
            user_average_message_length_ema: 0.0,
        }
    }
}

/// `level = floor( log10((total_xp + 111)/111) ^ 5.0243 )` (spec §3 invariant).
pub fn level_from_xp(total_xp: i64) -> i32 {
    let ratio = (total_xp as f64 + 111.0) / 111.0;
    let level = ratio.log10().powf(5.0243);
    level.floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_xp_is_level_zero() {
        assert_eq!(level_from_xp(0), 0);
    }

    #[test]
    fn level_is_monotone_nondecreasing() {
        let mut prev = level_from_xp(0);
        for xp in (0..200_000i64).step_by(37) {
            let lvl = level_from_xp(xp);
            assert!(lvl >= prev, "level dropped at xp={xp}: {lvl} < {prev}");
            prev = lvl;
        }
    }
}
