//! RollingState (spec §4.D): in-memory state that lives for one guild's ingest.

use crate::config::IngestConfig;
use crate::model::InternalId;
use crate::scorer::{PrevGuild, PrevUser, RecentEntry};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const RECENT_CAP: usize = 200;

/// `(avg_len, count)` per guild, updated after every non-bot message
/// (spec §4.D `GuildStats`).
#[derive(Debug, Clone, Copy, Default)]
pub struct GuildStats {
    pub avg_len: f64,
    pub count: i64,
}

impl GuildStats {
    /// Apply one message's length, returning the post-update state that gets
    /// written into the `ActivityRow` (spec §4.D).
    pub fn apply(&mut self, length: i32, alpha: f64) -> GuildStats {
        self.count += 1;
        self.avg_len = if self.avg_len <= 0.0 {
            length as f64
        } else {
            (1.0 - alpha) * self.avg_len + alpha * length as f64
        };
        *self
    }

    pub fn as_prev(&self) -> Option<PrevGuild> {
        if self.count > 0 {
            Some(PrevGuild {
                avg_len: self.avg_len,
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct SimEntry {
    simhash: u64,
    normalized_length: i32,
    timestamp: DateTime<Utc>,
}

/// Per-guild rolling state: guild length stats, each user's last message, and
/// each user's recent-simhash window (spec §4.D).
pub struct RollingState {
    pub guild: GuildStats,
    prev_user: HashMap<InternalId, PrevUser>,
    recent: HashMap<InternalId, Vec<SimEntry>>, // newest-first
    window: chrono::Duration,
}

impl RollingState {
    pub fn new(config: &IngestConfig) -> Self {
        RollingState {
            guild: GuildStats::default(),
            prev_user: HashMap::new(),
            recent: HashMap::new(),
            window: chrono::Duration::minutes(config.similarity_window_minutes as i64),
        }
    }

    pub fn seed_guild(&mut self, stats: GuildStats) {
        self.guild = stats;
    }

    pub fn seed_prev_user(&mut self, user_id: InternalId, prev: PrevUser) {
        self.prev_user.insert(user_id, prev);
    }

    /// Seed a user's recent-simhash window from persisted history, newest-first,
    /// already capped by the caller (spec §4.E query 3).
    pub fn seed_recent(
        &mut self,
        user_id: InternalId,
        entries: Vec<(u64, i32, DateTime<Utc>)>,
    ) {
        let entries = entries
            .into_iter()
            .map(|(simhash, normalized_length, timestamp)| SimEntry {
                simhash,
                normalized_length,
                timestamp,
            })
            .collect();
        self.recent.insert(user_id, entries);
    }

    pub fn prev_user(&self, user_id: InternalId) -> Option<&PrevUser> {
        self.prev_user.get(&user_id)
    }

    /// Recent-simhash entries for a user still within the similarity window
    /// as of `now`, in the scorer's expected shape. Entries are physically
    /// trimmed lazily (see [`RollingState::record`]); this additionally
    /// filters against `now` so a message arriving long after the user's
    /// last one never sees stale candidates (spec §4.D, §8 scenario 6).
    pub fn recent_entries(&self, user_id: InternalId, now: DateTime<Utc>) -> Vec<RecentEntry> {
        let cutoff = now - self.window;
        self.recent
            .get(&user_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.timestamp >= cutoff)
                    .map(|e| RecentEntry {
                        simhash: e.simhash,
                        normalized_length: e.normalized_length,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Record this message as the user's latest, append to the recent window,
    /// and trim (spec §4.D trim policy: drop stale, then cap at 200, oldest first).
    pub fn record(
        &mut self,
        user_id: InternalId,
        timestamp: DateTime<Utc>,
        content_hash: String,
        simhash: u64,
        normalized_length: i32,
    ) {
        self.prev_user.insert(
            user_id,
            PrevUser {
                timestamp,
                content_hash,
            },
        );

        let entries = self.recent.entry(user_id).or_default();
        entries.insert(
            0,
            SimEntry {
                simhash,
                normalized_length,
                timestamp,
            },
        );
        let cutoff = timestamp - self.window;
        entries.retain(|e| e.timestamp >= cutoff);
        entries.truncate(RECENT_CAP);
    }
}

/// Accumulated per-(user) XP/length/count deltas for one guild ingest,
/// flushed once after the merge drains (spec §4.D `UserDelta`, §4.G step 4).
#[derive(Debug, Default)]
pub struct UserDeltaMap {
    deltas: HashMap<InternalId, UserDelta>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UserDelta {
    pub xp_sum: i64,
    pub msg_count: i64,
    pub length_sum: i64,
    pub ema_current: f64,
}

impl UserDeltaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message's contribution. `persisted_ema` seeds `ema_current`
    /// on first touch (from the persisted EMA, or from `length` if that EMA
    /// is `<= 0`, per spec §4.D). The EMA only advances on `xp > 0` messages;
    /// `length_sum`/`msg_count` always advance (spec §9 asymmetry note).
    pub fn record(
        &mut self,
        user_id: InternalId,
        xp: i32,
        length: i32,
        persisted_ema: f64,
        alpha: f64,
    ) {
        let entry = self.deltas.entry(user_id).or_default();

        entry.msg_count += 1;
        entry.length_sum += length as i64;

        if xp > 0 {
            entry.xp_sum += xp as i64;
            let seed = if entry.ema_current > 0.0 {
                entry.ema_current
            } else if persisted_ema > 0.0 {
                persisted_ema
            } else {
                length as f64
            };
            entry.ema_current = (1.0 - alpha) * seed + alpha * length as f64;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (InternalId, UserDelta)> + '_ {
        self.deltas.iter().map(|(&id, &delta)| (id, delta))
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guild_stats_seeds_from_first_message() {
        let mut stats = GuildStats::default();
        let after = stats.apply(10, 2.0 / 501.0);
        assert_eq!(after.avg_len, 10.0);
        assert_eq!(after.count, 1);
    }

    #[test]
    fn guild_stats_ema_moves_toward_new_length() {
        let mut stats = GuildStats {
            avg_len: 10.0,
            count: 1,
        };
        let alpha = 2.0 / 501.0;
        let after = stats.apply(20, alpha);
        assert!(after.avg_len > 10.0 && after.avg_len < 20.0);
        assert_eq!(after.count, 2);
    }

    #[test]
    fn recent_window_trims_stale_and_caps_at_200() {
        let config = IngestConfig::default();
        let mut state = RollingState::new(&config);
        let base = chrono::Utc::now();
        for i in 0..250 {
            state.record(
                1,
                base + chrono::Duration::seconds(i),
                format!("h{i}"),
                i as u64,
                20,
            );
        }
        let now = base + chrono::Duration::seconds(249);
        assert_eq!(state.recent_entries(1, now).len(), 200);
        // newest-first: the most recently inserted entry is first.
        assert_eq!(state.recent_entries(1, now)[0].simhash, 249);
    }

    #[test]
    fn user_delta_ema_seeds_from_persisted_value() {
        let mut deltas = UserDeltaMap::new();
        deltas.record(1, 5, 40, 30.0, 2.0 / 501.0);
        let (_, delta) = deltas.iter().next().unwrap();
        // seed=30 (persisted), length=40: EMA moves from the seed toward 40.
        assert!(delta.ema_current > 30.0 && delta.ema_current < 40.0);
    }

    #[test]
    fn user_delta_only_updates_ema_on_positive_xp() {
        let mut deltas = UserDeltaMap::new();
        deltas.record(1, 0, 999, 30.0, 2.0 / 501.0);
        assert_eq!(deltas.iter().next().unwrap().1.ema_current, 0.0);
        deltas.record(1, 5, 40, 30.0, 2.0 / 501.0);
        let (_, delta) = deltas.iter().next().unwrap();
        assert!(delta.ema_current > 30.0 && delta.ema_current < 40.0);
    }

    #[test]
    fn user_delta_zero_xp_skips_ema_but_counts_length() {
        let mut deltas = UserDeltaMap::new();
        deltas.record(1, 0, 40, 30.0, 2.0 / 501.0);
        let (_, delta) = deltas.iter().next().unwrap();
        assert_eq!(delta.ema_current, 0.0);
        assert_eq!(delta.msg_count, 1);
        assert_eq!(delta.length_sum, 40);
        assert_eq!(delta.xp_sum, 0);
    }
}
