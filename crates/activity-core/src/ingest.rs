//! Ingestor (spec §4.G): orchestrates normaliser, fingerprint hasher, scorer,
//! rolling state, seeder and merge source for one guild, writing activity
//! rows through a bulk sink and flushing aggregate deltas once at the end.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::fingerprint;
use crate::merge::{MergeSource, Stream};
use crate::model::{level_from_xp, ActivityRow, InternalId, Message, UserLevels};
use crate::rolling::UserDeltaMap;
use crate::scorer::{self, ScoreInput};
use crate::seed;
use crate::store::{ActivitySink, GuildTxn};
use std::collections::HashMap;

/// One channel's messages, keyed by the channel's external id, as handed to
/// [`Ingestor::ingest_guild`].
pub struct ChannelMessages {
    pub channel_id: u64,
    pub messages: Vec<Message>,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub rows_written: usize,
    pub users_updated: usize,
}

pub struct Ingestor {
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        Ingestor { config }
    }

    /// Ingest every message across `channels` for one guild, in one
    /// transaction (spec §4.G). Messages are merged in strict chronological
    /// order (spec §4.F) regardless of which channel they arrived from.
    pub async fn ingest_guild<'a>(
        &self,
        mut txn: Box<dyn GuildTxn + 'a>,
        guild_id_ext: &str,
        guild_name: &str,
        channels: Vec<ChannelMessages>,
    ) -> Result<IngestSummary, IngestError> {
        let guild_id = txn.ensure_guild(guild_id_ext, guild_name).await?;
        tracing::debug!(guild = guild_id_ext, channels = channels.len(), "opened guild");

        let first_ts = channels
            .iter()
            .flat_map(|c| c.messages.iter().map(|m| m.timestamp))
            .min();

        let mut state = match first_ts {
            Some(ts) => seed::seed_rolling_state(txn.as_mut(), guild_id, ts, &self.config).await?,
            None => {
                tracing::debug!(guild = guild_id_ext, "no messages across any channel, nothing to seed");
                txn.commit().await?;
                return Ok(IngestSummary::default());
            }
        };

        let streams = channels
            .into_iter()
            .map(|c| Stream::new(c.channel_id, c.messages))
            .collect();

        let mut sink = txn.open_activity_sink().await?;
        let mut deltas = UserDeltaMap::new();
        let mut user_ids: HashMap<String, InternalId> = HashMap::new();
        let mut cached_levels: HashMap<InternalId, UserLevels> = HashMap::new();
        let mut rows_written = 0usize;

        for merged in MergeSource::new(streams) {
            let message = merged.message;
            if message.author.is_bot {
                // Bot authors: the merge advances, but no row/state/delta
                // is ever produced (spec §3 invariant, §8 property 8).
                continue;
            }

            let user_id = match user_ids.get(&message.author.id) {
                Some(&id) => id,
                None => {
                    let id = txn
                        .ensure_user(&message.author.id, &message.author.name)
                        .await?;
                    user_ids.insert(message.author.id.clone(), id);
                    id
                }
            };
            let persisted = match cached_levels.get(&user_id) {
                Some(&levels) => levels,
                None => {
                    let levels = txn.cached_user_levels(user_id, guild_id).await?;
                    cached_levels.insert(user_id, levels);
                    levels
                }
            };

            let length = message.content.encode_utf16().count() as i32;
            let content_hash = fingerprint::content_hash(&message.content);
            let fp = fingerprint::fingerprint(&message.content);

            let prev_user = state.prev_user(user_id).cloned();
            let recent = state.recent_entries(user_id, message.timestamp);
            let prev_guild = state.guild.as_prev();

            let xp = scorer::score(&ScoreInput {
                length,
                normalized_length: fp.normalized_length,
                simhash: fp.simhash,
                content_hash: &content_hash,
                timestamp: message.timestamp,
                prev_user: prev_user.as_ref(),
                recent: &recent,
                prev_guild,
            });

            let guild_after = state.guild.apply(length, self.config.alpha());

            let row = ActivityRow {
                channel_id: merged.channel_id,
                guild_id,
                user_id,
                insert_date: message.timestamp,
                message_hash: content_hash.clone(),
                message_length: length,
                message_simhash: fp.simhash as i64,
                normalized_length: fp.normalized_length,
                xp_gained: xp,
                guild_average_message_length: guild_after.avg_len,
                guild_message_count: guild_after.count,
            };
            sink.write_row(&row).await?;
            rows_written += 1;

            state.record(
                user_id,
                message.timestamp,
                content_hash,
                fp.simhash,
                fp.normalized_length,
            );
            deltas.record(
                user_id,
                xp,
                length,
                persisted.user_average_message_length_ema,
                self.config.alpha(),
            );
        }

        sink.finish().await?;
        tracing::debug!(guild = guild_id_ext, rows_written, "activity rows flushed");

        let users_updated = if deltas.is_empty() {
            0
        } else {
            let mut updates = Vec::new();
            for (user_id, delta) in deltas.iter() {
                let persisted = cached_levels
                    .get(&user_id)
                    .copied()
                    .unwrap_or_default();
                let total_xp = persisted.total_xp + delta.xp_sum;
                let level = level_from_xp(total_xp);
                let count = persisted.user_message_count + delta.msg_count;
                let avg = if count == 0 {
                    0.0
                } else {
                    (persisted.user_average_message_length * persisted.user_message_count as f64
                        + delta.length_sum as f64)
                        / count as f64
                };
                let ema = if delta.ema_current > 0.0 {
                    delta.ema_current
                } else {
                    persisted.user_average_message_length_ema
                };
                updates.push((
                    user_id,
                    UserLevels {
                        total_xp,
                        level,
                        user_message_count: count,
                        user_average_message_length: avg,
                        user_average_message_length_ema: ema,
                    },
                ));
            }
            let count = updates.len();
            txn.flush_user_levels(guild_id, updates).await?;
            count
        };

        txn.commit().await?;

        Ok(IngestSummary {
            rows_written,
            users_updated,
        })
    }
}
