//! Seeder (spec §4.E): one-shot queries that prime `RollingState` from
//! persisted history before the first new message in a guild.

use crate::config::IngestConfig;
use crate::error::StoreError;
use crate::model::InternalId;
use crate::rolling::RollingState;
use crate::store::GuildTxn;
use chrono::{DateTime, Utc};

/// Seed a fresh [`RollingState`] for `guild_id` using the three queries of
/// spec §4.E, keyed by the minimum timestamp across all files for this guild
/// (`first_ts`).
pub async fn seed_rolling_state(
    txn: &mut dyn GuildTxn,
    guild_id: InternalId,
    first_ts: DateTime<Utc>,
    config: &IngestConfig,
) -> Result<RollingState, StoreError> {
    let mut state = RollingState::new(config);

    if let Some(stats) = txn.seed_guild_stats(guild_id, first_ts).await? {
        state.seed_guild(stats);
    }

    for (user_id, prev) in txn.seed_prev_users(guild_id, first_ts).await? {
        state.seed_prev_user(user_id, prev);
    }

    let window_start =
        first_ts - chrono::Duration::minutes(config.similarity_window_minutes as i64);
    const RECENT_CAP_PER_USER: usize = 200;
    let recent = txn
        .seed_recent_simhashes(guild_id, window_start, first_ts, RECENT_CAP_PER_USER)
        .await?;
    for (user_id, entries) in recent {
        state.seed_recent(user_id, entries);
    }

    Ok(state)
}
