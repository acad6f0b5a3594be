//! Store adapter (spec §4.H): the narrow capability surface `activity-core`
//! depends on. A concrete implementation (Postgres, in `activity-store`)
//! provides lookups, seed queries, a streaming bulk sink, and batched
//! aggregate updates, all scoped to the single transaction that wraps one
//! guild's ingest (spec §4.G, §5).

use crate::error::StoreError;
use crate::model::{InternalId, UserLevels};
use crate::rolling::GuildStats;
use crate::scorer::PrevUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A streaming bulk-insert sink for one guild's activity rows, held open for
/// the full guild and closed before the aggregate flush (spec §5).
#[async_trait]
pub trait ActivitySink: Send {
    async fn write_row(&mut self, row: &crate::model::ActivityRow) -> Result<(), StoreError>;

    /// Close the sink, committing however many rows were streamed through it.
    async fn finish(self: Box<Self>) -> Result<(), StoreError>;
}

/// Entry point: opens the single transaction that wraps one guild's ingest
/// (spec §4.G, §5 "the database connection is owned exclusively by its
/// Ingestor"). `activity-core` never manages connection pooling itself.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin_guild(&self) -> Result<Box<dyn GuildTxn + '_>, StoreError>;
}

/// Everything the Ingestor does against one guild's transaction (spec §4.H).
#[async_trait]
pub trait GuildTxn: Send {
    /// Ensure a guild row exists, returning its internal id (spec §4.G step 1).
    async fn ensure_guild(
        &mut self,
        guild_id_ext: &str,
        guild_name: &str,
    ) -> Result<InternalId, StoreError>;

    /// Ensure a user row exists, updating the username if changed
    /// (spec §6 Persistence contract, `Users` table).
    async fn ensure_user(
        &mut self,
        user_id_ext: &str,
        username: &str,
    ) -> Result<InternalId, StoreError>;

    /// Cached `(total_xp, level, msg_count, avg_len, ema_len)` for one
    /// `(user, guild)` pair, zero-valued if never seen (spec §4.G step 1).
    async fn cached_user_levels(
        &mut self,
        user_id: InternalId,
        guild_id: InternalId,
    ) -> Result<UserLevels, StoreError>;

    /// Latest prior guild length stats strictly before `first_ts`
    /// (spec §4.E query 1). `None` if the guild has no prior history.
    async fn seed_guild_stats(
        &mut self,
        guild_id: InternalId,
        first_ts: DateTime<Utc>,
    ) -> Result<Option<GuildStats>, StoreError>;

    /// Each user's most recent `(timestamp, content_hash)` strictly before
    /// `first_ts` (spec §4.E query 2).
    async fn seed_prev_users(
        &mut self,
        guild_id: InternalId,
        first_ts: DateTime<Utc>,
    ) -> Result<HashMap<InternalId, PrevUser>, StoreError>;

    /// Each user's `(simhash, normalized_length, insert_date)` within
    /// `[first_ts - window, first_ts)`, newest-first, capped per user
    /// (spec §4.E query 3).
    async fn seed_recent_simhashes(
        &mut self,
        guild_id: InternalId,
        window_start: DateTime<Utc>,
        first_ts: DateTime<Utc>,
        cap_per_user: usize,
    ) -> Result<HashMap<InternalId, Vec<(u64, i32, DateTime<Utc>)>>, StoreError>;

    /// Open a bulk-copy sink over the activity table (spec §4.G step 3, §4.H).
    async fn open_activity_sink(&mut self) -> Result<Box<dyn ActivitySink>, StoreError>;

    /// Apply every accumulated `UserDelta` as one update per row, after the
    /// sink from [`GuildTxn::open_activity_sink`] has been finished
    /// (spec §4.G step 4).
    async fn flush_user_levels(
        &mut self,
        guild_id: InternalId,
        updates: Vec<(InternalId, UserLevels)>,
    ) -> Result<(), StoreError>;

    /// Commit the transaction. Dropping a `GuildTxn` without calling this
    /// rolls it back (spec §4.G "Failure semantics").
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
